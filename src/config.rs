use clap::Parser;
use serde::Deserialize;
use std::fmt::Display;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::rate_limit::TokenPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "APP_";
const MIN_JWT_SECRET_LEN: usize = 32;
// ten years
const MAX_JWT_EXPIRE_SECS: u64 = 10 * 365 * 24 * 3600;

// CLI argument structure
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "turbo-server")]
#[command(about = "HTTP API scaffold with per-client rate limiting")]
pub struct Args {
    // TOML config file (defaults to ./config.toml when present)
    #[arg(short, long, env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    // Address to bind, overrides server.host
    #[arg(long)]
    pub host: Option<String>,

    // Port to run the server on, overrides server.port
    #[arg(short, long)]
    pub port: Option<u16>,

    // Log level, overrides log.level
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: String,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub log: LogConfig,
    pub middleware: MiddlewareConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    // Peers allowed to set X-Forwarded-For
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub enabled: bool,
    pub secret: String,
    pub expire_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("unsupported log format `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub ip_access: IpAccessConfig,
    pub prometheus: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub rps: f64,
    pub burst: i64,
    // Evict budgets idle this long (and already refilled). Unset keeps every client forever.
    pub idle_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IpAccessConfig {
    pub enabled: bool,
    pub allowed_ips: Vec<IpAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            server: ServerConfig::default(),
            jwt: JwtConfig::default(),
            log: LogConfig::default(),
            middleware: MiddlewareConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            expire_secs: 72 * 3600,
            issuer: "turbo-server".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            ip_access: IpAccessConfig::default(),
            prometheus: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_origins: vec!["*".to_string()],
            allow_methods: ["GET", "POST", "PUT", "DELETE"].map(String::from).to_vec(),
            allow_headers: vec!["content-type".to_string(), "authorization".to_string()],
            expose_headers: Vec::new(),
            allow_credentials: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: 100.0,
            burst: 50,
            idle_ttl_secs: None,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `APP_*` environment variables,
    /// then CLI flags. The result is validated before it is returned.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Overrides fields from `APP_*` variables. `lookup` resolves a variable
    /// name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource { lookup };

        env.string("ENV", &mut self.env);

        env.string("SERVER_HOST", &mut self.server.host);
        env.parse("SERVER_PORT", &mut self.server.port)?;
        env.list("SERVER_TRUSTED_PROXIES", &mut self.server.trusted_proxies)?;

        env.parse("JWT_ENABLED", &mut self.jwt.enabled)?;
        env.string("JWT_SECRET", &mut self.jwt.secret);
        env.parse("JWT_EXPIRE_SECS", &mut self.jwt.expire_secs)?;
        env.string("JWT_ISSUER", &mut self.jwt.issuer);

        env.string("LOG_LEVEL", &mut self.log.level);
        env.parse("LOG_FORMAT", &mut self.log.format)?;

        let mw = &mut self.middleware;
        env.parse("MIDDLEWARE_PROMETHEUS", &mut mw.prometheus)?;

        env.parse("MIDDLEWARE_CORS_ENABLED", &mut mw.cors.enabled)?;
        env.list("MIDDLEWARE_CORS_ALLOW_ORIGINS", &mut mw.cors.allow_origins)?;
        env.list("MIDDLEWARE_CORS_ALLOW_METHODS", &mut mw.cors.allow_methods)?;
        env.list("MIDDLEWARE_CORS_ALLOW_HEADERS", &mut mw.cors.allow_headers)?;
        env.list("MIDDLEWARE_CORS_EXPOSE_HEADERS", &mut mw.cors.expose_headers)?;
        env.parse("MIDDLEWARE_CORS_ALLOW_CREDENTIALS", &mut mw.cors.allow_credentials)?;

        env.parse("MIDDLEWARE_RATE_LIMIT_ENABLED", &mut mw.rate_limit.enabled)?;
        env.parse("MIDDLEWARE_RATE_LIMIT_RPS", &mut mw.rate_limit.rps)?;
        env.parse("MIDDLEWARE_RATE_LIMIT_BURST", &mut mw.rate_limit.burst)?;
        env.parse("MIDDLEWARE_RATE_LIMIT_IDLE_TTL_SECS", &mut mw.rate_limit.idle_ttl_secs)?;

        env.parse("MIDDLEWARE_IP_ACCESS_ENABLED", &mut mw.ip_access.enabled)?;
        env.list("MIDDLEWARE_IP_ACCESS_ALLOWED_IPS", &mut mw.ip_access.allowed_ips)?;

        Ok(())
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = &args.log_level {
            self.log.level = level.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate_limit = &self.middleware.rate_limit;
        if rate_limit.enabled {
            TokenPolicy::new(rate_limit.rps, rate_limit.burst)?;
        }

        if self.jwt.enabled && self.jwt.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret {
                min: MIN_JWT_SECRET_LEN,
            });
        }

        if self.jwt.enabled && !(1..=MAX_JWT_EXPIRE_SECS).contains(&self.jwt.expire_secs) {
            return Err(ConfigError::InvalidJwtExpiry {
                value: self.jwt.expire_secs,
                max: MAX_JWT_EXPIRE_SECS,
            });
        }

        if tracing::Level::from_str(&self.log.level).is_err() {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<(String, String)> {
        let name = format!("{ENV_PREFIX}{key}");
        (self.lookup)(&name).map(|value| (name, value))
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some((_, value)) = self.get(key) {
            *target = value;
        }
    }

    fn parse<T>(&self, key: &str, target: &mut T) -> Result<(), ConfigError>
    where
        T: EnvValue,
    {
        if let Some((name, value)) = self.get(key) {
            *target = T::from_env(value.trim()).map_err(|reason| ConfigError::Env {
                key: name,
                value,
                reason,
            })?;
        }
        Ok(())
    }

    // Comma-separated; an empty value clears the list
    fn list<T>(&self, key: &str, target: &mut Vec<T>) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some((name, value)) = self.get(key) {
            let parsed = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|item| {
                    item.parse::<T>().map_err(|e| ConfigError::Env {
                        key: name.clone(),
                        value: value.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            *target = parsed;
        }
        Ok(())
    }
}

// Scalar env values; `Option<u64>` becomes `Some` when the variable is set
trait EnvValue: Sized {
    fn from_env(s: &str) -> Result<Self, String>;
}

macro_rules! from_env_via_from_str {
    ($($ty:ty),*) => {
        $(impl EnvValue for $ty {
            fn from_env(s: &str) -> Result<Self, String> {
                s.parse::<$ty>().map_err(|e| e.to_string())
            }
        })*
    };
}

from_env_via_from_str!(bool, u16, u64, i64, f64, LogFormat);

impl EnvValue for Option<u64> {
    fn from_env(s: &str) -> Result<Self, String> {
        s.parse::<u64>().map(Some).map_err(|e| e.to_string())
    }
}
