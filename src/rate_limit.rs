use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

use crate::config::RateLimitConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        self == Admission::Admitted
    }
}

// shared by every budget of one limiter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPolicy {
    refill_rate: f64,
    burst_capacity: f64,
}

impl TokenPolicy {
    pub fn new(rps: f64, burst: i64) -> Result<Self, ConfigError> {
        if !rps.is_finite() || rps < 0.0 {
            return Err(ConfigError::InvalidRate(rps));
        }
        if burst < 1 {
            return Err(ConfigError::InvalidBurst(burst));
        }
        Ok(Self {
            refill_rate: rps,
            burst_capacity: burst as f64,
        })
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    pub fn burst_capacity(&self) -> f64 {
        self.burst_capacity
    }
}

// Token budget of a single client
#[derive(Debug, Clone)]
pub struct RateBudget {
    tokens: f64,
    last_refill: Instant,
}

impl RateBudget {
    fn full(policy: &TokenPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.burst_capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, policy: &TokenPolicy, now: Instant) {
        // callers racing on one key may arrive with slightly older instants
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * policy.refill_rate).min(policy.burst_capacity);
        self.last_refill = self.last_refill.max(now);
    }

    fn try_take(&mut self) -> Admission {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Admission::Admitted
        } else {
            Admission::Rejected
        }
    }

    // Would this budget be back at full capacity by `now`?
    fn is_full_at(&self, policy: &TokenPolicy, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens + elapsed.as_secs_f64() * policy.refill_rate >= policy.burst_capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

// client id -> budget, created on first sight
#[derive(Debug, Default)]
pub struct BudgetRegistry {
    budgets: DashMap<String, RateBudget>,
}

impl BudgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The shard guard stays held while the budget is refilled and charged,
    // so refill + take is atomic for a given client.
    fn admit(&self, client: &str, policy: &TokenPolicy, now: Instant) -> Admission {
        if let Some(mut budget) = self.budgets.get_mut(client) {
            budget.refill(policy, now);
            return budget.try_take();
        }

        let mut budget = self
            .budgets
            .entry(client.to_owned())
            .or_insert_with(|| RateBudget::full(policy, now));
        budget.refill(policy, now);
        budget.try_take()
    }

    fn sweep(&self, policy: &TokenPolicy, idle_ttl: Duration, now: Instant) -> usize {
        let mut removed = 0;
        self.budgets.retain(|_, budget| {
            let idle = now.saturating_duration_since(budget.last_refill) >= idle_ttl;
            let evict = idle && budget.is_full_at(policy, now);
            if evict {
                removed += 1;
            }
            !evict
        });
        removed
    }

    pub fn budget(&self, client: &str) -> Option<RateBudget> {
        self.budgets.get(client).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

pub struct ActiveLimiter {
    policy: TokenPolicy,
    registry: BudgetRegistry,
    idle_ttl: Option<Duration>,
}

// Noop admits everything without touching any state
pub enum RateLimiter {
    Active(ActiveLimiter),
    Noop,
}

impl RateLimiter {
    pub fn from_config(cfg: &RateLimitConfig) -> Result<Self, ConfigError> {
        if !cfg.enabled {
            return Ok(RateLimiter::Noop);
        }
        let mut limiter = Self::new(cfg.rps, cfg.burst)?;
        if let RateLimiter::Active(active) = &mut limiter {
            active.idle_ttl = cfg.idle_ttl_secs.map(Duration::from_secs);
        }
        Ok(limiter)
    }

    pub fn new(rps: f64, burst: i64) -> Result<Self, ConfigError> {
        Ok(RateLimiter::Active(ActiveLimiter {
            policy: TokenPolicy::new(rps, burst)?,
            registry: BudgetRegistry::new(),
            idle_ttl: None,
        }))
    }

    pub fn noop() -> Self {
        RateLimiter::Noop
    }

    pub fn admit(&self, client: &str) -> Admission {
        match self {
            RateLimiter::Active(active) => active.registry.admit(client, &active.policy, Instant::now()),
            RateLimiter::Noop => Admission::Admitted,
        }
    }

    pub fn admit_at(&self, client: &str, now: Instant) -> Admission {
        match self {
            RateLimiter::Active(active) => active.registry.admit(client, &active.policy, now),
            RateLimiter::Noop => Admission::Admitted,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RateLimiter::Active(_))
    }

    pub fn policy(&self) -> Option<&TokenPolicy> {
        match self {
            RateLimiter::Active(active) => Some(&active.policy),
            RateLimiter::Noop => None,
        }
    }

    pub fn registry(&self) -> Option<&BudgetRegistry> {
        match self {
            RateLimiter::Active(active) => Some(&active.registry),
            RateLimiter::Noop => None,
        }
    }

    pub fn tracked_clients(&self) -> usize {
        self.registry().map_or(0, BudgetRegistry::len)
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        match self {
            RateLimiter::Active(active) => active.idle_ttl,
            RateLimiter::Noop => None,
        }
    }

    // Only budgets that would already be full are dropped; a re-created
    // budget starts full, so admission decisions never change.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        match self {
            RateLimiter::Active(ActiveLimiter {
                policy,
                registry,
                idle_ttl: Some(ttl),
            }) => registry.sweep(policy, *ttl, now),
            _ => 0,
        }
    }
}

// Periodic eviction of idle budgets. Only spawned when an idle TTL is configured.
pub async fn idle_sweeper(limiter: Arc<RateLimiter>, every: Duration) {
    let mut ticker = interval(every.max(Duration::from_secs(1)));
    // first tick fires immediately
    ticker.tick().await;

    debug!(interval = ?every, "rate-limit sweeper started");

    loop {
        ticker.tick().await;
        let removed = limiter.sweep_idle(Instant::now());
        if removed > 0 {
            debug!(
                removed,
                remaining = limiter.tracked_clients(),
                "evicted idle rate-limit budgets"
            );
        }
    }
}
