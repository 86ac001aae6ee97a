// outermost first: request_log, ip_access, cors, rate_limit; auth is per route group

pub mod auth;
pub mod cors;
pub mod ip_access;
pub mod rate_limit;
pub mod request_log;
