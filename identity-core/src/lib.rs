//! Multi-tenant identity core.
//!
//! The authorization and session-security subsystem of an identity backend:
//! effective-permission resolution with cache-aside memoization, the
//! access-token and opaque-session lifecycle (issue, validate, rotate,
//! revoke, enumerate), brute-force lockout, and sliding-window rate limiting.
//!
//! The relational store is the single source of truth; the ephemeral store
//! (cache entries, rate counters) is advisory and safe to lose. HTTP routing,
//! admin CRUD, email, and audit persistence are external collaborators wired
//! up by the consuming service.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

pub use config::IdentityConfig;
pub use services::{
    Database, JwtService, LockoutGuard, PermissionService, RateCategory, RateDecision,
    RateLimitService, RedisService, ServiceError, SessionService,
};
