//! Services layer for the identity core.
//!
//! Each component of the authorization and session-security subsystem lives
//! here: permission resolution and caching, the session lifecycle manager,
//! the lockout guard, and the rate limiter, plus the storage seams they sit
//! on.

mod database;
mod jwt;
mod lockout;
mod memory;
mod permissions;
mod rate_limit;
mod sessions;

pub mod error;
pub mod events;
pub mod redis;
pub mod store;

pub use database::Database;
pub use error::{ErrorClass, ServiceError};
pub use events::{
    MemoryEventSink, SecurityEvent, SecurityEventKind, SecurityEventSink, SecurityEvents,
    TracingEventSink,
};
pub use jwt::{AccessTokenClaims, JwtService};
pub use lockout::LockoutGuard;
pub use memory::{MemoryEphemeral, MemoryStore};
pub use permissions::PermissionService;
pub use rate_limit::{RateCategory, RateDecision, RateLimitService};
pub use redis::RedisService;
pub use sessions::{SessionService, TokenResponse};
pub use store::{AuthFailureOutcome, EphemeralStore, IdentityStore};
