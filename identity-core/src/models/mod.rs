//! Data models for the identity core.
//!
//! Relational entities carry `sqlx::FromRow` and map 1:1 onto the consumed
//! schema; association tables stay as plain rows queried with set operations,
//! never as an in-memory object graph.

mod permission;
mod role;
mod session;
mod tenant;
mod user;

pub use permission::Permission;
pub use role::{Role, RolePermission, UserPermission, UserRole};
pub use session::{Session, SessionInfo};
pub use tenant::{LockoutPolicy, Tenant};
pub use user::{User, UserResponse};
