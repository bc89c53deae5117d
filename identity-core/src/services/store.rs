//! Storage seams for the identity core.
//!
//! `IdentityStore` fronts the relational source of truth; `EphemeralStore`
//! fronts the shared cache/counter backend. Both are object-safe so services
//! hold `Arc<dyn ...>` and tests swap in the in-memory twins. All atomicity
//! is delegated to the backing store's own read-modify-write primitives; no
//! lock is held across any of these calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Role, Session, Tenant, User};
use crate::services::ServiceError;

/// Result of an atomic failed-authentication increment.
#[derive(Debug, Clone, Copy)]
pub struct AuthFailureOutcome {
    pub failed_attempt_count: i32,
    pub lockout_expiry_utc: Option<DateTime<Utc>>,
}

/// Read/write surface over the relational source of truth.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, ServiceError>;

    async fn find_tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, ServiceError>;

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError>;

    /// Atomically bump the failure counter, arming the lockout expiry when
    /// the count reaches `max_attempts`. Returns the post-increment state.
    async fn record_auth_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lockout_duration_secs: i64,
    ) -> Result<AuthFailureOutcome, ServiceError>;

    /// Zero the failure counter, clear any lockout, stamp `last_auth_utc`.
    async fn reset_auth_failures(&self, user_id: Uuid) -> Result<(), ServiceError>;

    /// Union of role-derived and directly-granted permission codes for a
    /// principal within a tenant. May contain duplicates; callers dedupe.
    async fn effective_permission_codes(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError>;

    /// Names of the roles held by a principal within a tenant.
    async fn role_names_for_user(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError>;

    /// Every principal currently holding a role (invalidation fan-out).
    async fn user_ids_with_role(&self, role_id: Uuid) -> Result<Vec<Uuid>, ServiceError>;

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError>;

    /// Look up a session by secret hash, regardless of state; the lifecycle
    /// manager distinguishes revoked from expired from absent.
    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, ServiceError>;

    /// Idempotent transition to Revoked; a second call is a no-op.
    async fn revoke_session(&self, session_id: Uuid) -> Result<(), ServiceError>;

    /// Revoke every active session of a user except one. Returns the number
    /// of sessions revoked.
    async fn revoke_sessions_except(
        &self,
        user_id: Uuid,
        keep_session_id: Uuid,
    ) -> Result<u64, ServiceError>;

    async fn active_sessions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Session>, ServiceError>;

    /// Telemetry write; last-write-wins under races.
    async fn touch_session_last_used(&self, session_id: Uuid) -> Result<(), ServiceError>;
}

/// Shared ephemeral store: permission cache entries and rate counters.
/// Contents are advisory and recomputable; total loss costs performance,
/// never correctness.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;

    async fn set(
        &self,
        key: &str,
        value: &str,
        expiry_seconds: i64,
    ) -> Result<(), anyhow::Error>;

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error>;

    /// Atomic counter increment; the key self-expires `expiry_seconds` after
    /// its first increment. Returns the post-increment count.
    async fn incr_with_expiry(&self, key: &str, expiry_seconds: i64)
        -> Result<i64, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}
