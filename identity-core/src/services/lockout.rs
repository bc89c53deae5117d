//! Account lockout guard.
//!
//! Tracks consecutive credential failures per principal under the owning
//! tenant's policy. The lock check runs before any credential comparison, so
//! a locked account rejects authentication even when the presented credential
//! is correct.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{LockoutPolicy, User};
use crate::services::events::{SecurityEvent, SecurityEventKind, SecurityEvents};
use crate::services::store::IdentityStore;
use crate::services::ServiceError;

#[derive(Clone)]
pub struct LockoutGuard {
    store: Arc<dyn IdentityStore>,
    events: SecurityEvents,
}

impl LockoutGuard {
    pub fn new(store: Arc<dyn IdentityStore>, events: SecurityEvents) -> Self {
        Self { store, events }
    }

    /// Whether the principal is currently locked: policy enabled, an expiry
    /// is set, and the expiry lies in the future.
    pub fn is_locked(user: &User, policy: &LockoutPolicy, now: DateTime<Utc>) -> bool {
        policy.enabled && user.lockout_expiry_utc.map_or(false, |expiry| expiry > now)
    }

    /// Record one failed authentication. Reaching the policy maximum arms the
    /// lockout window and emits a security event. No-op when the policy is
    /// disabled.
    pub async fn record_failure(
        &self,
        user: &User,
        policy: &LockoutPolicy,
    ) -> Result<(), ServiceError> {
        if !policy.enabled {
            return Ok(());
        }

        let outcome = self
            .store
            .record_auth_failure(user.user_id, policy.max_attempts, policy.duration_secs)
            .await?;

        if outcome.failed_attempt_count == policy.max_attempts {
            tracing::warn!(
                user_id = %user.user_id,
                tenant_id = %user.tenant_id,
                attempts = outcome.failed_attempt_count,
                "Account locked after consecutive authentication failures"
            );
            self.events.emit(SecurityEvent::new(
                SecurityEventKind::BruteForceLockout,
                Some(user.tenant_id),
                Some(user.user_id),
                None,
                format!(
                    "Locked for {}s after {} consecutive failures",
                    policy.duration_secs, outcome.failed_attempt_count
                ),
            ));
        }

        Ok(())
    }

    /// Zero the failure counter and clear any lockout. Invoked after every
    /// successful authentication and after a successful credential reset.
    pub async fn reset_on_success(&self, user_id: Uuid) -> Result<(), ServiceError> {
        self.store.reset_auth_failures(user_id).await
    }
}
