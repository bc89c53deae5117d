//! Tenant model - isolation boundary carrying per-tenant security policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant entity. Read-only to this core; policy columns are owned by the
/// administrative layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub tenant_slug: String,
    pub tenant_label: String,
    pub active_flag: bool,
    pub require_verified_email_flag: bool,
    pub lockout_enabled_flag: bool,
    pub lockout_max_attempts: i32,
    pub lockout_duration_secs: i64,
    pub created_utc: DateTime<Utc>,
}

/// Immutable lockout-policy snapshot taken from a tenant row.
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    pub enabled: bool,
    pub max_attempts: i32,
    pub duration_secs: i64,
}

impl Tenant {
    /// Create a new tenant with default policy (lockout disabled).
    pub fn new(tenant_slug: String, tenant_label: String) -> Self {
        Self {
            tenant_id: Uuid::new_v4(),
            tenant_slug,
            tenant_label,
            active_flag: true,
            require_verified_email_flag: false,
            lockout_enabled_flag: false,
            lockout_max_attempts: 5,
            lockout_duration_secs: 900,
            created_utc: Utc::now(),
        }
    }

    /// Check if tenant is active.
    pub fn is_active(&self) -> bool {
        self.active_flag
    }

    /// Snapshot the lockout policy for this tenant.
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            enabled: self.lockout_enabled_flag,
            max_attempts: self.lockout_max_attempts,
            duration_secs: self.lockout_duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_snapshot_mirrors_tenant_columns() {
        let mut tenant = Tenant::new("acme".into(), "Acme Corp".into());
        tenant.lockout_enabled_flag = true;
        tenant.lockout_max_attempts = 3;
        tenant.lockout_duration_secs = 600;

        let policy = tenant.lockout_policy();
        assert!(policy.enabled);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.duration_secs, 600);
    }
}
