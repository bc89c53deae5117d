//! User model - tenant-scoped principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity (tenant-scoped principal).
///
/// `failed_attempt_count` and `lockout_expiry_utc` belong to the lockout
/// guard; `password_hash_text` is written by the out-of-scope profile layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash_text: String,
    pub active_flag: bool,
    pub email_verified_flag: bool,
    pub failed_attempt_count: i32,
    pub lockout_expiry_utc: Option<DateTime<Utc>>,
    pub last_auth_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user.
    pub fn new(tenant_id: Uuid, email: String, password_hash: String) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            tenant_id,
            email,
            password_hash_text: password_hash,
            active_flag: true,
            email_verified_flag: false,
            failed_attempt_count: 0,
            lockout_expiry_utc: None,
            last_auth_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Check if the user may authenticate at all.
    pub fn is_active(&self) -> bool {
        self.active_flag
    }
}

/// User response for API consumers (no credential material).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub active_flag: bool,
    pub email_verified_flag: bool,
    pub last_auth_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            tenant_id: u.tenant_id,
            email: u.email,
            active_flag: u.active_flag,
            email_verified_flag: u.email_verified_flag,
            last_auth_utc: u.last_auth_utc,
            created_utc: u.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_active_with_zeroed_counters() {
        let user = User::new(Uuid::new_v4(), "a@example.com".into(), "$argon2id$x".into());

        assert!(user.is_active());
        assert!(!user.email_verified_flag);
        assert_eq!(user.failed_attempt_count, 0);
        assert!(user.lockout_expiry_utc.is_none());
        assert!(user.last_auth_utc.is_none());
    }

    #[test]
    fn response_drops_credential_hash() {
        let user = User::new(Uuid::new_v4(), "a@example.com".into(), "$argon2id$x".into());
        let rendered = serde_json::to_string(&UserResponse::from(user)).unwrap();

        assert!(!rendered.contains("argon2id"));
    }
}
