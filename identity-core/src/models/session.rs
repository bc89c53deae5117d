//! Session model - opaque refresh/session tokens.
//!
//! The secret handed to the client is never persisted; only its SHA-256 hash
//! is. A session is Active until revoked (explicit, terminal) or until the
//! clock passes `expiry_utc` (derived, never stored as a transition).

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity backing refresh tokens.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_hash_text: String,
    pub expiry_utc: DateTime<Utc>,
    pub revoked_utc: Option<DateTime<Utc>>,
    pub last_used_utc: Option<DateTime<Utc>>,
    pub device_text: Option<String>,
    pub ip_text: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Session {
    /// Mint a new session, returning the opaque secret alongside the record.
    /// The secret carries 256 bits of OS entropy; the record stores its hash.
    pub fn mint(
        user_id: Uuid,
        tenant_id: Uuid,
        expiry_days: i64,
        device: Option<String>,
        ip: Option<String>,
    ) -> (String, Self) {
        let secret = Self::generate_secret();
        let now = Utc::now();
        let session = Self {
            session_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            token_hash_text: Self::hash_token(&secret),
            expiry_utc: now + Duration::days(expiry_days),
            revoked_utc: None,
            last_used_utc: None,
            device_text: device,
            ip_text: ip,
            created_utc: now,
        };
        (secret, session)
    }

    /// Generate an opaque session secret: 32 random bytes, hex-encoded.
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Hash a session secret using SHA-256.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check if this session is expired.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Check if this session is revoked.
    pub fn is_revoked(&self) -> bool {
        self.revoked_utc.is_some()
    }

    /// Check if this session is valid (not expired, not revoked).
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_revoked()
    }
}

/// Session metadata surfaced to end users listing their sessions.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub device_text: Option<String>,
    pub ip_text: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub expiry_utc: DateTime<Utc>,
    pub last_used_utc: Option<DateTime<Utc>>,
    pub is_current: bool,
}

impl SessionInfo {
    /// Build the listing entry for a session, flagging the caller's own.
    pub fn from_session(s: &Session, current_session_id: Uuid) -> Self {
        Self {
            session_id: s.session_id,
            device_text: s.device_text.clone(),
            ip_text: s.ip_text.clone(),
            created_utc: s.created_utc,
            expiry_utc: s.expiry_utc,
            last_used_utc: s.last_used_utc,
            is_current: s.session_id == current_session_id,
        }
    }
}
