use thiserror::Error;

/// Coarse error class used by callers (HTTP layer, operators) to tell
/// "attacker" from "outage" without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Unauthorized,
    Dependency,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    // Absent entities
    #[error("User not found")]
    UserNotFound,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Role not found")]
    RoleNotFound,

    #[error("Session not found")]
    SessionNotFound,

    // Rejections. Account-locked stays distinguishable from bad credentials;
    // the enumeration trade-off is accepted.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked")]
    AccountLocked,

    #[error("Account is not active")]
    AccountInactive,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Tenant is suspended")]
    TenantSuspended,

    #[error("Invalid session token")]
    InvalidSession,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session revoked")]
    SessionRevoked,

    // Dependency failures: retryable server errors, never downgraded to an
    // authorization rejection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Signing key unavailable: {0}")]
    SigningKey(anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl ServiceError {
    /// Classify this error per the NotFound / Unauthorized / Dependency
    /// taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::UserNotFound
            | ServiceError::TenantNotFound
            | ServiceError::RoleNotFound
            | ServiceError::SessionNotFound => ErrorClass::NotFound,

            ServiceError::InvalidCredentials
            | ServiceError::AccountLocked
            | ServiceError::AccountInactive
            | ServiceError::EmailNotVerified
            | ServiceError::TenantSuspended
            | ServiceError::InvalidSession
            | ServiceError::SessionExpired
            | ServiceError::SessionRevoked => ErrorClass::Unauthorized,

            ServiceError::Database(_)
            | ServiceError::Cache(_)
            | ServiceError::SigningKey(_)
            | ServiceError::Config(_) => ErrorClass::Dependency,
        }
    }
}
