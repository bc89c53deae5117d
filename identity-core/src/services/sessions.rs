//! Token and session lifecycle manager.
//!
//! Orchestrates credential authentication, access-token issuance, and the
//! opaque session lifecycle: issue, validate, rotate, revoke, enumerate.
//! Session validity is store-authoritative; no cache ever sits in the
//! revocation path.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Session, SessionInfo, Tenant, User};
use crate::services::events::{SecurityEvent, SecurityEventKind, SecurityEvents};
use crate::services::jwt::JwtService;
use crate::services::lockout::LockoutGuard;
use crate::services::permissions::PermissionService;
use crate::services::store::IdentityStore;
use crate::services::ServiceError;
use crate::utils::{verify_password, Password, PasswordHashString};

/// Token pair returned to the client after authentication or refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub session_token: String,
    pub session_id: Uuid,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn IdentityStore>,
    permissions: PermissionService,
    jwt: JwtService,
    lockout: LockoutGuard,
    events: SecurityEvents,
    session_expiry_days: i64,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        permissions: PermissionService,
        jwt: JwtService,
        lockout: LockoutGuard,
        events: SecurityEvents,
        session_expiry_days: i64,
    ) -> Self {
        Self {
            store,
            permissions,
            jwt,
            lockout,
            events,
            session_expiry_days,
        }
    }

    /// Authenticate a principal with email + password inside a tenant.
    ///
    /// The lockout check runs before the credential comparison: a locked
    /// account is rejected even when the presented password is correct.
    /// Callers are expected to have passed the rate limiter already.
    pub async fn authenticate(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<TokenResponse, ServiceError> {
        let tenant = self
            .store
            .find_tenant_by_id(tenant_id)
            .await?
            .ok_or(ServiceError::TenantNotFound)?;
        if !tenant.is_active() {
            return Err(ServiceError::TenantSuspended);
        }

        let user = self
            .store
            .find_user_by_email_in_tenant(tenant_id, email)
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        let policy = tenant.lockout_policy();
        if LockoutGuard::is_locked(&user, &policy, chrono::Utc::now()) {
            self.events.emit(SecurityEvent::new(
                SecurityEventKind::LockedAccountAttempt,
                Some(tenant_id),
                Some(user.user_id),
                ip.clone(),
                "Authentication attempted against a locked account",
            ));
            return Err(ServiceError::AccountLocked);
        }

        if verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.password_hash_text.clone()),
        )
        .is_err()
        {
            self.lockout.record_failure(&user, &policy).await?;
            self.events.emit(SecurityEvent::new(
                SecurityEventKind::AuthFailure,
                Some(tenant_id),
                Some(user.user_id),
                ip.clone(),
                "Invalid credentials presented",
            ));
            return Err(ServiceError::InvalidCredentials);
        }

        if !user.is_active() {
            return Err(ServiceError::AccountInactive);
        }
        if tenant.require_verified_email_flag && !user.email_verified_flag {
            return Err(ServiceError::EmailNotVerified);
        }

        self.lockout.reset_on_success(user.user_id).await?;

        tracing::info!(user_id = %user.user_id, tenant_id = %tenant_id, "User authenticated");

        self.issue_for(&user, &tenant, device, ip).await
    }

    /// Persist a new Active session and hand back its opaque secret.
    pub async fn issue_session(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<(String, Session), ServiceError> {
        let (secret, session) =
            Session::mint(user_id, tenant_id, self.session_expiry_days, device, ip);
        self.store.insert_session(&session).await?;
        Ok((secret, session))
    }

    /// Validate an opaque session secret and return its record.
    ///
    /// Fails unless the record exists, is not revoked, is not expired, and
    /// both the owning principal and tenant are active. On success the
    /// last-used timestamp is bumped best-effort; it is telemetry, not a
    /// security gate, and last-write-wins under races.
    pub async fn validate_session(&self, secret: &str) -> Result<Session, ServiceError> {
        let (session, _, _) = self.validate_session_full(secret).await?;
        Ok(session)
    }

    async fn validate_session_full(
        &self,
        secret: &str,
    ) -> Result<(Session, User, Tenant), ServiceError> {
        let hash = Session::hash_token(secret);
        let session = self
            .store
            .find_session_by_hash(&hash)
            .await?
            .ok_or(ServiceError::InvalidSession)?;

        if session.is_revoked() {
            return Err(ServiceError::SessionRevoked);
        }
        if session.is_expired() {
            return Err(ServiceError::SessionExpired);
        }

        let user = self
            .store
            .find_user_by_id(session.user_id)
            .await?
            .ok_or(ServiceError::InvalidSession)?;
        if !user.is_active() {
            return Err(ServiceError::AccountInactive);
        }

        let tenant = self
            .store
            .find_tenant_by_id(session.tenant_id)
            .await?
            .ok_or(ServiceError::InvalidSession)?;
        if !tenant.is_active() {
            return Err(ServiceError::TenantSuspended);
        }

        if let Err(e) = self.store.touch_session_last_used(session.session_id).await {
            tracing::warn!(session_id = %session.session_id, error = %e, "Failed to bump session last-used timestamp");
        }

        Ok((session, user, tenant))
    }

    /// Exchange a valid session for a fresh access token and a new session.
    ///
    /// The session just used stays Active until its own expiry; rotation
    /// mints a sibling, not a replacement. Multiple devices sharing a refresh
    /// chain therefore keep working.
    pub async fn refresh(
        &self,
        secret: &str,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<TokenResponse, ServiceError> {
        let (session, user, tenant) = self.validate_session_full(secret).await?;

        tracing::info!(
            user_id = %user.user_id,
            predecessor_session_id = %session.session_id,
            "Session refreshed"
        );

        self.issue_for(&user, &tenant, device, ip).await
    }

    /// Revoke a session by ID. Idempotent: revoking an already-revoked
    /// session is a no-op.
    pub async fn revoke_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        self.store.revoke_session(session_id).await?;
        self.events.emit(SecurityEvent::new(
            SecurityEventKind::SessionRevoked,
            None,
            None,
            None,
            format!("Session {} revoked", session_id),
        ));
        Ok(())
    }

    /// Revoke a session by its opaque secret.
    pub async fn revoke_session_by_secret(&self, secret: &str) -> Result<(), ServiceError> {
        let hash = Session::hash_token(secret);
        let session = self
            .store
            .find_session_by_hash(&hash)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;
        self.revoke_session(session.session_id).await
    }

    /// List a principal's active sessions, flagging the caller's own.
    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        current_session_id: Uuid,
    ) -> Result<Vec<SessionInfo>, ServiceError> {
        let sessions = self.store.active_sessions_for_user(user_id).await?;
        Ok(sessions
            .iter()
            .map(|s| SessionInfo::from_session(s, current_session_id))
            .collect())
    }

    /// Revoke every session except the caller's current one. Requires a
    /// fresh credential proof so a captured session token cannot silently
    /// lock out the legitimate holder. Returns the number revoked.
    pub async fn revoke_all_except_current(
        &self,
        user_id: Uuid,
        current_session_id: Uuid,
        password: &str,
    ) -> Result<u64, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.password_hash_text.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let revoked = self
            .store
            .revoke_sessions_except(user_id, current_session_id)
            .await?;

        tracing::info!(user_id = %user_id, revoked, "Revoked all sessions except current");
        self.events.emit(SecurityEvent::new(
            SecurityEventKind::MassRevocation,
            Some(user.tenant_id),
            Some(user_id),
            None,
            format!("Revoked {} sibling sessions", revoked),
        ));

        Ok(revoked)
    }

    async fn issue_for(
        &self,
        user: &User,
        tenant: &Tenant,
        device: Option<String>,
        ip: Option<String>,
    ) -> Result<TokenResponse, ServiceError> {
        let roles = self
            .permissions
            .role_names(user.user_id, tenant.tenant_id)
            .await?;
        let mut perms: Vec<String> = self
            .permissions
            .resolve(user.user_id, tenant.tenant_id, None)
            .await?
            .into_iter()
            .collect();
        perms.sort();

        let access_token = self
            .jwt
            .generate_access_token(user.user_id, tenant.tenant_id, &roles, &perms)
            .map_err(ServiceError::SigningKey)?;

        let (session_token, session) = self
            .issue_session(user.user_id, tenant.tenant_id, device, ip)
            .await?;

        Ok(TokenResponse {
            access_token,
            session_token,
            session_id: session.session_id,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry_seconds(),
        })
    }
}
