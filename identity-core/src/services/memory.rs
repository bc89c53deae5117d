//! In-memory implementations of the storage seams.
//!
//! `MemoryStore` and `MemoryEphemeral` exist for tests and local development:
//! no external dependencies, single-process consistency, nothing durable.
//! `MemoryStore` additionally exposes fixture helpers (insert/assign/expire)
//! so tests can stand in for the out-of-scope administrative layer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Permission, Role, RolePermission, Session, Tenant, User, UserPermission, UserRole,
};
use crate::services::store::{AuthFailureOutcome, EphemeralStore, IdentityStore};
use crate::services::ServiceError;

/// In-memory relational store.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tenants: RwLock<HashMap<Uuid, Tenant>>,
    roles: RwLock<HashMap<Uuid, Role>>,
    permissions: RwLock<HashMap<Uuid, Permission>>,
    role_permissions: RwLock<Vec<RolePermission>>,
    user_roles: RwLock<Vec<UserRole>>,
    user_permissions: RwLock<Vec<UserPermission>>,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Fixture helpers ====================
    // These mutations belong to the administrative layer in production; the
    // store exposes them directly so tests can arrange state.

    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.tenant_id, tenant);
    }

    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.user_id, user);
    }

    pub async fn insert_role(&self, role: Role) {
        self.roles.write().await.insert(role.role_id, role);
    }

    pub async fn insert_permission(&self, permission: Permission) {
        self.permissions
            .write()
            .await
            .insert(permission.perm_id, permission);
    }

    pub async fn assign_role(&self, user_id: Uuid, role_id: Uuid) {
        self.user_roles.write().await.push(UserRole { user_id, role_id });
    }

    pub async fn remove_role_assignment(&self, user_id: Uuid, role_id: Uuid) {
        self.user_roles
            .write()
            .await
            .retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
    }

    pub async fn grant_role_permission(&self, role_id: Uuid, perm_id: Uuid) {
        self.role_permissions
            .write()
            .await
            .push(RolePermission { role_id, perm_id });
    }

    pub async fn revoke_role_permission(&self, role_id: Uuid, perm_id: Uuid) {
        self.role_permissions
            .write()
            .await
            .retain(|rp| !(rp.role_id == role_id && rp.perm_id == perm_id));
    }

    pub async fn grant_user_permission(&self, user_id: Uuid, perm_id: Uuid) {
        self.user_permissions
            .write()
            .await
            .push(UserPermission { user_id, perm_id });
    }

    /// Force a lockout expiry, e.g. into the past to simulate an elapsed
    /// lockout window.
    pub async fn set_lockout_expiry(&self, user_id: Uuid, when: Option<DateTime<Utc>>) {
        if let Some(user) = self.users.write().await.get_mut(&user_id) {
            user.lockout_expiry_utc = when;
        }
    }

    /// Push a session's expiry into the past.
    pub async fn expire_session(&self, session_id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.expiry_utc = Utc::now() - Duration::seconds(1);
        }
    }

    pub async fn get_session(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&session_id).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_user_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, ServiceError> {
        Ok(self.tenants.read().await.get(&tenant_id).cloned())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        Ok(self.roles.read().await.get(&role_id).cloned())
    }

    async fn record_auth_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lockout_duration_secs: i64,
    ) -> Result<AuthFailureOutcome, ServiceError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(ServiceError::UserNotFound)?;

        user.failed_attempt_count += 1;
        if user.failed_attempt_count >= max_attempts {
            user.lockout_expiry_utc = Some(Utc::now() + Duration::seconds(lockout_duration_secs));
        }

        Ok(AuthFailureOutcome {
            failed_attempt_count: user.failed_attempt_count,
            lockout_expiry_utc: user.lockout_expiry_utc,
        })
    }

    async fn reset_auth_failures(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or(ServiceError::UserNotFound)?;

        user.failed_attempt_count = 0;
        user.lockout_expiry_utc = None;
        user.last_auth_utc = Some(Utc::now());
        Ok(())
    }

    async fn effective_permission_codes(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        let permissions = self.permissions.read().await;
        let mut codes = Vec::new();

        let role_ids: Vec<Uuid> = self
            .user_roles
            .read()
            .await
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .map(|ur| ur.role_id)
            .collect();

        for rp in self.role_permissions.read().await.iter() {
            if role_ids.contains(&rp.role_id) {
                if let Some(p) = permissions.get(&rp.perm_id) {
                    if p.tenant_id == tenant_id {
                        codes.push(p.perm_code.clone());
                    }
                }
            }
        }

        for up in self.user_permissions.read().await.iter() {
            if up.user_id == user_id {
                if let Some(p) = permissions.get(&up.perm_id) {
                    if p.tenant_id == tenant_id {
                        codes.push(p.perm_code.clone());
                    }
                }
            }
        }

        Ok(codes)
    }

    async fn role_names_for_user(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        let roles = self.roles.read().await;
        let mut names: Vec<String> = self
            .user_roles
            .read()
            .await
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| roles.get(&ur.role_id))
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.role_name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn user_ids_with_role(&self, role_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        Ok(self
            .user_roles
            .read()
            .await
            .iter()
            .filter(|ur| ur.role_id == role_id)
            .map(|ur| ur.user_id)
            .collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        self.sessions
            .write()
            .await
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, ServiceError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.token_hash_text == token_hash)
            .cloned())
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            if session.revoked_utc.is_none() {
                session.revoked_utc = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_sessions_except(
        &self,
        user_id: Uuid,
        keep_session_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let mut revoked = 0;
        for session in self.sessions.write().await.values_mut() {
            if session.user_id == user_id
                && session.session_id != keep_session_id
                && session.revoked_utc.is_none()
            {
                session.revoked_utc = Some(Utc::now());
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn active_sessions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Session>, ServiceError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && s.is_valid())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(sessions)
    }

    async fn touch_session_last_used(&self, session_id: Uuid) -> Result<(), ServiceError> {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.last_used_utc = Some(Utc::now());
        }
        Ok(())
    }
}

/// In-memory ephemeral store with a switchable failure mode, so tests can
/// exercise the fail-open/fail-closed paths.
#[derive(Default)]
pub struct MemoryEphemeral {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    counters: Mutex<HashMap<String, i64>>,
    failing: AtomicBool,
}

impl MemoryEphemeral {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate backend unavailability for every subsequent call.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), anyhow::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("ephemeral store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl EphemeralStore for MemoryEphemeral {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        self.check_available()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("ephemeral store mutex poisoned: {}", e))?;

        let expired = matches!(
            entries.get(key),
            Some((_, Some(expires_at))) if *expires_at <= Instant::now()
        );
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        self.check_available()?;
        let expires_at = (expiry_seconds > 0)
            .then(|| Instant::now() + std::time::Duration::from_secs(expiry_seconds as u64));
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("ephemeral store mutex poisoned: {}", e))?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.check_available()?;
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("ephemeral store mutex poisoned: {}", e))?
            .remove(key);
        Ok(())
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        _expiry_seconds: i64,
    ) -> Result<i64, anyhow::Error> {
        // Expiry is irrelevant here: counter keys carry their window bucket,
        // so a new window means a new key.
        self.check_available()?;
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| anyhow::anyhow!("ephemeral store mutex poisoned: {}", e))?;
        let count = counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.check_available()
    }
}
