//! Effective-permission resolution with cache-aside memoization.
//!
//! The relational store is the authority; the ephemeral cache is a
//! performance optimization and never a security boundary. A cache-backend
//! failure falls open to direct computation, and a failed invalidation is
//! capped by the entry TTL.
//!
//! Cache contract: one entry per (principal, tenant) holding the full
//! effective set as a JSON array; module-scoped resolution filters the full
//! set, so invalidation is always a single-key delete.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::store::{EphemeralStore, IdentityStore};
use crate::services::ServiceError;

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn IdentityStore>,
    cache: Arc<dyn EphemeralStore>,
    cache_ttl_seconds: i64,
}

impl PermissionService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        cache: Arc<dyn EphemeralStore>,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            store,
            cache,
            cache_ttl_seconds,
        }
    }

    fn cache_key(user_id: Uuid, tenant_id: Uuid) -> String {
        format!("perms:{}:{}", tenant_id, user_id)
    }

    fn filter_module(codes: HashSet<String>, module: Option<&str>) -> HashSet<String> {
        match module {
            None => codes,
            Some(module) => codes
                .into_iter()
                .filter(|code| {
                    code.split_once('.')
                        .map_or(false, |(prefix, _)| prefix == module)
                })
                .collect(),
        }
    }

    /// Resolve the effective permission set for a principal within a tenant,
    /// optionally scoped to one module. Role-derived and directly-granted
    /// codes are unioned and deduplicated; iteration order is unspecified.
    pub async fn resolve(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        module: Option<&str>,
    ) -> Result<HashSet<String>, ServiceError> {
        let key = Self::cache_key(user_id, tenant_id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(codes) => {
                    return Ok(Self::filter_module(codes.into_iter().collect(), module));
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding corrupt permission cache entry");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Permission cache read failed, computing directly");
            }
        }

        let codes: HashSet<String> = self
            .store
            .effective_permission_codes(user_id, tenant_id)
            .await?
            .into_iter()
            .collect();

        match serde_json::to_string(&codes.iter().collect::<Vec<_>>()) {
            Ok(serialized) => {
                if let Err(e) = self.cache.set(&key, &serialized, self.cache_ttl_seconds).await {
                    tracing::warn!(key = %key, error = %e, "Failed to populate permission cache");
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize permission set");
            }
        }

        Ok(Self::filter_module(codes, module))
    }

    /// Names of the roles held by a principal within a tenant, for claims.
    pub async fn role_names(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        self.store.role_names_for_user(user_id, tenant_id).await
    }

    /// Drop the cached set for one (principal, tenant). Idempotent. A failed
    /// delete is logged but never blocks the mutation that triggered it; the
    /// entry TTL bounds the resulting staleness.
    pub async fn invalidate(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), ServiceError> {
        let key = Self::cache_key(user_id, tenant_id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Permission cache invalidation failed; entry TTL will cap staleness");
        }
        Ok(())
    }

    /// A role's own permission set changed: invalidate every principal
    /// currently holding that role.
    pub async fn invalidate_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        let role = self
            .store
            .find_role_by_id(role_id)
            .await?
            .ok_or(ServiceError::RoleNotFound)?;

        for user_id in self.store.user_ids_with_role(role_id).await? {
            self.invalidate(user_id, role.tenant_id).await?;
        }
        Ok(())
    }
}
