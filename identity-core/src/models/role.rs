//! Role model and the association rows connecting users, roles, and
//! permissions. Associations are pure relational rows; effective permission
//! sets come out of joins, not object traversal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role entity (tenant-scoped, name unique within tenant).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub role_name: String,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new role.
    pub fn new(tenant_id: Uuid, role_name: String) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            tenant_id,
            role_name,
            created_utc: Utc::now(),
        }
    }
}

/// Role -> permission association row.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub perm_id: Uuid,
}

/// User -> role association row.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// User -> permission direct-grant association row.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct UserPermission {
    pub user_id: Uuid,
    pub perm_id: Uuid,
}
