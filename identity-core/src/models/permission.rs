//! Permission model - (module, action) pairs with a tenant-unique code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Permission entity (tenant-scoped).
///
/// `perm_code` is always `"{module_name}.{action_name}"` and is the value
/// carried in access-token claims and cached permission sets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub perm_id: Uuid,
    pub tenant_id: Uuid,
    pub module_name: String,
    pub action_name: String,
    pub perm_code: String,
    pub created_utc: DateTime<Utc>,
}

impl Permission {
    /// Create a new permission; the code is derived, never passed in.
    pub fn new(tenant_id: Uuid, module_name: String, action_name: String) -> Self {
        let perm_code = Self::code(&module_name, &action_name);
        Self {
            perm_id: Uuid::new_v4(),
            tenant_id,
            module_name,
            action_name,
            perm_code,
            created_utc: Utc::now(),
        }
    }

    /// Build the canonical code for a (module, action) pair.
    pub fn code(module_name: &str, action_name: &str) -> String {
        format!("{}.{}", module_name, action_name)
    }
}
