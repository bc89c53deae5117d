//! PostgreSQL store for the identity core.
//!
//! Implements [`IdentityStore`] over sqlx. Counter updates and revocations
//! are single atomic statements; the pool's acquire timeout bounds every
//! call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Role, Session, Tenant, User};
use crate::services::store::{AuthFailureOutcome, IdentityStore};
use crate::services::ServiceError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for Database {
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email_in_tenant(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND LOWER(email) = LOWER($2)",
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_tenant_by_id(&self, tenant_id: Uuid) -> Result<Option<Tenant>, ServiceError> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn record_auth_failure(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lockout_duration_secs: i64,
    ) -> Result<AuthFailureOutcome, ServiceError> {
        // Increment and arm the lockout in one statement so concurrent
        // failures cannot under-count.
        let (failed_attempt_count, lockout_expiry_utc): (i32, Option<DateTime<Utc>>) =
            sqlx::query_as(
            r#"
            UPDATE users
            SET failed_attempt_count = failed_attempt_count + 1,
                lockout_expiry_utc = CASE
                    WHEN failed_attempt_count + 1 >= $2
                    THEN NOW() + make_interval(secs => $3)
                    ELSE lockout_expiry_utc
                END
            WHERE user_id = $1
            RETURNING failed_attempt_count, lockout_expiry_utc
            "#,
        )
        .bind(user_id)
        .bind(max_attempts)
        .bind(lockout_duration_secs as f64)
        .fetch_one(&self.pool)
        .await?;

        Ok(AuthFailureOutcome {
            failed_attempt_count,
            lockout_expiry_utc,
        })
    }

    async fn reset_auth_failures(&self, user_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_attempt_count = 0,
                lockout_expiry_utc = NULL,
                last_auth_utc = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn effective_permission_codes(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        // UNION deduplicates across the role path and the direct-grant path.
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT p.perm_code FROM permissions p
            JOIN role_permissions rp ON rp.perm_id = p.perm_id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1 AND p.tenant_id = $2
            UNION
            SELECT p.perm_code FROM permissions p
            JOIN user_permissions up ON up.perm_id = p.perm_id
            WHERE up.user_id = $1 AND p.tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(code,)| code).collect())
    }

    async fn role_names_for_user(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT r.role_name FROM roles r
            JOIN user_roles ur ON ur.role_id = r.role_id
            WHERE ur.user_id = $1 AND r.tenant_id = $2
            ORDER BY r.role_name
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn user_ids_with_role(&self, role_id: Uuid) -> Result<Vec<Uuid>, ServiceError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT user_id FROM user_roles WHERE role_id = $1")
                .bind(role_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, tenant_id, token_hash_text, expiry_utc,
                                  revoked_utc, last_used_utc, device_text, ip_text, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.tenant_id)
        .bind(&session.token_hash_text)
        .bind(session.expiry_utc)
        .bind(session.revoked_utc)
        .bind(session.last_used_utc)
        .bind(&session.device_text)
        .bind(&session.ip_text)
        .bind(session.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash_text = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(session)
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query(
            "UPDATE sessions SET revoked_utc = NOW() WHERE session_id = $1 AND revoked_utc IS NULL",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_sessions_except(
        &self,
        user_id: Uuid,
        keep_session_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked_utc = NOW()
            WHERE user_id = $1 AND session_id <> $2 AND revoked_utc IS NULL
            "#,
        )
        .bind(user_id)
        .bind(keep_session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn active_sessions_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Session>, ServiceError> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND revoked_utc IS NULL AND expiry_utc > NOW()
            ORDER BY created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn touch_session_last_used(&self, session_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("UPDATE sessions SET last_used_utc = NOW() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
