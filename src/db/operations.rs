use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::models::{
    CounselorProfile, Principal, PrincipalRow, Role, RoleProfile, StudentProfile,
};
use crate::db::store::CredentialStore;
use crate::error::StorageError;

const PRINCIPAL_COLUMNS: &str =
    "id, email, password_hash, role, first_name, last_name, phone, is_active, created_at";

/// Postgres-backed credential store.
pub struct PgCredentialStore {
    pool: Arc<PgPool>,
}

impl PgCredentialStore {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, StorageError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    async fn insert_principal_with_transaction(
        principal: &Principal,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<Uuid, StorageError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO users (id, email, password_hash, role, first_name, last_name, phone, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(principal.id)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role.as_str())
        .bind(&principal.first_name)
        .bind(&principal.last_name)
        .bind(&principal.phone)
        .bind(principal.active)
        .bind(principal.created_at)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(id)
    }

    async fn insert_role_profile_with_transaction(
        principal_id: Uuid,
        role: Role,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<(), StorageError> {
        let sql = match role {
            Role::Student => "INSERT INTO students (user_id) VALUES ($1)",
            Role::Counselor => "INSERT INTO counselors (user_id) VALUES ($1)",
            Role::Admin => return Ok(()),
        };

        sqlx::query(sql)
            .bind(principal_id)
            .execute(&mut **transaction)
            .await?;

        Ok(())
    }

    fn to_principal(row: PrincipalRow) -> Result<Principal, StorageError> {
        Principal::try_from(row).map_err(StorageError::QueryError)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StorageError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Self::to_principal).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StorageError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Self::to_principal).transpose()
    }

    async fn insert_principal(&self, principal: &Principal) -> Result<Uuid, StorageError> {
        let mut transaction = self.begin_transaction().await?;
        let id = Self::insert_principal_with_transaction(principal, &mut transaction).await?;
        transaction.commit().await?;
        Ok(id)
    }

    async fn insert_role_profile(&self, principal_id: Uuid, role: Role) -> Result<(), StorageError> {
        let mut transaction = self.begin_transaction().await?;
        Self::insert_role_profile_with_transaction(principal_id, role, &mut transaction).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn create_principal(&self, principal: &Principal) -> Result<Uuid, StorageError> {
        let mut transaction = self.begin_transaction().await?;

        let result = async {
            let id = Self::insert_principal_with_transaction(principal, &mut transaction).await?;
            Self::insert_role_profile_with_transaction(id, principal.role, &mut transaction).await?;
            Ok::<_, StorageError>(id)
        }
        .await;

        match result {
            Ok(id) => {
                transaction.commit().await?;
                Ok(id)
            }
            Err(e) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    warn!("Rollback after failed principal insert also failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn find_role_profile(
        &self,
        principal_id: Uuid,
        role: Role,
    ) -> Result<Option<RoleProfile>, StorageError> {
        let profile = match role {
            Role::Student => sqlx::query_as::<_, StudentProfile>(
                "SELECT grade_level, interests, career_goals FROM students WHERE user_id = $1",
            )
            .bind(principal_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(RoleProfile::Student),
            Role::Counselor => sqlx::query_as::<_, CounselorProfile>(
                "SELECT specialization, qualifications, experience_years, bio, is_verified FROM counselors WHERE user_id = $1",
            )
            .bind(principal_id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .map(RoleProfile::Counselor),
            Role::Admin => None,
        };

        Ok(profile)
    }

    async fn set_active(&self, principal_id: Uuid, active: bool) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
            .bind(active)
            .bind(principal_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_principals(&self, role: Option<Role>) -> Result<Vec<Principal>, StorageError> {
        let rows = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY created_at DESC",
            PRINCIPAL_COLUMNS
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Self::to_principal).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
