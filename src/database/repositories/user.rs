use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::user::{NewUser, UserChanges, UserEntity};
use crate::database::{StoreError, UserStore};
use crate::user::UserRecord;

const USER_COLUMNS: &str = r#"
    id,
    email,
    password_hash,
    first_name,
    last_name,
    role,
    is_deleted,
    created_at,
    updated_at
"#;

/// 用户存储库实现
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, UserEntity>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(entity) => {
                tracing::info!(user_id = %entity.id, "Created user");
                entity.try_into()
            }
            Err(e) => {
                tracing::error!("Failed to create user: {:?}", e);
                Err(map_write_error(e))
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1 AND is_deleted = false
            "#
        );

        let entity = sqlx::query_as::<_, UserEntity>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        entity.map(UserRecord::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1 AND is_deleted = false
            "#
        );

        let entity = sqlx::query_as::<_, UserEntity>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        entity.map(UserRecord::try_from).transpose()
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE is_deleted = false
            ORDER BY created_at
            "#
        );

        let entities = sqlx::query_as::<_, UserEntity>(&query)
            .fetch_all(&self.pool)
            .await?;

        entities.into_iter().map(UserRecord::try_from).collect()
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError> {
        let query = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                password_hash = COALESCE($3, password_hash),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                updated_at = now()
            WHERE id = $1 AND is_deleted = false
            RETURNING {USER_COLUMNS}
            "#
        );

        let entity = sqlx::query_as::<_, UserEntity>(&query)
            .bind(id)
            .bind(&changes.email)
            .bind(&changes.password_hash)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?;

        entity.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_deleted = true, updated_at = now()
            WHERE id = $1 AND is_deleted = false
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
