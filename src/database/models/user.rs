use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::StoreError;
use crate::user::{Role, User, UserRecord};

/// 用户数据库实体
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserEntity> for UserRecord {
    type Error = StoreError;

    fn try_from(entity: UserEntity) -> Result<Self, Self::Error> {
        let role: Role = entity.role.parse().map_err(StoreError::Corrupt)?;
        Ok(UserRecord {
            user: User {
                id: entity.id,
                email: entity.email,
                first_name: entity.first_name,
                last_name: entity.last_name,
                role,
                created_at: entity.created_at,
                updated_at: entity.updated_at,
                is_deleted: entity.is_deleted,
            },
            password_hash: entity.password_hash,
        })
    }
}

/// 新建用户时写入的字段，密码已哈希
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

/// 更新时只修改为 `Some` 的字段
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}
