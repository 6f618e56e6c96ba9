// 数据库模块
// 包含数据库实体定义和存储库操作

#[cfg(test)]
pub mod memory; // 测试用内存存储
pub mod models; // 数据库实体定义
pub mod repositories; // 存储库实现

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::user::UserRecord;

// 重新导出常用类型和函数，方便其他模块使用
pub use models::user::{NewUser, UserChanges, UserEntity};
pub use repositories::user::PgUserRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found")]
    NotFound,

    #[error("email already in use")]
    Duplicate,

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// 用户持久化存储，所有查询只返回未删除的用户
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError>;

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError>;

    /// 软删除
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
