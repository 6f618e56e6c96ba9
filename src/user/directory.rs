use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::ReadThroughCache;
use crate::cache::keys::{ALL_USERS_KEY, user_email_key, user_id_key, user_key_family};
use crate::database::{NewUser, StoreError, UserChanges, UserStore};
use crate::error::AppError;
use crate::user::types::{CreateUserRequest, Role, UpdateUserRequest, User};
use crate::utils::{hash_password, verify_password};

/// 用户目录：持久化存储之上的读穿透缓存
///
/// 读操作先查缓存，写操作先写存储，成功后再让整个键族失效。
/// 密码哈希从不进入缓存，凭证校验总是直接读存储。
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
    cache: Arc<ReadThroughCache>,
    cache_ttl_secs: u64,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<ReadThroughCache>, cache_ttl_secs: u64) -> Self {
        Self {
            store,
            cache,
            cache_ttl_secs,
        }
    }

    pub async fn create(&self, req: CreateUserRequest) -> Result<User, AppError> {
        self.create_with_role(req, Role::User).await
    }

    pub async fn create_with_role(
        &self,
        req: CreateUserRequest,
        role: Role,
    ) -> Result<User, AppError> {
        req.validate()?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::conflict("User with this email already exists"));
        }

        let password_hash = hash_password(&req.password)?;
        let record = self
            .store
            .create(NewUser {
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Duplicate => AppError::conflict("User with this email already exists"),
                other => other.into(),
            })?;

        let user = record.user;
        // 邮箱键可能缓存了“查无此人”
        self.invalidate(user.id, [user.email.as_str()]).await;
        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn find_all(&self) -> Result<Vec<User>, AppError> {
        let ttl = Some(self.cache_ttl_secs);
        self.cache
            .get_or_set(
                ALL_USERS_KEY,
                || async {
                    let records = self.store.find_all().await?;
                    Ok::<_, AppError>(records.into_iter().map(|r| r.user).collect())
                },
                ttl,
            )
            .await
    }

    pub async fn find_one(&self, id: Uuid) -> Result<User, AppError> {
        let key = user_id_key(&id.to_string());
        let ttl = Some(self.cache_ttl_secs);
        let user: Option<User> = self
            .cache
            .get_or_set(
                &key,
                || async {
                    let record = self.store.find_by_id(id).await?;
                    Ok::<_, AppError>(record.map(|r| r.user))
                },
                ttl,
            )
            .await?;

        user.ok_or_else(|| AppError::not_found(format!("User with ID {} not found", id)))
    }

    /// 按邮箱查找公开资料，填充 `user:email:<email>` 键
    ///
    /// 不存在时返回 `None`，该结果同样会被缓存。登录不走这里，
    /// 因为密码哈希不进入缓存。
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let key = user_email_key(email);
        let ttl = Some(self.cache_ttl_secs);
        self.cache
            .get_or_set(
                &key,
                || async {
                    let record = self.store.find_by_email(email).await?;
                    Ok::<_, AppError>(record.map(|r| r.user))
                },
                ttl,
            )
            .await
    }

    pub async fn update(&self, id: Uuid, req: UpdateUserRequest) -> Result<User, AppError> {
        req.validate()?;

        // 存在性检查读存储而不是缓存
        let existing = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User with ID {} not found", id)))?;
        let old_email = existing.user.email;

        if let Some(email) = req.email.as_deref() {
            if email != old_email {
                if let Some(other) = self.store.find_by_email(email).await? {
                    if other.user.id != id {
                        return Err(AppError::conflict("Email already in use"));
                    }
                }
            }
        }

        let password_hash = match req.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let changes = UserChanges {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        };
        let user = self.store.update(id, changes).await?.user;

        self.invalidate(id, [old_email.as_str(), user.email.as_str()])
            .await;
        info!(user_id = %id, "User updated");
        Ok(user)
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), AppError> {
        let existing = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User with ID {} not found", id)))?;

        self.store.soft_delete(id).await?;

        self.invalidate(id, [existing.user.email.as_str()]).await;
        info!(user_id = %id, "User removed");
        Ok(())
    }

    /// 校验登录凭证，失败时不区分邮箱不存在和密码错误
    pub async fn validate_credentials(&self, email: &str, password: &str) -> Result<User, AppError> {
        let Some(record) = self.store.find_by_email(email).await? else {
            warn!(email, "Login attempt for unknown email");
            return Err(AppError::unauthorized("Invalid credentials"));
        };

        if !verify_password(password, &record.password_hash)? {
            warn!(user_id = %record.user.id, "Login attempt with wrong password");
            return Err(AppError::unauthorized("Invalid credentials"));
        }

        Ok(record.user)
    }

    /// 启动时确保管理员账号存在
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.find_by_email(email).await?.is_some() {
            info!(email, "Admin account already present");
            return Ok(());
        }

        let req = CreateUserRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: None,
            last_name: None,
        };
        self.create_with_role(req, Role::Admin).await?;
        Ok(())
    }

    async fn invalidate<'a>(&self, id: Uuid, emails: impl IntoIterator<Item = &'a str>) {
        for key in user_key_family(&id.to_string(), emails) {
            self.cache.del(&key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, ChaosControl, MemoryCacheStore};
    use crate::database::memory::MemoryUserStore;

    struct Fixture {
        store: Arc<MemoryUserStore>,
        cache_store: Arc<MemoryCacheStore>,
        chaos: Arc<ChaosControl>,
        directory: UserDirectory,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryUserStore::new());
        let cache_store = Arc::new(MemoryCacheStore::new());
        let chaos = Arc::new(ChaosControl::new(0.0).unwrap());
        let cache = Arc::new(ReadThroughCache::new(cache_store.clone(), chaos.clone()));
        let directory = UserDirectory::new(store.clone(), cache, 300);
        Fixture {
            store,
            cache_store,
            chaos,
            directory,
        }
    }

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "Password123!".to_string(),
            first_name: Some("John".to_string()),
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let fx = fixture();
        fx.directory.create(request("a@example.com")).await.unwrap();

        let err = fx.directory.create(request("a@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_one_is_served_from_cache() {
        let fx = fixture();
        let user = fx.directory.create(request("a@example.com")).await.unwrap();
        let reads_before = fx.store.reads();

        let first = fx.directory.find_one(user.id).await.unwrap();
        let second = fx.directory.find_one(user.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.store.reads(), reads_before + 1);
    }

    #[tokio::test]
    async fn test_find_one_missing_is_not_found() {
        let fx = fixture();
        let err = fx.directory.find_one(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cached_absent_email_is_a_hit() {
        let fx = fixture();
        assert!(fx.directory.find_by_email("ghost@example.com").await.unwrap().is_none());
        let reads = fx.store.reads();

        assert!(fx.directory.find_by_email("ghost@example.com").await.unwrap().is_none());
        assert_eq!(fx.store.reads(), reads);
    }

    #[tokio::test]
    async fn test_create_clears_cached_absent_email() {
        let fx = fixture();
        assert!(fx.directory.find_by_email("a@example.com").await.unwrap().is_none());

        fx.directory.create(request("a@example.com")).await.unwrap();
        let found = fx.directory.find_by_email("a@example.com").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_update_invalidates_old_and_new_email_keys() {
        let fx = fixture();
        let user = fx.directory.create(request("old@example.com")).await.unwrap();

        // 预热所有键
        fx.directory.find_one(user.id).await.unwrap();
        fx.directory.find_all().await.unwrap();
        fx.directory.find_by_email("old@example.com").await.unwrap();
        fx.directory.find_by_email("new@example.com").await.unwrap();

        let update = UpdateUserRequest {
            email: Some("new@example.com".into()),
            ..Default::default()
        };
        fx.directory.update(user.id, update).await.unwrap();

        assert!(fx.directory.find_by_email("old@example.com").await.unwrap().is_none());
        let by_new = fx.directory.find_by_email("new@example.com").await.unwrap().unwrap();
        assert_eq!(by_new.id, user.id);
        assert_eq!(fx.directory.find_one(user.id).await.unwrap().email, "new@example.com");
        assert_eq!(fx.directory.find_all().await.unwrap()[0].email, "new@example.com");
    }

    #[tokio::test]
    async fn test_update_rejects_taken_email() {
        let fx = fixture();
        let a = fx.directory.create(request("a@example.com")).await.unwrap();
        fx.directory.create(request("b@example.com")).await.unwrap();

        let update = UpdateUserRequest {
            email: Some("b@example.com".into()),
            ..Default::default()
        };
        let err = fx.directory.update(a.id, update).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_password_changes_credentials() {
        let fx = fixture();
        let user = fx.directory.create(request("a@example.com")).await.unwrap();

        let update = UpdateUserRequest {
            password: Some("NewPassword456!".into()),
            ..Default::default()
        };
        fx.directory.update(user.id, update).await.unwrap();

        assert!(
            fx.directory
                .validate_credentials("a@example.com", "Password123!")
                .await
                .is_err()
        );
        assert!(
            fx.directory
                .validate_credentials("a@example.com", "NewPassword456!")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_remove_invalidates_and_blocks_login() {
        let fx = fixture();
        let user = fx.directory.create(request("a@example.com")).await.unwrap();
        fx.directory.find_one(user.id).await.unwrap();
        assert_eq!(fx.directory.find_all().await.unwrap().len(), 1);

        fx.directory.remove(user.id).await.unwrap();

        assert!(matches!(
            fx.directory.find_one(user.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(fx.directory.find_all().await.unwrap().is_empty());
        assert!(
            fx.directory
                .validate_credentials("a@example.com", "Password123!")
                .await
                .is_err()
        );
        assert!(matches!(
            fx.directory.remove(user.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_disabled_cache_reads_store_every_time() {
        let fx = fixture();
        let user = fx.directory.create(request("a@example.com")).await.unwrap();
        fx.chaos.toggle_enabled(false);
        let reads = fx.store.reads();

        fx.directory.find_one(user.id).await.unwrap();
        fx.directory.find_one(user.id).await.unwrap();

        assert_eq!(fx.store.reads(), reads + 2);
        assert!(fx.cache_store.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let fx = fixture();
        fx.directory
            .ensure_admin("admin@example.com", "AdminPass123!")
            .await
            .unwrap();
        fx.directory
            .ensure_admin("admin@example.com", "AdminPass123!")
            .await
            .unwrap();

        let users = fx.directory.find_all().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);

        // 第二次调用通过缓存的邮箱键确认账号存在
        assert!(fx.cache_store.get("user:email:admin@example.com").await.unwrap().is_some());
    }
}
