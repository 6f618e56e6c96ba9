use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::database::{NewUser, StoreError, UserChanges, UserStore};
use crate::user::{User, UserRecord};

/// 内存用户存储，记录读取次数以便验证缓存是否生效
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    reads: AtomicUsize,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn live_by_email(users: &HashMap<Uuid, UserRecord>, email: &str) -> Option<UserRecord> {
        users
            .values()
            .find(|r| !r.user.is_deleted && r.user.email == email)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.lock().unwrap();
        if Self::live_by_email(&users, &new.email).is_some() {
            return Err(StoreError::Duplicate);
        }
        let now = Utc::now();
        let record = UserRecord {
            user: User {
                id: Uuid::new_v4(),
                email: new.email,
                first_name: new.first_name,
                last_name: new.last_name,
                role: new.role,
                created_at: now,
                updated_at: now,
                is_deleted: false,
            },
            password_hash: new.password_hash,
        };
        users.insert(record.user.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(users.get(&id).filter(|r| !r.user.is_deleted).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(Self::live_by_email(&users, email))
    }

    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        let mut all: Vec<_> = users
            .values()
            .filter(|r| !r.user.is_deleted)
            .cloned()
            .collect();
        all.sort_by_key(|r| r.user.created_at);
        Ok(all)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<UserRecord, StoreError> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &changes.email {
            if let Some(other) = Self::live_by_email(&users, email) {
                if other.user.id != id {
                    return Err(StoreError::Duplicate);
                }
            }
        }
        let record = users
            .get_mut(&id)
            .filter(|r| !r.user.is_deleted)
            .ok_or(StoreError::NotFound)?;
        if let Some(email) = changes.email {
            record.user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            record.password_hash = hash;
        }
        if let Some(first_name) = changes.first_name {
            record.user.first_name = Some(first_name);
        }
        if let Some(last_name) = changes.last_name {
            record.user.last_name = Some(last_name);
        }
        record.user.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        let record = users
            .get_mut(&id)
            .filter(|r| !r.user.is_deleted)
            .ok_or(StoreError::NotFound)?;
        record.user.is_deleted = true;
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
