/// 缓存键模块
/// 提供各种缓存键生成函数

// 用户缓存键模块
pub mod user_keys;

pub use user_keys::{ALL_USERS_KEY, user_email_key, user_id_key, user_key_family};
