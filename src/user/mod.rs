// 用户模块
// 包含用户类型定义和带缓存的用户目录

pub mod directory;
pub mod types;

pub use directory::UserDirectory;
pub use types::{
    CreateUserRequest, LoginRequest, MIN_PASSWORD_LEN, Role, UpdateUserRequest, User, UserRecord,
};
