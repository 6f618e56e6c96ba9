// 缓存模块
// 包含缓存键、存储门面、故障注入和读穿透缓存

pub mod chaos;
pub mod keys;
pub mod operations;
pub mod store;

// 重新导出常用类型和函数，方便其他模块使用
pub use chaos::{Admission, ChaosControl, ChaosError, ChaosStatus};
pub use operations::ReadThroughCache;
pub use store::{CacheError, CacheStore, MemoryCacheStore, RedisCacheStore};
