/// 缓存操作
/// 提供读穿透缓存的实现

pub mod read_through;

pub use read_through::ReadThroughCache;
