pub mod utils;

/// 网盘下载请求使用的固定 User-Agent
pub const PCS_UA: &str = "softxm;netdisk";

pub const ONE_M: u64 = 1024 * 1024;

/// 服务端允许的单次 Range 请求最大长度
pub const MAX_CHUNK_SIZE: u64 = 50 * ONE_M;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_CHUNK_SIZE: &str = "50M";
