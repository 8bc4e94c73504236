use serde::{Deserialize, Serialize};

/// 远程文件或目录的元信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: String,
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
}

impl RemoteEntry {
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// 路径的最后一段，作为本地文件名
    pub fn basename(&self) -> &str {
        basename(&self.path)
    }
}

/// 取远程路径的最后一段（远程路径总是以 `/` 分隔）
pub fn basename(remotepath: &str) -> &str {
    remotepath.trim_end_matches('/').rsplit('/').next().unwrap_or(remotepath)
}

/// 服务端的统一响应包装
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub errno: i64,
    #[serde(default)]
    pub errmsg: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkData {
    pub dlink: Option<String>,
}
