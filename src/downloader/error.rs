use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("接口调用失败: {0}")]
    Api(#[from] ApiError),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("无效的块大小: {0}")]
    InvalidChunkSize(String),

    #[error("无法获取文件大小: {0}")]
    UnknownLength(String),

    #[error("HTTP 请求失败，状态码: {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("分块 {index} 下载失败: {reason}")]
    ChunkFailed { index: usize, reason: String },

    #[error("外部下载器 {tool} 失败，退出码: {code}")]
    BackendExit { tool: String, code: i32 },

    #[error("启动外部下载器 {tool} 失败: {source}")]
    BackendSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("断点记录无效: {0}")]
    Marker(String),

    #[error("任务执行失败: {0}")]
    Join(#[from] tokio::task::JoinError),
}
