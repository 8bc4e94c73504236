use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("远程路径不存在: {0}")]
    NotFound(String),

    #[error("无效的接口地址: {0}")]
    InvalidUrl(String),

    #[error("服务端错误码 {0}: {1}")]
    Errno(i64, String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
