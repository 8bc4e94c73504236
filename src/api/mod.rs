pub mod client;
pub mod error;
pub mod models;

pub use client::PcsClient;
pub use error::ApiError;
pub use models::RemoteEntry;

use async_trait::async_trait;

/// 远程内容存储的抽象接口。
///
/// 认证、列表、取下载链接等属于存储服务自身的语义，
/// 下载编排器只依赖这个接口，不关心具体实现。
#[async_trait]
pub trait RemoteFs: Send + Sync {
    /// 远程路径是否存在
    async fn exists(&self, remotepath: &str) -> Result<bool, ApiError>;

    /// 取远程路径的元信息（文件/目录、大小）
    async fn meta(&self, remotepath: &str) -> Result<RemoteEntry, ApiError>;

    /// 列出远程目录的直接子项
    async fn list(&self, remotedir: &str) -> Result<Vec<RemoteEntry>, ApiError>;

    /// 取文件的下载链接；被服务端屏蔽的路径返回 None
    async fn download_link(&self, remotepath: &str) -> Result<Option<String>, ApiError>;

    /// 会话的认证令牌（BDUSS 值），未登录时为 None
    fn auth_token(&self) -> Option<&str>;
}
