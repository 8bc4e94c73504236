use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::DownloadError;
use super::models::{ChunkSpec, ChunkState, ResumeMarker};

/// 把 `[0, content_length)` 划分为有序、互不重叠、完全覆盖的分块序列
pub fn plan(content_length: u64, chunk_size: u64) -> Result<Vec<ChunkSpec>, DownloadError> {
    if chunk_size == 0 {
        return Err(DownloadError::InvalidChunkSize("块大小必须大于 0".to_string()));
    }

    let mut chunks = Vec::new();
    let mut start = 0u64;
    let mut index = 0usize;
    while start < content_length {
        let end = (start + chunk_size).min(content_length);
        chunks.push(ChunkSpec { index, start, end, state: ChunkState::Pending });
        start = end;
        index += 1;
    }
    Ok(chunks)
}

impl ResumeMarker {
    pub fn new(content_length: u64, chunk_size: u64) -> Self {
        Self { content_length, chunk_size, done: Vec::new() }
    }

    /// 目标文件对应的断点记录路径
    pub fn path_for(localpath: &Path) -> PathBuf {
        let mut name = localpath.as_os_str().to_os_string();
        name.push(".pcsdl");
        PathBuf::from(name)
    }

    /// 加载断点记录。目标文件缺失、记录损坏或参数不一致时返回 None，
    /// 此时从头下载而不是信任旧记录。
    pub async fn load(localpath: &Path, content_length: u64, chunk_size: u64) -> Option<Self> {
        let marker_path = Self::path_for(localpath);
        if !tokio::fs::try_exists(localpath).await.unwrap_or(false) {
            return None;
        }
        let data = tokio::fs::read(&marker_path).await.ok()?;
        let marker: ResumeMarker = match serde_json::from_slice(&data) {
            Ok(m) => m,
            Err(e) => {
                warn!("断点记录损坏，忽略: {:?}, {}", marker_path, e);
                return None;
            }
        };
        if marker.content_length != content_length || marker.chunk_size != chunk_size {
            debug!(
                "断点记录与当前会话不一致 (大小 {} vs {}, 块 {} vs {})，重新下载",
                marker.content_length, content_length, marker.chunk_size, chunk_size
            );
            return None;
        }
        Some(marker)
    }

    /// 把已完成的分块标记为 Done，返回这些分块的总字节数
    pub fn apply(&self, chunks: &mut [ChunkSpec]) -> u64 {
        let mut resumed = 0u64;
        for &index in &self.done {
            if let Some(chunk) = chunks.get_mut(index) {
                chunk.state = ChunkState::Done;
                resumed += chunk.len();
            }
        }
        resumed
    }

    /// 原子落盘：先写临时文件再改名，重复续传是幂等的
    pub async fn save(&self, localpath: &Path) -> Result<(), DownloadError> {
        let marker_path = Self::path_for(localpath);
        let tmp_path = marker_path.with_extension("pcsdl.tmp");
        let data = serde_json::to_vec(self).map_err(|e| DownloadError::Marker(e.to_string()))?;
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &marker_path).await?;
        Ok(())
    }

    /// 下载成功后删除断点记录
    pub async fn remove(localpath: &Path) {
        let _ = tokio::fs::remove_file(Self::path_for(localpath)).await;
    }
}
