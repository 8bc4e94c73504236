use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::common::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};

/// 一个批次内所有任务共享的下载配置
#[derive(Debug, Clone)]
pub struct DownloadParams {
    /// 并发 worker 数，至少为 1
    pub concurrency: usize,
    /// 分块大小，人类可读字符串（各外部下载器有自己的单位约定）
    pub chunk_size: String,
    /// 抑制进度输出
    pub quiet: bool,
    /// 透传给外部下载器的额外参数
    pub downloader_args: Vec<String>,
}

impl Default for DownloadParams {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE.to_string(),
            quiet: false,
            downloader_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight,
    Done,
    Failed,
}

/// 一个分块的字节范围，区间为 `[start, end)`
#[derive(Debug, Clone)]
pub struct ChunkSpec {
    pub index: usize,
    pub start: u64,
    pub end: u64,
    pub state: ChunkState,
}

impl ChunkSpec {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// HTTP Range 头的取值（闭区间）
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

/// 编排器为每个发现的远程文件建一个任务，成功或失败后即丢弃
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub remotepath: String,
    pub localpath: PathBuf,
    /// 列表接口报告的文件大小
    pub content_length: u64,
}

/// 通过内建引擎下载一个文件的会话
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub url: String,
    pub localpath: PathBuf,
    /// 列表接口已知的文件大小；未知时引擎自行探测
    pub content_length: Option<u64>,
    /// 认证令牌（BDUSS 值）
    pub bduss: Option<String>,
    pub decrypt_password: Option<String>,
}

/// 断点续传的落盘记录，保存在 `<目标文件>.pcsdl`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResumeMarker {
    pub content_length: u64,
    pub chunk_size: u64,
    /// 已完成分块的下标
    pub done: Vec<usize>,
}
