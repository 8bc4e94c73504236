use std::io::SeekFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::StreamExt;
use reqwest::{
    Client, StatusCode,
    header::{CONNECTION, CONTENT_LENGTH, COOKIE, RANGE, USER_AGENT},
};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::common::utils::human_size_to_int;
use crate::common::{MAX_CHUNK_SIZE, PCS_UA};

use super::crypto::ChunkDecryptor;
use super::error::DownloadError;
use super::models::{ChunkSpec, ChunkState, DownloadParams, DownloadSession, ResumeMarker};
use super::planner;
use super::progress::TaskProgress;

/// 内建的并发分块下载引擎
#[derive(Clone)]
pub struct ChunkEngine {
    client: Client,
}

/// worker 的产出：分块的终态，外加可能的失败原因
struct ChunkOutcome {
    chunk: ChunkSpec,
    error: Option<DownloadError>,
}

impl ChunkEngine {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }

    /// 跑完一个下载会话。全部分块 Done 才算成功；任何分块失败后
    /// 不再派发新的分块，在途分块跑完即标记会话失败，保留半成品
    /// 文件和断点记录供下次续传。
    pub async fn run(
        &self,
        session: &DownloadSession,
        params: &DownloadParams,
        progress: Arc<dyn TaskProgress>,
    ) -> Result<(), DownloadError> {
        let chunk_size = human_size_to_int(&params.chunk_size)
            .map_err(DownloadError::InvalidChunkSize)?;
        // 超过服务端上限的块大小在规划前收紧
        let chunk_size = chunk_size.min(MAX_CHUNK_SIZE);

        let content_length = match session.content_length {
            Some(len) => len,
            None => self.probe_length(session).await?,
        };
        progress.set_total(content_length);

        let mut chunks = planner::plan(content_length, chunk_size)?;

        // 续传：磁盘上已验证完成的分块直接标记 Done
        let marker = ResumeMarker::load(&session.localpath, content_length, chunk_size).await;
        let (marker, resumed) = match marker {
            Some(m) => {
                let resumed = m.apply(&mut chunks);
                debug!(
                    "续传 {:?}: 已完成 {}/{} 个分块",
                    session.localpath,
                    m.done.len(),
                    chunks.len()
                );
                (m, resumed)
            }
            None => (ResumeMarker::new(content_length, chunk_size), 0),
        };
        progress.set_position(resumed);

        // 预分配目标文件，worker 才能各写各的偏移
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&session.localpath)
            .await?;
        file.set_len(content_length).await?;
        drop(file);

        let pending: Vec<ChunkSpec> = chunks
            .iter()
            .filter(|c| c.state == ChunkState::Pending)
            .cloned()
            .collect();
        if pending.is_empty() {
            // 空文件或全部分块已在磁盘上
            ResumeMarker::remove(&session.localpath).await;
            progress.finish();
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(params.concurrency.max(1)));
        let failed = Arc::new(AtomicBool::new(false));
        let bytes_completed = Arc::new(AtomicU64::new(resumed));
        let marker = Arc::new(Mutex::new(marker));

        let mut workers = JoinSet::new();
        for chunk in pending {
            let client = self.client.clone();
            let session = session.clone();
            let semaphore = Arc::clone(&semaphore);
            let failed = Arc::clone(&failed);
            let bytes_completed = Arc::clone(&bytes_completed);
            let marker = Arc::clone(&marker);
            let progress = Arc::clone(&progress);

            workers.spawn(async move {
                let mut chunk = chunk;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    chunk.state = ChunkState::Failed;
                    return ChunkOutcome {
                        error: Some(DownloadError::ChunkFailed {
                            index: chunk.index,
                            reason: "信号量已关闭".to_string(),
                        }),
                        chunk,
                    };
                };

                // 已观察到致命失败，停止派发，分块保持 Pending
                if failed.load(Ordering::SeqCst) {
                    return ChunkOutcome { chunk, error: None };
                }

                chunk.state = ChunkState::InFlight;
                match fetch_chunk(&client, &session, &chunk).await {
                    Ok(()) => {
                        chunk.state = ChunkState::Done;
                        bytes_completed.fetch_add(chunk.len(), Ordering::SeqCst);
                        progress.advance(chunk.len());

                        let mut m = marker.lock().await;
                        m.done.push(chunk.index);
                        if let Err(e) = m.save(&session.localpath).await {
                            warn!("断点记录写入失败: {}", e);
                        }
                        ChunkOutcome { chunk, error: None }
                    }
                    Err(e) => {
                        chunk.state = ChunkState::Failed;
                        failed.store(true, Ordering::SeqCst);
                        let error = match e {
                            e @ DownloadError::ChunkFailed { .. } => e,
                            other => DownloadError::ChunkFailed {
                                index: chunk.index,
                                reason: other.to_string(),
                            },
                        };
                        ChunkOutcome { chunk, error: Some(error) }
                    }
                }
            });
        }

        // 在途分块跑完再收尾，不做抢占式取消。
        // 会话结果由所有分块的终态决定：全部 Done 才算成功。
        let mut first_err: Option<DownloadError> = None;
        let mut all_done = true;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    if outcome.chunk.state != ChunkState::Done {
                        all_done = false;
                    }
                    if let Some(e) = outcome.error {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                }
                Err(e) => {
                    all_done = false;
                    if first_err.is_none() {
                        first_err = Some(DownloadError::Join(e));
                    }
                }
            }
        }

        if let Some(e) = first_err {
            progress.reset();
            return Err(e);
        }
        if !all_done {
            progress.reset();
            return Err(DownloadError::ChunkFailed {
                index: 0,
                reason: "会话中止，存在未完成的分块".to_string(),
            });
        }

        debug!(
            "会话完成: {:?}, 共 {} 字节",
            session.localpath,
            bytes_completed.load(Ordering::SeqCst)
        );
        ResumeMarker::remove(&session.localpath).await;
        progress.finish();
        Ok(())
    }

    /// 文件大小未知时用 HEAD 请求探测
    async fn probe_length(&self, session: &DownloadSession) -> Result<u64, DownloadError> {
        let resp = with_session_headers(self.client.head(&session.url), session)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(DownloadError::BadStatus(resp.status()));
        }
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| DownloadError::UnknownLength(session.url.clone()))
    }
}

impl Default for ChunkEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn with_session_headers(
    req: reqwest::RequestBuilder,
    session: &DownloadSession,
) -> reqwest::RequestBuilder {
    let req = req
        .header(USER_AGENT, PCS_UA)
        .header(CONNECTION, "Keep-Alive");
    match &session.bduss {
        Some(bduss) => req.header(COOKIE, format!("BDUSS={};", bduss)),
        None => req,
    }
}

/// 拉取单个分块并写入目标文件的对应偏移
async fn fetch_chunk(
    client: &Client,
    session: &DownloadSession,
    chunk: &ChunkSpec,
) -> Result<(), DownloadError> {
    let resp = with_session_headers(client.get(&session.url), session)
        .header(RANGE, chunk.range_header())
        .send()
        .await?;

    let status = resp.status();
    // 服务端忽略 Range 返回整个文件时，只有首个分块的数据可用
    let ok = status == StatusCode::PARTIAL_CONTENT || (status == StatusCode::OK && chunk.start == 0);
    if !ok {
        return Err(DownloadError::BadStatus(status));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&session.localpath)
        .await?;
    file.seek(SeekFrom::Start(chunk.start)).await?;

    let mut decryptor = ChunkDecryptor::new(session.decrypt_password.as_deref(), chunk.start);
    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(part) = stream.next().await {
        let part = part?;
        let remaining = (chunk.len() - written) as usize;
        if remaining == 0 {
            break;
        }
        let take = remaining.min(part.len());
        let mut buf = part[..take].to_vec();
        decryptor.apply(&mut buf);
        file.write_all(&buf).await?;
        written += take as u64;
    }
    file.flush().await?;

    if written != chunk.len() {
        return Err(DownloadError::ChunkFailed {
            index: chunk.index,
            reason: format!("内容不完整: 期望 {} 字节, 实际 {} 字节", chunk.len(), written),
        });
    }
    Ok(())
}
