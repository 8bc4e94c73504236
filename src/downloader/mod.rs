use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use colored::Colorize;
use tracing::debug;

use crate::api::models::basename;
use crate::api::{RemoteEntry, RemoteFs};
use crate::sifter::{Sifter, sift};

use backend::{Backend, TransferContext};
use engine::ChunkEngine;
use error::DownloadError;
use models::{DownloadParams, DownloadTask};
use progress::{BatchProgress, MultiBarProgress, QuietProgress};

pub mod backend;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod models;
pub mod planner;
pub mod progress;

/// 批次编排器：把一组远程路径展开成逐个文件的下载，
/// 并持有整个批次共享的引擎与进度子系统。
pub struct BatchDownloader {
    engine: ChunkEngine,
    progress: Arc<dyn BatchProgress>,
    backend: Backend,
    params: DownloadParams,
    dry_run: bool,
    decrypt_password: Option<String>,
}

impl BatchDownloader {
    pub fn new(
        backend: Backend,
        params: DownloadParams,
        dry_run: bool,
        decrypt_password: Option<String>,
    ) -> Self {
        let progress: Arc<dyn BatchProgress> = if params.quiet {
            Arc::new(QuietProgress)
        } else {
            Arc::new(MultiBarProgress::new())
        };
        Self {
            engine: ChunkEngine::new(),
            progress,
            backend,
            params,
            dry_run,
            decrypt_password,
        }
    }

    /// 下载一批远程路径到 `localdir`，返回失败的任务数。
    ///
    /// 单个路径的失败只记录、不中断批次；无论成败，
    /// 进度子系统都在批次结束时恰好关停一次。
    pub async fn download(
        &self,
        api: &dyn RemoteFs,
        remotepaths: &[String],
        localdir: &Path,
        sifters: &[Sifter],
        recursive: bool,
        from_index: usize,
    ) -> usize {
        let failures = self
            .run_batch(api, remotepaths, localdir, sifters, recursive, from_index)
            .await;
        self.progress.stop();
        failures
    }

    async fn run_batch(
        &self,
        api: &dyn RemoteFs,
        remotepaths: &[String],
        localdir: &Path,
        sifters: &[Sifter],
        recursive: bool,
        from_index: usize,
    ) -> usize {
        debug!(
            "`download`: recursive: {}, from_index: {}, downloader: {:?}, params: {:?}, dry_run: {}, 有解密口令: {}",
            recursive,
            from_index,
            self.backend,
            self.params,
            self.dry_run,
            self.decrypt_password.is_some(),
        );

        // 路径列表按集合对待：重复项只诊断，不自动去重
        let uniq: HashSet<&String> = remotepaths.iter().collect();
        if uniq.len() != remotepaths.len() {
            debug!(
                "`download`: 路径列表应当唯一 {} != {}",
                remotepaths.len(),
                uniq.len()
            );
        }

        // 所选外部工具不可用时静默回落，一个批次只解析一次
        let backend = self.backend.select().await;

        let mut failures = 0usize;
        for rp in remotepaths {
            match api.exists(rp).await {
                Ok(true) => {}
                Ok(false) => {
                    println!("{}: `{}` 不存在。", "警告".yellow(), rp);
                    continue;
                }
                Err(e) => {
                    println!("{}: `{}` 查询失败: {}", "警告".yellow(), rp, e);
                    failures += 1;
                    continue;
                }
            }

            let meta = match api.meta(rp).await {
                Ok(m) => m,
                Err(e) => {
                    println!("{}: `{}` 查询失败: {}", "警告".yellow(), rp, e);
                    failures += 1;
                    continue;
                }
            };

            if meta.is_file() {
                if let Err(e) = self.download_file(api, &meta, localdir, &backend).await {
                    println!("{}: `{}` 下载失败: {}", "错误".red(), rp, e);
                    failures += 1;
                }
            } else {
                let sub = localdir.join(basename(rp));
                failures += self
                    .download_dir(api, rp, &sub, sifters, recursive, from_index, &backend)
                    .await;
            }
        }
        failures
    }

    /// 下载单个远程文件到 `localdir` 下的同名文件
    async fn download_file(
        &self,
        api: &dyn RemoteFs,
        entry: &RemoteEntry,
        localdir: &Path,
        backend: &Backend,
    ) -> Result<(), DownloadError> {
        let localpath = localdir.join(entry.basename());

        if let Some(parent) = localpath.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 已有的目标文件不覆盖
        if !self.dry_run && tokio::fs::try_exists(&localpath).await? {
            println!("{} 已存在。", localpath.display().to_string().yellow());
            return Ok(());
        }

        let Some(dlink) = api.download_link(&entry.path).await? else {
            println!("{}: `{}` 被屏蔽，无法获取下载链接。", "跳过".red(), entry.path);
            return Ok(());
        };

        if *backend != Backend::Me {
            println!(
                "{}: {} 到 {}",
                "下载".blue().italic(),
                entry.path,
                localpath.display()
            );
        }

        let task = DownloadTask {
            remotepath: entry.path.clone(),
            localpath,
            content_length: entry.size,
        };
        let ctx = TransferContext {
            engine: &self.engine,
            progress: self.progress.as_ref(),
            params: &self.params,
            bduss: api.auth_token(),
            decrypt_password: self.decrypt_password.as_deref(),
            dry_run: self.dry_run,
        };
        backend.transfer(&dlink, &task, &ctx).await
    }

    /// 展开远程目录。`from_index` 只作用于本目录层级，不跨层累计。
    fn download_dir<'a>(
        &'a self,
        api: &'a dyn RemoteFs,
        remotedir: &'a str,
        localdir: &'a Path,
        sifters: &'a [Sifter],
        recursive: bool,
        from_index: usize,
        backend: &'a Backend,
    ) -> Pin<Box<dyn Future<Output = usize> + Send + 'a>> {
        Box::pin(async move {
            let entries = match api.list(remotedir).await {
                Ok(entries) => entries,
                Err(e) => {
                    println!("{}: `{}` 列表失败: {}", "错误".red(), remotedir, e);
                    return 1;
                }
            };

            let mut failures = 0usize;
            for entry in sift(entries, sifters, recursive).into_iter().skip(from_index) {
                if entry.is_file() {
                    if let Err(e) = self.download_file(api, &entry, localdir, backend).await {
                        println!("{}: `{}` 下载失败: {}", "错误".red(), entry.path, e);
                        failures += 1;
                    }
                } else if recursive {
                    let sub = localdir.join(entry.basename());
                    failures += self
                        .download_dir(api, &entry.path, &sub, sifters, recursive, from_index, backend)
                        .await;
                }
            }
            failures
        })
    }
}
