use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use clap::ValueEnum;
use tokio::process::Command;
use tracing::debug;

use crate::common::utils::human_size_to_int;
use crate::common::{MAX_CHUNK_SIZE, ONE_M, PCS_UA};

use super::engine::ChunkEngine;
use super::error::DownloadError;
use super::models::{DownloadParams, DownloadSession, DownloadTask};
use super::progress::BatchProgress;

/// 可互换的传输后端：内建引擎，或某个外部加速下载器
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// 内建的分块下载引擎
    Me,
    /// aget (https://github.com/PeterDing/aget)
    Aget,
    /// aget-rs (https://github.com/PeterDing/aget-rs)
    Ag,
    /// aria2 (https://github.com/aria2/aria2)
    Aria2,
}

// 不用 axel：它处理不了超过 1024 字符的 URL。
// 不用 wget：网盘的文件链接只支持 Range 请求。

/// 一个批次内传输所需的共享资源
pub struct TransferContext<'a> {
    pub engine: &'a ChunkEngine,
    pub progress: &'a dyn BatchProgress,
    pub params: &'a DownloadParams,
    pub bduss: Option<&'a str>,
    pub decrypt_password: Option<&'a str>,
    pub dry_run: bool,
}

impl Backend {
    /// 外部工具的可执行文件名；内建引擎没有
    pub fn executable(&self) -> Option<&'static str> {
        match self {
            Backend::Me => None,
            Backend::Aget => Some("aget"),
            Backend::Ag => Some("ag"),
            Backend::Aria2 => Some("aria2c"),
        }
    }

    /// 宿主机上找不到所选外部工具时，静默回落到内建引擎。
    /// 每个批次只解析一次，不走全局可变状态。
    pub async fn select(self) -> Backend {
        let Some(exe) = self.executable() else {
            return self;
        };
        let probe = Command::new(exe)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if probe.is_ok() {
            self
        } else {
            debug!("外部下载器 {} 不可用，回落到内建引擎", exe);
            Backend::Me
        }
    }

    /// 执行一次传输。外部后端构造并运行子进程；
    /// 内建后端构造下载会话并交给分块引擎。
    pub async fn transfer(
        &self,
        url: &str,
        task: &DownloadTask,
        ctx: &TransferContext<'_>,
    ) -> Result<(), DownloadError> {
        if *self == Backend::Me {
            let session = DownloadSession {
                url: url.to_string(),
                localpath: task.localpath.clone(),
                content_length: Some(task.content_length),
                bduss: ctx.bduss.map(|s| s.to_string()),
                decrypt_password: ctx.decrypt_password.map(|s| s.to_string()),
            };
            let bar = ctx.progress.start_task(&task.remotepath, task.content_length);
            return ctx.engine.run(&session, ctx.params, Arc::clone(&bar)).await;
        }

        let Some(cmd) = self.build_cmd(url, &task.localpath, ctx.bduss, ctx.params)? else {
            return Ok(());
        };

        if ctx.dry_run {
            println!("{}", out_cmd_line(&cmd));
            return Ok(());
        }

        let tool = self.executable().unwrap_or_default();
        let mut child = Command::new(&cmd[0]);
        child.args(&cmd[1..]).stdin(Stdio::null());
        if ctx.params.quiet {
            child.stdout(Stdio::null());
        }
        let status = child.status().await.map_err(|e| DownloadError::BackendSpawn {
            tool: tool.to_string(),
            source: e,
        })?;

        debug!("外部下载器 {} 退出码: {:?}", tool, status.code());
        if !status.success() {
            return Err(DownloadError::BackendExit {
                tool: tool.to_string(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    /// 组装外部工具的命令行（各工具有自己的参数名和单位约定）。
    /// 内建引擎没有命令行，返回 None。
    pub fn build_cmd(
        &self,
        url: &str,
        localpath: &Path,
        bduss: Option<&str>,
        params: &DownloadParams,
    ) -> Result<Option<Vec<String>>, DownloadError> {
        let cookie = format!("Cookie: BDUSS={};", bduss.unwrap_or_default());
        match self {
            Backend::Me => Ok(None),
            Backend::Aget => Ok(Some(Self::aget_cmd(url, localpath, &cookie, params)?)),
            Backend::Ag => Ok(Some(Self::aget_rs_cmd(url, localpath, &cookie, params))),
            Backend::Aria2 => Ok(Some(Self::aria2_cmd(url, localpath, &cookie, params))),
        }
    }

    fn aget_cmd(
        url: &str,
        localpath: &Path,
        cookie: &str,
        params: &DownloadParams,
    ) -> Result<Vec<String>, DownloadError> {
        // aget 的 -k 只收字节数；块大小取到服务端上限时要缩小 1M，
        // 这是 aget 的已知毛病，不能去掉
        let mut chunk_size =
            human_size_to_int(&params.chunk_size).map_err(DownloadError::InvalidChunkSize)?;
        if chunk_size == MAX_CHUNK_SIZE {
            chunk_size -= ONE_M;
        }

        let mut cmd = vec![
            "aget".to_string(),
            url.to_string(),
            "-o".to_string(),
            localpath.display().to_string(),
            "-H".to_string(),
            format!("User-Agent: {}", PCS_UA),
            "-H".to_string(),
            "Connection: Keep-Alive".to_string(),
            "-H".to_string(),
            cookie.to_string(),
            "-s".to_string(),
            params.concurrency.to_string(),
            "-k".to_string(),
            chunk_size.to_string(),
        ];
        cmd.extend(params.downloader_args.iter().cloned());
        Ok(cmd)
    }

    fn aget_rs_cmd(
        url: &str,
        localpath: &Path,
        cookie: &str,
        params: &DownloadParams,
    ) -> Vec<String> {
        let mut cmd = vec![
            "ag".to_string(),
            url.to_string(),
            "-o".to_string(),
            localpath.display().to_string(),
            "-H".to_string(),
            format!("User-Agent: {}", PCS_UA),
            "-H".to_string(),
            "Connection: Keep-Alive".to_string(),
            "-H".to_string(),
            cookie.to_string(),
            "-s".to_string(),
            params.concurrency.to_string(),
            "-k".to_string(),
            params.chunk_size.clone(),
        ];
        cmd.extend(params.downloader_args.iter().cloned());
        cmd
    }

    fn aria2_cmd(
        url: &str,
        localpath: &Path,
        cookie: &str,
        params: &DownloadParams,
    ) -> Vec<String> {
        let directory = localpath
            .parent()
            .map(|p| p.display().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let filename = localpath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut cmd = vec![
            "aria2c".to_string(),
            url.to_string(),
            "-c".to_string(),
            "--dir".to_string(),
            directory,
            "-o".to_string(),
            filename,
            "--header".to_string(),
            format!("User-Agent: {}", PCS_UA),
            "--header".to_string(),
            "Connection: Keep-Alive".to_string(),
            "--header".to_string(),
            cookie.to_string(),
            "-s".to_string(),
            params.concurrency.to_string(),
            "-k".to_string(),
            params.chunk_size.clone(),
        ];
        cmd.extend(params.downloader_args.iter().cloned());
        cmd
    }
}

/// `--out-cmd` 模式下打印的单行命令，每个参数各自带引号
pub fn out_cmd_line(cmd: &[String]) -> String {
    let quoted: Vec<String> = cmd.iter().map(|c| format!("{:?}", c)).collect();
    quoted.join(" ")
}
