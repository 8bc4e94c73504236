#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use pcs_downloader::api::{ApiError, RemoteEntry, RemoteFs};
use pcs_downloader::downloader::BatchDownloader;
use pcs_downloader::downloader::backend::{Backend, TransferContext};
use pcs_downloader::downloader::engine::ChunkEngine;
use pcs_downloader::downloader::error::DownloadError;
use pcs_downloader::downloader::models::{DownloadParams, DownloadTask};
use pcs_downloader::downloader::progress::{BatchProgress, QuietProgress, TaskProgress};

/// PATH 是进程级状态，动它的测试串行执行
static PATH_LOCK: Mutex<()> = Mutex::new(());

fn prepend_to_path(dir: &Path) -> std::ffi::OsString {
    let orig = std::env::var_os("PATH").unwrap_or_default();
    let joined = std::env::join_paths(
        std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(&orig)),
    )
    .unwrap();
    unsafe { std::env::set_var("PATH", &joined) };
    orig
}

fn restore_path(orig: std::ffi::OsString) {
    unsafe { std::env::set_var("PATH", orig) };
}

/// 放一个固定退出码的假下载器到 `dir`，调用参数逐行记入 `log`
fn fake_tool(dir: &Path, name: &str, code: i32, log: &Path) {
    let script = format!("#!/bin/sh\necho \"$@\" >> '{}'\nexit {}\n", log.display(), code);
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn params() -> DownloadParams {
    DownloadParams {
        concurrency: 2,
        chunk_size: "16K".to_string(),
        quiet: true,
        downloader_args: Vec::new(),
    }
}

fn task(localpath: PathBuf, len: u64) -> DownloadTask {
    DownloadTask {
        remotepath: "/A/f1".to_string(),
        localpath,
        content_length: len,
    }
}

#[tokio::test]
async fn test_missing_tool_spawn_error_names_the_tool() {
    let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let empty = tempfile::tempdir().unwrap();
    let orig = std::env::var_os("PATH").unwrap_or_default();
    unsafe { std::env::set_var("PATH", empty.path()) };

    let engine = ChunkEngine::new();
    let progress = QuietProgress;
    let p = params();
    let ctx = TransferContext {
        engine: &engine,
        progress: &progress,
        params: &p,
        bduss: None,
        decrypt_password: None,
        dry_run: false,
    };
    let out = tempfile::tempdir().unwrap();
    let result = Backend::Aget
        .transfer("http://example.invalid/f", &task(out.path().join("f"), 8), &ctx)
        .await;

    restore_path(orig);
    match result {
        Err(DownloadError::BackendSpawn { tool, .. }) => assert_eq!(tool, "aget"),
        other => panic!("应当报启动失败，实际: {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_tool_reports_exit_code() {
    let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let bin = tempfile::tempdir().unwrap();
    let log = bin.path().join("calls.log");
    fake_tool(bin.path(), "aget", 3, &log);
    let orig = prepend_to_path(bin.path());

    let engine = ChunkEngine::new();
    let progress = QuietProgress;
    let p = params();
    let ctx = TransferContext {
        engine: &engine,
        progress: &progress,
        params: &p,
        bduss: Some("tok"),
        decrypt_password: None,
        dry_run: false,
    };
    let out = tempfile::tempdir().unwrap();
    let result = Backend::Aget
        .transfer("http://example.invalid/f", &task(out.path().join("f"), 8), &ctx)
        .await;

    restore_path(orig);
    match result {
        Err(DownloadError::BackendExit { tool, code }) => {
            assert_eq!(tool, "aget");
            assert_eq!(code, 3);
        }
        other => panic!("应当报退出码，实际: {:?}", other),
    }
    // 子进程确实拿到了 URL 与输出路径
    let calls = std::fs::read_to_string(&log).unwrap();
    assert!(calls.contains("http://example.invalid/f"));
}

/// 两个文件的远程树，下载链接指向不会被访问的占位地址
struct FlatFs;

#[async_trait]
impl RemoteFs for FlatFs {
    async fn exists(&self, _remotepath: &str) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn meta(&self, remotepath: &str) -> Result<RemoteEntry, ApiError> {
        Ok(RemoteEntry {
            path: remotepath.to_string(),
            is_dir: false,
            size: 8,
        })
    }

    async fn list(&self, _remotedir: &str) -> Result<Vec<RemoteEntry>, ApiError> {
        Ok(Vec::new())
    }

    async fn download_link(&self, remotepath: &str) -> Result<Option<String>, ApiError> {
        Ok(Some(format!("http://example.invalid{}", remotepath)))
    }

    fn auth_token(&self) -> Option<&str> {
        None
    }
}

#[tokio::test]
async fn test_failed_external_task_does_not_abort_batch() {
    let _guard = PATH_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let bin = tempfile::tempdir().unwrap();
    let log = bin.path().join("calls.log");
    fake_tool(bin.path(), "aget", 3, &log);
    let orig = prepend_to_path(bin.path());

    let out = tempfile::tempdir().unwrap();
    let paths = vec!["/A/f1".to_string(), "/A/f2".to_string()];
    let failures = BatchDownloader::new(Backend::Aget, params(), false, None)
        .download(&FlatFs, &paths, out.path(), &[], false, 0)
        .await;

    restore_path(orig);
    // 两个任务都计为失败，且第一个失败没有挡住第二个
    assert_eq!(failures, 2);
    let calls = std::fs::read_to_string(&log).unwrap();
    assert!(calls.contains("/A/f1"));
    assert!(calls.contains("/A/f2"));
}

struct RecordingProgress {
    titles: Mutex<Vec<String>>,
}

struct NullTask;

impl TaskProgress for NullTask {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
    fn reset(&self) {}
}

impl BatchProgress for RecordingProgress {
    fn start_task(&self, title: &str, _total: u64) -> Arc<dyn TaskProgress> {
        self.titles.lock().unwrap().push(title.to_string());
        Arc::new(NullTask)
    }

    fn stop(&self) {}
}

#[tokio::test]
async fn test_builtin_transfer_titles_task_by_remote_path() {
    let body = b"hello chunk".to_vec();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let engine = ChunkEngine::new();
    let progress = RecordingProgress { titles: Mutex::new(Vec::new()) };
    let p = params();
    let ctx = TransferContext {
        engine: &engine,
        progress: &progress,
        params: &p,
        bduss: None,
        decrypt_password: None,
        dry_run: false,
    };
    let out = tempfile::tempdir().unwrap();
    let localpath = out.path().join("f1");
    let url = format!("{}/A/f1", server.uri());

    Backend::Me
        .transfer(&url, &task(localpath.clone(), body.len() as u64), &ctx)
        .await
        .unwrap();

    assert_eq!(*progress.titles.lock().unwrap(), vec!["/A/f1".to_string()]);
    assert_eq!(tokio::fs::read(&localpath).await.unwrap(), body);
}
