use clap::Parser;
use colored::Colorize;
use regex::Regex;
use tracing::{info, warn};

use pcs_downloader::api::PcsClient;
use pcs_downloader::cli::Cli;
use pcs_downloader::common::MAX_CHUNK_SIZE;
use pcs_downloader::common::utils::{human_size, human_size_to_int};
use pcs_downloader::downloader::BatchDownloader;
use pcs_downloader::downloader::models::DownloadParams;
use pcs_downloader::sifter::Sifter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // 解析命令行参数
    let args = Cli::parse();

    // 块大小超过服务端上限时收紧
    let chunk_bytes = human_size_to_int(&args.chunk_size).map_err(|e| anyhow::anyhow!(e))?;
    let chunk_size = if chunk_bytes > MAX_CHUNK_SIZE {
        warn!(
            "块大小 {} 超过上限，收紧为 {}",
            args.chunk_size,
            human_size(MAX_CHUNK_SIZE)
        );
        human_size(MAX_CHUNK_SIZE)
    } else {
        args.chunk_size.clone()
    };

    // 组装筛选器
    let mut sifters = Vec::new();
    if let Some(pattern) = &args.include {
        sifters.push(Sifter::Include(Regex::new(pattern)?));
    }
    if let Some(pattern) = &args.exclude {
        sifters.push(Sifter::Exclude(Regex::new(pattern)?));
    }

    let params = DownloadParams {
        concurrency: args.concurrency.max(1),
        chunk_size,
        quiet: args.quiet,
        downloader_args: args.downloader_args.clone(),
    };

    if args.bduss.is_none() {
        warn!("未提供认证令牌，可能无法下载受限内容");
    }

    let api = PcsClient::new(&args.base_url, args.bduss.clone())?;
    let downloader = BatchDownloader::new(
        args.downloader,
        params,
        args.out_cmd,
        args.decrypt_password.clone(),
    );

    info!("开始下载 {} 个远程路径", args.remotepaths.len());
    let failures = downloader
        .download(
            &api,
            &args.remotepaths,
            &args.outdir,
            &sifters,
            args.recursive,
            args.from_index,
        )
        .await;

    if failures > 0 {
        println!("{}", format!("{} 个任务失败。", failures).red());
        std::process::exit(1);
    }

    info!("{}", "下载完成！".green());
    Ok(())
}
