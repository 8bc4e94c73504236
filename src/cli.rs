use clap::Parser;
use std::path::PathBuf;

use crate::common::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::downloader::backend::Backend;

/// 网盘文件下载器
#[derive(Parser, Debug)]
#[command(name = "pcsdl")]
#[command(version = "0.1.0")]
#[command(about = "一个简单的网盘文件并发下载工具", long_about = None)]
pub struct Cli {
    /// 远程文件或目录路径 (可指定多个)
    #[arg(required = true, value_name = "REMOTEPATH")]
    pub remotepaths: Vec<String>,

    /// 网盘接口地址
    #[arg(long, value_name = "URL")]
    pub base_url: String,

    /// 认证令牌 (BDUSS)
    #[arg(long, value_name = "TOKEN")]
    pub bduss: Option<String>,

    /// 本地保存目录
    #[arg(long, short = 'o', value_name = "DIR")]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub outdir: PathBuf,

    /// 每个文件的并发连接数
    #[arg(long, short = 's', value_name = "N")]
    #[arg(default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// 分块大小，如 1M、50M
    #[arg(long, short = 'k', value_name = "SIZE")]
    #[arg(default_value = DEFAULT_CHUNK_SIZE)]
    #[arg(help = "分块大小，上限 50M，如: 1M, 10M, 50M")]
    pub chunk_size: String,

    /// 抑制进度输出
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// 传输后端
    #[arg(long, short = 'd', value_enum, default_value_t = Backend::Me)]
    pub downloader: Backend,

    /// 透传给外部下载器的额外参数 (可多次指定)
    #[arg(long = "downloader-arg", value_name = "ARG")]
    pub downloader_args: Vec<String>,

    /// 递归下载目录
    #[arg(long, short = 'R')]
    pub recursive: bool,

    /// 跳过每个目录层级开头的 N 个条目
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub from_index: usize,

    /// 只处理路径匹配该正则的条目
    #[arg(long, short = 'I', value_name = "REGEX")]
    pub include: Option<String>,

    /// 跳过路径匹配该正则的条目
    #[arg(long, short = 'E', value_name = "REGEX")]
    pub exclude: Option<String>,

    /// 只打印外部下载器的命令行，不执行
    #[arg(long)]
    pub out_cmd: bool,

    /// 下载时流式解密内容的口令
    #[arg(long, value_name = "PASSWORD")]
    pub decrypt_password: Option<String>,
}
