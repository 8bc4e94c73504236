use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// 批次级进度订阅者，由编排器持有并在批次结束时关停一次
pub trait BatchProgress: Send + Sync {
    /// 注册一个文件的下载任务，返回其进度句柄
    fn start_task(&self, title: &str, total: u64) -> Arc<dyn TaskProgress>;

    /// 关停整个进度子系统
    fn stop(&self);
}

/// 单个下载会话的进度句柄
pub trait TaskProgress: Send + Sync {
    /// 引擎探测到真实文件大小后回填总量
    fn set_total(&self, total: u64);
    fn set_position(&self, pos: u64);
    fn advance(&self, bytes: u64);
    /// 成功完成，移除该任务的进度展示
    fn finish(&self);
    /// 会话失败，重置进度以便下次续传
    fn reset(&self);
}

/// indicatif 多进度条实现
pub struct MultiBarProgress {
    multi: MultiProgress,
}

impl MultiBarProgress {
    pub fn new() -> Self {
        Self { multi: MultiProgress::new() }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )
        .unwrap()
        .progress_chars("#>-")
    }
}

impl Default for MultiBarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProgress for MultiBarProgress {
    fn start_task(&self, title: &str, total: u64) -> Arc<dyn TaskProgress> {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(Self::bar_style());
        pb.set_message(title.to_string());
        Arc::new(BarTask(pb))
    }

    fn stop(&self) {
        let _ = self.multi.clear();
    }
}

struct BarTask(ProgressBar);

impl TaskProgress for BarTask {
    fn set_total(&self, total: u64) {
        self.0.set_length(total);
    }

    fn set_position(&self, pos: u64) {
        self.0.set_position(pos);
    }

    fn advance(&self, bytes: u64) {
        self.0.inc(bytes);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }

    fn reset(&self) {
        self.0.reset();
        self.0.abandon();
    }
}

/// quiet 模式：整个进度子系统不存在，而不只是不渲染
pub struct QuietProgress;

impl BatchProgress for QuietProgress {
    fn start_task(&self, _title: &str, _total: u64) -> Arc<dyn TaskProgress> {
        Arc::new(QuietTask)
    }

    fn stop(&self) {}
}

struct QuietTask;

impl TaskProgress for QuietTask {
    fn set_total(&self, _total: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn advance(&self, _bytes: u64) {}
    fn finish(&self) {}
    fn reset(&self) {}
}
