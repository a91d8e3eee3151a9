//! 扫描书页的取字工具集。
//!
//! - [`selector`]：画笔选区状态机，把指针事件累积成二值遮罩。
//! - [`pipeline`]：遮罩应用 → 预处理 → OCR → 写出文本。
//! - [`batch`]：按目录批量处理图像，单张失败不影响其余文件。
//! - [`quota`]：汇总 Cloud Vision 近 30 天的请求数与配额用量。
//! - `display`（`gui` 特性）：OpenCV 窗口，负责显示与采集鼠标/键盘事件。

pub mod batch;
#[cfg(feature = "gui")]
pub mod display;
pub mod pipeline;
pub mod quota;
pub mod selector;
pub mod settings;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// 初始化日志；未设置 `RUST_LOG` 时默认输出 info 级别。
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
