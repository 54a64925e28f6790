//! 日志初始化

use tracing::error;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志，默认 info 级别，可用 `RUST_LOG` 覆盖
///
/// 重复调用是安全的（测试里会多次调用）。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 把 panic 记录到日志，进程继续运行
///
/// 请求内的 panic 由编排层单独捕获，这里兜住其余后台任务。
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());

        error!(location = %location, "💥 未处理的异常: {}", payload);
    }));
}
