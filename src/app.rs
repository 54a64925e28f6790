use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api::{self, AppState, CorsPolicy};
use crate::browser::ChromeEngine;
use crate::config::Config;
use crate::infrastructure::TempFileManager;
use crate::orchestrator::PdfProcessor;

/// CDP 单条命令超时在编排层超时之外的余量
const REQUEST_TIMEOUT_SLACK: std::time::Duration = std::time::Duration::from_secs(5);

/// 应用主结构
pub struct App {
    config: Config,
    router: Router,
}

impl App {
    /// 初始化应用：创建临时目录、渲染引擎和路由
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let files = TempFileManager::init(&config.temp_dir)
            .with_context(|| format!("无法创建临时目录: {}", config.temp_dir.display()))?;

        let request_timeout = config
            .render
            .navigation_timeout
            .max(config.render.export_timeout)
            + REQUEST_TIMEOUT_SLACK;
        let engine = ChromeEngine::new(
            config.chrome_executable.clone(),
            config.render.surface,
            request_timeout,
        );

        let processor = PdfProcessor::new(Arc::new(engine), Arc::new(files), config.render.clone());
        let state = AppState::new(
            Arc::new(processor),
            config.mode,
            CorsPolicy::new(config.allowed_origins.clone()),
        );

        Ok(Self {
            router: api::build_router(state),
            config,
        })
    }

    /// 监听端口直到收到退出信号
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("无法监听端口 {}", self.config.port))?;
        info!("🌐 服务已启动: http://{}", listener.local_addr()?);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，等待进行中的请求完成...");
}

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 PDF 生成服务启动 - {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("📊 运行模式: {:?}", config.mode);
    info!("📁 临时目录: {}", config.temp_dir.display());
    info!(
        "⏱️ 导航超时 {}s / 导出超时 {}s / 清理延迟 {}s",
        config.render.navigation_timeout.as_secs(),
        config.render.export_timeout.as_secs(),
        config.render.cleanup_delay.as_secs()
    );
    info!("{}", "=".repeat(60));
}
