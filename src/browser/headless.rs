use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{BrowserError, NavigationOutcome, PdfLayout, RenderEngine, RenderSession, Surface};

/// 元素轮询间隔
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 基于 chromiumoxide 的渲染引擎，每次 launch 启动一个新的无头浏览器
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    chrome_executable: Option<PathBuf>,
    window: Surface,
    request_timeout: Duration,
}

impl ChromeEngine {
    /// `request_timeout` 是单条 CDP 命令的上限，应当不小于编排层的导航/导出超时
    pub fn new(chrome_executable: Option<PathBuf>, window: Surface, request_timeout: Duration) -> Self {
        Self {
            chrome_executable,
            window,
            request_timeout,
        }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .user_data_dir(profile_dir)
            .window_size(self.window.width, self.window.height)
            .request_timeout(self.request_timeout)
            .args(vec![
                "--disable-gpu",           // 容器内无 GPU
                "--no-sandbox",            // 以 root 运行时必须关闭沙盒
                "--disable-dev-shm-usage", // 防止共享内存不足
            ]);

        if let Some(executable) = &self.chrome_executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            BrowserError::Configuration(e)
        })
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        // 每个会话使用独立的 profile 目录，避免并发实例抢同一把 SingletonLock
        let profile_dir =
            std::env::temp_dir().join(format!("page2pdf-profile-{}", Uuid::new_v4().simple()));
        let config = self.browser_config(&profile_dir)?;

        debug!("🚀 启动无头浏览器, profile: {}", profile_dir.display());
        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            BrowserError::Launch(e.to_string())
        })?;

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("无头浏览器已启动");
        Ok(Box::new(ChromeSession {
            browser,
            handler_task,
            page: None,
            profile_dir,
        }))
    }
}

/// 一个无头浏览器进程和其中唯一的页面
pub struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: PathBuf,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::PageNotOpen)
    }

    /// 等待主框架在本次导航中进入 networkIdle
    async fn wait_for_network_idle(
        page: &Page,
        mut lifecycle: impl futures::Stream<Item = std::sync::Arc<EventLifecycleEvent>> + Unpin,
    ) -> Result<(), BrowserError> {
        let main_frame = page.mainframe().await?;
        let mut navigation_started = false;

        while let Some(event) = lifecycle.next().await {
            if main_frame.as_ref().is_some_and(|id| *id != event.frame_id) {
                continue;
            }
            match event.name.as_str() {
                "init" => navigation_started = true,
                "networkIdle" if navigation_started => {
                    debug!("页面网络已空闲");
                    return Ok(());
                }
                _ => {}
            }
        }

        // 事件流提前结束，通常是页面已被关闭
        warn!("生命周期事件流已结束，未观察到 networkIdle");
        Ok(())
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn open_page(&mut self, surface: &Surface) -> Result<(), BrowserError> {
        let page = self.browser.new_page("about:blank").await.map_err(|e| {
            error!("创建页面失败: {}", e);
            e
        })?;

        page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            surface.width as i64,
            surface.height as i64,
            surface.device_scale_factor,
            false,
        ))
        .await?;

        debug!(
            "页面视口: {}x{} @{}x",
            surface.width, surface.height, surface.device_scale_factor
        );
        self.page = Some(page);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationOutcome, BrowserError> {
        let page = self.page()?;

        // 先订阅再导航，避免漏掉事件
        let lifecycle = page.event_listener::<EventLifecycleEvent>().await?;

        page.goto(url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", url, e);
            e
        })?;
        Self::wait_for_network_idle(page, lifecycle).await?;

        let request = page.wait_for_navigation_response().await?;
        let status = request
            .as_ref()
            .and_then(|req| req.response.as_ref())
            .map(|response| response.status as u16);

        info!("已导航到: {} (状态码: {:?})", url, status);
        Ok(NavigationOutcome { status })
    }

    async fn wait_for_element(&mut self, selector: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn export_pdf(&mut self, layout: &PdfLayout, path: &Path) -> Result<(), BrowserError> {
        let page = self.page()?;
        let params = PrintToPdfParams {
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width),
            paper_height: Some(layout.paper_height),
            margin_top: Some(layout.margin),
            margin_bottom: Some(layout.margin),
            margin_left: Some(layout.margin),
            margin_right: Some(layout.margin),
            scale: Some(layout.scale),
            prefer_css_page_size: Some(layout.prefer_css_page_size),
            ..Default::default()
        };

        let bytes = page.save_pdf(params, path).await?;
        debug!("PDF 已写入 {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), BrowserError> {
        let result = match self.browser.close().await {
            Ok(_) => self.browser.wait().await.map(|_| ()).map_err(BrowserError::from),
            Err(e) => {
                warn!("正常关闭浏览器失败，强制结束进程: {}", e);
                if let Some(Err(kill_err)) = self.browser.kill().await {
                    warn!("强制结束浏览器进程失败: {}", kill_err);
                }
                Err(BrowserError::from(e))
            }
        };
        self.handler_task.abort();

        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            debug!("清理 profile 目录 {} 失败: {}", self.profile_dir.display(), e);
        }

        debug!("浏览器会话已关闭");
        result
    }
}

// 关闭超时被放弃时会话直接被丢弃，这里兜底
impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler_task.abort();
        discard_profile(&self.profile_dir);
    }
}

/// 尽力删除 profile 目录，目录不存在时什么也不做
fn discard_profile(dir: &Path) {
    if !dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!("已清理残留 profile 目录: {}", dir.display()),
        Err(e) => warn!("清理 profile 目录 {} 失败: {}", dir.display(), e),
    }
}
