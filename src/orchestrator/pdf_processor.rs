//! 单个请求的 PDF 生成流程 - 编排层
//!
//! 流程顺序：
//! 1. 校验目标地址
//! 2. 分配临时文件
//! 3. 启动独立浏览器 → 打开页面 → 导航 → 就绪等待 → 导出
//! 4. 校验并读回文件
//!
//! 无论成功、失败还是 panic，浏览器都只关闭一次，临时文件都只安排一次删除。
//! 浏览器关闭在后台任务中进行，不会推迟结果返回。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::browser::{RenderEngine, RenderSession};
use crate::config::RenderSettings;
use crate::error::{RenderError, RenderResult};
use crate::infrastructure::{ArtifactStore, TempArtifact};

/// 关闭浏览器的最长等待时间，超时后直接丢弃会话（Drop 时终止事件循环并清理 profile）
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// PDF 生成器
///
/// 不持有任何浏览器，每次请求都从引擎启动一个新会话。
pub struct PdfProcessor {
    engine: Arc<dyn RenderEngine>,
    store: Arc<dyn ArtifactStore>,
    settings: RenderSettings,
}

impl PdfProcessor {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        store: Arc<dyn ArtifactStore>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            engine,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// 在独立任务中生成 PDF
    ///
    /// 调用方（HTTP 连接）中途断开时流程仍会走完，保证资源被释放。
    pub async fn render_detached(self: Arc<Self>, target: Option<String>) -> RenderResult<Bytes> {
        let handle = tokio::spawn(async move { self.render_to_document(target.as_deref()).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("PDF 生成任务异常结束: {}", e);
                Err(RenderError::unexpected_with("PDF generation task failed", e))
            }
        }
    }

    /// 把目标页面渲染成 PDF 字节
    pub async fn render_to_document(&self, target: Option<&str>) -> RenderResult<Bytes> {
        let url = parse_target(target)?;

        let artifact = TempArtifact::allocate(self.store.clone());
        let id = artifact.id().to_string();
        info!("[{}] 📄 开始生成 PDF: {}", id, url);

        let mut session = self.engine.launch().await.map_err(|e| {
            error!("[{}] 启动浏览器失败: {}", id, e);
            RenderError::unexpected_with(format!("Failed to launch browser: {}", e), e)
        })?;

        let outcome = AssertUnwindSafe(self.drive(&id, session.as_mut(), &url, artifact.path()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!("[{}] 渲染过程中发生 panic: {}", id, message);
                Err(RenderError::unexpected(format!("Rendering panicked: {}", message)))
            });

        teardown(id.clone(), session);

        match outcome {
            Ok(bytes) => {
                info!("[{}] ✅ PDF 生成成功 ({} 字节)", id, bytes.len());
                artifact.release_after(self.settings.cleanup_delay);
                Ok(bytes)
            }
            Err(e) => {
                warn!("[{}] ❌ PDF 生成失败 ({}): {}", id, e.kind(), e);
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        id: &str,
        session: &mut dyn RenderSession,
        url: &Url,
        path: &Path,
    ) -> RenderResult<Bytes> {
        let settings = &self.settings;

        session
            .open_page(&settings.surface)
            .await
            .map_err(|e| RenderError::unexpected_with(format!("Failed to open page: {}", e), e))?;

        // ========== 导航 ==========
        let navigation_timeout = || RenderError::NavigationTimeout {
            url: url.to_string(),
            timeout: settings.navigation_timeout,
        };
        let outcome = match timeout(settings.navigation_timeout, session.navigate(url.as_str())).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) if e.is_timeout() => return Err(navigation_timeout()),
            Ok(Err(e)) => {
                return Err(RenderError::unexpected_with(
                    format!("Navigation to {} failed: {}", url, e),
                    e,
                ))
            }
            Err(_) => return Err(navigation_timeout()),
        };

        if let (false, Some(status)) = (outcome.is_success(), outcome.status) {
            return Err(RenderError::UpstreamPage {
                url: url.to_string(),
                status,
            });
        }

        // ========== 就绪等待（尽力而为） ==========
        match timeout(
            settings.ready_timeout,
            session.wait_for_element(&settings.ready_selector),
        )
        .await
        {
            Ok(Ok(())) => debug!("[{}] 页面已出现 {}", id, settings.ready_selector),
            Ok(Err(e)) => warn!("[{}] 就绪检测失败，继续导出: {}", id, e),
            Err(_) => warn!(
                "[{}] {}s 内未找到 {}，继续导出",
                id,
                settings.ready_timeout.as_secs(),
                settings.ready_selector
            ),
        }
        if !settings.settle_delay.is_zero() {
            sleep(settings.settle_delay).await;
        }

        // ========== 导出 ==========
        match timeout(settings.export_timeout, session.export_pdf(&settings.layout, path)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(RenderError::ExportFailed {
                    reason: e.to_string(),
                    source: Some(e),
                })
            }
            Err(_) => {
                return Err(RenderError::ExportFailed {
                    reason: format!("timed out after {}s", settings.export_timeout.as_secs()),
                    source: None,
                })
            }
        }

        // ========== 校验并读回 ==========
        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(RenderError::EmptyOutput);
        }

        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(Bytes::from(bytes))
    }
}

/// 在后台关闭会话，不阻塞结果返回
fn teardown(id: String, session: Box<dyn RenderSession>) {
    tokio::spawn(async move {
        match timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => debug!("[{}] 浏览器已关闭", id),
            Ok(Err(e)) => warn!("[{}] 关闭浏览器失败: {}", id, e),
            Err(_) => warn!("[{}] 关闭浏览器超时，放弃等待", id),
        }
    });
}

/// 校验目标地址：必须存在、非空，且是 http/https 绝对地址
fn parse_target(target: Option<&str>) -> RenderResult<Url> {
    let raw = target
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(RenderError::missing_url)?;

    let url = Url::parse(raw).map_err(|e| RenderError::InvalidInput(format!("Invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RenderError::InvalidInput(format!(
            "Unsupported URL scheme: {}",
            other
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_target_is_invalid_input() {
        for target in [None, Some(""), Some("   ")] {
            match parse_target(target) {
                Err(RenderError::InvalidInput(message)) => {
                    assert_eq!(message, "URL parameter is required")
                }
                other => panic!("unexpected result for {:?}: {:?}", target, other),
            }
        }
    }

    #[test]
    fn only_http_targets_are_accepted() {
        assert!(parse_target(Some("https://example.com")).is_ok());
        assert!(parse_target(Some(" http://example.com/a?b=c ")).is_ok());
        assert!(matches!(
            parse_target(Some("file:///etc/passwd")),
            Err(RenderError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_target(Some("example.com")),
            Err(RenderError::InvalidInput(_))
        ));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
