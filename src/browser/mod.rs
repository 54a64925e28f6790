//! 渲染引擎适配层
//!
//! 编排层只依赖 [`RenderEngine`] / [`RenderSession`] 两个 trait，
//! 具体实现 [`ChromeEngine`] 基于 chromiumoxide 驱动无头 Chrome。
//! 每次 `launch` 都是一个全新的浏览器进程，绝不复用。

pub mod headless;

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use thiserror::Error;

pub use headless::{ChromeEngine, ChromeSession};

/// 渲染引擎相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 浏览器配置失败
    #[error("invalid browser configuration: {0}")]
    Configuration(String),
    /// 启动浏览器进程失败
    #[error("failed to launch browser: {0}")]
    Launch(String),
    /// 尚未调用 open_page
    #[error("no page is open in this session")]
    PageNotOpen,
    /// CDP 协议调用失败
    #[error("devtools protocol error: {0}")]
    Cdp(#[from] CdpError),
    /// 浏览器进程或文件操作失败
    #[error("browser process error: {0}")]
    Process(#[from] std::io::Error),
    /// 其他错误
    #[error("{0}")]
    Other(String),
}

impl BrowserError {
    /// 是否是引擎内部的请求超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, BrowserError::Cdp(CdpError::Timeout))
    }
}

/// 固定的渲染视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
        }
    }
}

/// PDF 版式（尺寸单位均为英寸）
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin: f64,
    pub print_background: bool,
    pub scale: f64,
    pub prefer_css_page_size: bool,
}

impl PdfLayout {
    /// A4 纸，四边 10mm 页边距，打印背景
    pub fn a4() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            margin: 10.0 / 25.4,
            print_background: true,
            scale: 1.0,
            prefer_css_page_size: false,
        }
    }
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::a4()
    }
}

/// 导航结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationOutcome {
    /// 主文档的 HTTP 状态码；没有网络响应时为 None
    pub status: Option<u16>,
}

impl NavigationOutcome {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
        }
    }

    /// 2xx 或者没有 HTTP 响应都视为成功
    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |code| (200..300).contains(&code))
    }
}

/// 渲染引擎：每次调用 `launch` 得到一个独立的会话
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError>;
}

/// 一个浏览器实例及其中的单个页面
///
/// 除 `close` 外的方法都不会自带超时，由调用方负责限时。
#[async_trait]
pub trait RenderSession: Send {
    /// 新建页面并设置固定视口
    async fn open_page(&mut self, surface: &Surface) -> Result<(), BrowserError>;

    /// 导航到目标地址，等待 load 事件和网络空闲
    async fn navigate(&mut self, url: &str) -> Result<NavigationOutcome, BrowserError>;

    /// 轮询直到选择器匹配到元素
    async fn wait_for_element(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// 把当前页面导出为 PDF 写入 `path`
    async fn export_pdf(&mut self, layout: &PdfLayout, path: &Path) -> Result<(), BrowserError>;

    /// 关闭浏览器进程，会话随之销毁
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_outcome_success_range() {
        assert!(NavigationOutcome::with_status(200).is_success());
        assert!(NavigationOutcome::with_status(204).is_success());
        assert!(NavigationOutcome::default().is_success());
        assert!(!NavigationOutcome::with_status(301).is_success());
        assert!(!NavigationOutcome::with_status(404).is_success());
        assert!(!NavigationOutcome::with_status(503).is_success());
    }

    #[test]
    fn a4_layout_has_ten_millimetre_margins() {
        let layout = PdfLayout::a4();
        assert!((layout.margin * 25.4 - 10.0).abs() < 1e-9);
        assert!(layout.print_background);
        assert!(layout.paper_height > layout.paper_width);
    }
}
