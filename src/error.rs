use std::time::Duration;

use thiserror::Error;

use crate::browser::BrowserError;

/// 单次 PDF 生成请求可能出现的错误
///
/// 所有变体在 HTTP 边界统一转换为 500 + JSON 错误信封，
/// `Display` 文本即返回给调用方的 `message` 字段。
#[derive(Debug, Error)]
pub enum RenderError {
    /// 缺少或非法的目标地址
    #[error("{0}")]
    InvalidInput(String),

    /// 页面导航在限定时间内未完成
    #[error("Navigation to {url} timed out after {}s", .timeout.as_secs())]
    NavigationTimeout { url: String, timeout: Duration },

    /// 目标页面返回了非成功状态码
    #[error("Failed to load page: HTTP {status}")]
    UpstreamPage { url: String, status: u16 },

    /// 导出 PDF 失败（包括超时）
    #[error("PDF export failed: {reason}")]
    ExportFailed {
        reason: String,
        #[source]
        source: Option<BrowserError>,
    },

    /// 导出步骤成功但产物为空
    #[error("Generated PDF is empty")]
    EmptyOutput,

    /// 其他未预期的故障（浏览器启动失败、崩溃、panic 等）
    #[error("{message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RenderError {
    /// 缺少 url 参数
    pub fn missing_url() -> Self {
        RenderError::InvalidInput("URL parameter is required".to_string())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        RenderError::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    pub fn unexpected_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RenderError::Unexpected {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 错误类别名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::InvalidInput(_) => "InvalidInput",
            RenderError::NavigationTimeout { .. } => "NavigationTimeout",
            RenderError::UpstreamPage { .. } => "UpstreamPageError",
            RenderError::ExportFailed { .. } => "ExportFailed",
            RenderError::EmptyOutput => "EmptyOutput",
            RenderError::Unexpected { .. } => "Unexpected",
        }
    }

    /// 诊断信息：错误类别、调试表示以及完整的 source 链
    pub fn diagnostic(&self) -> String {
        let mut lines = vec![format!("{}: {:?}", self.kind(), self)];
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            lines.push(format!("    caused by: {}", err));
            current = err.source();
        }
        lines.join("\n")
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::unexpected_with(format!("File operation failed: {}", err), err)
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
