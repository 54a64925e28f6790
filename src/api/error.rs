use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::RunMode;
use crate::error::RenderError;

/// PDF 生成失败时 `error` 字段的固定文本
pub const GENERATE_FAILED: &str = "Failed to generate PDF";

/// 跨域被拒时 `error` 字段的固定文本
pub const CORS_REJECTED: &str = "Not allowed by CORS";

/// 统一的 JSON 错误信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    /// 诊断信息，只在非生产模式下返回
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// 附加在响应扩展里的诊断信息，供日志中间件使用
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub detail: String,
}

impl ErrorReport {
    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
    report: ErrorReport,
}

impl ApiError {
    /// 所有生成失败都返回 500，调用方换一种请求方式也无法修正
    pub fn from_render(err: &RenderError, mode: RunMode) -> Self {
        let diagnostic = err.diagnostic();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: GENERATE_FAILED.to_string(),
                message: err.to_string(),
                stack: (!mode.is_production()).then(|| diagnostic.clone()),
            },
            report: ErrorReport {
                kind: err.kind(),
                detail: diagnostic,
            },
        }
    }

    pub fn cors_rejected(origin: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorBody {
                error: CORS_REJECTED.to_string(),
                message: format!("Origin {} is not allowed", origin),
                stack: None,
            },
            report: ErrorReport {
                kind: "CorsRejected",
                detail: format!("origin={}", origin),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_envelope_in_development() {
        let err = ApiError::from_render(&RenderError::missing_url(), RunMode::Development);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().error, "Failed to generate PDF");
        assert_eq!(err.body().message, "URL parameter is required");
        assert!(err.body().stack.is_some());
    }

    #[test]
    fn production_mode_hides_stack() {
        let err = ApiError::from_render(&RenderError::EmptyOutput, RunMode::Production);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.body().stack.is_none());

        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "Failed to generate PDF",
                "message": "Generated PDF is empty",
            })
        );
    }

    #[test]
    fn every_failure_kind_maps_to_500() {
        let errors = [
            RenderError::missing_url(),
            RenderError::NavigationTimeout {
                url: "https://slow.example".to_string(),
                timeout: std::time::Duration::from_secs(60),
            },
            RenderError::UpstreamPage {
                url: "https://example.com".to_string(),
                status: 502,
            },
            RenderError::ExportFailed {
                reason: "timed out after 60s".to_string(),
                source: None,
            },
            RenderError::EmptyOutput,
            RenderError::unexpected("browser crashed"),
        ];
        for err in &errors {
            let api = ApiError::from_render(err, RunMode::Production);
            assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", err.kind());
        }
    }
}
