use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use super::{error::ApiError, AppState};

/// 存活检查返回的文本
pub const LIVENESS_MARKER: &str = "PDF generator service is running";

#[derive(Debug, Default, Deserialize)]
pub struct GeneratePdfQuery {
    pub url: Option<String>,
}

pub async fn health() -> &'static str {
    LIVENESS_MARKER
}

pub async fn generate_pdf(
    State(state): State<AppState>,
    query: Result<Query<GeneratePdfQuery>, QueryRejection>,
) -> Response {
    // 无法解析的查询串按缺少 url 处理
    let target = match query {
        Ok(Query(query)) => query.url,
        Err(rejection) => {
            debug!("查询参数解析失败: {}", rejection);
            None
        }
    };

    match state.processor.clone().render_detached(target).await {
        Ok(bytes) => pdf_response(bytes),
        Err(err) => ApiError::from_render(&err, state.mode).into_response(),
    }
}

fn pdf_response(bytes: Bytes) -> Response {
    let length = HeaderValue::from(bytes.len());
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (
                CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=generated.pdf"),
            ),
            (CONTENT_LENGTH, length),
        ],
        Body::from(bytes),
    )
        .into_response()
}
