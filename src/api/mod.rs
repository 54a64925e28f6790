//! HTTP 接口层
//!
//! - `GET /`：存活检查
//! - `GET /generate-pdf?url=...`：生成 PDF 并以附件形式返回

pub mod cors;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};

use crate::config::RunMode;
use crate::orchestrator::PdfProcessor;

pub use cors::CorsPolicy;
pub use error::{ApiError, ErrorBody, ErrorReport};

/// 路由共享状态，启动后只读
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<PdfProcessor>,
    pub mode: RunMode,
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    pub fn new(processor: Arc<PdfProcessor>, mode: RunMode, cors: CorsPolicy) -> Self {
        Self {
            processor,
            mode,
            cors: Arc::new(cors),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/generate-pdf", get(handlers::generate_pdf))
        .layer(axum_middleware::from_fn_with_state(
            state.cors.clone(),
            cors::enforce,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .with_state(state)
}
