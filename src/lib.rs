//! # page2pdf
//!
//! 把网页渲染成 PDF 的 HTTP 服务。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 临时文件的分配与延迟删除
//!
//! ### ② 渲染引擎层（Browser）
//! - `browser/` - `RenderEngine` / `RenderSession` 抽象，以及基于 chromiumoxide 的实现
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/` - 一次请求的完整流程：启动 → 导航 → 等待 → 导出 → 清理
//!
//! ### ④ 接口层（API）
//! - `api/` - axum 路由、CORS、统一错误信封
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod orchestrator;

// 重新导出常用类型
pub use app::App;
pub use browser::{ChromeEngine, RenderEngine, RenderSession};
pub use config::{Config, RenderSettings, RunMode};
pub use error::{RenderError, RenderResult};
pub use infrastructure::{ArtifactStore, TempArtifact, TempFileManager};
pub use orchestrator::PdfProcessor;
