//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 负责单个请求从"拿到 URL"到"拿到 PDF 字节"的完整流程，
//! 并且是唯一持有浏览器会话和临时文件的地方。
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP 路由、错误信封、CORS)
//!     ↓
//! orchestrator::PdfProcessor (一次请求 = 一个浏览器 + 一个临时文件)
//!     ↓
//! browser (RenderEngine / RenderSession)      infrastructure (临时文件)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：每个请求启动独立的浏览器进程，不复用
//! 2. **必定清理**：浏览器在所有出口关闭一次，临时文件在所有出口删除一次
//! 3. **顺序执行**：单个请求内部没有并发

pub mod pdf_processor;

pub use pdf_processor::PdfProcessor;
