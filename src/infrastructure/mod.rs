//! 基础设施层：持有文件系统等资源，只暴露能力

pub mod temp_files;

pub use temp_files::{ArtifactStore, TempArtifact, TempFileManager};
