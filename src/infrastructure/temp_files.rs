//! 临时文件管理 - 基础设施层
//!
//! 为每个请求分配不可猜测的临时文件路径，并保证文件最终被删除。
//! 删除失败只记录日志，残留的临时文件由运维在目录层面处理。

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::Rng;
use tracing::{debug, warn};

/// 临时文件扩展名
const ARTIFACT_EXTENSION: &str = "pdf";

/// 临时产物存储
pub trait ArtifactStore: Send + Sync {
    /// 分配一个新的临时文件路径（文件本身不会被创建）
    fn allocate_path(&self) -> PathBuf;

    /// 在 `delay` 之后异步删除 `path`
    fn schedule_deletion(&self, path: PathBuf, delay: Duration);
}

/// 基于本地目录的临时文件管理器
#[derive(Debug, Clone)]
pub struct TempFileManager {
    dir: PathBuf,
}

impl TempFileManager {
    /// 创建（或复用已存在的）临时目录
    pub fn init(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!("临时目录: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactStore for TempFileManager {
    fn allocate_path(&self) -> PathBuf {
        self.dir
            .join(random_file_stem())
            .with_extension(ARTIFACT_EXTENSION)
    }

    fn schedule_deletion(&self, path: PathBuf, delay: Duration) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => debug!("🧹 已删除临时文件: {}", path.display()),
                        Err(e) => log_deletion_failure(&path, &e),
                    }
                });
            }
            // 不在运行时内（例如进程退出阶段），只能同步删除
            Err(_) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    log_deletion_failure(&path, &e);
                }
            }
        }
    }
}

fn log_deletion_failure(path: &Path, e: &io::Error) {
    if e.kind() == io::ErrorKind::NotFound {
        debug!("临时文件不存在，无需删除: {}", path.display());
    } else {
        warn!("删除临时文件失败 {}: {}", path.display(), e);
    }
}

/// 32 位十六进制文件名，包含 128 位来自系统 CSPRNG 的随机数
fn random_file_stem() -> String {
    format!("{:032x}", OsRng.gen::<u128>())
}

/// 单个请求的临时产物
///
/// 被 drop 时立即安排删除；成功交付后调用 [`TempArtifact::release_after`]
/// 以宽限时间安排删除。两条路径都只会安排一次。
pub struct TempArtifact {
    path: PathBuf,
    store: Arc<dyn ArtifactStore>,
    grace: Duration,
}

impl TempArtifact {
    /// 从存储分配一个新路径
    pub fn allocate(store: Arc<dyn ArtifactStore>) -> Self {
        let path = store.allocate_path();
        Self {
            path,
            store,
            grace: Duration::ZERO,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件名主干，同时用作请求标识写入日志
    pub fn id(&self) -> &str {
        self.path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// 交付完成，在 `grace` 之后删除
    pub fn release_after(mut self, grace: Duration) {
        self.grace = grace;
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);
        self.store.schedule_deletion(path, self.grace);
    }
}
