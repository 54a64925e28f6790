#![allow(dead_code)]

//! 测试用的渲染引擎和临时文件存储
//!
//! FakeEngine 按脚本返回结果，并统计启动/关闭次数；
//! RecordingStore 记录每一次删除调度。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use page2pdf::browser::{
    BrowserError, NavigationOutcome, PdfLayout, RenderEngine, RenderSession, Surface,
};
use page2pdf::{ArtifactStore, PdfProcessor, RenderSettings};
use tempfile::TempDir;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7\n% fake document\n%%EOF\n";

#[derive(Debug, Clone)]
pub enum Navigation {
    Status(Option<u16>),
    Fail,
    EngineTimeout,
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
    Found,
    Fail,
    Hang,
}

#[derive(Debug, Clone)]
pub enum Export {
    Write(Vec<u8>),
    WriteNothing,
    Fail,
    Hang,
    Panic,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub launch_fails: bool,
    pub navigation: Navigation,
    pub ready: Ready,
    pub export: Export,
    pub close_fails: bool,
    pub close_hangs: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            launch_fails: false,
            navigation: Navigation::Status(Some(200)),
            ready: Ready::Found,
            export: Export::Write(FAKE_PDF.to_vec()),
            close_fails: false,
            close_hangs: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub pages: AtomicUsize,
    pub exports: AtomicUsize,
    pub closes: AtomicUsize,
    pub surfaces: Mutex<Vec<Surface>>,
    pub navigated: Mutex<Vec<String>>,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    /// 会话关闭在后台任务中进行，最多等 1 秒让关闭次数达到 `expected`
    pub async fn wait_for_closes(&self, expected: usize) -> usize {
        for _ in 0..100 {
            if self.closes() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closes()
    }
}

pub struct FakeEngine {
    script: Script,
    counters: Arc<Counters>,
}

impl FakeEngine {
    pub fn new(script: Script) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                script,
                counters: counters.clone(),
            },
            counters,
        )
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn launch(&self) -> Result<Box<dyn RenderSession>, BrowserError> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        if self.script.launch_fails {
            return Err(BrowserError::Launch("chrome not found".to_string()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    script: Script,
    counters: Arc<Counters>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn open_page(&mut self, surface: &Surface) -> Result<(), BrowserError> {
        self.counters.pages.fetch_add(1, Ordering::SeqCst);
        self.counters.surfaces.lock().unwrap().push(*surface);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationOutcome, BrowserError> {
        self.counters.navigated.lock().unwrap().push(url.to_string());
        match &self.script.navigation {
            Navigation::Status(status) => Ok(NavigationOutcome { status: *status }),
            Navigation::Fail => Err(BrowserError::Other("net::ERR_NAME_NOT_RESOLVED".to_string())),
            Navigation::EngineTimeout => Err(BrowserError::Cdp(
                chromiumoxide::error::CdpError::Timeout,
            )),
            Navigation::Hang => std::future::pending().await,
        }
    }

    async fn wait_for_element(&mut self, _selector: &str) -> Result<(), BrowserError> {
        match self.script.ready {
            Ready::Found => Ok(()),
            Ready::Fail => Err(BrowserError::Other("no such element".to_string())),
            Ready::Hang => std::future::pending().await,
        }
    }

    async fn export_pdf(&mut self, _layout: &PdfLayout, path: &Path) -> Result<(), BrowserError> {
        self.counters.exports.fetch_add(1, Ordering::SeqCst);
        match &self.script.export {
            Export::Write(bytes) => {
                tokio::fs::write(path, bytes).await?;
                Ok(())
            }
            Export::WriteNothing => Ok(()),
            Export::Fail => Err(BrowserError::Other("Printing failed".to_string())),
            Export::Hang => std::future::pending().await,
            Export::Panic => panic!("renderer crashed"),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.script.close_hangs {
            return std::future::pending().await;
        }
        if self.script.close_fails {
            return Err(BrowserError::Other("browser already gone".to_string()));
        }
        Ok(())
    }
}

/// 在临时目录中分配路径，记录删除调度并立即删除
pub struct RecordingStore {
    dir: TempDir,
    allocated: AtomicUsize,
    scheduled: Mutex<Vec<(PathBuf, Duration)>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dir: tempfile::tempdir().expect("tempdir should be created"),
            allocated: AtomicUsize::new(0),
            scheduled: Mutex::new(Vec::new()),
        })
    }

    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn scheduled(&self) -> Vec<(PathBuf, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl ArtifactStore for RecordingStore {
    fn allocate_path(&self) -> PathBuf {
        let n = self.allocated.fetch_add(1, Ordering::SeqCst);
        self.dir.path().join(format!("artifact-{n}.pdf"))
    }

    fn schedule_deletion(&self, path: PathBuf, delay: Duration) {
        let _ = std::fs::remove_file(&path);
        self.scheduled.lock().unwrap().push((path, delay));
    }
}

/// 测试用的短超时参数
pub fn fast_settings() -> RenderSettings {
    RenderSettings {
        navigation_timeout: Duration::from_millis(200),
        ready_timeout: Duration::from_millis(100),
        settle_delay: Duration::ZERO,
        export_timeout: Duration::from_millis(200),
        cleanup_delay: Duration::from_secs(5),
        ..RenderSettings::default()
    }
}

pub struct Harness {
    pub processor: Arc<PdfProcessor>,
    pub counters: Arc<Counters>,
    pub store: Arc<RecordingStore>,
}

pub fn harness(script: Script) -> Harness {
    harness_with(script, fast_settings())
}

pub fn harness_with(script: Script, settings: RenderSettings) -> Harness {
    let (engine, counters) = FakeEngine::new(script);
    let store = RecordingStore::new();
    let processor = PdfProcessor::new(Arc::new(engine), store.clone(), settings);
    Harness {
        processor: Arc::new(processor),
        counters,
        store,
    }
}
