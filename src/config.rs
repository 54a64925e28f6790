use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::browser::{PdfLayout, Surface};

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_FILE_ENV: &str = "PAGE2PDF_CONFIG";

/// 运行模式，决定错误响应是否携带诊断信息
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(RunMode::Development),
            "production" | "prod" => Some(RunMode::Production),
            _ => None,
        }
    }

    pub fn is_production(self) -> bool {
        self == RunMode::Production
    }
}

/// 单次渲染的参数
#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// 页面视口
    pub surface: Surface,
    /// PDF 版式
    pub layout: PdfLayout,
    /// 导航超时
    pub navigation_timeout: Duration,
    /// 就绪检测使用的选择器
    pub ready_selector: String,
    /// 就绪检测超时（超时不视为失败）
    pub ready_timeout: Duration,
    /// 就绪后额外等待客户端渲染的时间
    pub settle_delay: Duration,
    /// 导出超时
    pub export_timeout: Duration,
    /// 成功交付后删除临时文件前的宽限时间
    pub cleanup_delay: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            surface: Surface::default(),
            layout: PdfLayout::a4(),
            navigation_timeout: Duration::from_secs(60),
            ready_selector: "body".to_string(),
            ready_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(3),
            export_timeout: Duration::from_secs(60),
            cleanup_delay: Duration::from_secs(5),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 监听端口
    pub port: u16,
    /// 运行模式
    pub mode: RunMode,
    /// 临时文件目录（相对于工作目录）
    pub temp_dir: PathBuf,
    /// Chrome 可执行文件路径，未设置时由 chromiumoxide 自动查找
    pub chrome_executable: Option<PathBuf>,
    /// 允许跨域访问的来源
    pub allowed_origins: Vec<String>,
    pub render: RenderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            mode: RunMode::Development,
            temp_dir: PathBuf::from("temp"),
            chrome_executable: None,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            render: RenderSettings::default(),
        }
    }
}

/// TOML 配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<u16>,
    mode: Option<RunMode>,
    temp_dir: Option<PathBuf>,
    chrome_executable: Option<PathBuf>,
    allowed_origins: Option<Vec<String>>,
    navigation_timeout_secs: Option<u64>,
    ready_timeout_secs: Option<u64>,
    settle_delay_ms: Option<u64>,
    export_timeout_secs: Option<u64>,
    cleanup_delay_secs: Option<u64>,
    viewport_width: Option<u32>,
    viewport_height: Option<u32>,
}

impl Config {
    /// 默认值 → 配置文件（如果设置了 `PAGE2PDF_CONFIG`）→ 环境变量
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            config = config.with_file(Path::new(&path))?;
        }
        Ok(config.with_lookup(|key| std::env::var(key).ok()))
    }

    /// 只读取环境变量
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    /// 用 TOML 文件覆盖当前配置
    pub fn with_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        self.with_toml(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    fn with_toml(mut self, content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let render = &mut self.render;

        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        if let Some(dir) = file.temp_dir {
            self.temp_dir = dir;
        }
        if file.chrome_executable.is_some() {
            self.chrome_executable = file.chrome_executable;
        }
        if let Some(origins) = file.allowed_origins {
            self.allowed_origins = origins;
        }
        if let Some(secs) = file.navigation_timeout_secs {
            render.navigation_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.ready_timeout_secs {
            render.ready_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = file.settle_delay_ms {
            render.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.export_timeout_secs {
            render.export_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.cleanup_delay_secs {
            render.cleanup_delay = Duration::from_secs(secs);
        }
        if let Some(width) = file.viewport_width {
            render.surface.width = width;
        }
        if let Some(height) = file.viewport_height {
            render.surface.height = height;
        }
        Ok(self)
    }

    /// 用环境变量覆盖当前配置，无法解析的值保留原值
    pub fn with_lookup(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse_u64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let secs = |key: &str, current: Duration| parse_u64(key).map(Duration::from_secs).unwrap_or(current);
        let render = self.render;

        Self {
            port: lookup("PORT").and_then(|v| v.trim().parse().ok()).unwrap_or(self.port),
            mode: lookup("APP_ENV").and_then(|v| RunMode::parse(&v)).unwrap_or(self.mode),
            temp_dir: lookup("TEMP_DIR").map(PathBuf::from).unwrap_or(self.temp_dir),
            chrome_executable: lookup("CHROME_EXECUTABLE").map(PathBuf::from).or(self.chrome_executable),
            allowed_origins: lookup("ALLOWED_ORIGINS").map(|v| parse_origins(&v)).unwrap_or(self.allowed_origins),
            render: RenderSettings {
                navigation_timeout: secs("NAVIGATION_TIMEOUT_SECS", render.navigation_timeout),
                ready_timeout: secs("READY_TIMEOUT_SECS", render.ready_timeout),
                settle_delay: parse_u64("SETTLE_DELAY_MS").map(Duration::from_millis).unwrap_or(render.settle_delay),
                export_timeout: secs("EXPORT_TIMEOUT_SECS", render.export_timeout),
                cleanup_delay: secs("CLEANUP_DELAY_SECS", render.cleanup_delay),
                surface: Surface {
                    width: lookup("VIEWPORT_WIDTH").and_then(|v| v.trim().parse().ok()).unwrap_or(render.surface.width),
                    height: lookup("VIEWPORT_HEIGHT").and_then(|v| v.trim().parse().ok()).unwrap_or(render.surface.height),
                    ..render.surface
                },
                ..render
            },
        }
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
