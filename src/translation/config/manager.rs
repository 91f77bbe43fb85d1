//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 分段策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentStrategy {
    /// 每个文本节点一个片段
    #[default]
    TextNode,
    /// 每个直接拥有文本的块级容器一个片段
    Container,
}

impl std::str::FromStr for SegmentStrategy {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "text-node" => Ok(SegmentStrategy::TextNode),
            "container" | "element" => Ok(SegmentStrategy::Container),
            other => Err(TranslationError::Config(format!("未知的分段策略: {}", other))),
        }
    }
}

/// 翻译配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 语言配置
    pub source_lang: String,
    pub target_lang: String,
    pub strategy: SegmentStrategy,
    pub keep_original: bool,

    // 调度配置
    pub max_concurrency: usize,
    pub adaptive_limit: bool,
    pub fast_task_threshold_ms: u64,
    pub error_ratio_threshold: f64,
    pub backoff_factor: f64,

    // 超时与重试
    pub selection_timeout_ms: u64,
    pub selection_max_retries: usize,
    /// 页面翻译中单个片段的超时
    pub segment_timeout_ms: u64,

    // 观察与刷新
    pub observer_debounce_ms: u64,
    pub frame_interval_ms: u64,
    pub detection_sample_chars: usize,

    // 工作池
    pub use_workers: bool,
    pub worker_init_timeout_ms: u64,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_size: usize,

    pub api_url: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_lang: constants::DEFAULT_TARGET_LANG.to_string(),
            strategy: SegmentStrategy::default(),
            keep_original: true,

            max_concurrency: default_concurrency(),
            adaptive_limit: true,
            fast_task_threshold_ms: constants::FAST_TASK_THRESHOLD_MS,
            error_ratio_threshold: constants::ERROR_RATIO_THRESHOLD,
            backoff_factor: constants::BACKOFF_FACTOR,

            selection_timeout_ms: constants::SELECTION_TIMEOUT_MS,
            selection_max_retries: constants::SELECTION_MAX_RETRIES,
            segment_timeout_ms: constants::SEGMENT_TIMEOUT_MS,

            observer_debounce_ms: constants::OBSERVER_DEBOUNCE_MS,
            frame_interval_ms: constants::FRAME_INTERVAL_MS,
            detection_sample_chars: constants::DETECTION_SAMPLE_CHARS,

            use_workers: true,
            worker_init_timeout_ms: constants::WORKER_INIT_TIMEOUT_MS,

            cache_enabled: true,
            cache_size: constants::DEFAULT_CACHE_SIZE,

            api_url: constants::DEFAULT_API_URL.to_string(),
        }
    }
}

/// `min(4, max(1, cpus - 2))`
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.saturating_sub(constants::RESERVED_CPUS)
        .max(1)
        .min(constants::MAX_DEFAULT_CONCURRENCY)
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_lang: &str, api_url: Option<&str>) -> Self {
        let mut config = Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        };
        if let Some(url) = api_url {
            config.api_url = url.to_string();
        }
        config
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.max_concurrency == 0 {
            return Err(TranslationError::Config("最大并发数不能为0".to_string()));
        }

        if !(self.backoff_factor > 0.0 && self.backoff_factor < 1.0) {
            return Err(TranslationError::Config(format!(
                "退避系数必须在 (0, 1) 区间内: {}",
                self.backoff_factor
            )));
        }

        if !(0.0..=1.0).contains(&self.error_ratio_threshold) {
            return Err(TranslationError::Config(format!(
                "错误率阈值必须在 [0, 1] 区间内: {}",
                self.error_ratio_threshold
            )));
        }

        if self.target_lang.trim().is_empty() {
            return Err(TranslationError::Config("目标语言不能为空".to_string()));
        }

        if self.cache_enabled && self.cache_size == 0 {
            return Err(TranslationError::Config("启用缓存时缓存大小不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvVar};

        if let Ok(target_lang) = translation::TargetLang::get() {
            self.target_lang = target_lang;
        }

        if let Ok(source_lang) = translation::SourceLang::get() {
            self.source_lang = source_lang;
        }

        if let Ok(strategy) = translation::Strategy::get() {
            if let Ok(strategy) = strategy.parse() {
                self.strategy = strategy;
            }
        }

        if let Ok(api_url) = translation::ApiUrl::get() {
            self.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }

        if let Ok(max_concurrency) = translation::MaxConcurrency::get() {
            self.max_concurrency = max_concurrency;
        }

        if let Ok(keep_original) = translation::KeepOriginal::get() {
            self.keep_original = keep_original;
        }

        if let Ok(use_workers) = translation::UseWorkers::get() {
            self.use_workers = use_workers;
        }

        if let Ok(timeout) = translation::SelectionTimeout::get() {
            self.selection_timeout_ms = timeout.as_millis() as u64;
        }

        if let Ok(cache_enabled) = cache::Enabled::get() {
            self.cache_enabled = cache_enabled;
        }

        if let Ok(cache_size) = cache::Size::get() {
            self.cache_size = cache_size;
        }
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection_timeout_ms)
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_millis(self.segment_timeout_ms)
    }

    pub fn fast_task_threshold(&self) -> Duration {
        Duration::from_millis(self.fast_task_threshold_ms)
    }

    pub fn observer_debounce(&self) -> Duration {
        Duration::from_millis(self.observer_debounce_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn worker_init_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_init_timeout_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 从搜索路径加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
