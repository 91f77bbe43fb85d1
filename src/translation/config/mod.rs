//! 翻译配置管理模块
//!
//! 提供配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, SegmentStrategy, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 默认语言
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_TARGET_LANG: &str = "zh-Hans";
    pub const AUTO_LANG: &str = "auto";
    pub const UNDETERMINED_LANG: &str = "und";

    // 调度相关
    pub const MAX_DEFAULT_CONCURRENCY: usize = 4;
    pub const RESERVED_CPUS: usize = 2;
    pub const FAST_TASK_THRESHOLD_MS: u64 = 1000;
    pub const ERROR_RATIO_THRESHOLD: f64 = 0.1;
    pub const BACKOFF_FACTOR: f64 = 0.8;
    pub const ADAPTIVE_CEILING_FACTOR: usize = 2;
    pub const OUTCOME_WINDOW: usize = 20;

    // 超时与重试
    pub const SELECTION_TIMEOUT_MS: u64 = 8000;
    pub const SELECTION_MAX_RETRIES: usize = 3;
    pub const SEGMENT_TIMEOUT_MS: u64 = 30_000;
    pub const RETRY_PAUSE: Duration = Duration::from_secs(1);
    pub const WORKER_INIT_TIMEOUT_MS: u64 = 10_000;
    pub const WORKER_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DOWNLOAD_STALL_NOTICE: Duration = Duration::from_secs(20);

    // 观察与刷新
    pub const OBSERVER_DEBOUNCE_MS: u64 = 600;
    pub const FRAME_INTERVAL_MS: u64 = 16;

    // 语言检测
    pub const DETECTION_SAMPLE_CHARS: usize = 1500;
    pub const DETECTION_CONFIDENCE: f64 = 0.5;

    // 缓存设置
    pub const DEFAULT_CACHE_SIZE: usize = 1000;

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";

    /// 跨后端调用保护换行的占位符
    pub const NEWLINE_PLACEHOLDER: &str = "<br>";

    // 引擎自身界面与标记
    pub const UI_CLASS: &str = "ft-ui";
    pub const PAIR_CLASS: &str = "ft-pair";
    pub const ORIGINAL_CLASS: &str = "ft-original";
    pub const TRANSLATED_CLASS: &str = "ft-translated";
    pub const SHOW_ORIGINAL_CLASS: &str = "show-original";
    pub const SEGMENT_WRAPPER_CLASS: &str = "ft-segment-wrapper";
    pub const SEGMENT_ORIGINAL_CLASS: &str = "ft-segment-original";
    pub const SEGMENT_SEPARATOR_CLASS: &str = "ft-segment-separator";
    pub const SEGMENT_TRANSLATED_CLASS: &str = "ft-segment-translated";

    pub const ATTR_ORIGINAL_TEXT: &str = "data-ft-original-text";
    pub const ATTR_LEADING: &str = "data-ft-leading";
    pub const ATTR_TRAILING: &str = "data-ft-trailing";
    pub const ATTR_PAIR: &str = "data-ft-pair";
    pub const ATTR_SEGMENT_TRANSLATED: &str = "data-ft-segment-translated";
    pub const ATTR_SEGMENT_ORIGINAL: &str = "data-ft-segment-original";
    /// 旧版本留下的标记
    pub const ATTR_LEGACY_ORIGINAL: &str = "data-ft-original";

    pub const NO_TRANSLATE_CLASS: &str = "notranslate";

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "textarea", "input", "code", "pre", "svg", "math",
        "kbd", "samp", "tt", "var", "template", "head",
    ];

    // 代码环境标签
    pub const CODE_TAGS: &[&str] = &["code", "pre", "kbd", "samp", "tt", "var"];
    pub const CODE_ANCESTOR_DEPTH: usize = 5;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "page-translator.toml",
        ".page-translator.toml",
        "page-translator.json",
        "~/.config/page-translator/config.toml",
        "/etc/page-translator/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时使用默认配置
pub fn load_translation_config(target_lang: Option<&str>, api_url: Option<&str>) -> TranslationConfig {
    let mut config = match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default()
        }
    };
    if let Some(lang) = target_lang {
        config.target_lang = lang.to_string();
    }
    if let Some(url) = api_url {
        config.api_url = url.to_string();
    }
    config
}
