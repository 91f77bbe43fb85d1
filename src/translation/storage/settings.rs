//! 持久化设置
//!
//! 设置存储是外部协作者：读取失败一律回退到默认值，写入失败只记录日志。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::translation::config::constants;
use crate::translation::error::TranslationResult;

/// 支持的语言列表
pub const LANGUAGES: &[&str] = &[
    "zh-Hans", "zh-Hant", "en", "ja", "ru", "ko", "es", "fr", "de", "pt", "it", "nl", "sv", "da",
    "fi", "no", "id", "th", "pl", "tr", "vi", "ar", "hi", "bn", "kn", "mr", "hr", "cs", "hu", "uk",
    "he", "bg", "ro", "te", "lt", "sl", "el", "ta",
];

/// 设置键
pub mod keys {
    pub const SOURCE_LANG: &str = "ft_source_lang";
    pub const TARGET_LANG: &str = "ft_target_lang";
    pub const AUTO_OBSERVE_PREFIX: &str = "ft_auto_observe_";
    pub const POSITION: &str = "ft_position";
    pub const DISABLED: &str = "ft_disabled";
    pub const SITE_DISABLED_PREFIX: &str = "ft_site_disabled_";
    pub const WORD_SELECTION: &str = "ft_word_selection_global";

    pub fn auto_observe(host: &str) -> String {
        format!("{}{}", AUTO_OBSERVE_PREFIX, host)
    }

    pub fn site_disabled(host: &str) -> String {
        format!("{}{}", SITE_DISABLED_PREFIX, host)
    }
}

/// 键值设置存储
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> TranslationResult<()>;

    /// 读取并反序列化，失败时返回默认值
    fn get_or<T>(&self, key: &str, fallback: T) -> T
    where
        T: for<'de> Deserialize<'de>,
        Self: Sized,
    {
        read_or(self, key, fallback)
    }

    /// 写入，失败时只记录日志
    fn put<T: Serialize>(&self, key: &str, value: T)
    where
        Self: Sized,
    {
        write(self, key, value)
    }
}

/// 读取并反序列化，失败时返回默认值
pub fn read_or<S, T>(store: &S, key: &str, fallback: T) -> T
where
    S: SettingsStore + ?Sized,
    T: for<'de> Deserialize<'de>,
{
    store
        .get(key)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or(fallback)
}

/// 写入，失败时只记录日志
pub fn write<S, T>(store: &S, key: &str, value: T)
where
    S: SettingsStore + ?Sized,
    T: Serialize,
{
    let result = serde_json::to_value(value)
        .map_err(Into::into)
        .and_then(|value| store.set(key, value));
    if let Err(e) = result {
        tracing::warn!("设置写入失败 {}: {}", key, e);
    }
}

/// 内存设置存储
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> TranslationResult<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// JSON 文件设置存储，整个文件是一个对象
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let expanded = shellexpand::tilde(&path.as_ref().to_string_lossy()).into_owned();
        Self {
            path: PathBuf::from(expanded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> TranslationResult<serde_json::Map<String, Value>> {
        if !self.path.exists() {
            return Ok(serde_json::Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        match self.read_all() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                tracing::debug!("读取设置文件失败 {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) -> TranslationResult<()> {
        let mut map = self.read_all().unwrap_or_default();
        map.insert(key.to_string(), value);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// 控制界面位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPosition {
    pub top: i32,
    pub right: i32,
}

impl Default for UiPosition {
    fn default() -> Self {
        Self { top: 50, right: 12 }
    }
}

/// 默认语言对
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

/// 根据语言检测能力与本地语言推断默认语言对
pub fn infer_default_pair(has_detector: bool, locale: &str) -> LanguagePair {
    let source = if has_detector {
        constants::AUTO_LANG
    } else if is_chinese_locale(locale) {
        "zh-Hans"
    } else {
        "en"
    };
    LanguagePair {
        source: source.to_string(),
        target: constants::DEFAULT_TARGET_LANG.to_string(),
    }
}

fn is_chinese_locale(locale: &str) -> bool {
    let primary = locale.split(['-', '_']).next().unwrap_or_default();
    primary.eq_ignore_ascii_case("zh")
}

/// 是否为支持的语言
pub fn is_supported_language(tag: &str) -> bool {
    LANGUAGES.contains(&tag)
}

/// 某个站点的设置视图
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub auto_observe: bool,
    pub position: UiPosition,
    pub disabled: bool,
    pub site_disabled: bool,
    pub word_selection: bool,
}

impl Settings {
    pub fn load<S>(store: &S, host: &str, defaults: &LanguagePair) -> Self
    where
        S: SettingsStore + ?Sized,
    {
        Self {
            source_lang: read_or(store, keys::SOURCE_LANG, defaults.source.clone()),
            target_lang: read_or(store, keys::TARGET_LANG, defaults.target.clone()),
            auto_observe: read_or(store, &keys::auto_observe(host), false),
            position: read_or(store, keys::POSITION, UiPosition::default()),
            disabled: read_or(store, keys::DISABLED, false),
            site_disabled: read_or(store, &keys::site_disabled(host), false),
            word_selection: read_or(store, keys::WORD_SELECTION, true),
        }
    }

    /// 全局或本站禁用时引擎不启动
    pub fn engine_enabled(&self) -> bool {
        !self.disabled && !self.site_disabled
    }
}
