//! 存储管理模块
//!
//! - `cache`: 翻译记忆缓存
//! - `settings`: 持久化设置

pub mod cache;
pub mod settings;

pub use cache::{CacheStats, TranslationCache};
pub use settings::{
    infer_default_pair, FileSettingsStore, LanguagePair, MemorySettingsStore, Settings,
    SettingsStore, UiPosition, LANGUAGES,
};
