//! 翻译核心
//!
//! - `engine`: 页面翻译轮次、还原与划词翻译
//! - `observer`: 新内容的自动翻译

pub mod engine;
pub mod observer;

pub use engine::{PassReport, TranslationEngine};
pub use observer::{
    mutation_channel, AutoTranslator, MutationReceiver, MutationRecord, MutationSender,
    ObserverStats,
};
