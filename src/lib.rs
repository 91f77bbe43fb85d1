//! # Page Translator
//!
//! 在 HTML 文档中就地、可逆地翻译可见文本。
//!
//! ## 模块组织
//!
//! - `parsers` - HTML 解析、DOM 端口与序列化
//! - `translation` - 片段收集、并发调度、后端会话与 DOM 应用
//! - `env` - 环境变量访问

pub mod env;
pub mod parsers;
pub mod translation;

pub use parsers::{DomPort, RcDomPort};
pub use translation::{PassReport, TranslationConfig, TranslationEngine, TranslationError};
