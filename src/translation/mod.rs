//! 翻译模块
//!
//! 在文档中就地、可逆地翻译可见文本，模块划分：
//! - **core**: 翻译引擎与自动翻译观察者
//! - **pipeline**: 片段收集、过滤、并发调度与 DOM 应用
//! - **backend**: 宿主翻译能力、会话管理与工作者池
//! - **storage**: 翻译缓存与持久化设置
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use page_translator::parsers::RcDomPort;
//! use page_translator::translation::backend::{HostCapabilities, HttpCapability};
//! use page_translator::translation::{TranslationConfig, TranslationEngine, TracingSurface};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let port = Rc::new(RcDomPort::parse(b"<p>Hello</p>", "utf-8")?);
//! let config = TranslationConfig::default_with_lang("zh-Hans", None);
//! let capability = HttpCapability::new(&config.api_url)?;
//! let engine = TranslationEngine::new(
//!     port,
//!     config,
//!     HostCapabilities::new(Arc::new(capability)),
//!     Rc::new(TracingSurface),
//! );
//! let report = engine.translate_page(false).await?;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 宿主翻译能力与会话生命周期
pub mod backend;

/// 配置管理模块
///
/// 提供语言、调度、超时与缓存配置
pub mod config;

/// 翻译引擎与观察者
pub mod core;

/// 错误处理模块
pub mod error;

/// 翻译管道：收集、过滤、调度与应用
pub mod pipeline;

/// 缓存与设置存储
pub mod storage;

/// 状态与进度报告接口
pub mod surface;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, SegmentStrategy, TranslationConfig};
pub use core::{AutoTranslator, MutationRecord, PassReport, TranslationEngine};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use surface::{ControlSurface, RecordingSurface, TracingSurface};

// ============================================================================
// 高级API导出
// ============================================================================

pub use pipeline::{
    ApplyQueue, ConcurrencyScheduler, DomMutator, Segment, SegmentCollector, SegmentKind,
    TextFilter,
};
pub use storage::{CacheStats, FileSettingsStore, Settings, SettingsStore, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 还原 HTML 文档中全部翻译标记，返回序列化结果与还原数量
pub fn restore_html_document(html: &[u8], document_encoding: &str) -> TranslationResult<(Vec<u8>, usize)> {
    use crate::parsers::DomPort;

    let port = crate::parsers::RcDomPort::parse(html, document_encoding)?;
    let restored = pipeline::restore(&port, &port.body());
    let output = port.to_html(document_encoding)?;
    Ok((output, restored))
}

/// 文本是否会被送去翻译
pub fn should_translate(text: &str) -> bool {
    let filter = TextFilter::new();
    !filter.should_skip(text, &pipeline::AncestorContext::empty())
}
