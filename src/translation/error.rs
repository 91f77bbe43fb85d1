//! 翻译模块统一错误处理
//!
//! 错误按来源分类：宿主能力缺失、语言对不支持、会话失效、单段失败、
//! DOM 修改失败、工作池不可用以及取消。前两类对整个翻译轮次是致命的，
//! 其余均在本地处理。

use std::fmt;

use thiserror::Error;

use crate::parsers::html::DomError;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 宿主环境不提供翻译能力
    #[error("当前环境不支持翻译能力")]
    CapabilityAbsent,

    /// 后端拒绝该语言对
    #[error("不支持的语言对: {source_lang} -> {target_lang}")]
    PairUnsupported {
        source_lang: String,
        target_lang: String,
    },

    /// 会话存活探测失败
    #[error("翻译会话已失效: {0}")]
    SessionInvalid(String),

    /// 操作超时
    #[error("操作超时: {0}")]
    Timeout(String),

    /// 后端返回的一般错误
    #[error("翻译服务错误: {0}")]
    Backend(String),

    /// 无法创建工作线程池
    #[error("工作池不可用: {0}")]
    WorkerUnavailable(String),

    /// 工作池已终止，请求被取消
    #[error("工作线程已终止")]
    WorkerTerminated,

    /// DOM 修改失败
    #[error("DOM 修改错误: {0}")]
    Dom(#[from] DomError),

    /// 翻译轮次被取消
    #[error("翻译已取消")]
    Cancelled,

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::SessionInvalid(_) => true,
            TranslationError::Timeout(_) => true,
            TranslationError::Backend(_) => true,
            TranslationError::WorkerTerminated => true,
            TranslationError::Io(_) => true,
            TranslationError::CapabilityAbsent => false,
            TranslationError::PairUnsupported { .. } => false,
            TranslationError::WorkerUnavailable(_) => false,
            TranslationError::Dom(_) => false,
            TranslationError::Cancelled => false,
            TranslationError::Config(_) => false,
            TranslationError::Parse(_) => false,
        }
    }

    /// 是否终止整个翻译轮次
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranslationError::CapabilityAbsent | TranslationError::PairUnsupported { .. }
        )
    }

    /// 取消不算失败
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::CapabilityAbsent => ErrorSeverity::Critical,
            TranslationError::PairUnsupported { .. } => ErrorSeverity::Error,
            TranslationError::SessionInvalid(_) => ErrorSeverity::Warning,
            TranslationError::Timeout(_) => ErrorSeverity::Warning,
            TranslationError::Backend(_) => ErrorSeverity::Warning,
            TranslationError::WorkerUnavailable(_) => ErrorSeverity::Info,
            TranslationError::WorkerTerminated => ErrorSeverity::Warning,
            TranslationError::Dom(_) => ErrorSeverity::Warning,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::Config(_) => ErrorSeverity::Critical,
            TranslationError::Io(_) => ErrorSeverity::Error,
            TranslationError::Parse(_) => ErrorSeverity::Error,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::CapabilityAbsent => ErrorCategory::Capability,
            TranslationError::PairUnsupported { .. } => ErrorCategory::Capability,
            TranslationError::SessionInvalid(_) => ErrorCategory::Session,
            TranslationError::Timeout(_) => ErrorCategory::Timeout,
            TranslationError::Backend(_) => ErrorCategory::Service,
            TranslationError::WorkerUnavailable(_) => ErrorCategory::Worker,
            TranslationError::WorkerTerminated => ErrorCategory::Worker,
            TranslationError::Dom(_) => ErrorCategory::Dom,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::Config(_) => ErrorCategory::Configuration,
            TranslationError::Io(_) => ErrorCategory::Io,
            TranslationError::Parse(_) => ErrorCategory::Parsing,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} (上下文: {})", msg, context);
        match self {
            TranslationError::SessionInvalid(msg) => TranslationError::SessionInvalid(wrap(msg)),
            TranslationError::Timeout(msg) => TranslationError::Timeout(wrap(msg)),
            TranslationError::Backend(msg) => TranslationError::Backend(wrap(msg)),
            TranslationError::WorkerUnavailable(msg) => {
                TranslationError::WorkerUnavailable(wrap(msg))
            }
            TranslationError::Config(msg) => TranslationError::Config(wrap(msg)),
            TranslationError::Io(msg) => TranslationError::Io(wrap(msg)),
            TranslationError::Parse(msg) => TranslationError::Parse(wrap(msg)),
            other => other,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Capability,
    Session,
    Timeout,
    Service,
    Worker,
    Dom,
    Cancellation,
    Configuration,
    Io,
    Parsing,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::Parse(format!("JSON解析错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Parse(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::Parse(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::Timeout(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::Timeout(error.to_string())
        } else {
            TranslationError::Backend(format!("网络错误: {}", error))
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classes() {
        assert!(TranslationError::CapabilityAbsent.is_fatal());
        assert!(TranslationError::PairUnsupported {
            source_lang: "en".into(),
            target_lang: "xx".into()
        }
        .is_fatal());
        assert!(!TranslationError::Timeout("8s".into()).is_fatal());
        assert!(!TranslationError::Cancelled.is_fatal());
    }

    #[test]
    fn test_retryable_classes() {
        assert!(TranslationError::SessionInvalid("probe".into()).is_retryable());
        assert!(TranslationError::Timeout("8s".into()).is_retryable());
        assert!(!TranslationError::CapabilityAbsent.is_retryable());
        assert!(!TranslationError::Cancelled.is_retryable());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let error = TranslationError::Backend("boom".into()).with_context("segment 3");
        assert!(matches!(error, TranslationError::Backend(ref msg) if msg.contains("segment 3")));
        assert_eq!(error.category(), ErrorCategory::Service);

        let error = TranslationError::WorkerTerminated.with_context("ignored");
        assert!(matches!(error, TranslationError::WorkerTerminated));
    }

    #[test]
    fn test_dom_error_converts() {
        let error: TranslationError = DomError::Detached.into();
        assert_eq!(error.category(), ErrorCategory::Dom);
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }
}
