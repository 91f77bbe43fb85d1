//! 翻译后端
//!
//! 宿主提供的翻译与语言检测能力被视为不透明的外部依赖，这里只定义引擎需要的最小接口：
//!
//! - `TranslatorCapability`: 可用性查询与会话创建
//! - `TranslatorSession`: 流式翻译、存活探测与销毁
//! - `LanguageDetectorCapability`: 语言检测
//!
//! `BackendAdapter` 在这些接口之上管理会话生命周期，`WorkerPool` 把翻译调用分发到隔离的工作者。

pub mod adapter;
pub mod http;
pub mod mock;
pub mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::translation::error::TranslationResult;

pub use adapter::{BackendAdapter, SessionState};
pub use http::{HttpCapability, HttpSession};
pub use mock::{ScriptedCapability, ScriptedDetector, TextBehavior};
pub use worker::{can_use_workers, TokioWorkerSpawner, WorkerPool, WorkerRequest, WorkerResponse, WorkerSpawner};

/// 语言对可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// 可用但需要先下载模型
    Downloadable,
    Unavailable,
}

/// 模型下载进度，取值 0.0..=1.0
pub type ProgressSender = mpsc::UnboundedSender<f64>;

#[async_trait]
pub trait TranslatorCapability: Send + Sync {
    async fn availability(&self, source: &str, target: &str) -> TranslationResult<Availability>;

    async fn create(
        &self,
        source: &str,
        target: &str,
        progress: Option<ProgressSender>,
    ) -> TranslationResult<Arc<dyn TranslatorSession>>;
}

#[async_trait]
pub trait TranslatorSession: Send + Sync {
    fn source_language(&self) -> &str;

    fn target_language(&self) -> &str;

    /// 存活探测，会话失效时返回错误
    async fn measure_input_usage(&self, text: &str) -> TranslationResult<usize>;

    /// 逐块产出译文
    fn translate_streaming(&self, text: &str) -> BoxStream<'static, TranslationResult<String>>;

    fn destroy(&self);
}

/// 一条语言检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageGuess {
    pub language: String,
    pub confidence: f64,
}

#[async_trait]
pub trait LanguageDetectorCapability: Send + Sync {
    async fn create(&self, progress: Option<ProgressSender>) -> TranslationResult<Arc<dyn LanguageDetector>>;
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    /// 按可信度从高到低排列
    async fn detect(&self, sample: &str) -> TranslationResult<Vec<LanguageGuess>>;

    fn destroy(&self) {}
}

/// 宿主环境提供的全部能力
#[derive(Clone, Default)]
pub struct HostCapabilities {
    pub translator: Option<Arc<dyn TranslatorCapability>>,
    pub detector: Option<Arc<dyn LanguageDetectorCapability>>,
    pub workers: Option<Arc<dyn WorkerSpawner>>,
}

impl HostCapabilities {
    pub fn new(translator: Arc<dyn TranslatorCapability>) -> Self {
        Self {
            translator: Some(translator),
            detector: None,
            workers: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetectorCapability>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_workers(mut self, workers: Arc<dyn WorkerSpawner>) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn has_translator(&self) -> bool {
        self.translator.is_some()
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }
}
