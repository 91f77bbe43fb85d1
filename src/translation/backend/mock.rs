//! 内存中的脚本化翻译能力
//!
//! 按原文配置每段文本的行为（正常、失败、挂起、延迟），并统计并发度，
//! 供测试与离线演示使用。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use super::{
    Availability, LanguageDetector, LanguageDetectorCapability, LanguageGuess, ProgressSender,
    TranslatorCapability, TranslatorSession,
};
use crate::translation::error::{TranslationError, TranslationResult};

/// 单段文本的脚本行为
#[derive(Debug, Clone, PartialEq)]
pub enum TextBehavior {
    /// 返回固定译文
    Reply(String),
    Fail,
    /// 永不返回
    Hang,
    /// 延迟后正常翻译
    Delay(Duration),
}

#[derive(Default)]
struct ScriptState {
    behaviors: Mutex<HashMap<String, TextBehavior>>,
    unsupported: Mutex<HashSet<(String, String)>>,
    default_delay: Mutex<Duration>,
    create_delay: Mutex<Duration>,
    downloadable: AtomicBool,
    chunk_size: AtomicUsize,
    generation: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl ScriptState {
    fn behavior(&self, text: &str) -> Option<TextBehavior> {
        self.behaviors.lock().ok()?.get(text).cloned()
    }

    fn default_delay(&self) -> Duration {
        self.default_delay.lock().map(|d| *d).unwrap_or_default()
    }
}

/// 在途计数守卫，任务被丢弃时同样递减
struct InFlight(Arc<ScriptState>);

impl InFlight {
    fn enter(state: Arc<ScriptState>) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        state.started.fetch_add(1, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 脚本化翻译能力
#[derive(Clone, Default)]
pub struct ScriptedCapability {
    state: Arc<ScriptState>,
}

impl ScriptedCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(self, text: &str, behavior: TextBehavior) -> Self {
        if let Ok(mut behaviors) = self.state.behaviors.lock() {
            behaviors.insert(text.to_string(), behavior);
        }
        self
    }

    pub fn with_unsupported_pair(self, source: &str, target: &str) -> Self {
        if let Ok(mut pairs) = self.state.unsupported.lock() {
            pairs.insert((source.to_string(), target.to_string()));
        }
        self
    }

    /// 每次翻译前的统一延迟
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.state.default_delay.lock() {
            *slot = delay;
        }
        self
    }

    /// 模拟模型下载耗时
    pub fn with_create_delay(self, delay: Duration) -> Self {
        if let Ok(mut slot) = self.state.create_delay.lock() {
            *slot = delay;
        }
        self
    }

    pub fn downloadable(self) -> Self {
        self.state.downloadable.store(true, Ordering::SeqCst);
        self
    }

    /// 流式输出的分块大小（字符数），0 表示一次输出
    pub fn with_chunk_size(self, chars: usize) -> Self {
        self.state.chunk_size.store(chars, Ordering::SeqCst);
        self
    }

    /// 使现有会话全部失效
    pub fn invalidate_sessions(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sessions_created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn sessions_destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }

    /// 开始过的翻译调用数
    pub fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    /// 按开始顺序记录的原文
    pub fn texts(&self) -> Vec<String> {
        self.state.texts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TranslatorCapability for ScriptedCapability {
    async fn availability(&self, source: &str, target: &str) -> TranslationResult<Availability> {
        let unsupported = self
            .state
            .unsupported
            .lock()
            .map(|pairs| pairs.contains(&(source.to_string(), target.to_string())))
            .unwrap_or(false);
        if unsupported {
            Ok(Availability::Unavailable)
        } else if self.state.downloadable.load(Ordering::SeqCst) {
            Ok(Availability::Downloadable)
        } else {
            Ok(Availability::Available)
        }
    }

    async fn create(
        &self,
        source: &str,
        target: &str,
        progress: Option<ProgressSender>,
    ) -> TranslationResult<Arc<dyn TranslatorSession>> {
        if matches!(self.availability(source, target).await?, Availability::Unavailable) {
            return Err(TranslationError::PairUnsupported {
                source_lang: source.to_string(),
                target_lang: target.to_string(),
            });
        }

        let delay = self.state.create_delay.lock().map(|d| *d).unwrap_or_default();
        if let Some(progress) = progress {
            let _ = progress.send(0.0);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = progress.send(1.0);
        }

        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            source: source.to_string(),
            target: target.to_string(),
            generation: self.state.generation.load(Ordering::SeqCst),
            destroyed: AtomicBool::new(false),
            state: self.state.clone(),
        }))
    }
}

struct ScriptedSession {
    source: String,
    target: String,
    generation: usize,
    destroyed: AtomicBool,
    state: Arc<ScriptState>,
}

impl ScriptedSession {
    fn is_valid(&self) -> bool {
        !self.destroyed.load(Ordering::SeqCst)
            && self.generation == self.state.generation.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslatorSession for ScriptedSession {
    fn source_language(&self) -> &str {
        &self.source
    }

    fn target_language(&self) -> &str {
        &self.target
    }

    async fn measure_input_usage(&self, text: &str) -> TranslationResult<usize> {
        if self.is_valid() {
            Ok(text.chars().count())
        } else {
            Err(TranslationError::SessionInvalid("会话已销毁".to_string()))
        }
    }

    fn translate_streaming(&self, text: &str) -> BoxStream<'static, TranslationResult<String>> {
        let state = self.state.clone();
        let valid = self.is_valid();
        let target = self.target.clone();
        let text = text.to_string();

        let output = async move {
            let _guard = InFlight::enter(state.clone());
            if let Ok(mut texts) = state.texts.lock() {
                texts.push(text.clone());
            }
            if !valid {
                return Err(TranslationError::SessionInvalid("会话已销毁".to_string()));
            }

            let delay = state.default_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let translated = match state.behavior(&text) {
                Some(TextBehavior::Reply(reply)) => reply,
                Some(TextBehavior::Fail) => {
                    return Err(TranslationError::Backend(format!("脚本失败: {}", text)))
                }
                Some(TextBehavior::Hang) => {
                    futures::future::pending::<()>().await;
                    String::new()
                }
                Some(TextBehavior::Delay(extra)) => {
                    tokio::time::sleep(extra).await;
                    format!("[{}] {}", target, text)
                }
                None => format!("[{}] {}", target, text),
            };
            Ok(chunk(&translated, state.chunk_size.load(Ordering::SeqCst)))
        };

        stream::once(output)
            .flat_map(|result| match result {
                Ok(chunks) => stream::iter(chunks.into_iter().map(Ok)).boxed(),
                Err(e) => stream::iter(vec![Err(e)]).boxed(),
            })
            .boxed()
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.state.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn chunk(text: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// 返回固定结果的语言检测器
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    language: String,
    confidence: f64,
}

impl ScriptedDetector {
    pub fn new(language: &str, confidence: f64) -> Self {
        Self {
            language: language.to_string(),
            confidence,
        }
    }
}

#[async_trait]
impl LanguageDetectorCapability for ScriptedDetector {
    async fn create(&self, progress: Option<ProgressSender>) -> TranslationResult<Arc<dyn LanguageDetector>> {
        if let Some(progress) = progress {
            let _ = progress.send(1.0);
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl LanguageDetector for ScriptedDetector {
    async fn detect(&self, sample: &str) -> TranslationResult<Vec<LanguageGuess>> {
        if sample.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![
            LanguageGuess {
                language: self.language.clone(),
                confidence: self.confidence,
            },
            LanguageGuess {
                language: "und".to_string(),
                confidence: (1.0 - self.confidence).max(0.0),
            },
        ])
    }
}
