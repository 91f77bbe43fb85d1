//! 后端适配器
//!
//! 统一封装宿主翻译能力：可用性检查、源语言解析、会话复用与重建、流式翻译。
//! 会话创建经由同一把异步锁串行化，并发任务只会等待同一次创建而不会重复创建。

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};

use super::{
    Availability, HostCapabilities, LanguageDetector, TranslatorCapability, TranslatorSession,
    WorkerPool,
};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::surface::ControlSurface;

/// 当前会话的语言对
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub source: String,
    pub target: String,
}

/// 用占位符保护换行
pub fn protect_newlines(text: &str) -> String {
    text.replace('\n', constants::NEWLINE_PLACEHOLDER)
}

/// 还原换行并去除首尾空白
pub fn restore_newlines(text: &str) -> String {
    text.replace(constants::NEWLINE_PLACEHOLDER, "\n").trim().to_string()
}

pub struct BackendAdapter {
    capabilities: HostCapabilities,
    surface: Rc<dyn ControlSurface>,
    session: Mutex<Option<Arc<dyn TranslatorSession>>>,
    detector: Mutex<Option<Arc<dyn LanguageDetector>>>,
    /// 最近一次成功建立会话的语言对，会话被销毁后据此重建
    last_pair: RefCell<Option<SessionState>>,
    detection_sample_chars: usize,
}

impl BackendAdapter {
    pub fn new(capabilities: HostCapabilities, surface: Rc<dyn ControlSurface>) -> Self {
        Self {
            capabilities,
            surface,
            session: Mutex::new(None),
            detector: Mutex::new(None),
            last_pair: RefCell::new(None),
            detection_sample_chars: constants::DETECTION_SAMPLE_CHARS,
        }
    }

    pub fn with_sample_chars(mut self, chars: usize) -> Self {
        self.detection_sample_chars = chars.max(1);
        self
    }

    pub fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    pub fn sample_chars(&self) -> usize {
        self.detection_sample_chars
    }

    fn translator(&self) -> TranslationResult<&Arc<dyn TranslatorCapability>> {
        self.capabilities
            .translator
            .as_ref()
            .ok_or(TranslationError::CapabilityAbsent)
    }

    /// 宿主翻译能力是否存在
    pub fn check_availability(&self) -> TranslationResult<()> {
        if self.capabilities.translator.is_none() {
            self.surface.set_status("此环境不支持原生翻译");
            return Err(TranslationError::CapabilityAbsent);
        }
        Ok(())
    }

    /// 解析真实源语言，`auto` 时对样本做语言检测，失败返回 `und`
    pub async fn resolve_source_language(&self, requested: &str, sample: &str) -> String {
        if requested != constants::AUTO_LANG {
            return requested.to_string();
        }
        let Some(detector) = self.ensure_detector().await else {
            return constants::UNDETERMINED_LANG.to_string();
        };

        let sample: String = sample.chars().take(self.detection_sample_chars).collect();
        let guesses = match detector.detect(&sample).await {
            Ok(guesses) => guesses,
            Err(e) => {
                tracing::debug!("语言检测失败: {}", e);
                Vec::new()
            }
        };

        guesses
            .into_iter()
            .next()
            .filter(|guess| guess.confidence >= constants::DETECTION_CONFIDENCE)
            .map(|guess| guess.language)
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| constants::UNDETERMINED_LANG.to_string())
    }

    async fn ensure_detector(&self) -> Option<Arc<dyn LanguageDetector>> {
        let capability = self.capabilities.detector.as_ref()?;
        let mut slot = self.detector.lock().await;
        if let Some(detector) = slot.as_ref() {
            return Some(detector.clone());
        }

        self.surface.set_busy(true);
        self.surface.set_status("下载语言检测模型中...");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let created = {
            let create = capability.create(Some(tx));
            tokio::pin!(create);
            loop {
                tokio::select! {
                    result = &mut create => break result,
                    Some(loaded) = rx.recv() => {
                        self.surface.set_status(&format!("检测模型下载 {:.2}%", loaded * 100.0));
                    }
                }
            }
        };
        self.surface.set_busy(false);

        match created {
            Ok(detector) => {
                self.surface.set_status("检测模型已就绪");
                *slot = Some(detector.clone());
                Some(detector)
            }
            Err(e) => {
                tracing::warn!("检测模型加载失败: {}", e);
                self.surface.set_status("检测模型加载失败");
                None
            }
        }
    }

    /// 确保存在可用的 `source -> target` 会话
    ///
    /// 语言对一致且探测通过时复用现有会话，否则销毁后重建。
    pub async fn ensure_session(
        &self,
        source: &str,
        target: &str,
    ) -> TranslationResult<Arc<dyn TranslatorSession>> {
        let translator = self.translator()?.clone();
        let mut slot = self.session.lock().await;

        if let Some(existing) = slot.take() {
            if existing.source_language() == source && existing.target_language() == target {
                match existing.measure_input_usage("test").await {
                    Ok(_) => {
                        *slot = Some(existing.clone());
                        return Ok(existing);
                    }
                    Err(e) => {
                        tracing::info!("现有翻译会话无效，重新创建: {}", e);
                        existing.destroy();
                    }
                }
            } else {
                tracing::info!("语言对改变，销毁旧翻译会话");
                existing.destroy();
            }
        }

        self.surface.set_busy(true);
        let result = self.create_session(translator.as_ref(), source, target).await;
        self.surface.set_busy(false);

        match result {
            Ok(session) => {
                self.surface.set_status("翻译模型就绪");
                *self.last_pair.borrow_mut() = Some(SessionState {
                    source: source.to_string(),
                    target: target.to_string(),
                });
                *slot = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                if !matches!(e, TranslationError::PairUnsupported { .. }) {
                    self.surface.set_status(&format!("翻译模型初始化失败: {}", e));
                }
                tracing::error!("翻译会话初始化失败: {}", e);
                Err(e)
            }
        }
    }

    async fn create_session(
        &self,
        translator: &dyn TranslatorCapability,
        source: &str,
        target: &str,
    ) -> TranslationResult<Arc<dyn TranslatorSession>> {
        self.surface.set_status("准备翻译模型...");
        let availability = translator.availability(source, target).await?;
        match availability {
            Availability::Unavailable => {
                self.surface.set_status(&format!("不支持 {} -> {} 翻译", source, target));
                return Err(TranslationError::PairUnsupported {
                    source_lang: source.to_string(),
                    target_lang: target.to_string(),
                });
            }
            Availability::Available => self.surface.set_status("翻译模型已缓存，正在加载..."),
            Availability::Downloadable => self.surface.set_status("翻译模型下载中..."),
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let create = translator.create(source, target, Some(tx));
        tokio::pin!(create);
        let stall = tokio::time::sleep(constants::DOWNLOAD_STALL_NOTICE);
        tokio::pin!(stall);
        let mut stall_reported = false;

        loop {
            tokio::select! {
                result = &mut create => return result,
                Some(loaded) = rx.recv() => {
                    self.surface.set_status(&format!("翻译模型 {:.2}%", loaded * 100.0));
                }
                _ = &mut stall, if !stall_reported => {
                    // 仅提示，不视为失败
                    stall_reported = true;
                    tracing::info!("翻译模型下载耗时较长");
                    self.surface.set_status("翻译模型下载较慢，请耐心等待...");
                }
            }
        }
    }

    pub async fn session_state(&self) -> Option<SessionState> {
        self.session.lock().await.as_ref().map(|session| SessionState {
            source: session.source_language().to_string(),
            target: session.target_language().to_string(),
        })
    }

    /// 使用当前会话翻译，会话失效时重建并重试一次
    ///
    /// 会话已被销毁时按最近的语言对重建。
    pub async fn translate(&self, text: &str) -> TranslationResult<String> {
        let current = self.session.lock().await.clone();
        let session = match current {
            Some(session) => session,
            None => {
                let pair = self.last_pair.borrow().clone().ok_or_else(|| {
                    TranslationError::SessionInvalid("尚未创建翻译会话".to_string())
                })?;
                tracing::info!("翻译会话已销毁，按 {} -> {} 重建", pair.source, pair.target);
                self.ensure_session(&pair.source, &pair.target).await?
            }
        };

        match Self::translate_with_session(session.as_ref(), text).await {
            Ok(translated) => Ok(translated),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                if session.measure_input_usage("test").await.is_ok() {
                    return Err(e);
                }
                tracing::info!("翻译会话失效，重建后重试: {}", e);
                let source = session.source_language().to_string();
                let target = session.target_language().to_string();
                let renewed = self.ensure_session(&source, &target).await?;
                Self::translate_with_session(renewed.as_ref(), text).await
            }
        }
    }

    async fn translate_with_session(
        session: &dyn TranslatorSession,
        text: &str,
    ) -> TranslationResult<String> {
        let mut stream = session.translate_streaming(&protect_newlines(text));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk?);
        }
        Ok(restore_newlines(&out))
    }

    /// 通过工作者池翻译
    pub async fn translate_in_pool(&self, pool: &WorkerPool, text: &str) -> TranslationResult<String> {
        let translated = pool.translate(&protect_newlines(text)).await?;
        Ok(restore_newlines(&translated))
    }

    /// 销毁会话与检测器
    pub async fn teardown(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.destroy();
        }
        if let Some(detector) = self.detector.lock().await.take() {
            detector.destroy();
        }
    }
}
