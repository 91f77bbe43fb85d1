//! 翻译引擎
//!
//! 引擎实例拥有一次会话内的全部可变状态（语言对、活动轮次、是否已翻译），
//! 多个实例之间互不影响。一个翻译轮次依次执行：
//!
//! 1. 取消上一轮次并检查宿主能力
//! 2. 收集片段、解析源语言、确保会话
//! 3. 以有界并发调度全部片段，完成的译文进入应用队列并按帧刷新
//! 4. 汇总为 `PassReport`

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::parsers::html::DomPort;
use crate::translation::backend::{can_use_workers, BackendAdapter, HostCapabilities, WorkerPool};
use crate::translation::config::{constants, SegmentStrategy, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{
    is_page_translated, restore, ApplyQueue, ConcurrencyScheduler, DomMutator, FlushReport,
    Segment, SegmentCollector, SchedulerObserver, SchedulerOptions, SchedulerStats, Task,
};
use crate::translation::storage::settings::{keys, read_or, write};
use crate::translation::storage::{CacheStats, LanguagePair, Settings, SettingsStore, TranslationCache};
use crate::translation::surface::ControlSurface;

/// 一个翻译轮次的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub source_lang: String,
    pub target_lang: String,
    /// 收集到的片段数
    pub collected: usize,
    /// 成功应用到 DOM 的片段数
    pub translated: usize,
    pub failed: usize,
    /// 翻译完成但锚点已失效而未应用的片段数
    pub skipped: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: 收集 {}, 翻译 {}, 失败 {}, 跳过 {}{} ({:.2}s)",
            self.source_lang,
            self.target_lang,
            self.collected,
            self.translated,
            self.failed,
            self.skipped,
            if self.cancelled { ", 已取消" } else { "" },
            self.elapsed.as_secs_f64()
        )
    }
}

struct ActivePass {
    id: u64,
    token: CancellationToken,
}

struct EngineState {
    source_lang: String,
    target_lang: String,
    keep_original: bool,
    strategy: SegmentStrategy,
    auto_observe: bool,
    page_translated: bool,
    active_pass: Option<ActivePass>,
    next_pass_id: u64,
    /// 被还原打断的轮次，该轮次退出时若没有新轮次接手则销毁会话
    teardown_pending: Option<u64>,
}

/// 站点设置
struct SiteSettings {
    store: Rc<dyn SettingsStore>,
    host: String,
}

pub struct TranslationEngine<P: DomPort> {
    port: Rc<P>,
    config: TranslationConfig,
    adapter: BackendAdapter,
    surface: Rc<dyn ControlSurface>,
    cache: TranslationCache,
    state: RefCell<EngineState>,
    settings: Option<SiteSettings>,
}

impl<P: DomPort> TranslationEngine<P> {
    pub fn new(
        port: Rc<P>,
        config: TranslationConfig,
        capabilities: HostCapabilities,
        surface: Rc<dyn ControlSurface>,
    ) -> Self {
        let adapter = BackendAdapter::new(capabilities, surface.clone())
            .with_sample_chars(config.detection_sample_chars);
        let cache = if config.cache_enabled {
            TranslationCache::with_capacity(config.cache_size)
        } else {
            TranslationCache::disabled()
        };
        let state = EngineState {
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
            keep_original: config.keep_original,
            strategy: config.strategy,
            auto_observe: false,
            page_translated: false,
            active_pass: None,
            next_pass_id: 1,
            teardown_pending: None,
        };

        let engine = Self {
            port,
            config,
            adapter,
            surface,
            cache,
            state: RefCell::new(state),
            settings: None,
        };
        let translated = engine.is_page_translated();
        engine.state.borrow_mut().page_translated = translated;
        engine
    }

    /// 按站点设置初始化，全局或本站禁用时返回 `None`
    pub fn with_settings(mut self, store: Rc<dyn SettingsStore>, host: &str) -> Option<Self> {
        let defaults = LanguagePair {
            source: self.config.source_lang.clone(),
            target: self.config.target_lang.clone(),
        };
        let settings = Settings::load(store.as_ref(), host, &defaults);
        if !settings.engine_enabled() {
            tracing::info!("翻译已在 {} 上禁用", host);
            return None;
        }

        {
            let mut state = self.state.borrow_mut();
            state.source_lang = settings.source_lang;
            state.target_lang = settings.target_lang;
            state.auto_observe = settings.auto_observe;
        }
        self.settings = Some(SiteSettings {
            store,
            host: host.to_string(),
        });
        Some(self)
    }

    pub fn port(&self) -> &Rc<P> {
        &self.port
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn surface(&self) -> &Rc<dyn ControlSurface> {
        &self.surface
    }

    pub fn adapter(&self) -> &BackendAdapter {
        &self.adapter
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats()
    }

    pub fn source_lang(&self) -> String {
        self.state.borrow().source_lang.clone()
    }

    pub fn target_lang(&self) -> String {
        self.state.borrow().target_lang.clone()
    }

    pub fn keep_original(&self) -> bool {
        self.state.borrow().keep_original
    }

    pub fn strategy(&self) -> SegmentStrategy {
        self.state.borrow().strategy
    }

    pub fn set_strategy(&self, strategy: SegmentStrategy) {
        self.state.borrow_mut().strategy = strategy;
    }

    pub fn auto_observe(&self) -> bool {
        self.state.borrow().auto_observe
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.borrow().active_pass.is_some()
    }

    /// 设置语言对并持久化
    pub fn set_languages(&self, source: &str, target: &str) {
        {
            let mut state = self.state.borrow_mut();
            state.source_lang = source.to_string();
            state.target_lang = target.to_string();
        }
        if let Some(site) = &self.settings {
            write(site.store.as_ref(), keys::SOURCE_LANG, source);
            write(site.store.as_ref(), keys::TARGET_LANG, target);
        }
    }

    /// 设置本站自动翻译并持久化
    pub fn set_auto_observe(&self, on: bool) {
        self.state.borrow_mut().auto_observe = on;
        if let Some(site) = &self.settings {
            write(site.store.as_ref(), &keys::auto_observe(&site.host), on);
        }
    }

    /// 读取持久化的本站自动翻译开关
    pub fn stored_auto_observe(&self) -> Option<bool> {
        let site = self.settings.as_ref()?;
        Some(read_or(site.store.as_ref(), &keys::auto_observe(&site.host), false))
    }

    /// 切换原文显示，同时影响后续应用
    pub fn set_keep_original(&self, on: bool) -> usize {
        self.state.borrow_mut().keep_original = on;
        let mut mutator = DomMutator::new(on, "");
        mutator.set_keep_original(self.port.as_ref(), &self.port.body(), on)
    }

    /// 页面上是否存在已翻译标记
    pub fn is_page_translated(&self) -> bool {
        is_page_translated(self.port.as_ref(), &self.port.body())
    }

    /// 页面是否处于已翻译状态（最近一次操作的结果）
    pub fn page_translated(&self) -> bool {
        self.state.borrow().page_translated
    }

    fn begin_pass(&self) -> (u64, CancellationToken) {
        let mut state = self.state.borrow_mut();
        if let Some(previous) = state.active_pass.take() {
            tracing::info!("取消进行中的翻译轮次 #{}", previous.id);
            previous.token.cancel();
        }
        let id = state.next_pass_id;
        state.next_pass_id += 1;
        let token = CancellationToken::new();
        state.active_pass = Some(ActivePass {
            id,
            token: token.clone(),
        });
        (id, token)
    }

    /// 结束轮次，返回该轮次是否仍是当前轮次
    fn end_pass(&self, id: u64) -> bool {
        let mut state = self.state.borrow_mut();
        match &state.active_pass {
            Some(active) if active.id == id => {
                state.active_pass = None;
                true
            }
            _ => false,
        }
    }

    fn cancel_active_pass(&self) -> Option<u64> {
        let active = self.state.borrow_mut().active_pass.take()?;
        active.token.cancel();
        Some(active.id)
    }

    /// 被还原取消的轮次退出时是否应销毁会话
    fn take_teardown(&self, id: u64) -> bool {
        let mut state = self.state.borrow_mut();
        if state.teardown_pending != Some(id) {
            return false;
        }
        state.teardown_pending = None;
        // 新轮次已在使用同一会话
        state.active_pass.is_none()
    }

    /// 翻译整个页面
    ///
    /// 致命错误（能力缺失、语言对不支持、会话创建失败）以 `Err` 返回；
    /// 单个片段的失败只计入报告。观察者触发的轮次在已有轮次进行时直接跳过。
    pub async fn translate_page(&self, from_observer: bool) -> TranslationResult<PassReport> {
        if from_observer && self.is_in_progress() {
            tracing::debug!("已有翻译进行中，跳过观察者触发的翻译");
            return Ok(PassReport::default());
        }

        let (id, token) = self.begin_pass();
        let started = Instant::now();
        self.surface.set_busy(true);
        self.surface.set_status("准备翻译...");

        let result = self.run_pass(&token, started).await;

        let current = self.end_pass(id);
        match &result {
            Ok(report) if report.cancelled => {
                tracing::info!("翻译轮次 #{} 已取消", id);
                if self.take_teardown(id) {
                    self.adapter.teardown().await;
                }
            }
            Ok(report) => {
                tracing::info!("翻译轮次 #{} 完成: {}", id, report);
                if report.translated > 0 {
                    self.state.borrow_mut().page_translated = true;
                }
            }
            Err(e) => {
                tracing::error!("翻译轮次 #{} 失败: {}", id, e);
                self.surface.set_progress(0.0, false);
            }
        }
        if current {
            self.surface.set_busy(false);
        }
        if !self.surface.is_attached() {
            tracing::warn!("控制界面在翻译后丢失，重新挂载");
            self.surface.reattach();
        }
        result
    }

    async fn run_pass(
        &self,
        token: &CancellationToken,
        started: Instant,
    ) -> TranslationResult<PassReport> {
        self.adapter.check_availability()?;

        let (requested_source, target, strategy, keep_original) = {
            let state = self.state.borrow();
            (
                state.source_lang.clone(),
                state.target_lang.clone(),
                state.strategy,
                state.keep_original,
            )
        };

        let mut collector = SegmentCollector::new(strategy);
        let segments = collector.collect(self.port.as_ref(), &self.port.body());
        let total = segments.len();
        tracing::debug!("收集统计: {:?}", collector.stats());
        self.surface
            .set_status(&format!("扫描到 {} 个文本片段，准备翻译...", total));
        self.surface.set_progress(0.0, true);

        let mut report = PassReport {
            source_lang: requested_source.clone(),
            target_lang: target.clone(),
            collected: total,
            ..PassReport::default()
        };
        if total == 0 {
            self.surface.set_status("没有需要翻译的内容");
            self.surface.set_progress(100.0, false);
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let sample = self.sample_text(&segments);
        let source = self
            .adapter
            .resolve_source_language(&requested_source, &sample)
            .await;
        report.source_lang = source.clone();
        if token.is_cancelled() {
            return Ok(cancelled(report, started));
        }

        if self.cache.bind_pair(&source, &target) {
            tracing::info!("语言对变为 {} -> {}", source, target);
        }
        self.adapter.ensure_session(&source, &target).await?;
        self.surface.set_busy(true);
        if token.is_cancelled() {
            return Ok(cancelled(report, started));
        }

        let limit = self.config.max_concurrency.max(1);
        let pool = self.create_pool(limit, &source, &target).await;
        if token.is_cancelled() {
            if let Some(pool) = &pool {
                pool.terminate();
            }
            return Ok(cancelled(report, started));
        }

        let pair_key = format!("{}->{}", source, target);
        let mutator = DomMutator::new(keep_original, pair_key);
        let queue = ApplyQueue::new();
        let observer = PassObserver {
            segments: &segments,
            queue: &queue,
            surface: self.surface.as_ref(),
            total,
            started,
            done: Cell::new(0),
            failed: Cell::new(0),
        };

        let tasks = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| self.segment_task(index, segment, pool.as_ref(), token))
            .collect();

        let scheduler = ConcurrencyScheduler::new(limit, SchedulerOptions::from(&self.config));
        let mut flushed = FlushReport::default();
        let stats = {
            let run = scheduler.run(tasks, &observer, token);
            tokio::pin!(run);
            let mut frame = tokio::time::interval(self.config.frame_interval());
            frame.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    stats = &mut run => break stats,
                    _ = frame.tick() => {
                        if !queue.is_empty() {
                            flushed.merge(queue.flush(self.port.as_ref(), &mutator, token));
                        }
                    }
                }
            }
        };
        // 排空剩余更新
        flushed.merge(queue.flush(self.port.as_ref(), &mutator, token));

        if let Some(pool) = &pool {
            pool.terminate();
        }

        tracing::debug!(
            "调度统计: 成功 {}, 失败 {}, 最大并发 {}, 最终限制 {}",
            stats.success_count,
            stats.error_count,
            stats.max_in_flight,
            stats.current_limit
        );

        report.translated = flushed.applied + flushed.degraded;
        report.failed = observer.failed.get() + flushed.failed;
        report.skipped = flushed.stale;
        if token.is_cancelled() {
            return Ok(cancelled(report, started));
        }

        report.elapsed = started.elapsed();
        self.surface.set_status(&format!(
            "翻译完成：{}/{}",
            observer.done.get(),
            total
        ));
        self.surface.set_progress(100.0, false);
        Ok(report)
    }

    async fn create_pool(&self, size: usize, source: &str, target: &str) -> Option<WorkerPool> {
        if !self.config.use_workers {
            return None;
        }
        let spawner = self.adapter.capabilities().workers.as_ref()?;
        if !can_use_workers(spawner.as_ref()).await {
            tracing::info!("工作者不可用，使用单线程翻译");
            return None;
        }
        match WorkerPool::create(
            spawner.as_ref(),
            size,
            source,
            target,
            self.config.worker_init_timeout(),
        )
        .await
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::info!("工作者池创建失败，回退到单线程翻译: {}", e);
                None
            }
        }
    }

    fn segment_task<'a>(
        &'a self,
        index: usize,
        segment: &Segment<P::Node>,
        pool: Option<&'a WorkerPool>,
        token: &CancellationToken,
    ) -> Task<'a, String> {
        let adapter = &self.adapter;
        let cache = &self.cache;
        let token = token.clone();
        let text = segment.source_text().to_string();
        let timeout = self.config.segment_timeout();

        Task::new(
            index,
            Box::pin(async move {
                if token.is_cancelled() {
                    return Err(TranslationError::Cancelled);
                }
                if let Some(hit) = cache.get(&text) {
                    return Ok(hit);
                }

                let call = async {
                    match pool {
                        Some(pool) => adapter.translate_in_pool(pool, &text).await,
                        None => adapter.translate(&text).await,
                    }
                };
                let translated = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(TranslationError::Cancelled),
                    result = tokio::time::timeout(timeout, call) => result.map_err(|_| {
                        TranslationError::Timeout(format!("片段翻译超过 {}ms", timeout.as_millis()))
                    })??,
                };

                if token.is_cancelled() {
                    return Err(TranslationError::Cancelled);
                }
                if translated.is_empty() {
                    return Err(TranslationError::Backend("翻译结果为空".to_string()));
                }
                cache.insert(text, translated.clone());
                Ok(translated)
            }),
        )
    }

    /// 标题加上片段原文，截断到采样长度
    fn sample_text(&self, segments: &[Segment<P::Node>]) -> String {
        let limit = self.adapter.sample_chars();
        let mut sample = self.port.title().unwrap_or_default();
        for segment in segments.iter() {
            if sample.chars().count() > limit {
                break;
            }
            sample.push('\n');
            sample.push_str(&segment.original);
        }
        sample.chars().take(limit).collect()
    }

    /// 还原页面，返回还原的元素数
    ///
    /// 进行中的轮次会被取消，其后不会再有来自该轮次的 DOM 修改。
    pub fn restore_page(&self) -> usize {
        if let Some(id) = self.cancel_active_pass() {
            self.state.borrow_mut().teardown_pending = Some(id);
        }
        let restored = restore(self.port.as_ref(), &self.port.body());
        self.state.borrow_mut().page_translated = false;
        self.surface
            .set_status(&format!("已还原 {} 个翻译元素", restored));
        self.surface.set_progress(0.0, false);
        self.surface.set_busy(false);
        restored
    }

    /// 翻译单段文本（划词翻译）
    pub async fn translate_text(&self, text: &str) -> TranslationResult<String> {
        self.adapter.check_availability()?;
        let (requested_source, target) = {
            let state = self.state.borrow();
            (state.source_lang.clone(), state.target_lang.clone())
        };
        let source = self.adapter.resolve_source_language(&requested_source, text).await;
        self.adapter.ensure_session(&source, &target).await?;

        let timeout = self.config.selection_timeout();
        let translated = tokio::time::timeout(timeout, self.adapter.translate(text))
            .await
            .map_err(|_| TranslationError::Timeout(format!("翻译超时 ({}ms)", timeout.as_millis())))??;
        if translated.is_empty() {
            return Err(TranslationError::Backend("翻译结果为空".to_string()));
        }
        Ok(translated)
    }

    /// 带重试的单段翻译，每次重试前销毁会话与检测器
    pub async fn translate_text_with_retry(&self, text: &str) -> TranslationResult<String> {
        let max_retries = self.config.selection_max_retries;
        let mut attempt = 0;
        loop {
            match self.translate_text(text).await {
                Ok(translated) => return Ok(translated),
                Err(e) if !e.is_retryable() || attempt >= max_retries => {
                    tracing::error!("划词翻译失败 (第{}次): {}", attempt + 1, e);
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!("划词翻译失败，{}s后重试 ({}/{}): {}", constants::RETRY_PAUSE.as_secs(), attempt, max_retries, e);
                    self.surface
                        .set_status(&format!("翻译失败，重试 ({}/{})...", attempt, max_retries));
                    self.adapter.teardown().await;
                    tokio::time::sleep(constants::RETRY_PAUSE).await;
                }
            }
        }
    }
}

fn cancelled(mut report: PassReport, started: Instant) -> PassReport {
    report.cancelled = true;
    report.elapsed = started.elapsed();
    report
}

/// 把完成的译文送入应用队列并报告进度
struct PassObserver<'a, N> {
    segments: &'a [Segment<N>],
    queue: &'a ApplyQueue<N>,
    surface: &'a dyn ControlSurface,
    total: usize,
    started: Instant,
    done: Cell<usize>,
    failed: Cell<usize>,
}

impl<N> PassObserver<'_, N> {
    fn advance(&self) {
        let done = self.done.get() + 1;
        self.done.set(done);

        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 { done as f64 / elapsed } else { 0.0 };
        let eta = if rate > 0.0 {
            (self.total.saturating_sub(done)) as f64 / rate
        } else {
            0.0
        };
        self.surface.set_status(&format!(
            "已翻译 {}/{} ({:.1}/s, 预计{:.0}s)",
            done, self.total, rate, eta
        ));
        self.surface
            .set_progress(done as f64 / self.total.max(1) as f64 * 100.0, true);
    }
}

impl<N: Clone> SchedulerObserver<String> for PassObserver<'_, N> {
    fn on_success(&self, index: usize, value: String, stats: &SchedulerStats) {
        if let Some(segment) = self.segments.get(index) {
            self.queue.push(segment.clone(), value);
        }
        if stats.success_count % 10 == 0 {
            tracing::debug!(
                "并发状态: 活跃{}, 队列{}, 限制{}",
                stats.active,
                stats.queued,
                stats.current_limit
            );
        }
        self.advance();
    }

    fn on_error(&self, index: usize, error: TranslationError, _stats: &SchedulerStats) {
        tracing::warn!("片段 #{} 翻译失败: {}", index, error);
        self.failed.set(self.failed.get() + 1);
        self.advance();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::parsers::html::RcDomPort;
    use crate::translation::backend::{ScriptedCapability, TextBehavior};
    use crate::translation::storage::MemorySettingsStore;
    use crate::translation::surface::RecordingSurface;

    fn engine_for(
        body: &str,
        capability: ScriptedCapability,
    ) -> (TranslationEngine<RcDomPort>, Rc<RecordingSurface>) {
        let html = format!("<html><head><title>T</title></head><body>{}</body></html>", body);
        let port = Rc::new(RcDomPort::parse(html.as_bytes(), "utf-8").unwrap());
        let config = TranslationConfig {
            source_lang: "en".to_string(),
            max_concurrency: 2,
            ..TranslationConfig::default()
        };
        let surface = Rc::new(RecordingSurface::new());
        let engine = TranslationEngine::new(
            port,
            config,
            HostCapabilities::new(Arc::new(capability)),
            surface.clone(),
        );
        (engine, surface)
    }

    #[tokio::test(start_paused = true)]
    async fn test_translate_then_restore() {
        let capability = ScriptedCapability::new();
        let (engine, surface) = engine_for("<p>One</p><p>Two</p>", capability.clone());
        let before = engine.port().to_html_string();

        let report = engine.translate_page(false).await.unwrap();
        assert_eq!(report.collected, 2);
        assert_eq!(report.translated, 2);
        assert!(!report.cancelled);
        assert!(engine.page_translated());
        assert!(engine.is_page_translated());
        assert!(!surface.is_busy());
        assert_eq!(surface.last_status().as_deref(), Some("翻译完成：2/2"));

        assert_eq!(engine.restore_page(), 2);
        assert!(!engine.page_translated());
        assert_eq!(engine.port().to_html_string(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_pass_uses_cache() {
        let capability = ScriptedCapability::new();
        let (engine, _) = engine_for("<p>Same</p>", capability.clone());

        engine.translate_page(false).await.unwrap();
        engine.restore_page();
        engine.translate_page(false).await.unwrap();

        assert_eq!(capability.started(), 1);
        assert_eq!(engine.cache_stats().cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_segment_is_counted() {
        let capability = ScriptedCapability::new().with_behavior("Bad", TextBehavior::Fail);
        let (engine, _) = engine_for("<p>Good</p><p>Bad</p>", capability);

        let report = engine.translate_page(false).await.unwrap();
        assert_eq!(report.translated, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_page() {
        let (engine, surface) = engine_for("<script>var x = 1;</script>", ScriptedCapability::new());
        let report = engine.translate_page(false).await.unwrap();
        assert_eq!(report.collected, 0);
        assert_eq!(surface.last_status().as_deref(), Some("没有需要翻译的内容"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_translate_text_timeout_is_retried() {
        let capability = ScriptedCapability::new().with_behavior("stuck", TextBehavior::Hang);
        let (engine, surface) = engine_for("", capability.clone());

        let err = engine.translate_text_with_retry("stuck").await.unwrap_err();
        assert!(matches!(err, TranslationError::Timeout(_)));
        assert_eq!(capability.started(), 1 + constants::SELECTION_MAX_RETRIES);
        assert!(surface.statuses().iter().any(|s| s.contains("重试 (3/3)")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_translate_text() {
        let (engine, _) = engine_for("", ScriptedCapability::new());
        assert_eq!(engine.translate_text("hi").await.unwrap(), "[zh-Hans] hi");
    }

    #[test]
    fn test_settings_disable_engine() {
        let store = Rc::new(MemorySettingsStore::new());
        write(store.as_ref(), &keys::site_disabled("blocked.example"), true);

        let (engine, _) = engine_for("", ScriptedCapability::new());
        assert!(engine.with_settings(store.clone(), "blocked.example").is_none());

        let (engine, _) = engine_for("", ScriptedCapability::new());
        let engine = engine.with_settings(store.clone(), "open.example").unwrap();
        engine.set_languages("ja", "en");
        engine.set_auto_observe(true);
        assert_eq!(read_or(store.as_ref(), keys::TARGET_LANG, String::new()), "en");
        assert_eq!(engine.stored_auto_observe(), Some(true));
    }

    #[test]
    fn test_report_display() {
        let report = PassReport {
            source_lang: "en".into(),
            target_lang: "ja".into(),
            collected: 3,
            translated: 2,
            failed: 1,
            ..PassReport::default()
        };
        assert!(report.to_string().starts_with("en -> ja: 收集 3, 翻译 2, 失败 1"));
    }
}
