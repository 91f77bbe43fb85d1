//! 并发调度器
//!
//! 在单个任务上协作式地驱动大量翻译调用：同时在途的任务数不超过当前并发上限，
//! 其余任务按优先级排队（同优先级按提交顺序）。可选的自适应模式根据耗时和
//! 错误率调整上限。单个任务失败不会影响其他任务。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};

/// 调度选项
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub adaptive: bool,
    pub fast_task_threshold: Duration,
    pub error_ratio_threshold: f64,
    pub backoff_factor: f64,
    /// 上限可增长到基础值的倍数
    pub ceiling_factor: usize,
    /// 计算错误率的滑动窗口大小
    pub window: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            adaptive: true,
            fast_task_threshold: Duration::from_millis(constants::FAST_TASK_THRESHOLD_MS),
            error_ratio_threshold: constants::ERROR_RATIO_THRESHOLD,
            backoff_factor: constants::BACKOFF_FACTOR,
            ceiling_factor: constants::ADAPTIVE_CEILING_FACTOR,
            window: constants::OUTCOME_WINDOW,
        }
    }
}

impl From<&TranslationConfig> for SchedulerOptions {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            adaptive: config.adaptive_limit,
            fast_task_threshold: config.fast_task_threshold(),
            error_ratio_threshold: config.error_ratio_threshold,
            backoff_factor: config.backoff_factor,
            ..Self::default()
        }
    }
}

/// 自适应并发上限
#[derive(Debug, Clone)]
pub struct LimitController {
    base: usize,
    current: usize,
    ceiling: usize,
    options: SchedulerOptions,
    /// 最近的结果，`true` 表示失败
    outcomes: VecDeque<bool>,
}

impl LimitController {
    pub fn new(base: usize, options: SchedulerOptions) -> Self {
        let base = base.max(1);
        let ceiling = if options.adaptive {
            base * options.ceiling_factor.max(1)
        } else {
            base
        };
        Self {
            base,
            current: base,
            ceiling,
            options,
            outcomes: VecDeque::new(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// 窗口内的错误比例
    pub fn error_ratio(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let errors = self.outcomes.iter().filter(|failed| **failed).count();
        errors as f64 / self.outcomes.len() as f64
    }

    fn record(&mut self, failed: bool) {
        self.outcomes.push_back(failed);
        while self.outcomes.len() > self.options.window.max(1) {
            self.outcomes.pop_front();
        }
    }

    pub fn on_success(&mut self, elapsed: Duration) {
        self.record(false);
        if !self.options.adaptive {
            return;
        }
        let recent_errors = self.outcomes.iter().any(|failed| *failed);
        if elapsed < self.options.fast_task_threshold && !recent_errors && self.current < self.ceiling {
            self.current += 1;
            tracing::trace!("并发上限提升至 {}", self.current);
        }
    }

    pub fn on_error(&mut self) {
        self.record(true);
        if !self.options.adaptive {
            return;
        }
        if self.error_ratio() > self.options.error_ratio_threshold {
            let reduced = (self.current as f64 * self.options.backoff_factor).floor() as usize;
            self.current = reduced.max(1);
            tracing::debug!(
                "错误率 {:.2} 超过阈值，并发上限降至 {}",
                self.error_ratio(),
                self.current
            );
        }
    }
}

/// 调度统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub active: usize,
    pub queued: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub current_limit: usize,
    /// 运行期间同时在途的最大任务数
    pub max_in_flight: usize,
    /// 取消时未执行即丢弃的任务数
    pub drained: usize,
    /// 取消时被中止的在途任务数
    pub aborted: usize,
}

/// 任务结果观察者
pub trait SchedulerObserver<T> {
    fn on_success(&self, index: usize, value: T, stats: &SchedulerStats);

    fn on_error(&self, index: usize, error: TranslationError, stats: &SchedulerStats);
}

/// 待调度的任务
///
/// future 在被接纳之前不会被轮询。
pub struct Task<'a, T> {
    pub index: usize,
    pub priority: i64,
    pub future: LocalBoxFuture<'a, TranslationResult<T>>,
}

impl<'a, T> Task<'a, T> {
    /// 默认优先级随文档顺序递减
    pub fn new(index: usize, future: LocalBoxFuture<'a, TranslationResult<T>>) -> Self {
        Self {
            index,
            priority: -(index as i64),
            future,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

struct Queued<'a, T> {
    sequence: usize,
    task: Task<'a, T>,
}

impl<T> PartialEq for Queued<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority && self.sequence == other.sequence
    }
}

impl<T> Eq for Queued<'_, T> {}

impl<T> PartialOrd for Queued<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Queued<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // 大顶堆：优先级高者先出，同优先级先提交者先出
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// 并发调度器
pub struct ConcurrencyScheduler {
    limit: usize,
    options: SchedulerOptions,
}

impl ConcurrencyScheduler {
    pub fn new(limit: usize, options: SchedulerOptions) -> Self {
        Self { limit, options }
    }

    /// 运行全部任务直到完成或取消
    ///
    /// 取消后队列中的任务不再执行，在途任务被丢弃，其结果不会交给观察者。
    pub async fn run<'a, T, O>(
        &self,
        tasks: Vec<Task<'a, T>>,
        observer: &O,
        cancel: &CancellationToken,
    ) -> SchedulerStats
    where
        T: 'a,
        O: SchedulerObserver<T> + ?Sized,
    {
        let mut controller = LimitController::new(self.limit, self.options.clone());
        let mut queue: BinaryHeap<Queued<'a, T>> = tasks
            .into_iter()
            .enumerate()
            .map(|(sequence, task)| Queued { sequence, task })
            .collect();
        let mut in_flight = FuturesUnordered::new();
        let mut stats = SchedulerStats {
            queued: queue.len(),
            current_limit: controller.current(),
            ..SchedulerStats::default()
        };

        loop {
            if cancel.is_cancelled() {
                stats.drained = queue.len();
                stats.aborted = in_flight.len();
                queue.clear();
                tracing::debug!(
                    "调度已取消: 丢弃 {} 个排队任务, 中止 {} 个在途任务",
                    stats.drained,
                    stats.aborted
                );
                break;
            }

            while in_flight.len() < controller.current() {
                let Some(Queued { task, .. }) = queue.pop() else {
                    break;
                };
                let Task { index, future, .. } = task;
                in_flight.push(async move {
                    let started = Instant::now();
                    let result = future.await;
                    (index, result, started.elapsed())
                });
                stats.max_in_flight = stats.max_in_flight.max(in_flight.len());
            }

            stats.active = in_flight.len();
            stats.queued = queue.len();
            stats.current_limit = controller.current();

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => continue,
                Some((index, result, elapsed)) = in_flight.next() => {
                    match result {
                        Ok(value) => {
                            stats.success_count += 1;
                            controller.on_success(elapsed);
                            stats.active = in_flight.len();
                            stats.current_limit = controller.current();
                            observer.on_success(index, value, &stats);
                        }
                        Err(TranslationError::Cancelled) => {
                            // 任务自行观察到取消，不计为失败
                            stats.active = in_flight.len();
                        }
                        Err(error) => {
                            stats.error_count += 1;
                            controller.on_error();
                            stats.active = in_flight.len();
                            stats.current_limit = controller.current();
                            observer.on_error(index, error, &stats);
                        }
                    }
                }
            }
        }

        stats.active = 0;
        stats.queued = 0;
        stats.current_limit = controller.current();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use futures::FutureExt;

    #[derive(Default)]
    struct Recorder {
        successes: RefCell<Vec<usize>>,
        errors: RefCell<Vec<usize>>,
    }

    impl SchedulerObserver<usize> for Recorder {
        fn on_success(&self, index: usize, _value: usize, _stats: &SchedulerStats) {
            self.successes.borrow_mut().push(index);
        }

        fn on_error(&self, index: usize, _error: TranslationError, _stats: &SchedulerStats) {
            self.errors.borrow_mut().push(index);
        }
    }

    fn fixed(limit_options: bool) -> SchedulerOptions {
        SchedulerOptions {
            adaptive: limit_options,
            ..SchedulerOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_is_never_exceeded() {
        let active = Rc::new(Cell::new(0usize));
        let peak = Rc::new(Cell::new(0usize));
        let tasks: Vec<Task<'_, usize>> = (0..20)
            .map(|i| {
                let active = active.clone();
                let peak = peak.clone();
                Task::new(
                    i,
                    async move {
                        active.set(active.get() + 1);
                        peak.set(peak.get().max(active.get()));
                        tokio::time::sleep(Duration::from_millis(50 + (i as u64 % 3) * 10)).await;
                        active.set(active.get() - 1);
                        Ok(i)
                    }
                    .boxed_local(),
                )
            })
            .collect();

        let recorder = Recorder::default();
        let stats = ConcurrencyScheduler::new(3, fixed(false))
            .run(tasks, &recorder, &CancellationToken::new())
            .await;

        assert_eq!(peak.get(), 3);
        assert_eq!(stats.max_in_flight, 3);
        assert_eq!(stats.success_count, 20);
        assert_eq!(recorder.successes.borrow().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_order_with_ties() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let tasks: Vec<Task<'_, usize>> = (0..5)
            .map(|i| {
                let order = order.clone();
                let priority = if i == 3 { 10 } else { 0 };
                Task::new(
                    i,
                    async move {
                        order.borrow_mut().push(i);
                        Ok(i)
                    }
                    .boxed_local(),
                )
                .with_priority(priority)
            })
            .collect();

        ConcurrencyScheduler::new(1, fixed(false))
            .run(tasks, &Recorder::default(), &CancellationToken::new())
            .await;

        assert_eq!(*order.borrow(), vec![3, 0, 1, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let tasks: Vec<Task<'_, usize>> = (0..10)
            .map(|i| {
                Task::new(
                    i,
                    async move {
                        if i == 4 {
                            Err(TranslationError::Timeout("slow".into()))
                        } else {
                            Ok(i)
                        }
                    }
                    .boxed_local(),
                )
            })
            .collect();

        let recorder = Recorder::default();
        let stats = ConcurrencyScheduler::new(2, SchedulerOptions::default())
            .run(tasks, &recorder, &CancellationToken::new())
            .await;

        assert_eq!(stats.success_count, 9);
        assert_eq!(stats.error_count, 1);
        assert_eq!(*recorder.errors.borrow(), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_drains_queue() {
        let cancel = CancellationToken::new();
        let started = Rc::new(Cell::new(0usize));
        let tasks: Vec<Task<'_, usize>> = (0..10)
            .map(|i| {
                let started = started.clone();
                let cancel = cancel.clone();
                Task::new(
                    i,
                    async move {
                        started.set(started.get() + 1);
                        if i == 1 {
                            cancel.cancel();
                        }
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(i)
                    }
                    .boxed_local(),
                )
            })
            .collect();

        let recorder = Recorder::default();
        let stats = ConcurrencyScheduler::new(2, fixed(false))
            .run(tasks, &recorder, &cancel)
            .await;

        assert_eq!(started.get(), 2);
        assert_eq!(stats.drained, 8);
        assert_eq!(stats.aborted, 2);
        assert!(recorder.successes.borrow().is_empty());
    }

    #[test]
    fn test_limit_grows_on_fast_success_up_to_ceiling() {
        let mut controller = LimitController::new(2, SchedulerOptions::default());
        for _ in 0..10 {
            controller.on_success(Duration::from_millis(10));
        }
        assert_eq!(controller.current(), 4);
        assert_eq!(controller.ceiling(), 4);

        controller.on_success(Duration::from_secs(2));
        assert_eq!(controller.current(), 4);
    }

    #[test]
    fn test_limit_backs_off_on_errors() {
        let mut controller = LimitController::new(4, SchedulerOptions::default());
        for _ in 0..9 {
            controller.on_success(Duration::from_secs(5));
        }
        // 1/10 不超过阈值
        controller.on_error();
        assert_eq!(controller.current(), 4);
        // 2/11 超过阈值
        controller.on_error();
        assert_eq!(controller.current(), 3);
        controller.on_error();
        assert_eq!(controller.current(), 2);
        controller.on_error();
        controller.on_error();
        controller.on_error();
        assert_eq!(controller.current(), 1);

        // 窗口内仍有错误时不增长
        controller.on_success(Duration::from_millis(1));
        assert_eq!(controller.current(), 1);
    }

    #[test]
    fn test_fixed_limit_never_changes() {
        let mut controller = LimitController::new(3, fixed(false));
        controller.on_error();
        controller.on_success(Duration::from_millis(1));
        assert_eq!(controller.current(), 3);
        assert_eq!(controller.ceiling(), 3);
    }
}
