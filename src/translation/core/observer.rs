//! 自动翻译观察者
//!
//! 宿主把 body 子树上的插入记录送入通道；出现合格插入后经过防抖再触发一次
//! 观察者轮次。新内容由收集器的排除规则自动筛选，不需要单独的增量处理。

use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::engine::TranslationEngine;
use crate::parsers::html::{DomPort, NodeKind};
use crate::translation::config::constants;

/// 一批子树插入
#[derive(Debug, Clone)]
pub struct MutationRecord<N> {
    pub added: Vec<N>,
}

impl<N> MutationRecord<N> {
    pub fn new(added: Vec<N>) -> Self {
        Self { added }
    }
}

pub type MutationSender<N> = mpsc::UnboundedSender<MutationRecord<N>>;
pub type MutationReceiver<N> = mpsc::UnboundedReceiver<MutationRecord<N>>;

/// 创建插入记录通道
pub fn mutation_channel<N>() -> (MutationSender<N>, MutationReceiver<N>) {
    mpsc::unbounded_channel()
}

/// 观察者运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub records: usize,
    pub qualifying: usize,
    /// 触发的翻译轮次
    pub passes: usize,
    pub reattached: usize,
}

pub struct AutoTranslator<P: DomPort> {
    engine: Rc<TranslationEngine<P>>,
    debounce: Duration,
}

impl<P: DomPort> AutoTranslator<P> {
    pub fn new(engine: Rc<TranslationEngine<P>>) -> Self {
        let debounce = engine.config().observer_debounce();
        Self { engine, debounce }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// 插入是否应触发重新翻译：元素节点，不在引擎界面内，也不是引擎自己产生的标记
    pub fn is_qualifying(&self, node: &P::Node) -> bool {
        let port = self.engine.port().as_ref();
        if port.kind(node) != NodeKind::Element {
            return false;
        }
        if port.closest(node, |n| port.has_class(n, constants::UI_CLASS)).is_some() {
            return false;
        }
        !(port.has_class(node, constants::PAIR_CLASS)
            || port.has_class(node, constants::SEGMENT_WRAPPER_CLASS))
    }

    fn heal_surface(&self, stats: &mut ObserverStats) {
        let surface = self.engine.surface();
        if !surface.is_attached() {
            tracing::warn!("控制界面已被移除，正在恢复");
            surface.reattach();
            stats.reattached += 1;
        }
    }

    /// 运行直到取消或通道关闭
    pub async fn run(
        self,
        mut records: MutationReceiver<P::Node>,
        cancel: CancellationToken,
    ) -> ObserverStats {
        let mut stats = ObserverStats::default();
        let mut deadline: Option<Instant> = None;
        let mut closed = false;

        loop {
            // 通道关闭后仍执行已排定的一次轮次
            if closed && deadline.is_none() {
                break;
            }
            let pending_at = deadline;
            let fire = async move {
                match pending_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                record = records.recv(), if !closed => {
                    let Some(record) = record else {
                        closed = true;
                        continue;
                    };
                    stats.records += 1;
                    self.heal_surface(&mut stats);
                    if record.added.iter().any(|node| self.is_qualifying(node)) {
                        stats.qualifying += 1;
                        deadline = Some(Instant::now() + self.debounce);
                    }
                }
                _ = fire => {
                    deadline = None;
                    if !self.engine.auto_observe() {
                        continue;
                    }
                    tracing::debug!("检测到新内容，自动翻译");
                    stats.passes += 1;
                    if let Err(e) = self.engine.translate_page(true).await {
                        tracing::warn!("自动翻译失败: {}", e);
                    }
                    self.heal_surface(&mut stats);
                }
            }
        }

        tracing::debug!("观察者停止: {:?}", stats);
        stats
    }
}
