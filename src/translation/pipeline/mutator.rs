//! DOM 修改与还原
//!
//! 应用译文时给节点打上已翻译标记，使其不会被再次收集，并保存还原所需的原文：
//!
//! - 文本节点片段被替换为 `span.ft-pair`，内含原文与译文两个子元素，
//!   原文（含首尾空白）完整保存在 `data-ft-original-text` 中
//! - 容器片段在修改前把内部标记快照存入 `data-ft-segment-original`
//!
//! 还原时按这些标记逐字节恢复原内容并移除全部标记。

use std::cell::RefCell;
use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;

use crate::parsers::html::{DomError, DomPort, NodeKind};
use crate::translation::config::constants;
use crate::translation::pipeline::collector::{split_whitespace_edges, Segment, SegmentKind};

/// 单个片段的应用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// 结构修改失败，退化为单文本节点替换
    Degraded,
    /// 锚点已脱离文档或内容已变，放弃应用
    Stale,
}

/// DOM 修改器
#[derive(Debug, Clone)]
pub struct DomMutator {
    keep_original: bool,
    pair_key: String,
}

impl DomMutator {
    pub fn new(keep_original: bool, pair_key: impl Into<String>) -> Self {
        Self {
            keep_original,
            pair_key: pair_key.into(),
        }
    }

    pub fn keep_original(&self) -> bool {
        self.keep_original
    }

    /// 把译文应用到片段
    pub fn apply<P: DomPort>(
        &self,
        port: &P,
        segment: &Segment<P::Node>,
        translated: &str,
    ) -> Result<ApplyOutcome, DomError> {
        match segment.kind {
            SegmentKind::TextNode => self.apply_text_node(
                port,
                &segment.anchor,
                &segment.original,
                &segment.leading,
                &segment.trailing,
                translated,
            ),
            SegmentKind::Container => self.apply_container(port, segment, translated),
        }
    }

    fn apply_text_node<P: DomPort>(
        &self,
        port: &P,
        node: &P::Node,
        original: &str,
        leading: &str,
        trailing: &str,
        translated: &str,
    ) -> Result<ApplyOutcome, DomError> {
        if !port.is_attached(node) || port.text(node).as_deref() != Some(original) {
            return Ok(ApplyOutcome::Stale);
        }

        let wrapper = port.create_element("span");
        port.add_class(&wrapper, constants::PAIR_CLASS);
        if self.keep_original {
            port.add_class(&wrapper, constants::SHOW_ORIGINAL_CLASS);
        }
        port.set_attr(&wrapper, constants::ATTR_ORIGINAL_TEXT, original);
        port.set_attr(&wrapper, constants::ATTR_LEADING, leading);
        port.set_attr(&wrapper, constants::ATTR_TRAILING, trailing);
        port.set_attr(&wrapper, constants::ATTR_PAIR, &self.pair_key);

        let original_span = port.create_element("span");
        port.add_class(&original_span, constants::ORIGINAL_CLASS);
        port.append_child(&original_span, &port.create_text(original.trim()))?;

        let translated_span = port.create_element("span");
        port.add_class(&translated_span, constants::TRANSLATED_CLASS);
        let pretty = format!("{}{}{}", leading, translated, trailing);
        port.append_child(&translated_span, &port.create_text(&pretty))?;

        port.append_child(&wrapper, &original_span)?;
        port.append_child(&wrapper, &translated_span)?;
        port.replace_node(node, &wrapper)?;

        Ok(ApplyOutcome::Applied)
    }

    fn apply_container<P: DomPort>(
        &self,
        port: &P,
        segment: &Segment<P::Node>,
        translated: &str,
    ) -> Result<ApplyOutcome, DomError> {
        let container = &segment.anchor;
        if !port.is_attached(container)
            || port.attr(container, constants::ATTR_SEGMENT_TRANSLATED).is_some()
        {
            return Ok(ApplyOutcome::Stale);
        }

        let snapshot = port.inner_markup(container)?;
        if let Some(collected) = segment.original_markup.as_deref() {
            if collected != snapshot {
                return Ok(ApplyOutcome::Stale);
            }
        }
        match self.rebuild_container(port, container, &snapshot, translated) {
            Ok(()) => Ok(ApplyOutcome::Applied),
            Err(e) => {
                tracing::warn!("段落翻译应用失败，使用回退方案: {}", e);
                // 尽量回到修改前的状态再退化
                if port.inner_markup(container).ok().as_deref() != Some(snapshot.as_str()) {
                    port.set_inner_markup(container, &snapshot)?;
                }
                self.fallback_to_text_node(port, segment, translated)
            }
        }
    }

    fn rebuild_container<P: DomPort>(
        &self,
        port: &P,
        container: &P::Node,
        snapshot: &str,
        translated: &str,
    ) -> Result<(), DomError> {
        // 先在游离节点上构建，成功后再替换容器内容
        let content = if self.keep_original {
            let wrapper = port.create_element("span");
            port.add_class(&wrapper, constants::SEGMENT_WRAPPER_CLASS);
            port.add_class(&wrapper, constants::SHOW_ORIGINAL_CLASS);

            let original_span = port.create_element("span");
            port.add_class(&original_span, constants::SEGMENT_ORIGINAL_CLASS);
            port.set_inner_markup(&original_span, snapshot)?;

            let separator = port.create_element("span");
            port.add_class(&separator, constants::SEGMENT_SEPARATOR_CLASS);
            port.append_child(&separator, &port.create_text(" "))?;

            let translated_span = port.create_element("span");
            port.add_class(&translated_span, constants::SEGMENT_TRANSLATED_CLASS);
            port.append_child(&translated_span, &port.create_text(translated))?;

            port.append_child(&wrapper, &original_span)?;
            port.append_child(&wrapper, &separator)?;
            port.append_child(&wrapper, &translated_span)?;
            wrapper
        } else {
            port.create_text(translated)
        };

        port.clear_children(container);
        port.append_child(container, &content)?;

        port.set_attr(container, constants::ATTR_SEGMENT_ORIGINAL, snapshot);
        port.set_attr(container, constants::ATTR_PAIR, &self.pair_key);
        port.set_attr(container, constants::ATTR_SEGMENT_TRANSLATED, "true");
        Ok(())
    }

    /// 把译文放到容器的第一个非空文本节点上
    fn fallback_to_text_node<P: DomPort>(
        &self,
        port: &P,
        segment: &Segment<P::Node>,
        translated: &str,
    ) -> Result<ApplyOutcome, DomError> {
        let usable = |node: &P::Node| {
            port.is_attached(node) && port.text(node).is_some_and(|t| !t.trim().is_empty())
        };
        // 回滚快照后原文本节点已被替换，需要重新查找
        let first = segment
            .text_nodes
            .iter()
            .find(|node| usable(node))
            .cloned()
            .or_else(|| first_text_descendant(port, &segment.anchor, &usable));
        let Some(first) = first else {
            return Ok(ApplyOutcome::Stale);
        };
        let Some(original) = port.text(&first) else {
            return Ok(ApplyOutcome::Stale);
        };
        let (leading, _, trailing) = split_whitespace_edges(&original);

        match self.apply_text_node(port, &first, &original, leading, trailing, translated)? {
            ApplyOutcome::Applied => Ok(ApplyOutcome::Degraded),
            other => Ok(other),
        }
    }

    /// 切换 `root` 下全部已翻译包装元素的原文显示
    pub fn set_keep_original<P: DomPort>(&mut self, port: &P, root: &P::Node, on: bool) -> usize {
        self.keep_original = on;
        let wrappers = port.find_elements(root, |el| {
            port.has_class(el, constants::PAIR_CLASS)
                || port.has_class(el, constants::SEGMENT_WRAPPER_CLASS)
        });
        for wrapper in wrappers.iter() {
            if on {
                port.add_class(wrapper, constants::SHOW_ORIGINAL_CLASS);
            } else {
                port.remove_class(wrapper, constants::SHOW_ORIGINAL_CLASS);
            }
        }
        wrappers.len()
    }
}

fn first_text_descendant<P, F>(port: &P, node: &P::Node, usable: &F) -> Option<P::Node>
where
    P: DomPort,
    F: Fn(&P::Node) -> bool,
{
    for child in port.children(node) {
        match port.kind(&child) {
            NodeKind::Text if usable(&child) => return Some(child),
            NodeKind::Element => {
                if let Some(found) = first_text_descendant(port, &child, usable) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

/// `root` 下是否存在任何已翻译标记
pub fn is_page_translated<P: DomPort>(port: &P, root: &P::Node) -> bool {
    !port
        .find_elements(root, |el| is_marked(port, el))
        .is_empty()
}

fn is_marked<P: DomPort>(port: &P, element: &P::Node) -> bool {
    port.has_class(element, constants::PAIR_CLASS)
        || port.has_class(element, constants::SEGMENT_WRAPPER_CLASS)
        || port.attr(element, constants::ATTR_SEGMENT_TRANSLATED).is_some()
        || port.attr(element, constants::ATTR_LEGACY_ORIGINAL).is_some()
}

/// 还原 `root` 下全部已翻译内容，返回还原的元素数
pub fn restore<P: DomPort>(port: &P, root: &P::Node) -> usize {
    let mut restored = 0;

    // 容器快照
    let containers = port.find_elements(root, |el| {
        port.attr(el, constants::ATTR_SEGMENT_TRANSLATED).is_some()
    });
    for container in containers.iter() {
        if !port.is_attached(container) && container != root {
            continue;
        }
        if let Some(snapshot) = port.attr(container, constants::ATTR_SEGMENT_ORIGINAL) {
            if let Err(e) = port.set_inner_markup(container, &snapshot) {
                tracing::warn!("还原容器内容失败: {}", e);
                continue;
            }
        }
        port.remove_attr(container, constants::ATTR_SEGMENT_TRANSLATED);
        port.remove_attr(container, constants::ATTR_SEGMENT_ORIGINAL);
        port.remove_attr(container, constants::ATTR_PAIR);
        restored += 1;
    }

    // 文本节点包装
    let pairs = port.find_elements(root, |el| port.has_class(el, constants::PAIR_CLASS));
    for pair in pairs.iter() {
        let original = port
            .attr(pair, constants::ATTR_ORIGINAL_TEXT)
            .unwrap_or_else(|| {
                let leading = port.attr(pair, constants::ATTR_LEADING).unwrap_or_default();
                let trailing = port.attr(pair, constants::ATTR_TRAILING).unwrap_or_default();
                let body = port
                    .find_elements(pair, |el| port.has_class(el, constants::ORIGINAL_CLASS))
                    .first()
                    .map(|el| port.text_content(el))
                    .unwrap_or_default();
                format!("{}{}{}", leading, body, trailing)
            });
        match port.replace_node(pair, &port.create_text(&original)) {
            Ok(()) => restored += 1,
            Err(e) => tracing::warn!("还原翻译对失败: {}", e),
        }
    }

    // 脱离了容器标记的段落包装
    let wrappers = port.find_elements(root, |el| {
        port.has_class(el, constants::SEGMENT_WRAPPER_CLASS)
    });
    for wrapper in wrappers.iter() {
        let original = port
            .attr(wrapper, constants::ATTR_SEGMENT_ORIGINAL)
            .unwrap_or_else(|| {
                port.find_elements(wrapper, |el| {
                    port.has_class(el, constants::SEGMENT_ORIGINAL_CLASS)
                })
                .first()
                .map(|el| port.text_content(el))
                .unwrap_or_default()
            });
        if port.replace_node(wrapper, &port.create_text(&original)).is_ok() {
            restored += 1;
        }
    }

    // 旧版本标记
    let legacy = port.find_elements(root, |el| {
        port.attr(el, constants::ATTR_LEGACY_ORIGINAL).is_some()
    });
    for element in legacy.iter() {
        if let Some(original) = port.attr(element, constants::ATTR_ORIGINAL_TEXT) {
            let first_text = port
                .children(element)
                .into_iter()
                .find(|child| port.kind(child) == NodeKind::Text);
            if let Some(text_node) = first_text {
                if let Err(e) = port.replace_node(&text_node, &port.create_text(&original)) {
                    tracing::warn!("还原旧版标记失败: {}", e);
                }
            }
        }
        port.remove_attr(element, constants::ATTR_LEGACY_ORIGINAL);
        port.remove_attr(element, constants::ATTR_ORIGINAL_TEXT);
        restored += 1;
    }

    tracing::debug!("已还原 {} 个翻译元素", restored);
    restored
}

/// 待应用的译文
#[derive(Debug, Clone)]
pub struct PendingApply<N> {
    pub segment: Segment<N>,
    pub translated: String,
}

/// 一次刷新的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub applied: usize,
    pub degraded: usize,
    pub stale: usize,
    pub failed: usize,
    /// 因取消而丢弃的条目
    pub discarded: usize,
}

impl FlushReport {
    pub fn merge(&mut self, other: FlushReport) {
        self.applied += other.applied;
        self.degraded += other.degraded;
        self.stale += other.stale;
        self.failed += other.failed;
        self.discarded += other.discarded;
    }
}

/// 合并后按帧刷新的应用队列
pub struct ApplyQueue<N> {
    pending: RefCell<VecDeque<PendingApply<N>>>,
}

impl<N> Default for ApplyQueue<N> {
    fn default() -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
        }
    }
}

impl<N: Clone> ApplyQueue<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, segment: Segment<N>, translated: String) {
        self.pending
            .borrow_mut()
            .push_back(PendingApply { segment, translated });
    }

    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// 排空队列；已取消时丢弃全部条目而不修改 DOM
    pub fn flush<P>(&self, port: &P, mutator: &DomMutator, cancel: &CancellationToken) -> FlushReport
    where
        P: DomPort<Node = N>,
    {
        let mut report = FlushReport::default();
        loop {
            if cancel.is_cancelled() {
                let mut pending = self.pending.borrow_mut();
                report.discarded += pending.len();
                pending.clear();
                break;
            }
            let Some(item) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            match mutator.apply(port, &item.segment, &item.translated) {
                Ok(ApplyOutcome::Applied) => report.applied += 1,
                Ok(ApplyOutcome::Degraded) => report.degraded += 1,
                Ok(ApplyOutcome::Stale) => report.stale += 1,
                Err(e) => {
                    tracing::warn!("DOM更新失败: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}
