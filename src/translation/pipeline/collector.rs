//! 文本收集器模块
//!
//! 按文档顺序遍历 DOM，把可翻译内容切分为片段。支持两种策略：
//!
//! - 文本节点策略：每个非空文本节点一个片段
//! - 容器策略：每个直接拥有文本的元素一个片段，合并其后代文本
//!
//! 遍历是剪枝的：被拒绝的元素连同整棵子树一起跳过，因此同一个文本节点
//! 在一次收集中最多属于一个片段。

use crate::parsers::html::{DomPort, NodeKind};
use crate::translation::config::{constants, SegmentStrategy};
use crate::translation::pipeline::filters::{
    is_punctuation_only, AncestorContext, AncestorFrame, TextFilter,
};

/// 片段类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    TextNode,
    Container,
}

/// 一次翻译调用的单位
///
/// 片段不拥有节点，只持有句柄和恢复所需的原文快照。
#[derive(Debug, Clone)]
pub struct Segment<N> {
    /// 文档顺序下的序号
    pub id: usize,
    pub kind: SegmentKind,
    /// 文本节点策略下是文本节点，容器策略下是容器元素
    pub anchor: N,
    /// 片段覆盖的文本节点（文档顺序）
    pub text_nodes: Vec<N>,
    /// 原文，未裁剪
    pub original: String,
    /// 容器策略下收集时的内部标记快照
    pub original_markup: Option<String>,
    pub leading: String,
    pub trailing: String,
}

impl<N> Segment<N> {
    /// 送往后端的文本
    pub fn source_text(&self) -> &str {
        self.original.trim()
    }
}

/// 收集统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub nodes_visited: usize,
    pub nodes_skipped: usize,
    pub texts_filtered: usize,
    pub segments: usize,
}

impl CollectionStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 把文本拆成前导空白、主体、尾随空白
pub fn split_whitespace_edges(text: &str) -> (&str, &str, &str) {
    let body_start = text.len() - text.trim_start().len();
    let body_end = text.trim_end().len();
    if body_start >= body_end {
        return (text, "", "");
    }
    (&text[..body_start], &text[body_start..body_end], &text[body_end..])
}

/// DOM文本收集器
pub struct SegmentCollector {
    strategy: SegmentStrategy,
    filter: TextFilter,
    stats: CollectionStats,
}

impl SegmentCollector {
    /// 创建新的文本收集器
    pub fn new(strategy: SegmentStrategy) -> Self {
        Self {
            strategy,
            filter: TextFilter::new(),
            stats: CollectionStats::default(),
        }
    }

    pub fn strategy(&self) -> SegmentStrategy {
        self.strategy
    }

    pub fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// 收集 `root` 下的全部片段，按文档顺序返回
    pub fn collect<P: DomPort>(&mut self, port: &P, root: &P::Node) -> Vec<Segment<P::Node>> {
        self.stats.reset();
        let mut segments = Vec::new();

        // 根节点本身位于排除区域内时不收集
        if let Some(parent) = port.parent(root) {
            if port.closest(&parent, |el| self.rejects_element(port, el)).is_some() {
                tracing::debug!("收集根节点位于排除区域内");
                return segments;
            }
        }

        match self.strategy {
            SegmentStrategy::TextNode => self.collect_text_nodes(port, root, &mut segments),
            SegmentStrategy::Container => self.collect_containers(port, root, &mut segments),
        }

        self.stats.segments = segments.len();
        tracing::debug!(
            "收集完成: {} 个片段, 访问 {} 个节点, 跳过 {} 个元素, 过滤 {} 段文本",
            self.stats.segments,
            self.stats.nodes_visited,
            self.stats.nodes_skipped,
            self.stats.texts_filtered
        );
        segments
    }

    /// 元素是否连同子树一起排除
    pub fn rejects_element<P: DomPort>(&self, port: &P, element: &P::Node) -> bool {
        if port.kind(element) != NodeKind::Element {
            return false;
        }

        // 引擎自身界面
        if port.has_class(element, constants::UI_CLASS) {
            return true;
        }

        if port.is_hidden(element) {
            return true;
        }

        if let Some(tag) = port.tag_name(element) {
            if constants::SKIP_ELEMENTS.contains(&tag.as_str()) {
                return true;
            }
        }

        if port.has_class(element, constants::NO_TRANSLATE_CLASS)
            || port
                .attr(element, "translate")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("no"))
        {
            return true;
        }

        // 已翻译标记
        port.has_class(element, constants::PAIR_CLASS)
            || port.has_class(element, constants::SEGMENT_WRAPPER_CLASS)
            || port.attr(element, constants::ATTR_SEGMENT_TRANSLATED).is_some()
            || port.attr(element, constants::ATTR_LEGACY_ORIGINAL).is_some()
    }

    /// 从 `element` 开始向上构建祖先链摘要
    pub fn ancestor_context<P: DomPort>(&self, port: &P, element: Option<P::Node>) -> AncestorContext {
        let mut frames = Vec::new();
        let mut current = element;
        while let Some(node) = current {
            if frames.len() >= constants::CODE_ANCESTOR_DEPTH {
                break;
            }
            if port.kind(&node) != NodeKind::Element {
                break;
            }
            frames.push(AncestorFrame {
                tag: port.tag_name(&node).unwrap_or_default(),
                class: port.attr(&node, "class").unwrap_or_default(),
                has_code_data: ["data-lang", "data-language", "data-code"]
                    .iter()
                    .any(|name| port.attr(&node, name).is_some()),
            });
            current = port.parent(&node);
        }
        AncestorContext::new(frames)
    }

    fn collect_text_nodes<P: DomPort>(
        &mut self,
        port: &P,
        node: &P::Node,
        segments: &mut Vec<Segment<P::Node>>,
    ) {
        self.stats.nodes_visited += 1;

        match port.kind(node) {
            NodeKind::Text => {
                let Some(text) = port.text(node) else {
                    return;
                };
                if text.trim().is_empty() {
                    return;
                }
                let context = self.ancestor_context(port, port.parent(node));
                if let Some(reason) = self.filter.classify(&text, &context) {
                    tracing::trace!("跳过文本 {:?}: {:?}", text, reason);
                    self.stats.texts_filtered += 1;
                    return;
                }
                let (leading, _, trailing) = split_whitespace_edges(&text);
                segments.push(Segment {
                    id: segments.len(),
                    kind: SegmentKind::TextNode,
                    anchor: node.clone(),
                    text_nodes: vec![node.clone()],
                    leading: leading.to_string(),
                    trailing: trailing.to_string(),
                    original: text,
                    original_markup: None,
                });
            }
            NodeKind::Element => {
                if self.rejects_element(port, node) {
                    self.stats.nodes_skipped += 1;
                    return;
                }
                for child in port.children(node).iter() {
                    self.collect_text_nodes(port, child, segments);
                }
            }
            NodeKind::Document => {
                for child in port.children(node).iter() {
                    self.collect_text_nodes(port, child, segments);
                }
            }
            NodeKind::Other => {}
        }
    }

    fn collect_containers<P: DomPort>(
        &mut self,
        port: &P,
        node: &P::Node,
        segments: &mut Vec<Segment<P::Node>>,
    ) {
        self.stats.nodes_visited += 1;

        match port.kind(node) {
            NodeKind::Element => {
                if self.rejects_element(port, node) {
                    self.stats.nodes_skipped += 1;
                    return;
                }
                if self.has_direct_text(port, node) && self.claim_container(port, node, segments) {
                    // 已认领的子树不再向下收集
                    return;
                }
                for child in port.children(node).iter() {
                    self.collect_containers(port, child, segments);
                }
            }
            NodeKind::Document => {
                for child in port.children(node).iter() {
                    self.collect_containers(port, child, segments);
                }
            }
            NodeKind::Text | NodeKind::Other => {}
        }
    }

    fn has_direct_text<P: DomPort>(&self, port: &P, element: &P::Node) -> bool {
        port.children(element)
            .iter()
            .any(|child| port.text(child).is_some_and(|text| !text.trim().is_empty()))
    }

    fn claim_container<P: DomPort>(
        &mut self,
        port: &P,
        element: &P::Node,
        segments: &mut Vec<Segment<P::Node>>,
    ) -> bool {
        let mut text_nodes = Vec::new();
        let mut full_text = String::new();
        self.gather_text(port, element, &mut text_nodes, &mut full_text);

        let trimmed = full_text.trim();
        if text_nodes.is_empty() || trimmed.chars().count() < 2 || is_punctuation_only(trimmed) {
            self.stats.texts_filtered += 1;
            return false;
        }

        let context = self.ancestor_context(port, Some(element.clone()));
        if let Some(reason) = self.filter.classify(trimmed, &context) {
            tracing::trace!("跳过容器文本 {:?}: {:?}", trimmed, reason);
            self.stats.texts_filtered += 1;
            return false;
        }

        let original_markup = match port.inner_markup(element) {
            Ok(markup) => markup,
            Err(e) => {
                tracing::warn!("无法序列化容器内容，跳过: {}", e);
                return false;
            }
        };

        segments.push(Segment {
            id: segments.len(),
            kind: SegmentKind::Container,
            anchor: element.clone(),
            text_nodes,
            original: full_text,
            original_markup: Some(original_markup),
            leading: String::new(),
            trailing: String::new(),
        });
        true
    }

    /// 合并容器内的文本，跳过被排除的子元素
    fn gather_text<P: DomPort>(
        &mut self,
        port: &P,
        node: &P::Node,
        text_nodes: &mut Vec<P::Node>,
        full_text: &mut String,
    ) {
        for child in port.children(node).iter() {
            match port.kind(child) {
                NodeKind::Text => {
                    if let Some(text) = port.text(child) {
                        if !text.trim().is_empty() {
                            full_text.push_str(&text);
                            text_nodes.push(child.clone());
                        }
                    }
                }
                NodeKind::Element => {
                    if self.rejects_element(port, child) {
                        continue;
                    }
                    self.gather_text(port, child, text_nodes, full_text);
                }
                _ => {}
            }
        }
    }
}

impl Default for SegmentCollector {
    fn default() -> Self {
        Self::new(SegmentStrategy::default())
    }
}
