//! DOM 端口
//!
//! 翻译引擎只通过 [`DomPort`] 访问文档：查询、读取文本、替换节点、读写属性。
//! [`RcDomPort`] 是基于 `markup5ever_rcdom` 的实现，既用于命令行处理真实页面，
//! 也用于无头测试。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use encoding_rs::Encoding;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use thiserror::Error;

use super::dom::{
    append_node, clear_children, create_element_node, create_text_node, find_nodes,
    get_charset, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node, get_title,
    replace_node, set_node_attr,
};
use super::serializer::{parse_fragment_nodes, serialize_children, serialize_document};

/// DOM 结构修改错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// 目标节点已脱离文档
    #[error("节点已脱离文档")]
    Detached,

    /// 对非元素节点执行了元素操作
    #[error("节点不是元素: {0}")]
    NotAnElement(String),

    /// 标记序列化或解析失败
    #[error("标记处理失败: {0}")]
    Markup(String),
}

/// 节点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Other,
}

/// 引擎所需的最小 DOM 操作集合
pub trait DomPort {
    /// 非拥有的节点句柄，相等性按节点身份判断
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// 文档根节点
    fn document(&self) -> Self::Node;

    /// 翻译的默认根（通常是 body）
    fn body(&self) -> Self::Node;

    fn title(&self) -> Option<String>;

    fn kind(&self, node: &Self::Node) -> NodeKind;

    /// 小写标签名，非元素返回 `None`
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// 文本节点的值
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn attr(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attr(&self, node: &Self::Node, name: &str, value: &str);

    fn remove_attr(&self, node: &Self::Node, name: &str);

    /// 计算样式是否隐藏（display:none 或 visibility:hidden）
    fn is_hidden(&self, node: &Self::Node) -> bool;

    fn create_element(&self, tag: &str) -> Self::Node;

    fn create_text(&self, text: &str) -> Self::Node;

    fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;

    fn replace_node(&self, target: &Self::Node, replacement: &Self::Node) -> Result<(), DomError>;

    fn clear_children(&self, node: &Self::Node);

    /// 序列化的内部标记
    fn inner_markup(&self, node: &Self::Node) -> Result<String, DomError>;

    /// 用解析后的标记替换全部子节点
    fn set_inner_markup(&self, node: &Self::Node, markup: &str) -> Result<(), DomError>;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.attr(node, "class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }

    fn add_class(&self, node: &Self::Node, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        let value = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attr(node, "class", &value);
    }

    fn remove_class(&self, node: &Self::Node, class: &str) {
        let Some(existing) = self.attr(node, "class") else {
            return;
        };
        let value: Vec<&str> = existing
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .collect();
        if value.is_empty() {
            self.remove_attr(node, "class");
        } else {
            self.set_attr(node, "class", &value.join(" "));
        }
    }

    /// 节点是否仍挂在文档上
    fn is_attached(&self, node: &Self::Node) -> bool {
        let document = self.document();
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if n == document {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// 节点及其祖先中第一个满足条件的元素
    fn closest<F>(&self, node: &Self::Node, mut predicate: F) -> Option<Self::Node>
    where
        F: FnMut(&Self::Node) -> bool,
        Self: Sized,
    {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if self.kind(&n) == NodeKind::Element && predicate(&n) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }

    /// 文档顺序下满足条件的全部后代元素（含自身）
    fn find_elements<F>(&self, root: &Self::Node, mut predicate: F) -> Vec<Self::Node>
    where
        F: FnMut(&Self::Node) -> bool,
        Self: Sized,
    {
        let mut found = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if self.kind(&node) == NodeKind::Element && predicate(&node) {
                found.push(node.clone());
            }
            let mut children = self.children(&node);
            children.reverse();
            stack.extend(children);
        }
        found
    }

    /// 全部后代文本拼接
    fn text_content(&self, node: &Self::Node) -> String {
        if let Some(text) = self.text(node) {
            return text;
        }
        self.children(node)
            .iter()
            .map(|child| self.text_content(child))
            .collect()
    }
}

/// 以 `Rc` 指针身份比较的节点句柄
#[derive(Clone)]
pub struct NodeRef(pub Handle);

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.data {
            NodeData::Element { name, .. } => write!(f, "<{}>", name.local),
            NodeData::Text { contents } => write!(f, "#text({:?})", contents.borrow().to_string()),
            NodeData::Document => write!(f, "#document"),
            _ => write!(f, "#node"),
        }
    }
}

/// 基于 `RcDom` 的端口实现
pub struct RcDomPort {
    dom: RcDom,
}

impl RcDomPort {
    pub fn new(dom: RcDom) -> Self {
        Self { dom }
    }

    /// 从 HTML 字节构建
    pub fn parse(data: &[u8], document_encoding: &str) -> std::io::Result<Self> {
        super::dom::html_to_dom(data, document_encoding).map(Self::new)
    }

    /// 按文档内声明的字符集重新解析，返回实际使用的编码
    pub fn parse_detecting(data: &[u8], input_encoding: Option<&str>) -> std::io::Result<(Self, String)> {
        let mut document_encoding = input_encoding.unwrap_or("utf-8").to_string();
        let mut port = Self::parse(data, &document_encoding)?;

        if input_encoding.is_none() {
            if let Some(charset) = get_charset(&port.dom.document).filter(|c| !c.is_empty()) {
                if let Some(encoding) = Encoding::for_label_no_replacement(charset.as_bytes()) {
                    if encoding != encoding_rs::UTF_8 {
                        port = Self::parse(data, encoding.name())?;
                    }
                    document_encoding = charset;
                }
            }
        }

        Ok((port, document_encoding))
    }

    pub fn dom(&self) -> &RcDom {
        &self.dom
    }

    /// 序列化整个文档
    pub fn to_html(&self, document_encoding: &str) -> std::io::Result<Vec<u8>> {
        serialize_document(&self.dom.document, document_encoding)
    }

    /// 序列化整个文档为 UTF-8 字符串
    pub fn to_html_string(&self) -> String {
        self.to_html("")
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    /// 按路径查找元素，例如 `["html", "body", "p"]`
    pub fn find(&self, path: &[&str]) -> Vec<NodeRef> {
        find_nodes(&self.dom.document, path)
            .into_iter()
            .map(NodeRef)
            .collect()
    }
}

impl DomPort for RcDomPort {
    type Node = NodeRef;

    fn document(&self) -> NodeRef {
        NodeRef(self.dom.document.clone())
    }

    fn body(&self) -> NodeRef {
        get_child_node_by_name(&self.dom.document, "html")
            .and_then(|html| get_child_node_by_name(&html, "body"))
            .map(NodeRef)
            .unwrap_or_else(|| self.document())
    }

    fn title(&self) -> Option<String> {
        get_title(&self.dom.document)
    }

    fn kind(&self, node: &NodeRef) -> NodeKind {
        match node.0.data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text { .. } => NodeKind::Text,
            _ => NodeKind::Other,
        }
    }

    fn tag_name(&self, node: &NodeRef) -> Option<String> {
        get_node_name(&node.0).map(|name| name.to_ascii_lowercase())
    }

    fn parent(&self, node: &NodeRef) -> Option<NodeRef> {
        get_parent_node(&node.0).map(NodeRef)
    }

    fn children(&self, node: &NodeRef) -> Vec<NodeRef> {
        node.0.children.borrow().iter().cloned().map(NodeRef).collect()
    }

    fn text(&self, node: &NodeRef) -> Option<String> {
        match node.0.data {
            NodeData::Text { ref contents } => Some(contents.borrow().to_string()),
            _ => None,
        }
    }

    fn attr(&self, node: &NodeRef, name: &str) -> Option<String> {
        get_node_attr(&node.0, name)
    }

    fn set_attr(&self, node: &NodeRef, name: &str, value: &str) {
        set_node_attr(&node.0, name, Some(value));
    }

    fn remove_attr(&self, node: &NodeRef, name: &str) {
        set_node_attr(&node.0, name, None);
    }

    fn is_hidden(&self, node: &NodeRef) -> bool {
        if self.kind(node) != NodeKind::Element {
            return false;
        }
        if get_node_attr(&node.0, "hidden").is_some() {
            return true;
        }
        let Some(style) = get_node_attr(&node.0, "style") else {
            return false;
        };
        let style: String = style
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        style
            .split(';')
            .any(|decl| decl.starts_with("display:none") || decl.starts_with("visibility:hidden"))
    }

    fn create_element(&self, tag: &str) -> NodeRef {
        NodeRef(create_element_node(&self.dom, tag))
    }

    fn create_text(&self, text: &str) -> NodeRef {
        NodeRef(create_text_node(text))
    }

    fn append_child(&self, parent: &NodeRef, child: &NodeRef) -> Result<(), DomError> {
        match parent.0.data {
            NodeData::Element { .. } | NodeData::Document => {
                append_node(&parent.0, &child.0);
                Ok(())
            }
            _ => Err(DomError::NotAnElement(format!("{:?}", parent))),
        }
    }

    fn replace_node(&self, target: &NodeRef, replacement: &NodeRef) -> Result<(), DomError> {
        if replace_node(&target.0, &replacement.0) {
            Ok(())
        } else {
            Err(DomError::Detached)
        }
    }

    fn clear_children(&self, node: &NodeRef) {
        clear_children(&node.0);
    }

    fn inner_markup(&self, node: &NodeRef) -> Result<String, DomError> {
        serialize_children(&node.0).map_err(|e| DomError::Markup(e.to_string()))
    }

    fn set_inner_markup(&self, node: &NodeRef, markup: &str) -> Result<(), DomError> {
        if self.kind(node) != NodeKind::Element {
            return Err(DomError::NotAnElement(format!("{:?}", node)));
        }
        let nodes = parse_fragment_nodes(markup).map_err(|e| DomError::Markup(e.to_string()))?;
        clear_children(&node.0);
        for child in nodes.iter() {
            append_node(&node.0, child);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(html: &str) -> RcDomPort {
        RcDomPort::parse(html.as_bytes(), "utf-8").expect("parse")
    }

    #[test]
    fn test_hidden_detection() {
        let port = port(
            "<html><body><p style=\"display: none\">a</p><p style=\"color:red; visibility : hidden\">b</p><p hidden>c</p><p>d</p></body></html>",
        );
        let ps = port.find(&["html", "body", "p"]);
        let hidden: Vec<bool> = ps.iter().map(|p| port.is_hidden(p)).collect();
        assert_eq!(hidden, vec![true, true, true, false]);
    }

    #[test]
    fn test_class_helpers() {
        let port = port("<html><body><p class=\"a  b\">x</p></body></html>");
        let p = &port.find(&["html", "body", "p"])[0];

        assert!(port.has_class(p, "b"));
        port.add_class(p, "c");
        assert_eq!(port.attr(p, "class").as_deref(), Some("a  b c"));
        port.remove_class(p, "a");
        port.remove_class(p, "b");
        port.remove_class(p, "c");
        assert_eq!(port.attr(p, "class"), None);
    }

    #[test]
    fn test_set_inner_markup_replaces_children() {
        let port = port("<html><body><div>old <b>bold</b></div></body></html>");
        let div = &port.find(&["html", "body", "div"])[0];

        port.set_inner_markup(div, "new <i>italic</i>").expect("set");
        assert_eq!(port.inner_markup(div).expect("markup"), "new <i>italic</i>");
        let child = &port.children(div)[1];
        assert_eq!(port.parent(child).as_ref(), Some(div));
    }

    #[test]
    fn test_closest_and_attachment() {
        let port = port("<html><body><div class=\"ft-ui\"><span>x</span></div></body></html>");
        let span = &port.find(&["html", "body", "div", "span"])[0];
        let text = &port.children(span)[0];

        let ui = port.closest(text, |n| port.has_class(n, "ft-ui"));
        assert!(ui.is_some());
        assert!(port.is_attached(text));

        let detached = port.create_text("loose");
        assert!(!port.is_attached(&detached));
    }

    #[test]
    fn test_declared_charset_is_honoured() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(
            "<html><head><meta charset=\"windows-1252\"></head><body><p>caf\u{e9}</p></body></html>",
        );
        let (port, encoding) = RcDomPort::parse_detecting(&bytes, None).unwrap();
        assert_eq!(encoding, "windows-1252");
        let p = port.find(&["html", "body", "p"])[0].clone();
        assert_eq!(port.text_content(&p), "caf\u{e9}");

        let (_, encoding) = RcDomPort::parse_detecting(b"<p>x</p>", Some("utf-8")).unwrap();
        assert_eq!(encoding, "utf-8");
    }
}
