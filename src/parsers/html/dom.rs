//! 基础 DOM 操作
//!
//! 基于 `markup5ever_rcdom` 的节点查找、属性读写以及父子关系维护。

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
///
/// `document_encoding` 为空或无法识别时按 UTF-8（有损）解码。
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> io::Result<RcDom> {
    let s = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
}

/// 查找指定路径的DOM节点
pub fn find_nodes(node: &Handle, node_names: &[&str]) -> Vec<Handle> {
    let mut found_nodes = Vec::new();
    let Some((node_name, rest)) = node_names.split_first() else {
        return found_nodes;
    };

    let matches = get_node_name(node).is_some_and(|name| name == *node_name);

    if matches && rest.is_empty() {
        found_nodes.push(node.clone());
    }

    if matches && !rest.is_empty() {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, rest));
        }
    } else {
        for child_node in node.children.borrow().iter() {
            found_nodes.append(&mut find_nodes(child_node, node_names));
        }
    }

    found_nodes
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// `Node::parent` 是 `Cell`，读取时必须取出再放回，否则会切断父子关系。
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 设置节点属性，`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value);
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 获取文档标题
pub fn get_title(node: &Handle) -> Option<String> {
    for title_node in find_nodes(node, &["html", "head", "title"]).iter() {
        for child_node in title_node.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child_node.data {
                return Some(contents.borrow().to_string());
            }
        }
    }

    None
}

/// 获取 `<meta charset>` 声明的字符集
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, &["html", "head", "meta"]).iter() {
        if let Some(charset) = get_node_attr(meta_node, "charset") {
            return Some(charset);
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            let content = get_node_attr(meta_node, "content").unwrap_or_default();
            if let Some((_, charset)) = content.split_once("charset=") {
                return Some(charset.trim().trim_matches('"').to_string());
            }
        }
    }

    None
}

/// 创建独立的文本节点
pub fn create_text_node(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 创建独立的 HTML 元素节点
pub fn create_element_node(dom: &RcDom, tag: &str) -> Handle {
    html5ever::tree_builder::create_element(
        dom,
        QualName::new(None, ns!(html), LocalName::from(tag)),
        vec![],
    )
}

/// 将节点从其父节点上摘下
pub fn detach_node(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 将节点追加为 `parent` 的最后一个子节点
pub fn append_node(parent: &Handle, child: &Handle) {
    detach_node(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 用 `replacement` 替换 `target` 在父节点中的位置
///
/// `target` 已经脱离文档时返回 `false`。
pub fn replace_node(target: &Handle, replacement: &Handle) -> bool {
    let Some(parent) = get_parent_node(target) else {
        return false;
    };

    let position = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, target));
    let Some(position) = position else {
        return false;
    };

    detach_node(replacement);
    // detach_node 可能移动了同一父节点下的兄弟位置，重新定位
    let position = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, target))
        .unwrap_or(position);

    replacement.parent.set(Some(Rc::downgrade(&parent)));
    parent.children.borrow_mut()[position] = replacement.clone();
    target.parent.set(None);
    true
}

/// 移除全部子节点
pub fn clear_children(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in children {
        child.parent.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").expect("parse")
    }

    #[test]
    fn test_parent_lookup_keeps_link() {
        let dom = dom("<html><body><p>Hello</p></body></html>");
        let p = find_nodes(&dom.document, &["html", "body", "p"])[0].clone();
        let text = p.children.borrow()[0].clone();

        let first = get_parent_node(&text).expect("parent");
        let second = get_parent_node(&text).expect("parent again");
        assert!(Rc::ptr_eq(&first, &second));
        assert!(Rc::ptr_eq(&first, &p));
    }

    #[test]
    fn test_set_and_remove_attr() {
        let dom = dom("<html><body><p id=\"a\">Hello</p></body></html>");
        let p = find_nodes(&dom.document, &["html", "body", "p"])[0].clone();

        set_node_attr(&p, "data-x", Some("1"));
        assert_eq!(get_node_attr(&p, "data-x").as_deref(), Some("1"));
        set_node_attr(&p, "data-x", None);
        assert_eq!(get_node_attr(&p, "data-x"), None);
        assert_eq!(get_node_attr(&p, "id").as_deref(), Some("a"));
    }

    #[test]
    fn test_replace_node_in_place() {
        let dom = dom("<html><body><p>a<b>b</b>c</p></body></html>");
        let p = find_nodes(&dom.document, &["html", "body", "p"])[0].clone();
        let b = p.children.borrow()[1].clone();
        let replacement = create_text_node("B");

        assert!(replace_node(&b, &replacement));
        assert_eq!(p.children.borrow().len(), 3);
        assert!(Rc::ptr_eq(&p.children.borrow()[1], &replacement));
        assert!(get_parent_node(&b).is_none());
        assert!(!replace_node(&b, &create_text_node("x")));
    }

    #[test]
    fn test_get_title_and_charset() {
        let dom = dom(
            "<html><head><meta charset=\"windows-1252\"><title>Doc</title></head><body></body></html>",
        );
        assert_eq!(get_title(&dom.document).as_deref(), Some("Doc"));
        assert_eq!(get_charset(&dom.document).as_deref(), Some("windows-1252"));
    }
}
