use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

use super::dom::{find_nodes, get_child_node_by_name};

/// 序列化文档
///
/// `document_encoding` 非空且可识别时按该编码输出，否则输出 UTF-8。
pub fn serialize_document(document: &Handle, document_encoding: &str) -> std::io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            let s: &str = &String::from_utf8_lossy(&buf);
            let (data, _, _) = encoding.encode(s);
            buf = data.to_vec();
        }
    }

    Ok(buf)
}

/// 序列化节点的全部子节点（即 innerHTML）
pub fn serialize_children(node: &Handle) -> std::io::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let serializable: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut buf, &serializable, opts)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// 将一段 HTML 片段解析为游离节点列表
///
/// 片段被放进 `<body>` 中解析，返回 body 的子节点。
pub fn parse_fragment_nodes(markup: &str) -> std::io::Result<Vec<Handle>> {
    let document = format!("<!DOCTYPE html><html><head></head><body>{}</body></html>", markup);
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut document.as_bytes())?;

    let body = get_child_node_by_name(&dom.document, "html")
        .and_then(|html| get_child_node_by_name(&html, "body"))
        .or_else(|| find_nodes(&dom.document, &["body"]).into_iter().next());

    let Some(body) = body else {
        return Ok(Vec::new());
    };

    let children: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for child in children.iter() {
        child.parent.set(None);
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::html_to_dom;

    #[test]
    fn test_inner_markup_round_trip() {
        let markup = "Hello <b class=\"x\">brave</b> &amp; <i>new</i> world";
        let dom = html_to_dom(
            format!("<html><body><p>{}</p></body></html>", markup).as_bytes(),
            "utf-8",
        )
        .expect("parse");
        let p = find_nodes(&dom.document, &["html", "body", "p"])[0].clone();

        let serialized = serialize_children(&p).expect("serialize");
        assert_eq!(serialized, markup);

        let nodes = parse_fragment_nodes(&serialized).expect("fragment");
        assert_eq!(nodes.len(), 5);
    }
}
