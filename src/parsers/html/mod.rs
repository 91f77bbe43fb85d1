//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `serializer`: 序列化与片段解析
//! - `port`: 翻译引擎使用的DOM端口抽象

pub mod dom;
pub mod port;
pub mod serializer;

pub use dom::{
    find_nodes, get_charset, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node,
    get_title, html_to_dom, set_node_attr,
};
pub use port::{DomError, DomPort, NodeKind, NodeRef, RcDomPort};
pub use serializer::{parse_fragment_nodes, serialize_children, serialize_document};
