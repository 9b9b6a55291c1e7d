//! Arena DOM: tree storage, html5ever integration, reader serialization.

pub mod arena;
pub mod serialize;
pub mod tree_sink;

pub use arena::{Arena, Attr, ElementData, Node, NodeData, NodeId};
pub use serialize::{serialize_document, serialize_node};
pub use tree_sink::parse_html;
