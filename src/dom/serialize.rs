//! Reader-HTML serialization.
//!
//! Output contract: canonical end tags everywhere except self-closed
//! `img`/`br`, entity handling restricted to `&amp;`/`&nbsp;` (ampersands are
//! written raw, non-breaking spaces become plain spaces), and the
//! non-standard `ne-` tag-name prefix is stripped.

use memchr::memchr3;

use super::arena::{Arena, NodeData, NodeId};
use crate::consts::{FOREIGN_TAG_PREFIX, KEY_POSITION_ID};

/// Tags written as `<tag />` when empty.
const SELF_CLOSE_TAGS: &[&str] = &["img", "br"];

/// Serialize the subtree rooted at `root` (inclusive).
pub fn serialize_node(arena: &Arena, root: NodeId) -> String {
    let mut out = String::new();
    write_node(arena, root, &mut out);
    out
}

/// Serialize every element under the document root.
pub fn serialize_document(arena: &Arena, root: NodeId) -> String {
    let mut out = String::new();
    if arena.is_element(root) {
        write_node(arena, root, &mut out);
    } else {
        for child in arena.children(root) {
            write_node(arena, child, &mut out);
        }
    }
    out
}

fn write_node(arena: &Arena, id: NodeId, out: &mut String) {
    let element = match arena.get(id) {
        Some(node) => match &node.data {
            NodeData::Element(e) => e,
            _ => return,
        },
        None => return,
    };

    let tag = element.name.local.as_ref();
    let tag = tag.strip_prefix(FOREIGN_TAG_PREFIX).unwrap_or(tag);

    out.push('<');
    out.push_str(tag);
    for attr in &element.attrs {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        escape_attr(out, &attr.value);
        out.push('"');
    }
    if element.position_id != 0 {
        out.push(' ');
        out.push_str(KEY_POSITION_ID);
        out.push_str("=\"");
        out.push_str(&element.position_id.to_string());
        out.push('"');
    }

    let has_children = arena.children(id).next().is_some();
    if SELF_CLOSE_TAGS.contains(&tag) && !has_children && element.text.trim().is_empty() {
        out.push_str(" />");
    } else {
        out.push('>');
        escape_text(out, &element.text);
        for child in arena.children(id) {
            write_node(arena, child, out);
            escape_text(out, arena.tail(child));
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '\u{a0}' => out.push(' '),
            c => out.push(c),
        }
    }
}

/// Escape `<`/`>` and flatten NBSP; ampersands are left raw per the output
/// contract. memchr finds the next candidate byte (0xC2 leads NBSP in UTF-8).
fn escape_text(out: &mut String, text: &str) {
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut search = 0;
    while search < bytes.len() {
        let Some(pos) = memchr3(b'<', b'>', 0xC2, &bytes[search..]) else {
            break;
        };
        let idx = search + pos;
        match bytes[idx] {
            b'<' => {
                out.push_str(&text[start..idx]);
                out.push_str("&lt;");
                start = idx + 1;
                search = start;
            }
            b'>' => {
                out.push_str(&text[start..idx]);
                out.push_str("&gt;");
                start = idx + 1;
                search = start;
            }
            _ => {
                if bytes.get(idx + 1) == Some(&0xA0) {
                    out.push_str(&text[start..idx]);
                    out.push(' ');
                    start = idx + 2;
                    search = start;
                } else {
                    search = idx + 1;
                }
            }
        }
    }
    out.push_str(&text[start..]);
}
