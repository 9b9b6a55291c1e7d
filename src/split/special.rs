//! Special-node matchers: image, table and video elements collapse into
//! immutable placeholder atoms (or, for video, a normalized empty element)
//! and their subtrees are consumed.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::consts::{
    IMG_ATOM_PREFIX, IMG_ATTRS, IMG_TAGS, TABLE_ATOM_PREFIX, TABLE_DOMINANCE_RATIO, TABLE_TAGS,
    VIDEO_CLASS_EXACT, VIDEO_CLASS_HINTS,
};
use crate::doc::Document;
use crate::dom::{NodeId, serialize_node};
use crate::split::atom::{Atom, SegmentIds};
use crate::util;

static RE_BG_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"url\((.*)\)").unwrap());

/// Try the special matchers in order; `Some` means the element was consumed
/// (the returned atoms may be empty, e.g. for video).
pub fn handle_special(
    doc: &mut Document,
    segments: &mut SegmentIds,
    id: NodeId,
) -> Option<Vec<Atom>> {
    if match_image(doc, id) {
        return Some(handle_image(doc, segments, id).into_iter().collect());
    }
    if match_table(doc, id) {
        return Some(handle_table(doc, segments, id).into_iter().collect());
    }
    if match_video(doc, id) {
        handle_video(doc, id);
        return Some(Vec::new());
    }
    None
}

fn attr_is_link(value: &str) -> bool {
    ["http", "//", "/", "://", "./", "../"]
        .iter()
        .any(|prefix| value.starts_with(prefix))
}

fn background_image_url(doc: &Document, id: NodeId) -> Option<String> {
    let style = doc.arena().attr(id, "style")?;
    let map = util::style_map(style);
    let bg = map.get("background-image")?;
    RE_BG_IMAGE_URL
        .captures(bg)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(['\'', '"']).to_string())
}

fn match_image(doc: &mut Document, id: NodeId) -> bool {
    let tag = doc.arena().tag(id).to_string();
    if !IMG_TAGS.contains(&tag.as_str()) {
        // An element painted through a background image is an image.
        if let Some(url) = background_image_url(doc, id) {
            doc.arena_mut().set_tag(id, "img");
            doc.arena_mut().set_attr(id, "src", &url);
            doc.arena_mut().clear_children(id);
            return true;
        }
        return false;
    }
    IMG_ATTRS
        .iter()
        .any(|key| attr_is_link(doc.arena().attr_or(id, key, "")))
}

fn handle_image(doc: &mut Document, segments: &mut SegmentIds, id: NodeId) -> Option<Atom> {
    let mut url = String::new();
    for key in IMG_ATTRS {
        let value = doc.arena().attr_or(id, key, "");
        if attr_is_link(value) {
            url = value.to_string();
            break;
        }
    }
    if url.is_empty() {
        return None;
    }

    // Normalize to one absolute src attribute so later stages cannot pick a
    // stale lazy-loading variant.
    let url = util::ensure_link_absolute(&url, &doc.url);
    for key in IMG_ATTRS {
        doc.arena_mut().remove_attr(id, key);
    }
    if let Some(e) = doc.arena_mut().element_mut(id) {
        e.attrs.retain(|a| !a.value.contains("http"));
    }
    doc.arena_mut().set_attr(id, "src", &url);

    let text = format!("{IMG_ATOM_PREFIX} {url}");
    Some(make_atom(doc, segments, id, text, true))
}

fn contains_nested(doc: &Document, id: NodeId, tags: &[&str]) -> bool {
    doc.walk(id)
        .into_iter()
        .skip(1)
        .any(|n| tags.contains(&doc.arena().tag(n)))
}

fn match_table(doc: &Document, id: NodeId) -> bool {
    if doc.arena().tag(id) != "table" {
        return false;
    }
    if contains_nested(doc, id, TABLE_TAGS) {
        return false;
    }
    let table_text = doc.raw_text(id);
    let page_text = doc.raw_text(doc.root());
    if page_text.is_empty() {
        return false;
    }
    let ratio = table_text.len() as f32 / page_text.len() as f32;
    if ratio >= TABLE_DOMINANCE_RATIO {
        debug!(ratio, "table dominates page, treating as layout");
        return false;
    }
    true
}

fn handle_table(doc: &mut Document, segments: &mut SegmentIds, id: NodeId) -> Option<Atom> {
    let html = serialize_node(doc.arena(), id);
    let text = format!("{TABLE_ATOM_PREFIX} {html}");
    Some(make_atom(doc, segments, id, text, true))
}

fn match_video(doc: &Document, id: NodeId) -> bool {
    if doc.arena().tag(id) == "video" {
        return true;
    }
    let Some(class) = doc.arena().attr(id, "class") else {
        return false;
    };
    VIDEO_CLASS_HINTS.iter().any(|hint| class.contains(hint))
        || VIDEO_CLASS_EXACT.iter().any(|exact| class == *exact)
}

fn handle_video(doc: &mut Document, id: NodeId) {
    doc.arena_mut().set_tag(id, "video");
    doc.arena_mut().clear_children(id);
}

/// Build an atom for an element, preserving its attributes for the labeler.
pub fn make_atom(
    doc: &Document,
    segments: &mut SegmentIds,
    id: NodeId,
    text: String,
    immutable: bool,
) -> Atom {
    let xpath = doc.xpath_of(id).to_string();
    let attrs: HashMap<String, String> = doc
        .arena()
        .element(id)
        .map(|e| {
            e.attrs
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect()
        })
        .unwrap_or_default();
    Atom {
        tags: util::xpath_to_tags(&xpath),
        segment_id: segments.get(&xpath),
        position_id: doc.position_id(id),
        xpath,
        text,
        immutable,
        tail: false,
        attrs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_image_by_src_attr() {
        let mut d = doc(r#"<html><body><img data-src="/pic.png"><p>text</p></body></html>"#);
        let img = d.query("//img")[0];
        let mut seg = SegmentIds::new();
        let atoms = handle_special(&mut d, &mut seg, img).expect("match");
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].text, "<img https://example.com/pic.png");
        assert!(atoms[0].immutable);
        assert_eq!(d.arena().attr(img, "src"), Some("https://example.com/pic.png"));
        assert_eq!(d.arena().attr(img, "data-src"), None);
    }

    #[test]
    fn test_image_without_link_not_matched() {
        let mut d = doc(r#"<html><body><img alt="decorative"><p>text</p></body></html>"#);
        let img = d.query("//img")[0];
        let mut seg = SegmentIds::new();
        assert!(handle_special(&mut d, &mut seg, img).is_none());
    }

    #[test]
    fn test_background_image_becomes_img() {
        let mut d = doc(concat!(
            r#"<html><body><div style="background-image: url('/bg.jpg')">"#,
            "<span>x</span></div><p>text</p></body></html>"
        ));
        let div = d.query("//div")[0];
        let mut seg = SegmentIds::new();
        let atoms = handle_special(&mut d, &mut seg, div).expect("match");
        assert_eq!(atoms[0].text, "<img https://example.com/bg.jpg");
        assert_eq!(d.arena().tag(div), "img");
        assert_eq!(d.arena().children(div).count(), 0);
    }

    #[test]
    fn test_table_atom_serializes_html() {
        let mut d = doc(concat!(
            "<html><body><table><tr><td>cell</td></tr></table>",
            "<p>enough surrounding text to keep the table below dominance ",
            "enough surrounding text to keep the table below dominance</p>",
            "</body></html>"
        ));
        let table = d.query("//table")[0];
        let mut seg = SegmentIds::new();
        let atoms = handle_special(&mut d, &mut seg, table).expect("match");
        assert!(atoms[0].text.starts_with("<table <table"));
        assert!(atoms[0].text.contains("<td"));
    }

    #[test]
    fn test_nested_table_not_matched() {
        let mut d = doc(concat!(
            "<html><body><table><tr><td><table><tr><td>inner</td></tr></table></td></tr></table>",
            "<p>enough surrounding text to keep tables below the dominance ratio</p>",
            "</body></html>"
        ));
        let outer = d.query("//table")[0];
        let mut seg = SegmentIds::new();
        assert!(handle_special(&mut d, &mut seg, outer).is_none());
    }

    #[test]
    fn test_video_by_class_normalized() {
        let mut d = doc(concat!(
            r#"<html><body><div class="video_iframe wrap"><span>player</span></div>"#,
            "<p>text</p></body></html>"
        ));
        let div = d.query("//div")[0];
        let mut seg = SegmentIds::new();
        let atoms = handle_special(&mut d, &mut seg, div).expect("match");
        assert!(atoms.is_empty());
        assert_eq!(d.arena().tag(div), "video");
        assert_eq!(d.arena().children(div).count(), 0);
    }
}
