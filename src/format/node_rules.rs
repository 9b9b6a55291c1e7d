//! Pre-split element rewrite rules: collapse attributes and inline styles
//! to the allow-lists the reader can render safely.

use crate::consts::{A_ATTRS, ATTR_PREFIX, IMG_ATTRS, IMG_TAGS};
use crate::doc::Document;
use crate::dom::NodeId;
use crate::util;

/// Attributes that survive the rewrite on any element.
const RESERVED_ATTRS: &[&str] = &[
    // svg needs these to render at all
    "viewBox",
    "height",
    // styling survives separately through the style rule
    "style",
];

/// Style properties the reader keeps.
const RESERVED_STYLE_PROPS: &[&str] = &[
    "color",
    "font-style",
    "background",
    "background-color",
    "list-style",
    "font-weight",
    "text-indent",
    "border-left",
    "border-radius",
    "padding-right",
    "padding-left",
];

/// Extra properties kept on image-like elements (sizing matters there).
const IMG_STYLE_PROPS: &[&str] = &["width", "height", "vertical-align"];

fn clean_elem_attrs(doc: &mut Document, id: NodeId) {
    let Some(e) = doc.arena_mut().element_mut(id) else {
        return;
    };
    e.attrs.retain(|a| {
        RESERVED_ATTRS.contains(&a.name.as_str())
            || IMG_ATTRS.contains(&a.name.as_str())
            || A_ATTRS.contains(&a.name.as_str())
            || a.name.starts_with(ATTR_PREFIX)
    });
}

/// Apply all node rewrite rules in one pre-format pass.
pub fn apply_node_rules(doc: &mut Document) {
    apply_style_rule(doc);
    apply_link_rule(doc);
    apply_container_rule(doc);
    apply_img_rule(doc);
}

fn apply_style_rule(doc: &mut Document) {
    for elem in doc.query("//*[string-length(@style) > 0]") {
        rewrite_style(doc, elem);
    }
}

fn rewrite_style(doc: &mut Document, elem: NodeId) {
    let Some(style) = doc.arena().attr(elem, "style") else {
        return;
    };
    let source = util::style_map(style);
    let tag = doc.arena().tag(elem).to_string();

    let mut reserved: Vec<&str> = RESERVED_STYLE_PROPS.to_vec();
    if IMG_TAGS.contains(&tag.as_str()) {
        reserved.extend_from_slice(IMG_STYLE_PROPS);
    }

    let mut kept = std::collections::HashMap::new();
    for key in reserved {
        if let Some(value) = source.get(key) {
            let value = value.replace("!important", "").trim().to_string();
            if !value.is_empty() {
                kept.insert(key.to_string(), value);
            }
        }
    }
    if kept.get("width").map(String::as_str) == Some("100%") {
        kept.remove("width");
    }
    // extreme backgrounds fight the reader theme
    let bg = kept
        .get("background")
        .or_else(|| kept.get("background-color"))
        .cloned()
        .unwrap_or_default();
    if util::is_white_color(&bg) || util::is_dark_color(&bg) {
        kept.remove("background");
        kept.remove("background-color");
    }
    if kept.get("color").is_some_and(|c| util::is_white_color(c)) {
        kept.remove("color");
    }
    if tag != "ol" {
        kept.remove("list-style");
    }

    let rendered = util::style_map_to_string(&kept);
    clean_elem_attrs(doc, elem);
    doc.arena_mut().set_attr(elem, "style", &rendered);
}

fn apply_link_rule(doc: &mut Document) {
    for elem in doc.query("//a") {
        let href = doc.arena().attr_or(elem, "href", "").to_string();
        clean_elem_attrs(doc, elem);
        let link = util::ensure_link_absolute(&href, &doc.url);
        doc.arena_mut().set_attr(elem, "href", &link);
    }
}

fn apply_container_rule(doc: &mut Document) {
    for elem in doc.query("//div | //section") {
        clean_elem_attrs(doc, elem);
    }
}

fn apply_img_rule(doc: &mut Document) {
    for elem in doc.query("//img") {
        let sources: Vec<(String, String)> = IMG_ATTRS
            .iter()
            .filter_map(|key| {
                let value = doc.arena().attr_or(elem, key, "");
                if value.is_empty() {
                    None
                } else {
                    Some((key.to_string(), value.to_string()))
                }
            })
            .collect();
        clean_elem_attrs(doc, elem);
        for (key, value) in sources {
            let link = util::ensure_link_absolute(&value, &doc.url);
            doc.arena_mut().set_attr(elem, &key, &link);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_link_keeps_only_absolute_href() {
        let mut d = doc(concat!(
            r#"<html><body><a href="/rel" target="_blank" onclick-x="no" class="btn">go</a>"#,
            "</body></html>"
        ));
        apply_node_rules(&mut d);
        let a = d.query("//a")[0];
        assert_eq!(d.arena().attr(a, "href"), Some("https://example.com/rel"));
        assert_eq!(d.arena().attr(a, "target"), None);
        assert_eq!(d.arena().attr(a, "class"), None);
    }

    #[test]
    fn test_style_allow_list() {
        let mut d = doc(concat!(
            r#"<html><body><p style="color: red !important; font-size: 30px; font-weight: bold">"#,
            "x</p></body></html>"
        ));
        apply_node_rules(&mut d);
        let p = d.query("//p")[0];
        let style = d.arena().attr(p, "style").unwrap();
        assert!(style.contains("color: red"));
        assert!(style.contains("font-weight: bold"));
        assert!(!style.contains("font-size"));
        assert!(!style.contains("!important"));
    }

    #[test]
    fn test_white_text_and_extreme_background_dropped() {
        let mut d = doc(concat!(
            r#"<html><body><p style="color: #ffffff; background-color: #000">x</p>"#,
            "</body></html>"
        ));
        apply_node_rules(&mut d);
        let p = d.query("//p")[0];
        let style = d.arena().attr(p, "style").unwrap();
        assert!(!style.contains("color"));
        assert!(!style.contains("background"));
    }

    #[test]
    fn test_img_sources_absolutized() {
        let mut d = doc(concat!(
            r#"<html><body><img data-src="/lazy.png" width="300" alt="x">"#,
            "</body></html>"
        ));
        apply_node_rules(&mut d);
        let img = d.query("//img")[0];
        assert_eq!(
            d.arena().attr(img, "data-src"),
            Some("https://example.com/lazy.png")
        );
        assert_eq!(d.arena().attr(img, "alt"), None);
        assert_eq!(d.arena().attr(img, "width"), None);
    }

    #[test]
    fn test_marker_attrs_survive() {
        let mut d = doc(r#"<html><body><div data-pith-intro="" class="x">y</div></body></html>"#);
        apply_node_rules(&mut d);
        let div = d.query("//div")[0];
        assert_eq!(d.arena().attr(div, "data-pith-intro"), Some(""));
        assert_eq!(d.arena().attr(div, "class"), None);
    }
}
