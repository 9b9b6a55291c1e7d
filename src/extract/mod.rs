//! Metadata extractors: stateless fallback chains over a Document.
//!
//! Each extractor tries, in order: the site rule's explicit path, the page's
//! meta tags, DOM heuristics, then regexes over text — first non-empty
//! answer wins.

mod author;
mod cover;
mod description;
mod icon;
mod time;
mod title;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::consts::XPATH_UNION_SEP;
use crate::doc::Document;

pub use author::{extract_author, extract_author_profile};
pub use cover::extract_cover_image;
pub use description::extract_description;
pub use icon::extract_site_icon;
pub use time::{extract_publish_time, normalize_datetime};
pub use title::extract_title;

static RE_TRAILING_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/@([a-zA-Z_][a-zA-Z0-9_:-]*)$").unwrap());
static RE_TRAILING_FUNC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([a-zA-Z-]+)\(\)$").unwrap());
static RE_EDGE_NOISE_LEFT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\s|·)*").unwrap());
static RE_EDGE_NOISE_RIGHT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s|·)*$").unwrap());

/// Evaluate an extraction path. Supports `" | "`-joined alternatives (first
/// non-empty wins) and a trailing `/@attr` or `/text()` selector.
pub fn extract_by_path(doc: &Document, path: &str) -> String {
    if path.contains(XPATH_UNION_SEP) {
        for part in path.split(XPATH_UNION_SEP) {
            let result = extract_one(doc, part.trim());
            if !result.is_empty() {
                return result;
            }
        }
        return String::new();
    }
    extract_one(doc, path)
}

fn extract_one(doc: &Document, path: &str) -> String {
    let mut attr_key = None;
    let mut func = None;
    let mut base = path.to_string();

    if let Some(caps) = RE_TRAILING_ATTR.captures(path) {
        attr_key = Some(caps[1].to_string());
        base = RE_TRAILING_ATTR.replace(path, "").into_owned();
    } else if let Some(caps) = RE_TRAILING_FUNC.captures(path) {
        func = Some(caps[1].to_string());
        base = RE_TRAILING_FUNC.replace(path, "").into_owned();
    }

    let Some(&elem) = doc.query(&base).first() else {
        return String::new();
    };

    let raw = if let Some(key) = attr_key {
        doc.arena().attr_or(elem, &key, "").to_string()
    } else {
        match func.as_deref() {
            Some("text") => doc.arena().text(elem).to_string(),
            _ => doc.raw_text(elem),
        }
    };

    let trimmed = RE_EDGE_NOISE_LEFT.replace(&raw, "");
    RE_EDGE_NOISE_RIGHT.replace(&trimmed, "").into_owned()
}

/// All meta tag name/property → content pairs.
pub fn meta_map(doc: &Document) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for elem in doc.query("//meta") {
        let key = ["name", "property"]
            .iter()
            .map(|k| doc.arena().attr_or(elem, k, ""))
            .find(|v| !v.is_empty())
            .unwrap_or("");
        let value = doc.arena().attr_or(elem, "content", "");
        if !key.is_empty() && !value.is_empty() {
            out.entry(key.to_string()).or_insert_with(|| value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_extract_by_path_text_and_attr() {
        let d = doc(concat!(
            "<html><body>",
            r#"<h1 data-src="/x">  · Headline · </h1>"#,
            "</body></html>"
        ));
        assert_eq!(extract_by_path(&d, "//h1"), "Headline");
        assert_eq!(extract_by_path(&d, "//h1/@data-src"), "/x");
        assert_eq!(extract_by_path(&d, "//h1/text()"), "Headline");
    }

    #[test]
    fn test_union_first_non_empty_wins() {
        let d = doc("<html><body><h2>second</h2></body></html>");
        assert_eq!(extract_by_path(&d, "//h1 | //h2"), "second");
    }

    #[test]
    fn test_meta_map_prefers_name_then_property() {
        let d = doc(concat!(
            "<html><head>",
            r#"<meta name="author" content="Ann">"#,
            r#"<meta property="og:title" content="T">"#,
            "</head><body><p>x</p></body></html>"
        ));
        let map = meta_map(&d);
        assert_eq!(map.get("author").map(String::as_str), Some("Ann"));
        assert_eq!(map.get("og:title").map(String::as_str), Some("T"));
    }
}
