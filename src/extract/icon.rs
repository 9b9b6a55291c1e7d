//! Site icon extraction from `<link rel>` tags, falling back to the
//! conventional favicon location when the page declares no links at all.

use crate::doc::Document;
use crate::util;

const ICON_RELS: &[&str] = &["icon", "shortcut icon"];

pub fn extract_site_icon(doc: &Document) -> String {
    let links = doc.query("//link");
    if links.is_empty() {
        let host = util::url_host(&doc.url);
        if host.is_empty() {
            return String::new();
        }
        return format!("https://{host}/favicon.ico");
    }
    for link in links {
        let rel = doc.arena().attr_or(link, "rel", "").to_lowercase();
        if ICON_RELS.contains(&rel.as_str()) {
            let href = doc.arena().attr_or(link, "href", "");
            if !href.is_empty() {
                return util::ensure_link_absolute(href, &doc.url);
            }
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_link_absolutized() {
        let d = Document::parse(
            r#"<html><head><link rel="ICON" href="/favicon.png"></head><body><p>x</p></body></html>"#,
            "https://example.com/a/b",
            None,
        )
        .unwrap();
        assert_eq!(extract_site_icon(&d), "https://example.com/favicon.png");
    }

    #[test]
    fn test_fallback_when_no_links() {
        let d = Document::parse(
            "<html><body><p>x</p></body></html>",
            "https://example.com/a/b",
            None,
        )
        .unwrap();
        assert_eq!(extract_site_icon(&d), "https://example.com/favicon.ico");
    }
}
