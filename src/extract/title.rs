//! Title extraction: site rule → `<title>` → og:title → headings, followed
//! by bracket/suffix denoising.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::consts::{TITLE_KEEP_RATIO, TITLE_META_KEYS, TITLE_NOISE_PAIRS, TITLE_SPLIT_CHARS};
use crate::doc::{Document, RulePath};
use crate::extract::{extract_by_path, meta_map};

static RE_TITLE_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(TITLE_SPLIT_CHARS).unwrap());

pub fn extract_title(doc: &Document) -> String {
    if let Some(by_rule) = by_site_rule(doc) {
        if !by_rule.is_empty() {
            // curated paths already point at a clean title
            return first_line(&by_rule).unwrap_or(by_rule);
        }
    }

    for source in [by_title_tag, by_meta, by_heading] {
        let title = source(doc);
        let title = title.trim();
        if title.is_empty() {
            continue;
        }
        let title = strip_noise(title);
        return first_line(&title).unwrap_or(title);
    }
    String::new()
}

fn by_site_rule(doc: &Document) -> Option<String> {
    match doc.rule_path(|r| r.title.as_str())? {
        RulePath::Disabled => Some(String::new()),
        RulePath::Path(path) => Some(extract_by_path(doc, path).trim().to_string()),
    }
}

fn by_title_tag(doc: &Document) -> String {
    extract_by_path(doc, "//title")
}

fn by_meta(doc: &Document) -> String {
    let map = meta_map(doc);
    TITLE_META_KEYS
        .iter()
        .find_map(|key| map.get(*key).cloned())
        .unwrap_or_default()
}

fn by_heading(doc: &Document) -> String {
    extract_by_path(doc, "//h1 | //h2 | //h3 | //h4 | //h5 | //h6")
}

/// Strip enclosing bracket pairs and site-name suffixes ("Headline - Site").
fn strip_noise(title: &str) -> String {
    let mut title = title.to_string();
    loop {
        let mut stripped = false;
        for (left, right) in TITLE_NOISE_PAIRS {
            if title.starts_with(left) && title.ends_with(right) {
                title = title[left.len()..title.len() - right.len()].to_string();
                stripped = true;
                break;
            }
        }
        if !stripped {
            break;
        }
    }

    let parts: Vec<&str> = RE_TITLE_SPLIT.split(&title).collect();
    if parts.len() > 1 {
        let joined = parts[..parts.len() - 1].join("");
        if joined.len() as f32 / title.len() as f32 > TITLE_KEEP_RATIO {
            debug!(dropped = parts[parts.len() - 1], "dropping title suffix");
            return joined;
        }
    }
    title
}

/// First non-empty line, with literal `\n` escapes honored.
fn first_line(title: &str) -> Option<String> {
    let unescaped;
    let source = if title.contains("\\n") {
        unescaped = title.replace("\\n", "\n");
        &unescaped
    } else {
        title
    };
    source
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SiteRule;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_site_rule_bypasses_fallbacks() {
        let rule = SiteRule {
            host: "example.com".into(),
            title: "//h1".into(),
            ..Default::default()
        };
        let d = Document::parse(
            "<html><head><title>Wrong - Site</title></head><body><h1>Breaking News</h1></body></html>",
            "https://example.com/post",
            Some(rule),
        )
        .unwrap();
        assert_eq!(extract_title(&d), "Breaking News");
    }

    #[test]
    fn test_title_tag_with_suffix_stripped() {
        let d = doc(concat!(
            "<html><head><title>一个足够长的文章标题在这里 - 新浪</title></head>",
            "<body><p>x</p></body></html>"
        ));
        assert_eq!(extract_title(&d), "一个足够长的文章标题在这里");
    }

    #[test]
    fn test_short_title_keeps_suffix() {
        let d = doc("<html><head><title>短 - 很长很长的站点名称占比很大</title></head><body><p>x</p></body></html>");
        let title = extract_title(&d);
        assert!(title.contains('短'));
        assert!(title.contains("站点名称"));
    }

    #[test]
    fn test_bracket_noise_stripped() {
        let d = doc("<html><head><title>【独家报道这是一个长标题】</title></head><body><p>x</p></body></html>");
        assert_eq!(extract_title(&d), "独家报道这是一个长标题");
    }

    #[test]
    fn test_heading_fallback() {
        let d = doc("<html><body><h2>Only Heading</h2><p>x</p></body></html>");
        assert_eq!(extract_title(&d), "Only Heading");
    }
}
