//! Publish-time extraction and normalization.
//!
//! Sources: site rule → the standard meta-tag gauntlet → script variables →
//! datetime regexes over the raw page. Results are normalized to
//! `YYYY-MM-DD HH:MM:SS` with trailing zero components trimmed; values that
//! defeat every format are returned verbatim.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use crate::consts::{
    DATE_FORMATS, DATETIME_FORMATS, DATETIME_REGEXES, DATETIME_SUBMATCH_PATTERNS,
    NORMALIZED_DATETIME, PUBLISH_TIME_META_PATHS,
};
use crate::doc::{Document, RulePath};
use crate::extract::extract_by_path;

static SUBMATCH_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DATETIME_SUBMATCH_PATTERNS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

pub fn extract_publish_time(doc: &Document) -> String {
    match doc.rule_path(|r| r.pub_time.as_str()) {
        Some(RulePath::Disabled) => return String::new(),
        Some(RulePath::Path(path)) => {
            let result = extract_by_path(doc, path).trim().to_string();
            if !result.is_empty() {
                return normalize_datetime(&resolve_timestamp(&result));
            }
        }
        None => {}
    }

    for source in [by_meta, by_regex] {
        let result = source(doc);
        let result = result.trim();
        if !result.is_empty() {
            return normalize_datetime(&resolve_timestamp(result));
        }
    }
    String::new()
}

fn by_meta(doc: &Document) -> String {
    for path in PUBLISH_TIME_META_PATHS {
        for elem in doc.query(path) {
            let value = doc.arena().attr_or(elem, "content", "");
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    String::new()
}

fn by_regex(doc: &Document) -> String {
    let html = doc.raw_html();
    for regex in SUBMATCH_REGEXES.iter() {
        if let Some(caps) = regex.captures(html) {
            return caps[1].to_string();
        }
    }
    for regex in DATETIME_REGEXES.iter() {
        if let Some(m) = regex.find(html) {
            return m.as_str().to_string();
        }
    }
    String::new()
}

/// Second- or millisecond-resolution unix timestamps become datetimes.
fn resolve_timestamp(value: &str) -> String {
    if value.len() < 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return value.to_string();
    }
    let Ok(mut timestamp) = value.parse::<i64>() else {
        return value.to_string();
    };
    if value.len() == 13 {
        timestamp /= 1000;
    }
    match DateTime::from_timestamp(timestamp, 0) {
        Some(dt) => dt.naive_utc().format(NORMALIZED_DATETIME).to_string(),
        None => value.to_string(),
    }
}

fn try_parse(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalize a datetime string; trailing `:00` seconds and `00:00` midnight
/// components are trimmed. Unparseable input is scanned for an embedded
/// datetime before being returned as-is.
pub fn normalize_datetime(value: &str) -> String {
    if let Some(dt) = try_parse(value) {
        return render(dt);
    }
    debug!(value, "datetime did not match any format, scanning");
    for regex in DATETIME_REGEXES.iter() {
        if let Some(m) = regex.find(value) {
            if let Some(dt) = try_parse(m.as_str()) {
                return render(dt);
            }
        }
    }
    value.to_string()
}

fn render(dt: NaiveDateTime) -> String {
    let formatted = dt.format(NORMALIZED_DATETIME).to_string();
    let formatted = formatted.strip_suffix(":00").unwrap_or(&formatted);
    let formatted = formatted.strip_suffix("00:00").unwrap_or(formatted);
    formatted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_common_shapes() {
        assert_eq!(normalize_datetime("2025-03-06 16:21:33"), "2025-03-06 16:21:33");
        assert_eq!(normalize_datetime("2025-03-06 16:21:00"), "2025-03-06 16:21");
        assert_eq!(normalize_datetime("2025-03-06"), "2025-03-06");
        assert_eq!(normalize_datetime("2025/03/06 16:21"), "2025-03-06 16:21");
        assert_eq!(normalize_datetime("2025年03月06日 16:21"), "2025-03-06 16:21");
        assert_eq!(normalize_datetime("2025-03-06T16:21:33+08:00"), "2025-03-06 16:21:33");
    }

    #[test]
    fn test_normalize_embedded_datetime() {
        assert_eq!(
            normalize_datetime("发布于 2025-03-06 16:21:33 · 北京"),
            "2025-03-06 16:21:33"
        );
    }

    #[test]
    fn test_unparseable_returned_verbatim() {
        assert_eq!(normalize_datetime("someday soon"), "someday soon");
    }

    #[test]
    fn test_timestamp_resolution() {
        assert_eq!(resolve_timestamp("1741277293"), "2025-03-06 16:08:13");
        assert_eq!(resolve_timestamp("1741277293000"), "2025-03-06 16:08:13");
        assert_eq!(resolve_timestamp("not-a-number"), "not-a-number");
    }

    #[test]
    fn test_meta_publish_time() {
        let d = Document::parse(
            concat!(
                "<html><head>",
                r#"<meta property="article:published_time" content="2025-03-06T16:21:33+08:00">"#,
                "</head><body><p>x</p></body></html>"
            ),
            "https://example.com/post",
            None,
        )
        .unwrap();
        assert_eq!(extract_publish_time(&d), "2025-03-06 16:21:33");
    }

    #[test]
    fn test_regex_fallback_from_page_text() {
        let d = Document::parse(
            "<html><body><p>发布时间 2025年3月6日16:21 编辑部</p></body></html>",
            "https://example.com/post",
            None,
        )
        .unwrap();
        assert_eq!(extract_publish_time(&d), "2025-03-06 16:21");
    }

    #[test]
    fn test_script_create_time() {
        let html = "<html><body><script>var createTime = '2025-03-06 16:21:33';</script><p>x</p></body></html>";
        let d = Document::parse(html, "https://example.com/post", None).unwrap();
        assert_eq!(extract_publish_time(&d), "2025-03-06 16:21:33");
    }
}
