//! Author extraction: site rule → meta tags → attribute heuristics →
//! byline keyword regex → script variables. Also recovers a structured
//! author profile from script globals some platforms embed.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::consts::{
    AUTHOR_KEYWORDS, AUTHOR_META_KEYS, RE_AUTHOR_DESCRIPTION, RE_AUTHOR_ID, RE_AUTHOR_NAME,
    RE_PROFILE_IMG,
};
use crate::doc::{Document, RulePath};
use crate::extract::{extract_by_path, meta_map};
use crate::meta::AuthorProfile;

/// Elements whose attributes advertise an author byline, minus the usual
/// false friends (footers, statements, comment sections).
const AUTHOR_NODE_PATH: &str = concat!(
    r#"//*[(@*="author" or contains(@*,"author") or contains(@*,"Author") or contains(@*,"作者"))"#,
    r#" and not(contains(@*,"footer")) and not(contains(@*,"statement"))"#,
    r#" and not(contains(@*,"authorize")) and not(contains(@*,"comment"))]"#,
);

static RE_AUTHOR_BYLINE: LazyLock<Regex> = LazyLock::new(|| {
    let keywords: Vec<String> = AUTHOR_KEYWORDS
        .iter()
        .map(|keyword| {
            let chars: Vec<char> = keyword.chars().collect();
            if chars.len() == 2 {
                // tolerate one space wedged between the two characters
                format!("{}\\s{{0,1}}{}", chars[0], chars[1])
            } else {
                (*keyword).to_string()
            }
        })
        .collect();
    Regex::new(&format!(
        "({})\\s*[：|:| |丨|/]\\s*([\\p{{Han}}a-zA-Z]{{2,20}})",
        keywords.join("|")
    ))
    .unwrap()
});

pub fn extract_author(doc: &Document) -> String {
    match doc.rule_path(|r| r.author.as_str()) {
        Some(RulePath::Disabled) => return String::new(),
        Some(RulePath::Path(path)) => {
            let result = extract_by_path(doc, path);
            if !result.trim().is_empty() {
                return result.trim().to_string();
            }
        }
        None => {}
    }

    for source in [by_meta, by_node, by_regex] {
        let author = source(doc);
        if !author.trim().is_empty() {
            return author.trim().to_string();
        }
    }
    String::new()
}

fn by_meta(doc: &Document) -> String {
    let map = meta_map(doc);
    AUTHOR_META_KEYS
        .iter()
        .find_map(|key| map.get(*key).cloned())
        .unwrap_or_default()
}

fn by_node(doc: &Document) -> String {
    for elem in doc.query(AUTHOR_NODE_PATH) {
        let text = doc.arena().text(elem).trim();
        if !text.is_empty() {
            return text.to_string();
        }
    }
    String::new()
}

fn by_regex(doc: &Document) -> String {
    let text = doc.raw_text(doc.root());
    if let Some(caps) = RE_AUTHOR_BYLINE.captures(&text) {
        return caps[2].to_string();
    }
    if let Some(caps) = RE_AUTHOR_NAME.captures(&text) {
        return caps[1].to_string();
    }
    String::new()
}

/// Structured author profile: name plus uid/description/avatar recovered
/// from platform script globals.
pub fn extract_author_profile(doc: &Document) -> AuthorProfile {
    AuthorProfile {
        name: extract_author(doc),
        uid: extract_uid(doc),
        description: RE_AUTHOR_DESCRIPTION
            .captures(doc.raw_html())
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default(),
        profile_url: RE_PROFILE_IMG
            .captures(doc.raw_html())
            .map(|c| c[1].to_string())
            .unwrap_or_default(),
    }
}

fn extract_uid(doc: &Document) -> String {
    let map = meta_map(doc);
    if let Some(og_url) = map.get("og:url") {
        if let Ok(parsed) = Url::parse(og_url) {
            if let Some((_, biz)) = parsed.query_pairs().find(|(k, _)| k == "__biz") {
                if !biz.is_empty() {
                    return biz.into_owned();
                }
            }
        }
    }
    RE_AUTHOR_ID
        .captures(doc.raw_html())
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}
