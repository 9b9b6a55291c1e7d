//! Crate-private helpers: whitespace cleaning, inline-style maps, color
//! classification, absolute links, xpath string helpers, union-find.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::consts::{GOLD_TAG_MAPPING, PARAGRAPH_XPATH_TAGS};

static RE_COLLAPSE_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n\s*").unwrap());
static RE_COLLAPSE_TABS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t|[ \t]{2,}").unwrap());
static RE_ANY_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\p{Zs}]+").unwrap());

/// Normalize whitespace and smart punctuation the way the heuristics expect.
pub fn clean(value: &str) -> String {
    let v = RE_COLLAPSE_NEWLINES.replace_all(value, "\n");
    let v = RE_COLLAPSE_TABS.replace_all(&v, " ");
    let v = v
        .replace(['‘', '’'], "'")
        .replace(['“', '”'], "\"")
        .replace('…', "....")
        .replace(['—', '–'], "-");
    v.trim().to_string()
}

/// Drop every whitespace character, Unicode spaces included.
pub fn remove_space(value: &str) -> String {
    RE_ANY_SPACE.replace_all(value, "").into_owned()
}

/// Parse an inline `style` attribute into a declaration map.
pub fn style_map(style: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for decl in style.split(';') {
        if let Some((key, val)) = decl.split_once(':') {
            let (key, val) = (key.trim(), val.trim());
            if !key.is_empty() && !val.is_empty() {
                map.insert(key.to_string(), val.to_string());
            }
        }
    }
    map
}

/// Render a declaration map back to a `style` value, in sorted key order so
/// output is deterministic.
pub fn style_map_to_string(map: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}: {}", k, map[*k]))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Perceived brightness (ITU-R BT.601 weights).
fn is_dark_rgb(r: i64, g: i64, b: i64) -> bool {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * (b as f64) < 128.0
}

fn hex_is_dark(hex: &str) -> bool {
    let hex = hex.trim_start_matches('#');
    let hex = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect::<String>()
    } else {
        hex.to_string()
    };
    if hex.len() != 6 {
        return false;
    }
    let parse = |s: &str| i64::from_str_radix(s, 16).ok();
    match (parse(&hex[0..2]), parse(&hex[2..4]), parse(&hex[4..6])) {
        (Some(r), Some(g), Some(b)) => is_dark_rgb(r, g, b),
        _ => false,
    }
}

static RE_RGB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rgba?\(\d+,\s*\d+,\s*\d+").unwrap());
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static RE_HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([0-9a-fA-F]{3}){1,2}").unwrap());

pub fn is_dark_color(color: &str) -> bool {
    if color.is_empty() {
        return false;
    }
    let lower = color.to_lowercase();
    if lower.contains("black") || lower.contains("dark") {
        return true;
    }
    if RE_RGB.is_match(color) {
        let dims: Vec<i64> = RE_DIGITS
            .find_iter(color)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if dims.len() >= 3 && is_dark_rgb(dims[0], dims[1], dims[2]) {
            return true;
        }
    }
    if let Some(m) = RE_HEX_COLOR.find(color) {
        if hex_is_dark(m.as_str()) {
            return true;
        }
    }
    false
}

pub fn is_white_color(color: &str) -> bool {
    if color.is_empty() {
        return false;
    }
    matches!(color, "#ffffff" | "#fff" | "white" | "transparent") || {
        let compact = color.replace(' ', "");
        compact == "rgb(255,255,255)" || compact == "rgba(255,255,255,1)"
    }
}

/// Resolve a possibly-relative link against the page url.
pub fn ensure_link_absolute(link: &str, page_url: &str) -> String {
    if link.starts_with("http") {
        return link.to_string();
    }
    if let Some(rest) = link.strip_prefix("//") {
        return format!("http://{rest}");
    }
    if link.starts_with("://") {
        return format!("http{link}");
    }
    match Url::parse(page_url) {
        Ok(base) => match base.join(link) {
            Ok(joined) => joined.to_string(),
            Err(_) => link.to_string(),
        },
        Err(_) => link.to_string(),
    }
}

pub fn url_host(page_url: &str) -> String {
    Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

static RE_XPATH_IDX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Truncate an xpath at its deepest enclosing paragraph-level tag.
pub fn paragraph_xpath(xpath: &str) -> String {
    let parts: Vec<&str> = xpath.split('/').collect();
    let mut cut = parts.len();
    for (i, part) in parts.iter().enumerate() {
        let name = RE_XPATH_IDX.replace(part, "");
        if PARAGRAPH_XPATH_TAGS.contains(&name.as_ref()) {
            cut = i + 1;
        }
    }
    parts[..cut].join("/")
}

/// Map xpath components onto the coarse tag set the labeler understands.
pub fn xpath_to_tags(xpath: &str) -> Vec<String> {
    if xpath.is_empty() {
        return Vec::new();
    }
    let stripped = RE_XPATH_IDX.replace_all(xpath, "");
    let mut tags: Vec<String> = stripped
        .split('/')
        .filter_map(|item| {
            GOLD_TAG_MAPPING
                .iter()
                .find(|(from, _)| *from == item)
                .map(|(_, to)| to.to_string())
        })
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Xpath components with positional indexes removed.
pub fn split_xpath(xpath: &str) -> Vec<String> {
    if xpath.is_empty() {
        return Vec::new();
    }
    xpath
        .split('/')
        .map(|item| RE_XPATH_IDX.replace_all(item, "").into_owned())
        .collect()
}

/// Set of xpaths whose subtrees have been consumed; `covers` asks whether a
/// node lies at or below any recorded path.
#[derive(Default)]
pub struct PrefixSet {
    paths: Vec<String>,
}

impl PrefixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, xpath: &str) {
        if !xpath.is_empty() {
            self.paths.push(xpath.to_string());
        }
    }

    pub fn covers(&self, xpath: &str) -> bool {
        if xpath.is_empty() {
            return false;
        }
        self.paths.iter().any(|p| {
            xpath == p || (xpath.len() > p.len() && xpath.starts_with(p) && xpath.as_bytes()[p.len()] == b'/')
        })
    }
}

/// Union-find over arbitrary hashable keys. Constructed fresh per call site;
/// path compression + union by rank.
pub struct UnionFind<T: std::hash::Hash + Eq + Copy> {
    parent: HashMap<T, T>,
    rank: HashMap<T, u32>,
}

impl<T: std::hash::Hash + Eq + Copy> UnionFind<T> {
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }

    pub fn find(&mut self, p: T) -> T {
        let entry = *self.parent.entry(p).or_insert(p);
        if entry == p {
            return p;
        }
        let root = self.find(entry);
        self.parent.insert(p, root);
        root
    }

    pub fn union(&mut self, p: T, q: T) {
        let root_p = self.find(p);
        let root_q = self.find(q);
        if root_p == root_q {
            return;
        }
        let rank_p = *self.rank.get(&root_p).unwrap_or(&1);
        let rank_q = *self.rank.get(&root_q).unwrap_or(&1);
        if rank_p > rank_q {
            self.parent.insert(root_q, root_p);
        } else if rank_p < rank_q {
            self.parent.insert(root_p, root_q);
        } else {
            self.parent.insert(root_q, root_p);
            self.rank.insert(root_p, rank_p + 1);
        }
    }

    /// Roots of all recorded keys, in no particular order.
    pub fn roots(&mut self) -> Vec<T> {
        let keys: Vec<T> = self.parent.keys().copied().collect();
        let mut roots: Vec<T> = keys.into_iter().map(|k| self.find(k)).collect();
        let mut seen = std::collections::HashSet::new();
        roots.retain(|r| seen.insert(*r));
        roots
    }
}

impl<T: std::hash::Hash + Eq + Copy> Default for UnionFind<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_whitespace() {
        assert_eq!(clean("  a\t\tb  \n\n  c  "), "a b\nc");
        assert_eq!(clean("“quoted”"), "\"quoted\"");
    }

    #[test]
    fn test_remove_space() {
        assert_eq!(remove_space("a b\u{00a0}c\nd"), "abcd");
    }

    #[test]
    fn test_style_map_round_trip() {
        let map = style_map("color: red; font-weight:bold;;broken");
        assert_eq!(map.get("color").map(String::as_str), Some("red"));
        assert_eq!(map.get("font-weight").map(String::as_str), Some("bold"));
        assert_eq!(map.len(), 2);
        let rendered = style_map_to_string(&map);
        assert_eq!(rendered, "color: red; font-weight: bold");
    }

    #[test]
    fn test_colors() {
        assert!(is_white_color("#fff"));
        assert!(is_white_color("rgb(255, 255, 255)"));
        assert!(!is_white_color("#eee"));
        assert!(is_dark_color("#000"));
        assert!(is_dark_color("rgb(10, 20, 30)"));
        assert!(is_dark_color("darkslategray"));
        assert!(!is_dark_color("rgb(250, 250, 250)"));
    }

    #[test]
    fn test_ensure_link_absolute() {
        let page = "https://example.com/articles/post.html";
        assert_eq!(
            ensure_link_absolute("/img/a.png", page),
            "https://example.com/img/a.png"
        );
        assert_eq!(
            ensure_link_absolute("../b.png", page),
            "https://example.com/b.png"
        );
        assert_eq!(
            ensure_link_absolute("//cdn.example.com/c.png", page),
            "http://cdn.example.com/c.png"
        );
        assert_eq!(
            ensure_link_absolute("https://other.com/d.png", page),
            "https://other.com/d.png"
        );
    }

    #[test]
    fn test_paragraph_xpath() {
        assert_eq!(
            paragraph_xpath("/html/body/div[2]/p/span"),
            "/html/body/div[2]/p"
        );
        assert_eq!(paragraph_xpath("/html/body/span"), "/html/body/span");
        assert_eq!(
            paragraph_xpath("/html/body/section/ul/li[3]/em"),
            "/html/body/section/ul/li[3]"
        );
    }

    #[test]
    fn test_xpath_to_tags() {
        let tags = xpath_to_tags("/html/body/ul/li[2]/strong");
        assert_eq!(tags, vec!["li".to_string(), "strong".to_string()]);
    }

    #[test]
    fn test_prefix_set_covers() {
        let mut set = PrefixSet::new();
        set.insert("/html/body/div[1]");
        assert!(set.covers("/html/body/div[1]"));
        assert!(set.covers("/html/body/div[1]/p"));
        assert!(!set.covers("/html/body/div[2]"));
        assert!(!set.covers("/html/body/divx"));
    }

    #[test]
    fn test_union_find_groups() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        uf.union(1, 2);
        uf.union(2, 3);
        uf.union(10, 11);
        assert_eq!(uf.find(1), uf.find(3));
        assert_ne!(uf.find(1), uf.find(10));
        assert_eq!(uf.roots().len(), 2);
    }
}
