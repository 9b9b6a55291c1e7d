//! The Document: a position-addressable view over the arena DOM.
//!
//! Every element that survives preprocessing carries a unique, stable
//! position id for the lifetime of the Document. Atoms and sentences refer
//! to the tree only through those ids; [`Document::resolve`] is the single
//! dereference point and may legitimately return `None` after mutation.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::consts::{
    EMPTY_EXTRACT_PATH, FURNITURE_CLASSES, IMG_ATTRS, TEXT_SKIP_TAGS, USELESS_TAGS,
};
use crate::dom::{Arena, Attr, NodeData, NodeId, parse_html, serialize_node};
use crate::error::{Error, Result};
use crate::meta::ArticleMeta;
use crate::path::{Backend, PathExpr, evaluate_general, evaluate_simple, select_backend};
use crate::rule::SiteRule;
use crate::util;

static RE_TEXTAREA_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<textarea\b([^>]*)>").unwrap());
static RE_TEXTAREA_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</textarea>").unwrap());
static RE_VALID_ATTR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").unwrap());

/// Decode raw page bytes: UTF-8 first, then the common simplified-Chinese
/// encodings.
pub fn decode_html_bytes(content: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(content) {
        return s.to_string();
    }
    for encoding in [encoding_rs::GBK, encoding_rs::GB18030] {
        let (decoded, _, had_errors) = encoding.decode(content);
        if !had_errors && !decoded.is_empty() {
            return decoded.into_owned();
        }
    }
    String::from_utf8_lossy(content).into_owned()
}

pub struct Document {
    arena: Arena,
    root: NodeId,
    pub url: String,
    pub rule: Option<SiteRule>,
    raw_html: String,
    max_position_id: u32,
    xpath_cache: HashMap<u32, String>,
    pid_index: HashMap<u32, NodeId>,
    tag_index: HashMap<String, Vec<NodeId>>,
    order: HashMap<NodeId, u32>,
    /// Stylesheet links / math scripts captured during preprocessing.
    reserved: Vec<NodeId>,
}

impl Document {
    /// Parse raw page HTML: repair, preprocess, assign the position-id
    /// skeleton and build the query caches.
    pub fn parse(html: &str, url: &str, rule: Option<SiteRule>) -> Result<Document> {
        if html.trim().is_empty() {
            return Err(Error::Parse("empty input".into()));
        }
        let repaired = replace_textarea(html);
        let arena = parse_html(&repaired);
        let root = arena
            .find_by_tag(arena.document(), "html")
            .ok_or_else(|| Error::Parse("no root element".into()))?;

        let mut doc = Document {
            arena,
            root,
            url: url.to_string(),
            rule,
            raw_html: html.to_string(),
            max_position_id: 0,
            xpath_cache: HashMap::new(),
            pid_index: HashMap::new(),
            tag_index: HashMap::new(),
            order: HashMap::new(),
            reserved: Vec::new(),
        };
        doc.preprocess();
        doc.set_skeleton();
        doc.rebuild_caches();
        Ok(doc)
    }

    /// Decode then parse raw page bytes.
    pub fn from_bytes(content: &[u8], url: &str, rule: Option<SiteRule>) -> Result<Document> {
        let html = decode_html_bytes(content);
        Document::parse(&html, url, rule)
    }

    /// Re-load HTML produced by an earlier pipeline stage. No preprocessing
    /// and no re-numbering: position ids are read back from serialized
    /// attributes.
    pub fn load(html: &str, url: &str, rule: Option<SiteRule>) -> Result<Document> {
        if html.trim().is_empty() {
            return Err(Error::Parse("empty input".into()));
        }
        let arena = parse_html(html);
        let root = arena
            .find_by_tag(arena.document(), "html")
            .or_else(|| arena.find_by_tag(arena.document(), "body"))
            .ok_or_else(|| Error::Parse("no root element".into()))?;
        let mut doc = Document {
            arena,
            root,
            url: url.to_string(),
            rule,
            raw_html: html.to_string(),
            max_position_id: 0,
            xpath_cache: HashMap::new(),
            pid_index: HashMap::new(),
            tag_index: HashMap::new(),
            order: HashMap::new(),
            reserved: Vec::new(),
        };
        doc.rebuild_caches();
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn raw_html(&self) -> &str {
        &self.raw_html
    }

    pub fn max_position_id(&self) -> u32 {
        self.max_position_id
    }

    /// Hand out a fresh position id for a synthesized node. Ids never
    /// decrease, so removed elements' ids are never reissued.
    pub fn next_position_id(&mut self) -> u32 {
        self.max_position_id += 1;
        self.max_position_id
    }

    /// Assign a fresh position id to an attached synthesized node and
    /// register it with the caches; its xpath is derived lazily from the
    /// live parent's cached path.
    pub fn register_synthetic(&mut self, id: NodeId) -> u32 {
        let pid = self.next_position_id();
        self.arena.set_position_id(id, pid);
        self.pid_index.insert(pid, id);
        let parent = self.arena.parent(id);
        let parent_pid = self.arena.position_id(parent);
        let base = self
            .xpath_cache
            .get(&parent_pid)
            .cloned()
            .unwrap_or_default();
        self.xpath_cache
            .insert(pid, format!("{}/{}", base, self.arena.tag(id)));
        if let Some(&ord) = self.order.get(&parent) {
            self.order.insert(id, ord);
        }
        self.tag_index
            .entry(self.arena.tag(id).to_string())
            .or_default()
            .push(id);
        pid
    }

    // -- preprocessing ------------------------------------------------------

    fn preprocess(&mut self) {
        let reserved_tags: Vec<String> = self
            .rule
            .as_ref()
            .map(|r| r.reserved_nodes.clone())
            .unwrap_or_default();
        let root = self.root;
        self.preprocess_node(root, &reserved_tags);
    }

    fn preprocess_node(&mut self, id: NodeId, reserved_tags: &[String]) {
        let children: Vec<NodeId> = self.arena.children(id).collect();
        for child in children {
            if !self.preprocess_keep(child, reserved_tags) {
                continue;
            }
            self.preprocess_node(child, reserved_tags);
        }
    }

    /// Returns false when the node was removed and must not be descended
    /// into.
    fn preprocess_keep(&mut self, id: NodeId, reserved_tags: &[String]) -> bool {
        let is_comment = self
            .arena
            .get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Comment(_)));
        if is_comment {
            self.arena.detach(id);
            return false;
        }
        if !self.arena.is_element(id) {
            return false;
        }

        let tag = self.arena.tag(id).to_string();

        // Accessibility-hidden subtrees are invisible, except inline svg
        // which some sites mark aria-hidden while still rendering it.
        if self.arena.attr(id, "aria-hidden") == Some("true") && tag != "svg" {
            self.arena.detach(id);
            return false;
        }
        if let Some(style) = self.arena.attr(id, "style") {
            if style.contains("display: none") || style.contains("display:none") {
                self.arena.detach(id);
                return false;
            }
        }

        if tag == "iframe" {
            self.arena.clear_children(id);
            return false;
        }

        if USELESS_TAGS.contains(&tag.as_str()) && !reserved_tags.iter().any(|t| *t == tag) {
            self.capture_reserved(id, &tag);
            self.arena.detach(id);
            return false;
        }

        if FURNITURE_CLASSES
            .iter()
            .any(|c| self.arena.attr(id, "class") == Some(*c))
        {
            self.arena.detach(id);
            return false;
        }

        if let Some(e) = self.arena.element_mut(id) {
            e.attrs.retain(|a| RE_VALID_ATTR_NAME.is_match(&a.name));
        }
        true
    }

    /// Stylesheet links, inline styles and math-rendering scripts removed by
    /// preprocessing are kept aside for later re-attachment.
    fn capture_reserved(&mut self, id: NodeId, tag: &str) {
        let keep = match tag {
            "style" => true,
            "script" => self
                .arena
                .attr(id, "src")
                .is_some_and(|src| src.contains("math")),
            "link" => self.arena.attr(id, "rel") == Some("stylesheet"),
            _ => false,
        };
        if !keep {
            return;
        }
        let attrs: Vec<Attr> = self
            .arena
            .element(id)
            .map(|e| e.attrs.clone())
            .unwrap_or_default();
        let text = self.arena.text(id).to_string();
        let copy = self.arena.create_named(tag);
        if let Some(e) = self.arena.element_mut(copy) {
            e.attrs = attrs;
            e.text = text;
        }
        if let Some(href) = self.arena.attr(copy, "href") {
            let abs = util::ensure_link_absolute(href, &self.url);
            self.arena.set_attr(copy, "href", &abs);
        }
        self.reserved.push(copy);
    }

    /// Assign position ids to every element in document order.
    fn set_skeleton(&mut self) {
        self.max_position_id = 0;
        for id in self.walk(self.root) {
            let pid = self.next_position_id();
            self.arena.set_position_id(id, pid);
        }
    }

    // -- caches -------------------------------------------------------------

    /// Rebuild the pid/tag/order indexes and the pid→xpath cache from the
    /// current tree; the position-id counter only ever grows.
    pub fn rebuild_caches(&mut self) {
        self.xpath_cache.clear();
        self.pid_index.clear();
        self.tag_index.clear();
        self.order.clear();

        let ids = self.walk(self.root);
        for (i, id) in ids.iter().enumerate() {
            self.order.insert(*id, i as u32);
            let pid = self.arena.position_id(*id);
            if pid != 0 {
                self.pid_index.insert(pid, *id);
                self.max_position_id = self.max_position_id.max(pid);
            }
            self.tag_index
                .entry(self.arena.tag(*id).to_string())
                .or_default()
                .push(*id);
        }

        let root = self.root;
        self.cache_xpath(root, 0, "");
    }

    fn cache_xpath(&mut self, id: NodeId, rank: usize, base: &str) {
        let tag = self.arena.tag(id).to_string();
        let own = if rank == 0 {
            format!("{base}/{tag}")
        } else {
            format!("{base}/{tag}[{rank}]")
        };
        let pid = self.arena.position_id(id);
        if pid != 0 {
            self.xpath_cache.insert(pid, own.clone());
        }

        let children: Vec<NodeId> = self
            .arena
            .children(id)
            .filter(|&c| self.arena.is_element(c))
            .collect();
        let mut tag_counts: HashMap<String, usize> = HashMap::new();
        for &child in &children {
            *tag_counts.entry(self.arena.tag(child).to_string()).or_default() += 1;
        }
        let mut tag_seen: HashMap<String, usize> = HashMap::new();
        for child in children {
            let child_tag = self.arena.tag(child).to_string();
            let seen = tag_seen.entry(child_tag.clone()).or_default();
            *seen += 1;
            let child_rank = if tag_counts[&child_tag] == 1 { 0 } else { *seen };
            self.cache_xpath(child, child_rank, &own);
        }
    }

    /// Cached xpath for an element; "" for nodes synthesized after the last
    /// cache rebuild that were never registered.
    pub fn xpath_of(&self, id: NodeId) -> &str {
        let pid = self.arena.position_id(id);
        self.xpath_cache.get(&pid).map(String::as_str).unwrap_or("")
    }

    pub fn position_id(&self, id: NodeId) -> u32 {
        self.arena.position_id(id)
    }

    /// Dereference a position id. Returns `None` for ids whose element no
    /// longer hangs off the working tree — a normal condition after
    /// mutation, not an error.
    pub fn resolve(&self, pid: u32) -> Option<NodeId> {
        let id = *self.pid_index.get(&pid)?;
        if self.is_attached(id) { Some(id) } else { None }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        let mut hops = 0;
        while cur.is_some() {
            if cur == self.root {
                return true;
            }
            cur = self.arena.parent(cur);
            hops += 1;
            if hops > self.arena.len() {
                return false;
            }
        }
        false
    }

    // -- traversal and queries ---------------------------------------------

    /// All elements of the subtree in document order (root included), with a
    /// per-call visited set guarding against malformed back-edges.
    pub fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !self.arena.is_element(id) {
                continue;
            }
            if !visited.insert(id) {
                warn!("traversal revisited node; aborting branch");
                continue;
            }
            out.push(id);
            let mut children: Vec<NodeId> = self.arena.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Query from the document root.
    pub fn query(&self, path: &str) -> Vec<NodeId> {
        self.query_from(self.arena.document(), path, true)
    }

    /// Query relative to an element.
    pub fn relative_query(&self, node: NodeId, path: &str) -> Vec<NodeId> {
        self.query_from(node, path, false)
    }

    fn query_from(&self, start: NodeId, path: &str, from_root: bool) -> Vec<NodeId> {
        let Some(expr) = PathExpr::parse(path) else {
            warn!(path, "unsupported path expression");
            return Vec::new();
        };
        match select_backend(&expr) {
            Backend::Simple => {
                let index = if from_root { Some(&self.tag_index) } else { None };
                evaluate_simple(&self.arena, start, &expr, &self.order, index)
            }
            Backend::General => evaluate_general(&self.arena, start, &expr, &self.order),
        }
    }

    /// Detach an element from its parent.
    pub fn remove_element(&mut self, id: NodeId) -> Result<()> {
        if self.arena.parent(id).is_none() {
            return Err(Error::Detach);
        }
        self.arena.detach(id);
        Ok(())
    }

    /// Remove every element the path selects. Missing matches are a no-op.
    pub fn remove_by_path(&mut self, path: &str) {
        for id in self.query(path) {
            if let Err(err) = self.remove_element(id) {
                warn!(%err, "remove_by_path skipped element");
            }
        }
    }

    /// Swap in a new working root (used by the cleaner to install a trimmed
    /// copy) and rebuild the caches. The new root is re-anchored under the
    /// arena's document node so absolute queries keep working.
    pub fn reset_subtree(&mut self, new_root: NodeId) -> Result<()> {
        if !self.arena.is_element(new_root) {
            return Err(Error::Parse("reset target is not an element".into()));
        }
        let doc_node = self.arena.document();
        let old_root = self.root;
        if old_root != new_root {
            self.arena.detach(old_root);
        }
        self.arena.detach(new_root);
        self.arena.append(doc_node, new_root);
        self.root = new_root;
        self.rebuild_caches();
        Ok(())
    }

    // -- text extraction ----------------------------------------------------

    fn text_skipped(&self, id: NodeId) -> bool {
        if TEXT_SKIP_TAGS.contains(&self.arena.tag(id)) {
            return true;
        }
        if let Some(style) = self.arena.attr(id, "style") {
            let compact = style.replace(' ', "").to_lowercase();
            if compact.contains("display:none") {
                return true;
            }
        }
        self.arena
            .classes(id)
            .iter()
            .any(|c| *c == "hidden")
    }

    /// Visible text of a subtree, one trimmed piece per text run, joined
    /// with newlines. The subtree root's own tail is excluded.
    pub fn raw_text(&self, root: NodeId) -> String {
        self.collect_text(root, false)
    }

    /// Like [`Self::raw_text`] but including the root's tail text.
    pub fn raw_text_with_tail(&self, root: NodeId) -> String {
        self.collect_text(root, true)
    }

    fn collect_text(&self, root: NodeId, with_tail: bool) -> String {
        if !self.arena.is_element(root) {
            return String::new();
        }
        if TEXT_SKIP_TAGS.contains(&self.arena.tag(root)) {
            return String::new();
        }

        enum Ev {
            Open(NodeId),
            Tail(NodeId),
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut push = |s: &str| {
            let t = s.trim();
            if !t.is_empty() {
                pieces.push(t.to_string());
            }
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![Ev::Open(root)];
        while let Some(ev) = stack.pop() {
            match ev {
                Ev::Open(id) => {
                    if !visited.insert(id) {
                        continue;
                    }
                    if self.text_skipped(id) {
                        continue;
                    }
                    push(self.arena.text(id));
                    let children: Vec<NodeId> = self
                        .arena
                        .children(id)
                        .filter(|&c| self.arena.is_element(c))
                        .collect();
                    for &child in children.iter().rev() {
                        stack.push(Ev::Tail(child));
                        stack.push(Ev::Open(child));
                    }
                }
                Ev::Tail(id) => push(self.arena.tail(id)),
            }
        }
        if with_tail {
            push(self.arena.tail(root));
        }
        pieces.join("\n").trim().to_string()
    }

    pub fn has_text(&self, id: NodeId) -> bool {
        !util::clean(&self.raw_text(id)).is_empty()
    }

    /// An image that can actually render: inline svg with content, or an img
    /// carrying one of the known source attributes.
    pub fn is_valid_image(&self, id: NodeId) -> bool {
        let tag = self.arena.tag(id);
        if tag == "svg" && self.arena.children(id).next().is_some() {
            return true;
        }
        tag == "img"
            && IMG_ATTRS
                .iter()
                .any(|key| !self.arena.attr_or(id, key, "").is_empty())
    }

    pub fn is_valid_video(&self, id: NodeId) -> bool {
        self.arena.tag(id) == "video"
    }

    pub fn has_image(&self, id: NodeId) -> bool {
        self.walk(id).into_iter().any(|n| self.is_valid_image(n))
    }

    pub fn has_video(&self, id: NodeId) -> bool {
        self.walk(id).into_iter().any(|n| self.is_valid_video(n))
    }

    fn subtree_has_media(&self, id: NodeId) -> bool {
        self.walk(id)
            .into_iter()
            .any(|n| self.is_valid_image(n) || self.is_valid_video(n))
    }

    /// Climb to the outermost ancestor whose visible text is exactly this
    /// element's text; stops as soon as the wider subtree pulls in media.
    pub fn most_top_elem(&self, elem: NodeId) -> NodeId {
        let text = util::clean(&self.raw_text(elem));
        let mut current = elem;
        loop {
            let parent = self.arena.parent(current);
            if !self.arena.is_element(parent) {
                break;
            }
            if self.subtree_has_media(parent) {
                break;
            }
            if util::clean(&self.raw_text(parent)) == text {
                current = parent;
            } else {
                break;
            }
        }
        current
    }

    // -- supplemental operations -------------------------------------------

    /// Absolute image urls in document order.
    pub fn images(&self) -> Vec<String> {
        let mut out = Vec::new();
        for id in self.query("//img") {
            for key in IMG_ATTRS {
                let value = self.arena.attr_or(id, key, "");
                if value.starts_with("http") {
                    out.push(value.to_string());
                }
            }
        }
        out
    }

    /// Map from absolute image url to the owning element's position id.
    pub fn images_with_position_id(&self) -> HashMap<String, u32> {
        let mut out = HashMap::new();
        for id in self.query("//img") {
            let pid = self.arena.position_id(id);
            for key in IMG_ATTRS {
                let value = self.arena.attr_or(id, key, "");
                if value.starts_with("http") {
                    out.insert(value.to_string(), pid);
                }
            }
        }
        out
    }

    fn head(&mut self) -> NodeId {
        if let Some(&head) = self.query("//head").first() {
            return head;
        }
        let head = self.arena.create_named("head");
        let root = self.root;
        self.arena.insert_child_at(root, 0, head);
        self.register_synthetic(head);
        head
    }

    /// Re-attach the reserved stylesheet/math nodes captured during
    /// preprocessing.
    pub fn add_reserved_nodes(&mut self) {
        if self.reserved.is_empty() {
            return;
        }
        let head = self.head();
        let nodes = std::mem::take(&mut self.reserved);
        for node in nodes {
            self.arena.append(head, node);
        }
    }

    /// Write extracted metadata back into `<head>` so the reader document is
    /// self-describing.
    pub fn insert_meta(&mut self, meta: &ArticleMeta) {
        let head = self.head();
        let mut add_meta = |doc: &mut Self, name: &str, content: &str| {
            if content.is_empty() {
                return;
            }
            let elem = doc.arena.create_named("meta");
            doc.arena.set_attr(elem, "name", name);
            doc.arena.set_attr(elem, "content", content);
            doc.arena.insert_child_at(head, 0, elem);
        };
        add_meta(self, "description", &meta.description);
        add_meta(self, "og:image", &meta.cover_image);
        add_meta(self, "pubtime", &meta.publish_time);
        add_meta(self, "author", &meta.author);
        if !meta.site_icon.is_empty() {
            let link = self.arena.create_named("link");
            self.arena.set_attr(link, "rel", "icon");
            self.arena.set_attr(link, "href", &meta.site_icon);
            self.arena.insert_child_at(head, 0, link);
        }
        if !meta.title.is_empty() {
            let title = self.arena.create_named("title");
            self.arena.set_text(title, &meta.title);
            self.arena.insert_child_at(head, 0, title);
        }
    }

    /// Serialize the working tree to reader HTML.
    pub fn to_html(&self) -> String {
        serialize_node(&self.arena, self.root)
    }

    /// The site rule's extractor path for a field, honoring the "empty"
    /// sentinel that disables extraction. Returns `None` when no usable path
    /// exists.
    pub fn rule_path(
        &self,
        select: impl for<'r> Fn(&'r SiteRule) -> &'r str,
    ) -> Option<RulePath<'_>> {
        let rule = self.rule.as_ref()?;
        let path = select(rule);
        if path.is_empty() {
            return None;
        }
        if path == EMPTY_EXTRACT_PATH {
            return Some(RulePath::Disabled);
        }
        Some(RulePath::Path(path))
    }
}

/// Site-rule extractor path resolution.
pub enum RulePath<'a> {
    /// Extraction explicitly disabled for this host.
    Disabled,
    Path(&'a str),
}

fn replace_textarea(html: &str) -> String {
    let replaced = RE_TEXTAREA_OPEN.replace_all(html, "<div$1>");
    RE_TEXTAREA_CLOSE.replace_all(&replaced, "</div>").into_owned()
}
