//! Post-label subtree merging: contiguous runs of same-label sentences are
//! reshaped into one annotated subtree so the reader can style them as a
//! unit.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::consts::{
    KEY_SUBTREE, MARKER_TAG_PREFIX, PARAGRAPH_MATCH_HIGH, PARAGRAPH_MATCH_LOW,
    PARAGRAPH_MERGE_RATIO, SUBTREE_ABORT_RATIO, SUBTREE_MATCH_HIGH, SUBTREE_MATCH_LOW,
    SUBTREE_RULES, SubtreeRule,
};
use crate::doc::Document;
use crate::dom::NodeId;
use crate::format::execute_label_rule;
use crate::label::LabeledSentence;
use crate::util::{self, UnionFind};

static RE_MARKER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("{MARKER_TAG_PREFIX}.*")).unwrap());

/// Tags that break rendering when nested inside the synthesized wrapper.
const ILLEGAL_NESTED_TAGS: &[&str] = &["p", "div", "ul"];

pub struct SubtreeFormatter<'d, 'l> {
    doc: &'d mut Document,
    labels: &'l [LabeledSentence],
    rules: HashMap<&'static str, SubtreeRule>,
}

impl<'d, 'l> SubtreeFormatter<'d, 'l> {
    pub fn new(doc: &'d mut Document, labels: &'l [LabeledSentence]) -> SubtreeFormatter<'d, 'l> {
        let rules = SUBTREE_RULES.iter().map(|r| (r.rule.label, *r)).collect();
        SubtreeFormatter { doc, labels, rules }
    }

    pub fn format(&mut self) {
        for window in self.windows() {
            let num_atoms: usize = window.iter().map(|s| s.atoms.len()).sum();
            if num_atoms >= 2 {
                self.format_window(&window);
            } else if num_atoms == 1 {
                self.format_atom(window[0]);
            }
        }
    }

    /// Contiguous runs of sentences sharing a subtree-rule label. A window
    /// also closes on a segment change when the rule is same-paragraph-only.
    fn windows(&self) -> Vec<Vec<&'l LabeledSentence>> {
        let mut windows = Vec::new();
        let mut window: Vec<&'l LabeledSentence> = Vec::new();
        for sentence in self.labels {
            let Some(rule) = self.rules.get(sentence.label.as_str()) else {
                if !window.is_empty() {
                    windows.push(std::mem::take(&mut window));
                }
                continue;
            };
            if let Some(first) = window.first() {
                if first.label != sentence.label
                    || (rule.same_paragraph && first.segment_id != sentence.segment_id)
                {
                    windows.push(std::mem::take(&mut window));
                }
            }
            window.push(sentence);
        }
        if !window.is_empty() {
            windows.push(window);
        }
        windows
    }

    /// Cached xpath with any synthetic-marker suffix removed.
    fn orig_xpath(&self, elem: NodeId) -> String {
        let xpath = self.doc.xpath_of(elem);
        RE_MARKER_SUFFIX
            .replace(xpath, "")
            .trim_end_matches('/')
            .to_string()
    }

    fn ancestors(&self, elem: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.doc.arena().parent(elem);
        while self.doc.arena().is_element(cur) {
            out.push(cur);
            cur = self.doc.arena().parent(cur);
        }
        out
    }

    /// An ancestor whose text matches the window's text within the
    /// acceptance band can be tagged directly, with no new node.
    fn try_find_top_parent(&self, joined: &str, initial: NodeId) -> Option<NodeId> {
        let target = util::remove_space(joined).len();
        for parent in self.ancestors(initial) {
            let parent_len = util::remove_space(&self.doc.raw_text(parent)).len();
            if parent_len == 0 {
                continue;
            }
            let rate = target as f32 / parent_len as f32;
            if (SUBTREE_MATCH_LOW..=SUBTREE_MATCH_HIGH).contains(&rate) {
                return Some(parent);
            }
            if rate < SUBTREE_ABORT_RATIO {
                return None;
            }
        }
        None
    }

    /// Replace a paragraph by its common parent when the parent holds
    /// essentially nothing else.
    fn merge_paragraph(&self, paragraph: Vec<NodeId>) -> Vec<NodeId> {
        let content: String = paragraph
            .iter()
            .map(|&e| self.doc.raw_text(e))
            .collect::<Vec<_>>()
            .join("");
        let content_len = util::remove_space(&content).len();
        let Some(&first) = paragraph.first() else {
            return paragraph;
        };
        for parent in self.ancestors(first) {
            let parent_len = util::remove_space(&self.doc.raw_text(parent)).len();
            if parent_len == 0 {
                continue;
            }
            let rate = content_len as f32 / parent_len as f32;
            if (PARAGRAPH_MATCH_LOW..=PARAGRAPH_MATCH_HIGH).contains(&rate) {
                return vec![parent];
            }
            if rate < SUBTREE_ABORT_RATIO {
                return paragraph;
            }
        }
        paragraph
    }

    /// Ancestor chain of `elem` (inclusive) with each node's child index at
    /// record time, used to find a surviving insertion point later.
    fn record_chain(&self, elem: NodeId) -> Vec<(NodeId, usize)> {
        let mut chain = Vec::new();
        let mut cur = elem;
        while self.doc.arena().is_element(cur) {
            chain.push((cur, self.doc.arena().child_index(cur)));
            cur = self.doc.arena().parent(cur);
        }
        chain
    }

    fn format_window(&mut self, window: &[&LabeledSentence]) {
        let Some(rule) = self.rules.get(window[0].label.as_str()).copied() else {
            return;
        };
        let marker_attr = rule.rule.new_attr;

        let mut pid_to_segment: HashMap<u32, u32> = HashMap::new();
        let mut elems: Vec<NodeId> = Vec::new();
        for sentence in window {
            for atom in &sentence.atoms {
                pid_to_segment.insert(atom.position_id, atom.segment_id);
                if let Some(node) = self.doc.resolve(atom.position_id) {
                    if !elems.contains(&node) {
                        elems.push(node);
                    }
                }
            }
        }
        // the injected page title is virtual and resolves to nothing
        if elems.is_empty() {
            return;
        }

        let joined: String = window.iter().map(|s| s.text.as_str()).collect();
        if let Some(top) = self.try_find_top_parent(&util::remove_space(&joined), elems[0]) {
            let most_top = self.doc.most_top_elem(top);
            self.doc.arena_mut().set_attr(most_top, marker_attr, "");
            return;
        }

        elems.sort_by_key(|&e| self.doc.position_id(e));

        // partition into paragraphs on segment-id changes
        let mut paragraphs: Vec<Vec<NodeId>> = Vec::new();
        let mut paragraph: Vec<NodeId> = Vec::new();
        let mut last_segment: u32 = 0;
        for &elem in &elems {
            let segment = pid_to_segment
                .get(&self.doc.position_id(elem))
                .copied()
                .unwrap_or(0);
            if !paragraph.is_empty() && segment != last_segment {
                paragraphs.push(std::mem::take(&mut paragraph));
            }
            last_segment = segment;
            paragraph.push(self.doc.most_top_elem(elem));
        }
        if !paragraph.is_empty() {
            paragraphs.push(paragraph);
        }
        if paragraphs.is_empty() {
            return;
        }
        let paragraphs: Vec<Vec<NodeId>> = paragraphs
            .into_iter()
            .map(|p| self.merge_paragraph(p))
            .collect();

        let mut chain = self.record_chain(paragraphs[0][0]);

        // The finished subtree is assembled detached and inserted with a
        // single call, so a missing insertion point cannot leave the tree
        // half-rewritten.
        let subtree = self.doc.arena_mut().create_named("span");
        self.doc.arena_mut().set_attr(subtree, marker_attr, "");
        self.doc.arena_mut().set_attr(subtree, KEY_SUBTREE, "");

        let num_paragraphs = paragraphs.len();
        for (index, paragraph) in paragraphs.into_iter().enumerate() {
            let mut uf: UnionFind<u32> = UnionFind::new();
            let mut pid_to_elem: HashMap<u32, NodeId> = HashMap::new();
            let mut rank: HashMap<u32, usize> = HashMap::new();
            let mut most_top: Option<(usize, NodeId)> = None;

            for (i, &top) in paragraph.iter().enumerate() {
                let top_pid = self.doc.position_id(top);
                pid_to_elem.insert(top_pid, top);
                rank.insert(top_pid, i);
                for node in self.doc.walk(top) {
                    let pid = self.doc.position_id(node);
                    if pid != 0 {
                        uf.union(top_pid, pid);
                    }
                }
                let depth = self.orig_xpath(top).split('/').count();
                if most_top.is_none_or(|(d, _)| depth < d) {
                    most_top = Some((depth, top));
                }
            }

            let span = self.doc.arena_mut().create_named("span");
            // display:block stands in for a real paragraph container
            self.doc
                .arena_mut()
                .set_attr(span, "style", "display: block; margin: 0;");

            let mut roots: Vec<u32> = uf
                .roots()
                .into_iter()
                .filter(|pid| pid_to_elem.contains_key(pid))
                .collect();
            roots.sort_by_key(|pid| rank.get(pid).copied().unwrap_or(usize::MAX));

            // several sentences already under one parent: tag the parent
            // instead of tearing its children out
            if roots.len() >= 2 {
                if let Some((_, most_top_elem)) = most_top {
                    let parent = self.doc.arena().parent(most_top_elem);
                    if self.doc.arena().is_element(parent) {
                        let paragraph_text: String = roots
                            .iter()
                            .filter_map(|pid| pid_to_elem.get(pid))
                            .map(|&e| self.doc.raw_text(e))
                            .collect();
                        let paragraph_len = util::remove_space(&paragraph_text).len();
                        let parent_len =
                            util::remove_space(&self.doc.raw_text(parent)).len();
                        if parent_len > 0
                            && paragraph_len as f32 / parent_len as f32 >= PARAGRAPH_MERGE_RATIO
                        {
                            let parent = self.doc.most_top_elem(parent);
                            if num_paragraphs == 1 {
                                self.doc.arena_mut().set_attr(parent, marker_attr, "");
                                return;
                            }
                            if index == 0 {
                                chain = self.record_chain(parent);
                            }
                            self.doc.arena_mut().detach(parent);
                            self.doc.arena_mut().append(span, parent);
                            self.doc.arena_mut().append(subtree, span);
                            continue;
                        }
                    }
                }
            }

            for pid in roots {
                let Some(&top) = pid_to_elem.get(&pid) else {
                    continue;
                };
                self.doc.arena_mut().detach(top);
                self.doc.arena_mut().append(span, top);
            }
            self.doc.arena_mut().append(subtree, span);
        }

        // insert at the nearest surviving ancestor of the first detached
        // element, at its recorded child slot
        let mut inserted = false;
        for i in 1..chain.len() {
            let (ancestor, _) = chain[i];
            let pid = self.doc.position_id(ancestor);
            if pid != 0 && self.doc.resolve(pid).is_some() {
                let child_index = chain[i - 1].1;
                self.doc
                    .arena_mut()
                    .insert_child_at(ancestor, child_index, subtree);
                inserted = true;
                break;
            }
        }
        if !inserted {
            warn!("no surviving ancestor for subtree insertion");
            return;
        }

        // register the synthesized nodes now that they are attached
        let synthesized: Vec<NodeId> = self
            .doc
            .walk(subtree)
            .into_iter()
            .filter(|&n| self.doc.position_id(n) == 0)
            .collect();
        for node in synthesized {
            self.doc.register_synthetic(node);
        }

        // container tags inside an inline wrapper break rendering
        for node in self.doc.walk(subtree) {
            if ILLEGAL_NESTED_TAGS.contains(&self.doc.arena().tag(node)) {
                self.doc.arena_mut().set_tag(node, "span");
            }
        }

        // keep the marker on the outermost equivalent element so the page's
        // own styling is not shadowed
        let subtree_top = self.doc.most_top_elem(subtree);
        if subtree_top != subtree {
            self.doc.arena_mut().set_attr(subtree_top, marker_attr, "");
            self.doc.arena_mut().remove_attr(subtree, marker_attr);
        }
        debug!(label = %window[0].label, "subtree window merged");
    }

    /// A one-atom window tags its element directly.
    fn format_atom(&mut self, sentence: &LabeledSentence) {
        let Some(rule) = self.rules.get(sentence.label.as_str()).copied() else {
            return;
        };
        let Some(atom) = sentence.atoms.first() else {
            return;
        };
        let Some(elem) = self.doc.resolve(atom.position_id) else {
            return;
        };
        let elem = self.doc.most_top_elem(elem);
        execute_label_rule(self.doc, elem, &rule.rule, atom.tail, &sentence.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{LABEL_CONTENT, LABEL_INTRO};
    use crate::label::{LabeledAtom, LabeledSentence};

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    fn labeled(doc: &Document, path: &str, label: &str, segment_id: u32) -> LabeledSentence {
        let node = doc.query(path)[0];
        LabeledSentence {
            text: doc.raw_text(node),
            label: label.to_string(),
            segment_id,
            atoms: vec![LabeledAtom {
                text: doc.raw_text(node),
                position_id: doc.position_id(node),
                xpath: doc.xpath_of(node).to_string(),
                tail: false,
                segment_id,
            }],
        }
    }

    #[test]
    fn test_single_atom_window_tags_element() {
        let mut d = doc(concat!(
            "<html><body>",
            "<p id=\"intro\">这是引言。</p>",
            "<p>正文第一段,字数较多以避免与引言合并。</p>",
            "</body></html>"
        ));
        let labels = vec![
            labeled(&d, "//p[@id='intro']", LABEL_INTRO, 1),
            labeled(&d, "//p[2]", LABEL_CONTENT, 2),
        ];
        SubtreeFormatter::new(&mut d, &labels).format();
        let p = d.query("//p[@id='intro']")[0];
        assert_eq!(d.arena().attr(p, "data-pith-intro"), Some(""));
    }

    #[test]
    fn test_window_merges_two_paragraphs_into_subtree() {
        let mut d = doc(concat!(
            "<html><body><div id=\"wrap\">",
            "<p>引言第一段。</p>",
            "<p>引言第二段。</p>",
            "<p>正文内容很长很长很长很长很长很长很长很长很长很长很长很长。</p>",
            "</div></body></html>"
        ));
        let labels = vec![
            labeled(&d, "//p[1]", LABEL_INTRO, 1),
            labeled(&d, "//p[2]", LABEL_INTRO, 2),
            labeled(&d, "//p[3]", LABEL_CONTENT, 3),
        ];
        SubtreeFormatter::new(&mut d, &labels).format();

        let marked = d.query("//*[@data-pith-intro]");
        assert_eq!(marked.len(), 1);
        let subtree = marked[0];
        // both intro paragraphs now live under the marked subtree
        let text = d.raw_text(subtree);
        assert!(text.contains("引言第一段"));
        assert!(text.contains("引言第二段"));
        assert!(!text.contains("正文"));
        // the content paragraph stayed where it was
        assert_eq!(d.query("//div[@id='wrap']").len(), 1);
    }

    #[test]
    fn test_exact_parent_match_tags_without_new_node() {
        let mut d = doc(concat!(
            "<html><body>",
            "<div id=\"only\"><p>目录一。</p><p>目录二。</p></div>",
            "<p>正文在外面,内容长长长长长长长长长长长长长长。</p>",
            "</body></html>"
        ));
        let labels = vec![
            labeled(&d, "//div/p[1]", LABEL_INTRO, 1),
            labeled(&d, "//div/p[2]", LABEL_INTRO, 2),
        ];
        let before = d.query("//span").len();
        SubtreeFormatter::new(&mut d, &labels).format();
        // the div already bounded the window text: tagged in place
        let div = d.query("//div[@id='only']");
        assert_eq!(div.len(), 1);
        assert_eq!(d.arena().attr(div[0], "data-pith-intro"), Some(""));
        assert_eq!(d.query("//span").len(), before);
    }

    #[test]
    fn test_non_rule_labels_ignored() {
        let mut d = doc("<html><body><p>正文。</p></body></html>");
        let labels = vec![labeled(&d, "//p", LABEL_CONTENT, 1)];
        SubtreeFormatter::new(&mut d, &labels).format();
        assert!(d.query("//*[@data-pith-intro]").is_empty());
    }
}
