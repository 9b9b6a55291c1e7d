//! The formatter: structural normalization before splitting, label-driven
//! rewriting and subtree merging after labeling.

pub mod node_rules;
pub mod subtree;

use tracing::{debug, warn};

use crate::consts::{LABEL_RULES, LabelRule};
use crate::doc::Document;
use crate::dom::NodeId;
use crate::label::LabeledSentence;

pub use node_rules::apply_node_rules;
pub use subtree::SubtreeFormatter;

pub struct Formatter<'d, 'l> {
    doc: &'d mut Document,
    labels: &'l [LabeledSentence],
}

impl<'d, 'l> Formatter<'d, 'l> {
    pub fn new(doc: &'d mut Document, labels: &'l [LabeledSentence]) -> Formatter<'d, 'l> {
        Formatter { doc, labels }
    }

    /// Structural normalization before sentence splitting.
    pub fn pre_format(&mut self) {
        apply_node_rules(self.doc);
        self.renumber_headings();
        debug!("pre-format done");
    }

    /// Label-driven rewriting after the labeler has spoken. Hosts flagged
    /// no-semantic-denoise only get the style fixes.
    pub fn post_format(&mut self) {
        let semantic = !self
            .doc
            .rule
            .as_ref()
            .is_some_and(|r| r.no_semantic_denoise);
        if semantic {
            self.apply_label_rules();
            SubtreeFormatter::new(self.doc, self.labels).format();
        }
        self.format_styles();
        debug!("post-format done");
    }

    fn apply_label_rules(&mut self) {
        for sentence in self.labels {
            let Some(rule) = LABEL_RULES.iter().find(|r| r.label == sentence.label) else {
                continue;
            };
            for atom in &sentence.atoms {
                let Some(elem) = self.doc.resolve(atom.position_id) else {
                    continue;
                };
                execute_label_rule(self.doc, elem, rule, atom.tail, &sentence.text);
            }
        }
    }

    /// Renumber h1..h6 so the first-seen distinct levels form a minimal
    /// consecutive sequence starting at h1.
    fn renumber_headings(&mut self) {
        let headings = self
            .doc
            .query("//h1 | //h2 | //h3 | //h4 | //h5 | //h6");
        if headings.is_empty() {
            return;
        }
        let mut levels: Vec<u8> = headings
            .iter()
            .filter_map(|&h| self.doc.arena().tag(h).as_bytes().get(1).copied())
            .collect();
        levels.sort_unstable();
        levels.dedup();

        for heading in headings {
            let Some(&level) = self.doc.arena().tag(heading).as_bytes().get(1) else {
                continue;
            };
            if let Some(pos) = levels.iter().position(|&l| l == level) {
                let new_tag = format!("h{}", pos + 1);
                self.doc.arena_mut().set_tag(heading, &new_tag);
            }
        }
    }

    /// List items inside intro-marked subtrees render inline with their
    /// markers otherwise.
    fn format_styles(&mut self) {
        let mut targets: Vec<NodeId> = Vec::new();
        for marked in self.doc.query("//*[@data-pith-intro]") {
            for li in self.doc.relative_query(marked, ".//li") {
                targets.extend(
                    self.doc
                        .arena()
                        .children(li)
                        .filter(|&c| self.doc.arena().is_element(c)),
                );
            }
        }
        for elem in targets {
            let style = self.doc.arena().attr_or(elem, "style", "").to_string();
            let style = if style.is_empty() {
                "display: contents;".to_string()
            } else {
                format!("{style}; display: contents;")
            };
            self.doc.arena_mut().set_attr(elem, "style", &style);
        }
    }
}

/// Apply a label rule to one element: scrub the labeled text out of the
/// tree, drop labeled media, and/or rename/annotate the element.
pub(crate) fn execute_label_rule(
    doc: &mut Document,
    elem: NodeId,
    rule: &LabelRule,
    tail: bool,
    text: &str,
) {
    if rule.clean {
        if tail && !doc.arena().tail(elem).is_empty() {
            let current = doc.arena().tail(elem).to_string();
            if text.contains(&current) {
                doc.arena_mut().set_tail(elem, "");
            } else {
                doc.arena_mut().set_tail(elem, &current.replace(text, ""));
            }
        } else if !doc.arena().text(elem).is_empty() {
            let current = doc.arena().text(elem).to_string();
            if text.contains(&current) {
                doc.arena_mut().set_text(elem, "");
            } else {
                doc.arena_mut().set_text(elem, &current.replace(text, ""));
            }
        }
        if ["img", "svg", "table"].contains(&doc.arena().tag(elem)) {
            if let Err(err) = doc.remove_element(elem) {
                warn!(%err, "labeled media removal skipped");
            }
        }
    }
    if !rule.new_tag.is_empty() {
        doc.arena_mut().set_tag(elem, rule.new_tag);
    }
    if !rule.new_attr.is_empty() {
        doc.arena_mut().set_attr(elem, rule.new_attr, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{LABEL_CONTENT, LABEL_NOISE};
    use crate::label::LabeledAtom;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    fn labeled(d: &Document, node: NodeId, label: &str, tail: bool) -> LabeledSentence {
        let text = if tail {
            d.arena().tail(node).to_string()
        } else {
            d.arena().text(node).to_string()
        };
        LabeledSentence {
            text: text.clone(),
            label: label.to_string(),
            segment_id: 1,
            atoms: vec![LabeledAtom {
                text,
                position_id: d.position_id(node),
                xpath: d.xpath_of(node).to_string(),
                tail,
                segment_id: 1,
            }],
        }
    }

    #[test]
    fn test_headings_renumber_to_consecutive_levels() {
        let mut d = doc(concat!(
            "<html><body>",
            "<h2>a</h2><h4>b</h4><h4>c</h4><h6>d</h6>",
            "</body></html>"
        ));
        Formatter::new(&mut d, &[]).pre_format();
        assert_eq!(d.query("//h1").len(), 1);
        assert_eq!(d.query("//h2").len(), 2);
        assert_eq!(d.query("//h3").len(), 1);
        assert!(d.query("//h4").is_empty());
        assert!(d.query("//h6").is_empty());
    }

    #[test]
    fn test_noise_label_scrubs_text() {
        let mut d = doc("<html><body><p>广告文字</p><p>正文。</p></body></html>");
        let noise = d.query("//p")[0];
        let labels = vec![labeled(&d, noise, LABEL_NOISE, false)];
        Formatter::new(&mut d, &labels).post_format();
        let ps = d.query("//p");
        assert_eq!(d.arena().text(ps[0]), "");
        assert_eq!(d.arena().text(ps[1]), "正文。");
    }

    #[test]
    fn test_noise_label_scrubs_tail() {
        let mut d = doc("<html><body><div><b>keep</b>tail junk</div></body></html>");
        let b = d.query("//b")[0];
        let labels = vec![labeled(&d, b, LABEL_NOISE, true)];
        Formatter::new(&mut d, &labels).post_format();
        assert_eq!(d.arena().tail(d.query("//b")[0]), "");
        assert_eq!(d.arena().text(d.query("//b")[0]), "keep");
    }

    #[test]
    fn test_no_semantic_denoise_skips_label_rules() {
        let rule = crate::rule::SiteRule {
            host: "example.com".into(),
            no_semantic_denoise: true,
            ..Default::default()
        };
        let mut d = Document::parse(
            "<html><body><p>保留文字</p></body></html>",
            "https://example.com/post",
            Some(rule),
        )
        .unwrap();
        let p = d.query("//p")[0];
        let labels = vec![labeled(&d, p, LABEL_NOISE, false)];
        Formatter::new(&mut d, &labels).post_format();
        assert_eq!(d.arena().text(d.query("//p")[0]), "保留文字");
    }

    #[test]
    fn test_content_label_untouched() {
        let mut d = doc("<html><body><p>正文内容。</p></body></html>");
        let p = d.query("//p")[0];
        let labels = vec![labeled(&d, p, LABEL_CONTENT, false)];
        Formatter::new(&mut d, &labels).post_format();
        assert_eq!(d.arena().text(d.query("//p")[0]), "正文内容。");
    }
}
