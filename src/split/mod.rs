//! The splitter: walks the cleaned tree in document order, emits atoms,
//! groups them into sentences and rewrites the tree with synthetic
//! position-marker nodes so every sentence maps back to a queryable DOM
//! location.

pub mod atom;
pub mod special;
pub mod tokenize;

use tracing::{debug, warn};

use crate::consts::{MARKER_GROUP_TAG, MARKER_POS_TAG};
use crate::doc::{Document, RulePath};
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::meta::ArticleMeta;
use crate::util::{self, PrefixSet};

pub use atom::{Atom, Interval, SegmentIds, Sentence, SentenceMedia, find_interval};
pub use tokenize::{SentSpan, cut_sentences};

use special::{handle_special, make_atom};

pub struct Splitter<'d> {
    doc: &'d mut Document,
    segments: SegmentIds,
}

impl<'d> Splitter<'d> {
    pub fn new(doc: &'d mut Document) -> Splitter<'d> {
        Splitter {
            doc,
            segments: SegmentIds::new(),
        }
    }

    /// Split the document into sentences and rewrite the tree with marker
    /// nodes. Fails with [`Error::NoSentences`] on empty output.
    pub fn split(&mut self, meta: &ArticleMeta) -> Result<Vec<Sentence>> {
        let atoms = self.collect_atoms(meta);
        let num_atoms = atoms.len();
        let mut sentences = self.cut_atom_sentences(atoms);
        if sentences.is_empty() {
            return Err(Error::NoSentences);
        }
        sentences = self.collapse_duplicate_images(sentences);
        self.rewrite_with_markers(&mut sentences);
        debug!(num_atoms, num_sentences = sentences.len(), "split done");
        Ok(sentences)
    }

    /// The article title participates in labeling as a virtual atom with no
    /// tree position.
    fn title_atom(&self, meta: &ArticleMeta) -> Option<Atom> {
        if meta.title.is_empty() {
            return None;
        }
        let xpath = match self.doc.rule_path(|r| r.title.as_str()) {
            Some(RulePath::Path(p)) => p.to_string(),
            _ => "//title".to_string(),
        };
        Some(Atom {
            text: meta.title.clone(),
            position_id: 0,
            tags: util::xpath_to_tags(&xpath),
            xpath,
            segment_id: 0,
            ..Default::default()
        })
    }

    fn collect_atoms(&mut self, meta: &ArticleMeta) -> Vec<Atom> {
        let mut atoms: Vec<Atom> = self.title_atom(meta).into_iter().collect();

        let mut tail_stack: Vec<Atom> = Vec::new();
        let mut consumed = PrefixSet::new();

        for id in self.doc.walk(self.doc.root()) {
            let xpath = self.doc.xpath_of(id).to_string();

            // Leaving a subtree flushes the pending tail atoms that belong
            // to it, keeping document order intact.
            while let Some(top) = tail_stack.last() {
                let inside = xpath == top.xpath
                    || (xpath.starts_with(&top.xpath)
                        && xpath.as_bytes().get(top.xpath.len()) == Some(&b'/'));
                if inside {
                    break;
                }
                if let Some(flushed) = tail_stack.pop() {
                    atoms.push(flushed);
                }
            }

            if consumed.covers(&xpath) {
                continue;
            }

            if let Some(special) = handle_special(self.doc, &mut self.segments, id) {
                atoms.extend(special);
                consumed.insert(&xpath);
            } else if !self.doc.arena().text(id).trim().is_empty() {
                let text = self.doc.arena().text(id).to_string();
                atoms.push(make_atom(self.doc, &mut self.segments, id, text, false));
            }

            if !self.doc.arena().tail(id).trim().is_empty() {
                let text = self.doc.arena().tail(id).to_string();
                let mut tail_atom = make_atom(self.doc, &mut self.segments, id, text, false);
                tail_atom.tail = true;
                tail_stack.push(tail_atom);
            }
        }

        while let Some(tail) = tail_stack.pop() {
            atoms.push(tail);
        }
        atoms
    }

    /// Group atoms into paragraphs and cut each into sentences; media
    /// placeholders terminate the running paragraph and become standalone
    /// sentences.
    fn cut_atom_sentences(&mut self, atoms: Vec<Atom>) -> Vec<Sentence> {
        let mut result = Vec::new();
        let mut paragraph: Vec<Atom> = Vec::new();
        for atom in atoms {
            if atom.is_media_placeholder() {
                result.extend(self.cut_paragraph(std::mem::take(&mut paragraph)));
                result.push(Sentence::from_atom(atom));
                continue;
            }
            let breaks_paragraph = paragraph
                .last()
                .is_some_and(|last| !last.same_paragraph(&atom));
            if breaks_paragraph {
                result.extend(self.cut_paragraph(std::mem::take(&mut paragraph)));
            }
            paragraph.push(atom);
        }
        result.extend(self.cut_paragraph(paragraph));
        result
    }

    fn cut_paragraph(&mut self, mut atoms: Vec<Atom>) -> Vec<Sentence> {
        if atoms.is_empty() {
            return Vec::new();
        }
        let joined: String = atoms.iter().map(|a| a.text.as_str()).collect();

        // Byte interval each atom occupies in the concatenated paragraph.
        let mut intervals = Vec::with_capacity(atoms.len());
        let mut start = 0usize;
        for (i, atom) in atoms.iter().enumerate() {
            let end = start + atom.text.len();
            intervals.push(Interval {
                start,
                end: end.saturating_sub(1),
                id: i,
            });
            start = end;
        }

        let mut sentences = Vec::new();
        for span in cut_sentences(&joined) {
            let span_len = span.end - span.start;
            let Some(start_idx) = find_interval(span.start, &intervals) else {
                warn!(start = span.start, "no atom interval for sentence start");
                return Vec::new();
            };
            let mut sentence = Sentence::empty();
            let mut idx = start_idx;
            while sentence.text.len() < span_len && idx < atoms.len() {
                let remaining = span_len - sentence.text.len();
                if atoms[idx].text.len() > remaining {
                    let (head, rest) = atoms[idx].split_at(remaining);
                    sentence.push(head);
                    if let Some(rest) = rest {
                        atoms[idx] = rest;
                    }
                } else {
                    sentence.push(atoms[idx].clone());
                    idx += 1;
                }
            }
            if !sentence.text.trim().is_empty() {
                sentences.push(sentence);
            }
        }
        sentences
    }

    /// Consecutive image sentences with the same resolved url collapse into
    /// one; the later duplicate's element is removed from the tree.
    fn collapse_duplicate_images(&mut self, sentences: Vec<Sentence>) -> Vec<Sentence> {
        let mut out: Vec<Sentence> = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            let duplicate = matches!(
                out.last(),
                Some(last) if last.is_image() && sentence.is_image() && last.media.url == sentence.media.url
            );
            if duplicate {
                let pid = sentence.atoms[0].position_id;
                if let Some(node) = self.doc.resolve(pid) {
                    if let Err(err) = self.doc.remove_element(node) {
                        warn!(%err, pid, "duplicate image removal skipped");
                    }
                }
                continue;
            }
            out.push(sentence);
        }
        out
    }

    /// Rewrite contiguous same-location atom runs into synthetic marker
    /// nodes so every sentence's atoms resolve to distinct tree locations.
    fn rewrite_with_markers(&mut self, sentences: &mut [Sentence]) {
        // Flat list of atom addresses, in sentence order.
        let refs: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .flat_map(|(si, s)| (0..s.atoms.len()).map(move |ai| (si, ai)))
            .collect();

        let mut windows: Vec<Vec<(usize, usize)>> = Vec::new();
        let mut i = 0;
        while i < refs.len() {
            let (si, ai) = refs[i];
            let key = (
                sentences[si].atoms[ai].xpath.clone(),
                sentences[si].atoms[ai].tail,
            );
            let mut j = i;
            while j < refs.len() {
                let (sj, aj) = refs[j];
                let atom = &sentences[sj].atoms[aj];
                if atom.xpath == key.0 && atom.tail == key.1 {
                    j += 1;
                } else {
                    break;
                }
            }
            windows.push(refs[i..j].to_vec());
            i = j;
        }

        for window in windows {
            let window: Vec<(usize, usize)> = window
                .into_iter()
                .filter(|&(si, ai)| !self.is_marker_exempt(&sentences[si].atoms[ai]))
                .collect();
            let Some(&(si0, ai0)) = window.first() else {
                continue;
            };
            if sentences[si0].atoms[ai0].tail {
                self.add_tail_markers(sentences, &window);
            } else {
                self.add_text_markers(sentences, &window);
            }
        }
    }

    /// Media placeholders and math subtrees keep their original location.
    fn is_marker_exempt(&self, atom: &Atom) -> bool {
        if atom.is_media_placeholder() {
            return true;
        }
        util::split_xpath(&atom.xpath).iter().any(|t| t == "math")
    }

    fn add_text_markers(&mut self, sentences: &mut [Sentence], window: &[(usize, usize)]) {
        let (si0, ai0) = window[0];
        let Some(elem) = self.doc.resolve(sentences[si0].atoms[ai0].position_id) else {
            return;
        };
        self.doc.arena_mut().set_text(elem, "");
        let group = self.doc.arena_mut().create_named(MARKER_GROUP_TAG);
        self.doc.arena_mut().insert_child_at(elem, 0, group);
        self.doc.register_synthetic(group);
        self.fill_marker_group(sentences, window, group);
    }

    fn add_tail_markers(&mut self, sentences: &mut [Sentence], window: &[(usize, usize)]) {
        let (si0, ai0) = window[0];
        let Some(elem) = self.doc.resolve(sentences[si0].atoms[ai0].position_id) else {
            return;
        };
        self.doc.arena_mut().set_tail(elem, "");
        let group = self.doc.arena_mut().create_named(MARKER_GROUP_TAG);
        self.doc.arena_mut().insert_after(elem, group);
        self.doc.register_synthetic(group);
        self.fill_marker_group(sentences, window, group);
    }

    fn fill_marker_group(
        &mut self,
        sentences: &mut [Sentence],
        window: &[(usize, usize)],
        group: NodeId,
    ) {
        for &(si, ai) in window {
            let marker = self.doc.arena_mut().create_named(MARKER_POS_TAG);
            self.doc.arena_mut().append(group, marker);
            let pid = self.doc.register_synthetic(marker);
            let text = sentences[si].atoms[ai].text.clone();
            self.doc.arena_mut().set_text(marker, &text);

            let atom = &mut sentences[si].atoms[ai];
            atom.tail = false;
            atom.position_id = pid;
        }
    }
}
