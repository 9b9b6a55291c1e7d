//! Atoms and sentences: the smallest addressable text/media units and their
//! groupings. Atoms reference the tree only by position id and cached xpath.

use std::collections::HashMap;

use crate::consts::{IMG_ATOM_PREFIX, TABLE_ATOM_PREFIX};
use crate::util;

/// Smallest addressable unit of text or media extracted from one DOM
/// location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    pub text: String,
    pub position_id: u32,
    pub xpath: String,
    /// Media placeholders are immutable: they never split.
    pub immutable: bool,
    /// Coarse tag vocabulary derived from the xpath.
    pub tags: Vec<String>,
    /// True when the text follows the element rather than living inside it.
    pub tail: bool,
    pub segment_id: u32,
    /// Source attributes preserved for the labeler.
    pub attrs: HashMap<String, String>,
}

impl Atom {
    /// Split at a byte offset (must be a char boundary). Out-of-range
    /// offsets return the atom unchanged.
    pub fn split_at(&self, index: usize) -> (Atom, Option<Atom>) {
        if index == 0 || index >= self.text.len() || !self.text.is_char_boundary(index) {
            return (self.clone(), None);
        }
        let mut a = self.clone();
        let mut b = self.clone();
        a.text = self.text[..index].to_string();
        b.text = self.text[index..].to_string();
        (a, Some(b))
    }

    /// Do two atoms belong to the same rendered paragraph?
    pub fn same_paragraph(&self, other: &Atom) -> bool {
        util::paragraph_xpath(&self.xpath) == util::paragraph_xpath(&other.xpath)
    }

    pub fn is_media_placeholder(&self) -> bool {
        self.text.starts_with(IMG_ATOM_PREFIX) || self.text.starts_with(TABLE_ATOM_PREFIX)
    }
}

/// Media payload carried by a sentence built from a placeholder atom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentenceMedia {
    pub url: String,
    pub table_html: String,
}

/// An ordered, non-empty run of atoms with concatenated text. Immutable
/// after splitting except for label assignment.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    pub text: String,
    pub atoms: Vec<Atom>,
    pub segment_id: u32,
    pub tags: Vec<String>,
    pub media: SentenceMedia,
}

impl Sentence {
    pub fn empty() -> Sentence {
        Sentence::default()
    }

    /// Wrap a single atom, decoding media payloads from the placeholder
    /// prefixes.
    pub fn from_atom(atom: Atom) -> Sentence {
        let mut media = SentenceMedia::default();
        if let Some(rest) = atom.text.strip_prefix(IMG_ATOM_PREFIX) {
            media.url = rest.trim().to_string();
        } else if let Some(rest) = atom.text.strip_prefix(TABLE_ATOM_PREFIX) {
            media.table_html = rest.trim().to_string();
        }
        Sentence {
            text: atom.text.clone(),
            segment_id: atom.segment_id,
            tags: atom.tags.clone(),
            media,
            atoms: vec![atom],
        }
    }

    pub fn push(&mut self, atom: Atom) {
        if self.segment_id == 0 {
            self.segment_id = atom.segment_id;
        }
        self.text.push_str(&atom.text);
        for tag in &atom.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        self.atoms.push(atom);
    }

    pub fn is_image(&self) -> bool {
        !self.media.url.is_empty()
    }
}

/// Character interval owned by one atom inside a concatenated paragraph.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
    pub id: usize,
}

/// Binary search for the interval containing `coord`. Intervals must be
/// sorted by start and non-overlapping.
pub fn find_interval(coord: usize, intervals: &[Interval]) -> Option<usize> {
    let mut low = 0isize;
    let mut high = intervals.len() as isize - 1;
    while low <= high {
        let mid = ((low + high) / 2) as usize;
        if coord < intervals[mid].start {
            high = mid as isize - 1;
        } else if coord > intervals[mid].end {
            low = mid as isize + 1;
        } else {
            return Some(intervals[mid].id);
        }
    }
    None
}

/// Hands out stable paragraph/segment ids keyed by truncated xpath.
#[derive(Default)]
pub struct SegmentIds {
    cache: HashMap<String, u32>,
}

impl SegmentIds {
    pub fn new() -> SegmentIds {
        SegmentIds::default()
    }

    pub fn get(&mut self, xpath: &str) -> u32 {
        let para = util::paragraph_xpath(xpath);
        let next = self.cache.len() as u32 + 1;
        *self.cache.entry(para).or_insert(next)
    }
}
