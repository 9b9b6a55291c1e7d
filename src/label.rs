//! Labeling-service interface: DTOs, the `Labeler` trait and a mock
//! implementation for tests and offline runs.
//!
//! The labeler is the only external collaborator in the hot path. The core
//! never retries it; timeouts and backoff belong to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::consts::{LABEL_CONTENT, LABEL_NOISE};
pub use crate::error::LabelFailure;
use crate::meta::ArticleMeta;
use crate::split::{Atom, Sentence};

/// One atom as the labeler sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomPayload {
    pub text: String,
    pub position_id: u32,
    pub xpath: String,
    #[serde(default)]
    pub tail: bool,
}

/// One sentence as the labeler sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentencePayload {
    pub text: String,
    pub segment_id: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub atoms: Vec<AtomPayload>,
}

/// Request: article metadata plus the ordered sentence list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRequest {
    pub article: ArticleMeta,
    /// Payload kind; web pages are always "web".
    pub kind: String,
    pub sentences: Vec<SentencePayload>,
}

impl LabelRequest {
    pub fn from_sentences(meta: &ArticleMeta, sentences: &[Sentence]) -> LabelRequest {
        LabelRequest {
            article: meta.clone(),
            kind: "web".to_string(),
            sentences: sentences
                .iter()
                .map(|s| SentencePayload {
                    text: s.text.clone(),
                    segment_id: s.segment_id,
                    tags: s.tags.clone(),
                    atoms: s
                        .atoms
                        .iter()
                        .map(|a| AtomPayload {
                            text: a.text.clone(),
                            position_id: a.position_id,
                            xpath: a.xpath.clone(),
                            tail: a.tail,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// One sentence with its assigned label, as consumed by the formatter and
/// the post-split cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSentence {
    pub text: String,
    pub label: String,
    pub segment_id: u32,
    pub atoms: Vec<LabeledAtom>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledAtom {
    pub text: String,
    pub position_id: u32,
    pub xpath: String,
    #[serde(default)]
    pub tail: bool,
    #[serde(default)]
    pub segment_id: u32,
}

/// Response: per-sentence labels, plus optionally corrected article
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelResponse {
    pub sentences: Vec<LabeledSentence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleMeta>,
}

/// The external text-labeling collaborator.
pub trait Labeler {
    fn label(&self, request: &LabelRequest) -> Result<LabelResponse, LabelFailure>;
}

/// Labels every sentence as article content. Used by tests and the CLI's
/// offline mode.
#[derive(Debug, Default)]
pub struct MockLabeler;

impl Labeler for MockLabeler {
    fn label(&self, request: &LabelRequest) -> Result<LabelResponse, LabelFailure> {
        if request.sentences.is_empty() {
            return Err(LabelFailure::EmptyInput);
        }
        Ok(LabelResponse {
            sentences: request
                .sentences
                .iter()
                .map(|s| LabeledSentence {
                    text: s.text.clone(),
                    label: LABEL_CONTENT.to_string(),
                    segment_id: s.segment_id,
                    atoms: s
                        .atoms
                        .iter()
                        .map(|a| LabeledAtom {
                            text: a.text.clone(),
                            position_id: a.position_id,
                            xpath: a.xpath.clone(),
                            tail: a.tail,
                            segment_id: s.segment_id,
                        })
                        .collect(),
                })
                .collect(),
            article: None,
        })
    }
}

/// Classify a response the way the pipeline needs: a response whose
/// sentences all carry the background label is a rejection.
pub fn all_background(response: &LabelResponse) -> bool {
    !response.sentences.is_empty() && response.sentences.iter().all(|s| s.label == LABEL_NOISE)
}

impl LabeledSentence {
    /// Labeled sentences built directly from split output, for callers that
    /// label locally.
    pub fn from_sentence(sentence: &Sentence, label: &str) -> LabeledSentence {
        LabeledSentence {
            text: sentence.text.clone(),
            label: label.to_string(),
            segment_id: sentence.segment_id,
            atoms: sentence.atoms.iter().map(LabeledAtom::from_atom).collect(),
        }
    }
}

impl LabeledAtom {
    pub fn from_atom(atom: &Atom) -> LabeledAtom {
        LabeledAtom {
            text: atom.text.clone(),
            position_id: atom.position_id,
            xpath: atom.xpath.clone(),
            tail: atom.tail,
            segment_id: atom.segment_id,
        }
    }
}
