//! Error types for pith operations.

use thiserror::Error;

/// Errors that can occur while distilling a document.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("site rule requires rule-only body extraction but no body matched: {url}")]
    RuleConflict { url: String },

    /// Attempted to detach a node with no parent (root or already removed).
    /// Always handled locally as a no-op; never escapes a pipeline stage.
    #[error("node has no parent")]
    Detach,

    #[error("splitter produced no sentences")]
    NoSentences,

    #[error("labeling failed: {0}")]
    Label(#[from] LabelFailure),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure modes of the external labeling collaborator, classified by the
/// collaborator's own response code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelFailure {
    /// The labeler rejected an empty sentence list.
    #[error("empty input")]
    EmptyInput,

    /// Every sentence came back with the background label.
    #[error("all sentences labeled background")]
    AllBackground,

    /// Transport-level or unclassified model failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
