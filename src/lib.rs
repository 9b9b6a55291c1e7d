//! # pith
//!
//! A reader-content distillation engine: extract the readable core of a web
//! page from raw HTML.
//!
//! pith parses a page into a position-addressable DOM, strips
//! navigation/ads/boilerplate with a heuristic cleaning pipeline, extracts
//! structured metadata (title, author, publish time, description, cover
//! image), splits the surviving text into position-stable atoms and
//! sentences, and — after an external labeling pass — regroups same-label
//! runs into annotated subtrees and renders a reader document.
//!
//! ## Quick start
//!
//! ```no_run
//! use pith::{MockLabeler, Outcome, parse_page};
//!
//! let html = std::fs::read_to_string("page.html").unwrap();
//! match parse_page(&html, "https://example.com/post", None, &MockLabeler).unwrap() {
//!     Outcome::Article(article) => {
//!         println!("{}", article.meta.title);
//!         println!("{}", article.text);
//!     }
//!     Outcome::Worthless(kind) => eprintln!("no content: {kind:?}"),
//! }
//! ```
//!
//! ## Stages
//!
//! The two pipeline halves are also usable on their own: [`segment`]
//! produces sentences for an external labeler, [`distill`] consumes the
//! labeled sentences and renders the final document. [`Document`] exposes
//! the underlying tree model for callers that need direct queries.

pub mod clean;
pub mod consts;
pub mod doc;
pub mod dom;
pub mod error;
pub mod extract;
pub mod format;
pub mod label;
pub mod meta;
pub mod parse;
pub mod path;
pub mod pipeline;
pub mod rule;
pub mod split;
pub(crate) mod util;

pub use doc::Document;
pub use error::{Error, LabelFailure, Result};
pub use label::{LabelRequest, LabelResponse, LabeledSentence, Labeler, MockLabeler};
pub use meta::{ArticleMeta, AuthorProfile, WorthType};
pub use pipeline::{Distilled, Outcome, Segmented, distill, find_rule, parse_page, segment};
pub use rule::{
    HtmlCache, ImageCache, MemoryHtmlCache, MemoryImageCache, MemorySiteRuleStore, RuleStage,
    SiteRule, SiteRuleStore, StageGroup,
};
pub use split::{Atom, Sentence};
