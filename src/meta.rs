//! Article metadata and worthlessness classification types.

use serde::{Deserialize, Serialize};

/// Structured author profile recovered from page scripts and meta tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub name: String,
    pub uid: String,
    pub description: String,
    pub profile_url: String,
}

/// Everything the extractors recover about an article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub url: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_profile: Option<AuthorProfile>,
    /// Normalized to `YYYY-MM-DD HH:MM:SS` with trailing zero components
    /// trimmed.
    pub publish_time: String,
    pub content_source: String,
    pub description: String,
    pub site_icon: String,
    pub cover_image: String,
}

/// Outcome of the worthlessness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorthType {
    /// The page carries real article content.
    Valuable,
    /// A recognizable error/interception page (404, captcha, moved account).
    NotFound,
    /// Parseable but carrying no usable content.
    NoContent,
}

impl WorthType {
    pub fn is_worthless(self) -> bool {
        self != WorthType::Valuable
    }
}
