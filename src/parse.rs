//! Metadata assembly and worthlessness classification.

use tracing::debug;

use crate::consts::{
    LABEL_FIGURE, WORTHLESS_KEYWORD_RATIO, WORTHLESS_TEXT_LEN, WORTHLESS_TITLE_REGEX,
    WORTHLESS_PAGE_KEYWORDS,
};
use crate::doc::Document;
use crate::extract;
use crate::label::LabeledSentence;
use crate::meta::{ArticleMeta, WorthType};
use crate::util;

pub struct Parser<'d, 'l> {
    doc: &'d Document,
    labels: &'l [LabeledSentence],
    text: String,
}

impl<'d, 'l> Parser<'d, 'l> {
    pub fn new(doc: &'d Document, labels: &'l [LabeledSentence]) -> Parser<'d, 'l> {
        let text = doc.raw_text(doc.root());
        Parser { doc, labels, text }
    }

    /// Run every extractor and assemble the article metadata.
    pub fn extract_meta(&self) -> ArticleMeta {
        let profile = extract::extract_author_profile(self.doc);
        ArticleMeta {
            url: self.doc.url.clone(),
            title: extract::extract_title(self.doc),
            author: profile.name.clone(),
            author_profile: Some(profile),
            publish_time: extract::extract_publish_time(self.doc),
            // recovered from labeling, not from the DOM
            content_source: String::new(),
            description: extract::extract_description(self.doc),
            site_icon: extract::extract_site_icon(self.doc),
            cover_image: extract::extract_cover_image(self.doc),
        }
    }

    /// A recognizable error page: barely any text plus a known error title
    /// or a matching keyword group.
    fn is_error_page(&self, meta: &ArticleMeta) -> bool {
        if self.text.chars().count() >= WORTHLESS_TEXT_LEN {
            return false;
        }
        if !meta.title.is_empty() {
            let compact = util::clean(&meta.title);
            if WORTHLESS_TITLE_REGEX.is_match(&compact) {
                return true;
            }
        }
        for keywords in WORTHLESS_PAGE_KEYWORDS {
            if keywords.len() < 2 {
                continue;
            }
            let matched = keywords
                .iter()
                .filter(|k| self.text.contains(*k))
                .count();
            if matched as f32 / keywords.len() as f32 >= WORTHLESS_KEYWORD_RATIO
                || matched + 1 == keywords.len()
            {
                debug!(?keywords, matched, "error-page keyword group matched");
                return true;
            }
        }
        false
    }

    fn has_valuable_image(&self) -> bool {
        self.labels.iter().any(|s| s.label == LABEL_FIGURE)
    }

    /// No usable content: next to no text beyond the title and no figure.
    fn is_content_empty(&self, meta: &ArticleMeta) -> bool {
        let text = self.text.replace(&meta.title, "");
        text.chars().count() <= WORTHLESS_TEXT_LEN && !self.has_valuable_image()
    }

    pub fn check_worthless(&self, meta: &ArticleMeta) -> WorthType {
        if self.is_error_page(meta) {
            return WorthType::NotFound;
        }
        if self.is_content_empty(meta) {
            return WorthType::NoContent;
        }
        WorthType::Valuable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_short_page_with_404_title_is_not_found() {
        let d = doc("<html><head><title>404 Not Found</title></head><body><p>gone, sorry, nothing here</p></body></html>");
        let parser = Parser::new(&d, &[]);
        let meta = ArticleMeta {
            title: "404 Not Found".into(),
            ..Default::default()
        };
        assert_eq!(parser.check_worthless(&meta), WorthType::NotFound);
    }

    #[test]
    fn test_long_page_is_valuable() {
        let body: String = "实际的正文内容。".repeat(30);
        let d = doc(&format!("<html><body><p>{body}</p></body></html>"));
        let parser = Parser::new(&d, &[]);
        let meta = ArticleMeta::default();
        assert_eq!(parser.check_worthless(&meta), WorthType::Valuable);
    }

    #[test]
    fn test_short_page_without_error_signs_is_no_content() {
        let d = doc("<html><body><p>短</p></body></html>");
        let parser = Parser::new(&d, &[]);
        assert_eq!(
            parser.check_worthless(&ArticleMeta::default()),
            WorthType::NoContent
        );
    }

    #[test]
    fn test_figure_label_rescues_short_page() {
        let d = doc("<html><body><p>短</p></body></html>");
        let labels = vec![LabeledSentence {
            text: "<img https://a.com/x.png".into(),
            label: crate::consts::LABEL_FIGURE.into(),
            segment_id: 1,
            atoms: vec![],
        }];
        let parser = Parser::new(&d, &labels);
        assert_eq!(
            parser.check_worthless(&ArticleMeta::default()),
            WorthType::Valuable
        );
    }

    #[test]
    fn test_keyword_group_match() {
        let d = doc("<html><body><p>该内容已被发布者删除,作者很抱歉。</p></body></html>");
        let parser = Parser::new(&d, &[]);
        assert_eq!(
            parser.check_worthless(&ArticleMeta::default()),
            WorthType::NotFound
        );
    }

    #[test]
    fn test_extract_meta_assembles_fields() {
        let d = doc(concat!(
            "<html><head>",
            "<title>Headline Here</title>",
            r#"<meta name="author" content="Ann">"#,
            r#"<meta name="description" content="Summary">"#,
            r#"<meta property="og:image" content="https://example.com/c.png">"#,
            r#"<link rel="icon" href="/i.ico">"#,
            "</head><body><p>body text</p></body></html>"
        ));
        let meta = Parser::new(&d, &[]).extract_meta();
        assert_eq!(meta.title, "Headline Here");
        assert_eq!(meta.author, "Ann");
        assert_eq!(meta.description, "Summary");
        assert_eq!(meta.cover_image, "https://example.com/c.png");
        assert_eq!(meta.site_icon, "https://example.com/i.ico");
    }
}
