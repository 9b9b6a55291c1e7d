//! End-to-end orchestration: segment → label → distill.
//!
//! The core performs no I/O of its own. The labeler is injected; its
//! failure modes map to distinct caller-visible outcomes. Retry, backoff
//! and cancellation belong to the orchestrator above this crate.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::clean::Cleaner;
use crate::consts::LABEL_SOURCE;
use crate::doc::Document;
use crate::error::{Error, LabelFailure, Result};
use crate::format::Formatter;
use crate::label::{LabelRequest, LabelResponse, Labeler, LabeledSentence, all_background};
use crate::meta::{ArticleMeta, WorthType};
use crate::parse::Parser;
use crate::rule::{SiteRule, SiteRuleStore, StageGroup, match_rule};
use crate::split::{Sentence, Splitter};

/// Output of the segmentation stage: cleaned, split and pre-formatted.
#[derive(Debug)]
pub struct Segmented {
    pub html: String,
    pub sentences: Vec<Sentence>,
    pub meta: ArticleMeta,
    pub images_by_position: HashMap<String, u32>,
}

/// Output of the distillation stage: the finished reader document.
#[derive(Debug)]
pub struct Distilled {
    pub html: String,
    pub text: String,
    pub images: Vec<String>,
    pub worth: WorthType,
    pub meta: ArticleMeta,
}

/// Final outcome for a page.
#[derive(Debug)]
pub enum Outcome {
    Article(Box<Distilled>),
    Worthless(WorthType),
}

/// Look up the site rule for a url.
pub fn find_rule(
    store: &dyn SiteRuleStore,
    url: &str,
    group: StageGroup,
) -> Result<Option<SiteRule>> {
    let rules = store.find_by_stage_group(group)?;
    Ok(match_rule(rules, url))
}

/// Segment raw page HTML: parse, extract metadata, clean, split into
/// sentences and pre-format. The returned HTML carries the position
/// markers the distill stage resolves against.
pub fn segment(html: &str, url: &str, rule: Option<SiteRule>) -> Result<Segmented> {
    let mut doc = Document::parse(html, url, rule)?;

    let meta = Parser::new(&doc, &[]).extract_meta();

    Cleaner::new(&mut doc).purify()?;
    let sentences = Splitter::new(&mut doc).split(&meta)?;
    Formatter::new(&mut doc, &[]).pre_format();

    let images_by_position = doc.images_with_position_id();
    info!(
        url,
        num_sentences = sentences.len(),
        "segment stage complete"
    );
    Ok(Segmented {
        html: doc.to_html(),
        sentences,
        meta,
        images_by_position,
    })
}

/// Distill segment-stage HTML plus labeled sentences into the final reader
/// document.
pub fn distill(
    html: &str,
    url: &str,
    rule: Option<SiteRule>,
    labels: &[LabeledSentence],
    meta: &ArticleMeta,
) -> Result<Distilled> {
    let mut doc = Document::load(html, url, rule)?;

    Formatter::new(&mut doc, labels).post_format();

    let mut cleaner = Cleaner::new(&mut doc);
    cleaner.set_sentences(labels.to_vec());
    cleaner.post_purify()?;

    doc.add_reserved_nodes();
    doc.insert_meta(meta);

    let worth = Parser::new(&doc, labels).check_worthless(meta);
    let text = doc.raw_text(doc.root());
    let images = doc.images();
    info!(url, ?worth, "distill stage complete");
    Ok(Distilled {
        html: doc.to_html(),
        text,
        images,
        worth,
        meta: meta.clone(),
    })
}

/// Fill metadata blanks from the labeler's corrected article metadata and
/// its source-labeled sentences.
fn recover_meta(meta: &mut ArticleMeta, response: &LabelResponse) {
    if let Some(corrected) = &response.article {
        if meta.title.is_empty() {
            meta.title = corrected.title.clone();
        }
        if meta.author.is_empty() {
            meta.author = corrected.author.clone();
        }
        if meta.publish_time.is_empty() {
            meta.publish_time = corrected.publish_time.clone();
        }
        if meta.content_source.is_empty() {
            meta.content_source = corrected.content_source.clone();
        }
    }
    if meta.content_source.is_empty() {
        if let Some(source) = response
            .sentences
            .iter()
            .find(|s| s.label == LABEL_SOURCE)
        {
            meta.content_source = source.text.clone();
        }
    }
}

/// Full pipeline for one page. Labeler rejections for empty or
/// all-background content surface as a worthless outcome; transport
/// failures propagate as errors.
pub fn parse_page(
    html: &str,
    url: &str,
    rule: Option<SiteRule>,
    labeler: &dyn Labeler,
) -> Result<Outcome> {
    let segmented = segment(html, url, rule.clone())?;

    let request = LabelRequest::from_sentences(&segmented.meta, &segmented.sentences);
    let response = match labeler.label(&request) {
        Ok(response) => response,
        Err(LabelFailure::EmptyInput) | Err(LabelFailure::AllBackground) => {
            warn!(url, "labeler classified page as empty");
            return Ok(Outcome::Worthless(WorthType::NoContent));
        }
        Err(err @ LabelFailure::Transport(_)) => return Err(Error::Label(err)),
    };
    if all_background(&response) {
        return Ok(Outcome::Worthless(WorthType::NoContent));
    }

    let mut meta = segmented.meta.clone();
    recover_meta(&mut meta, &response);

    let distilled = distill(&segmented.html, url, rule, &response.sentences, &meta)?;
    if distilled.worth.is_worthless() {
        return Ok(Outcome::Worthless(distilled.worth));
    }
    Ok(Outcome::Article(Box::new(distilled)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::MockLabeler;

    const PAGE: &str = concat!(
        "<html><head>",
        "<title>深海探测的新纪元已经到来 - 示例站</title>",
        r#"<meta name="author" content="测试作者">"#,
        r#"<meta name="description" content="深海探测进展综述">"#,
        "</head><body>",
        "<article>",
        "<h1>深海探测的新纪元已经到来</h1>",
        "<p>过去十年里,载人深潜器的下潜深度不断刷新纪录。",
        "科学家们在马里亚纳海沟发现了多种未知生物。</p>",
        "<p>未来的深海研究将更多依赖自主式潜航器,",
        "它们能够在极端环境下连续工作数周而无需人工干预。</p>",
        "<p>与此同时,各国的海洋研究机构正在共享深渊观测数据,",
        "以便更准确地描绘海底地形与洋流的长期变化趋势。</p>",
        r#"<img src="https://cdn.example.com/abyss.jpg">"#,
        "</article>",
        "<div><a href=\"/more\">更多</a></div>",
        "</body></html>"
    );

    #[test]
    fn test_segment_produces_sentences_and_meta() {
        let segmented = segment(PAGE, "https://example.com/deep-sea", None).unwrap();
        assert!(segmented.sentences.len() >= 3);
        assert_eq!(segmented.meta.title, "深海探测的新纪元已经到来");
        assert_eq!(segmented.meta.author, "测试作者");
        assert!(
            segmented
                .images_by_position
                .contains_key("https://cdn.example.com/abyss.jpg")
        );
        assert!(segmented.html.contains("data-pos"));
    }

    #[test]
    fn test_parse_page_end_to_end() {
        let outcome = parse_page(PAGE, "https://example.com/deep-sea", None, &MockLabeler).unwrap();
        let Outcome::Article(distilled) = outcome else {
            panic!("expected an article outcome");
        };
        assert_eq!(distilled.worth, WorthType::Valuable);
        assert!(distilled.text.contains("马里亚纳海沟"));
        assert!(distilled.html.contains("<title>深海探测的新纪元已经到来</title>"));
        assert!(
            distilled
                .images
                .contains(&"https://cdn.example.com/abyss.jpg".to_string())
        );
    }

    #[test]
    fn test_empty_page_is_worthless() {
        let outcome = parse_page(
            "<html><body><p>短</p></body></html>",
            "https://example.com/empty",
            None,
            &MockLabeler,
        );
        match outcome {
            Ok(Outcome::Worthless(_)) => {}
            Err(Error::NoSentences) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_transport_failure_propagates() {
        struct FailingLabeler;
        impl Labeler for FailingLabeler {
            fn label(&self, _: &LabelRequest) -> std::result::Result<LabelResponse, LabelFailure> {
                Err(LabelFailure::Transport("boom".into()))
            }
        }
        let err = parse_page(PAGE, "https://example.com/deep-sea", None, &FailingLabeler)
            .unwrap_err();
        assert!(matches!(err, Error::Label(LabelFailure::Transport(_))));
    }
}
