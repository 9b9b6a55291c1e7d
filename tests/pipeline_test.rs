//! End-to-end pipeline tests: worthlessness outcomes and label-driven
//! formatting.

use pith::consts::{LABEL_CONTENT, LABEL_INTRO, LABEL_NOISE};
use pith::label::{LabelFailure, LabelRequest, LabelResponse, LabeledAtom, LabeledSentence};
use pith::{Labeler, MockLabeler, Outcome, WorthType, parse_page};

#[test]
fn short_error_page_classifies_as_not_found() {
    let html = concat!(
        "<html><head><title>404 Not Found</title></head>",
        "<body><p>The page you requested is gone.</p></body></html>"
    );
    let outcome = parse_page(html, "https://example.com/gone", None, &MockLabeler).unwrap();
    match outcome {
        Outcome::Worthless(kind) => assert_eq!(kind, WorthType::NotFound),
        other => panic!("expected worthless, got {other:?}"),
    }
}

#[test]
fn normal_article_classifies_as_valuable() {
    let body = "这是真正的文章内容,每一句都在推进论点。".repeat(10);
    let html = format!(
        "<html><head><title>一篇普通的文章标题</title></head><body><article><p>{body}</p></article></body></html>"
    );
    let outcome = parse_page(&html, "https://example.com/ok", None, &MockLabeler).unwrap();
    let Outcome::Article(article) = outcome else {
        panic!("expected article");
    };
    assert_eq!(article.worth, WorthType::Valuable);
    assert!(article.text.chars().count() > 100);
}

/// Labels sentences by content: intro-ish sentences get the intro label,
/// boilerplate gets noise.
struct ScriptedLabeler;

impl Labeler for ScriptedLabeler {
    fn label(&self, request: &LabelRequest) -> Result<LabelResponse, LabelFailure> {
        if request.sentences.is_empty() {
            return Err(LabelFailure::EmptyInput);
        }
        Ok(LabelResponse {
            sentences: request
                .sentences
                .iter()
                .map(|s| {
                    let label = if s.text.contains("导读") {
                        LABEL_INTRO
                    } else if s.text.contains("点个赞") {
                        LABEL_NOISE
                    } else {
                        LABEL_CONTENT
                    };
                    LabeledSentence {
                        text: s.text.clone(),
                        label: label.to_string(),
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
                    }
                })
                .collect(),
            article: None,
        })
    }
}

#[test]
fn labeled_intro_is_marked_and_noise_is_scrubbed() {
    let html = concat!(
        "<html><head><title>标签驱动的重排测试文章</title></head><body>",
        "<div>",
        "<p>导读部分梳理了三个关键问题。</p>",
        "<p>导读部分给出了相应的解决思路。</p>",
        "</div>",
        "<p>正文第一段,论述第一个问题的来龙去脉,内容充实且与导读呼应,",
        "为了凑足长度再补充一些背景介绍和相关的数据支撑。</p>",
        "<p>正文第二段,继续讨论剩下的问题,并给出结论与展望,",
        "同样补充了足够多的细节避免被判定为无内容页面。</p>",
        "<p>觉得有用请点个赞再走。</p>",
        "</body></html>"
    );
    let outcome = parse_page(html, "https://example.com/labeled", None, &ScriptedLabeler).unwrap();
    let Outcome::Article(article) = outcome else {
        panic!("expected article");
    };

    // the two intro sentences were regrouped under one marked subtree
    assert!(article.html.contains("data-pith-intro"));
    // the like-bait sentence was scrubbed from the text
    assert!(!article.text.contains("点个赞"));
    assert!(article.text.contains("正文第一段"));
}

#[test]
fn all_noise_labels_mean_worthless() {
    struct NoiseLabeler;
    impl Labeler for NoiseLabeler {
        fn label(&self, request: &LabelRequest) -> Result<LabelResponse, LabelFailure> {
            Ok(LabelResponse {
                sentences: request
                    .sentences
                    .iter()
                    .map(|s| LabeledSentence {
                        text: s.text.clone(),
                        label: LABEL_NOISE.to_string(),
                        segment_id: s.segment_id,
                        atoms: Vec::new(),
                    })
                    .collect(),
                article: None,
            })
        }
    }
    let html = "<html><body><p>随便一句话。</p></body></html>";
    let outcome = parse_page(html, "https://example.com/noise", None, &NoiseLabeler).unwrap();
    assert!(matches!(outcome, Outcome::Worthless(_)));
}

#[test]
fn labeler_metadata_fills_blanks() {
    struct CorrectingLabeler;
    impl Labeler for CorrectingLabeler {
        fn label(&self, request: &LabelRequest) -> Result<LabelResponse, LabelFailure> {
            let mut response = MockLabeler.label(request)?;
            response.article = Some(pith::ArticleMeta {
                author: "模型识别的作者".into(),
                content_source: "模型识别的来源".into(),
                ..Default::default()
            });
            Ok(response)
        }
    }
    let body = "没有任何元信息的页面,但正文足够长可以通过内容检查。".repeat(6);
    let html = format!("<html><body><article><p>{body}</p></article></body></html>");
    let outcome = parse_page(&html, "https://example.com/bare", None, &CorrectingLabeler).unwrap();
    let Outcome::Article(article) = outcome else {
        panic!("expected article");
    };
    assert_eq!(article.meta.author, "模型识别的作者");
    assert_eq!(article.meta.content_source, "模型识别的来源");
}
