//! Extractor tests: fallback chains and site-rule overrides.

use pith::parse::Parser;
use pith::{Document, SiteRule};

#[test]
fn site_rule_title_bypasses_meta_and_fallbacks() {
    let rule = SiteRule {
        host: "example.com".into(),
        title: "//h1".into(),
        ..Default::default()
    };
    let d = Document::parse(
        concat!(
            "<html><head>",
            "<title>Some Other Title - Site</title>",
            r#"<meta property="og:title" content="OG Title">"#,
            "</head><body><h1>Breaking News</h1><p>x</p></body></html>"
        ),
        "https://example.com/post",
        Some(rule),
    )
    .unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();
    assert_eq!(meta.title, "Breaking News");
}

#[test]
fn rule_sentinel_disables_extraction() {
    let rule = SiteRule {
        host: "example.com".into(),
        pub_time: "empty".into(),
        ..Default::default()
    };
    let d = Document::parse(
        concat!(
            "<html><head>",
            r#"<meta name="pubtime" content="2025-03-06 10:00:00">"#,
            "</head><body><p>x</p></body></html>"
        ),
        "https://example.com/post",
        Some(rule),
    )
    .unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();
    assert_eq!(meta.publish_time, "");
}

#[test]
fn publish_time_normalized_and_trimmed() {
    let d = Document::parse(
        concat!(
            "<html><head>",
            r#"<meta name="pubtime" content="2025-03-06 10:30:00">"#,
            "</head><body><p>x</p></body></html>"
        ),
        "https://example.com/post",
        None,
    )
    .unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();
    assert_eq!(meta.publish_time, "2025-03-06 10:30");
}

#[test]
fn timestamp_meta_converted() {
    let d = Document::parse(
        concat!(
            "<html><head>",
            r#"<meta name="pubtime" content="1741277293">"#,
            "</head><body><p>x</p></body></html>"
        ),
        "https://example.com/post",
        None,
    )
    .unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();
    assert_eq!(meta.publish_time, "2025-03-06 16:08:13");
}

#[test]
fn author_profile_recovered_from_scripts() {
    let html = concat!(
        "<html><head>",
        r#"<meta property="og:url" content="https://mp.example.com/s?__biz=uid42=="/>"#,
        "</head><body>",
        "<script>var hd_head_img = \"https://cdn.example.com/avatar.png\";",
        "var profile_signature = \"每天一篇技术文章\";</script>",
        "<p>作者：王编辑 出品</p>",
        "</body></html>"
    );
    let d = Document::parse(html, "https://mp.example.com/s", None).unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();

    assert_eq!(meta.author, "王编辑");
    let profile = meta.author_profile.expect("profile");
    assert_eq!(profile.uid, "uid42==");
    assert_eq!(profile.profile_url, "https://cdn.example.com/avatar.png");
    assert_eq!(profile.description, "每天一篇技术文章");
}

#[test]
fn full_meta_assembly() {
    let d = Document::parse(
        concat!(
            "<html><head>",
            "<title>文章标题长度适中即可</title>",
            r#"<meta name="author" content="作者甲">"#,
            r#"<meta name="description" content="一段描述">"#,
            r#"<meta property="og:image" content="//img.example.com/cover.png">"#,
            r#"<link rel="shortcut icon" href="/fav.ico">"#,
            "</head><body><p>正文</p></body></html>"
        ),
        "https://example.com/post",
        None,
    )
    .unwrap();
    let meta = Parser::new(&d, &[]).extract_meta();
    assert_eq!(meta.title, "文章标题长度适中即可");
    assert_eq!(meta.author, "作者甲");
    assert_eq!(meta.description, "一段描述");
    assert_eq!(meta.cover_image, "http://img.example.com/cover.png");
    assert_eq!(meta.site_icon, "https://example.com/fav.ico");
}
