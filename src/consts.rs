//! Tuned constants, tag sets and pattern tables.
//!
//! The ratio thresholds in here are empirically tuned values carried over
//! unchanged; recalibrate against a regression corpus before adjusting any of
//! them.

use std::sync::LazyLock;

use regex::Regex;

/// Serialized attribute carrying an element's position id.
pub const KEY_POSITION_ID: &str = "data-pos";
/// Marker attribute on synthesized subtree wrapper nodes.
pub const KEY_SUBTREE: &str = "data-pith-subtree";

/// Tag prefix for synthetic position-marker nodes.
pub const MARKER_TAG_PREFIX: &str = "pith-";
/// Attribute prefix for label-derived annotations.
pub const ATTR_PREFIX: &str = "data-pith-";

/// Marker node wrapping a run of sentence atoms.
pub const MARKER_GROUP_TAG: &str = "pith-pos-group";
/// Marker node holding one sentence atom's text.
pub const MARKER_POS_TAG: &str = "pith-pos";

/// Atom text prefix for image placeholders.
pub const IMG_ATOM_PREFIX: &str = "<img";
/// Atom text prefix for table placeholders.
pub const TABLE_ATOM_PREFIX: &str = "<table";

/// Non-standard tag-name prefix some sites use for otherwise ordinary tags;
/// stripped during serialization.
pub const FOREIGN_TAG_PREFIX: &str = "ne-";

pub const IMG_TAGS: &[&str] = &["img", "map", "area", "canvas", "picture", "figure", "svg"];
pub const IMG_ATTRS: &[&str] = &[
    "src",
    "_src",
    "data-src",
    "data-original",
    "data-lazy-bgimg",
    "data-lazy-src",
];
pub const A_ATTRS: &[&str] = &["href", "data-href"];

pub const TABLE_TAGS: &[&str] = &["table"];

/// Video container class fingerprints seen in the wild.
pub const VIDEO_CLASS_HINTS: &[&str] = &[
    "video_iframe",
    "cne-video-embed",
    "ytp-cued-thumbnail-overlay-image",
    "pbs__player",
    "player__bg",
];
pub const VIDEO_CLASS_EXACT: &[&str] = &["qvt-video-container", "embed-container"];

/// Tags that end a paragraph when truncating an xpath to its enclosing
/// paragraph-level element.
pub const PARAGRAPH_XPATH_TAGS: &[&str] = &[
    "p", "div", "tr", "li", "section", "figcaption", "dd", "dt", "br", "h1", "h2", "h3", "h4",
    "h5", "h6",
];

/// Removed wholesale during preprocessing unless a site rule reserves them.
pub const USELESS_TAGS: &[&str] = &[
    "header", "script", "style", "footer", "comment", "aside", "nav", "noscript", "symbol",
    "button", "input", "select",
];

/// Class values that mark an element as pure page furniture when matched
/// exactly.
pub const FURNITURE_CLASSES: &[&str] = &["nav", "footer", "header"];

/// Tags skipped entirely during visible-text extraction.
pub const TEXT_SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "object", "head"];

/// Tags the potential-noise pass may never delete.
pub const CANT_DEL_TAGS: &[&str] = &["html", "body", "article", "title", "li", "p"];

/// Hosts where centroid detection is skipped outright.
pub const CENTROID_SKIP_HOSTS: &[&str] = &["mp.weixin.qq.com", "mp.weixin.com"];

/// Hosts whose cover image is always a logo; skip cover extraction.
pub const COVER_IMAGE_SKIP_HOSTS: &[&str] = &["tmtpost.com"];

/// `<article>` must hold at least this share of document text to become the
/// centroid.
pub const CENTROID_ARTICLE_RATIO: f32 = 0.6;
/// Link text must occupy at least this share of an ancestor's text for the
/// ancestor to qualify as a link bundle; climbing stops below it.
pub const LINK_BUNDLE_TEXT_RATIO: f32 = 0.7;
/// Ancestor levels examined during link-bundle detection.
pub const LINK_BUNDLE_MAX_CLIMB: usize = 3;
/// A potential-noise candidate is only deletable below this share of document
/// text.
pub const POTENTIAL_NOISE_SAFE_RATIO: f32 = 0.5;
/// A table dominating the page above this share is treated as layout, not
/// content.
pub const TABLE_DOMINANCE_RATIO: f32 = 0.8;
/// Paragraph content must cover this share of a common parent's text to merge
/// into it.
pub const PARAGRAPH_MERGE_RATIO: f32 = 0.95;
/// Window text must match an ancestor's text within this band to tag the
/// ancestor directly.
pub const SUBTREE_MATCH_LOW: f32 = 0.97;
pub const SUBTREE_MATCH_HIGH: f32 = 1.03;
/// Below this ratio an ancestor climb is abandoned.
pub const SUBTREE_ABORT_RATIO: f32 = 0.9;
/// Paragraph-merge acceptance band.
pub const PARAGRAPH_MATCH_LOW: f32 = 0.95;
pub const PARAGRAPH_MATCH_HIGH: f32 = 1.05;

pub const CHINESE_SENTENCE_STOP_SIGN: &[&str] = &["？", "！", "。", "…", "：", "；", ":"];
pub const ENGLISH_SENTENCE_STOP_SIGN: &[&str] = &["?", "!", ":", ";"];
/// Closing glyphs that pull a sentence boundary one token forward.
pub const SENTENCE_STOP_EXT: &[&str] = &["\"", "”", "’", "」", ")", "）"];

/// Words a trailing period does not end a sentence after.
pub const ABBREVIATIONS: &[&str] = &["sgt", "gov", "no"];

/// Bracket pairs inside which sentence boundaries are suppressed. Each
/// opener maps to its acceptable closers.
pub const BRACKET_PAIRS: &[(char, &[char])] = &[
    ('（', &['）', ')']),
    ('(', &[')', '）']),
    ('【', &['】']),
    ('[', &[']']),
    ('《', &['》']),
    ('<', &['>']),
    ('「', &['」']),
    ('『', &['』']),
    ('{', &['}']),
];

/// Bracket pairs stripped from around extracted titles.
pub const TITLE_NOISE_PAIRS: &[(&str, &str)] = &[
    ("【", "】"),
    ("[", "]"),
    ("「", "」"),
    ("（", "）"),
    ("(", ")"),
];

pub const TITLE_SPLIT_CHARS: &str = r"[-_|｜]";
pub const TITLE_KEEP_RATIO: f32 = 0.7;

pub const XPATH_UNION_SEP: &str = " | ";
/// Site-rule sentinel that disables an extractor outright.
pub const EMPTY_EXTRACT_PATH: &str = "empty";

pub static RE_OK_MAYBE_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("and|article|body|column|main|shadow|nickname").unwrap());
pub static RE_POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("article|artic|body|content|entry|hentry|main|page|pagination|post|text|blog|story|title")
        .unwrap()
});
pub static RE_UNLIKELY_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("community|disqus|extra|header|menu|remark|rss|agegate|pagination|pager|popup|tweet|twitter")
        .unwrap()
});
pub static RE_NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "combx|comment|commnent|com-|contact|foot|footer|footnote|masthead|meta|outbrain|promo|\
         related|scroll|shoutbox|sidebar|sponsor|shopping|tag|tool|recommend|recommon|search|\
         crumb|disclaimer|relate|hot|share|pop_|side|qr_code|qr-code|qrcode|ad-break|extra|\
         title-bar|video|navbar|erweima|data-ad|retop|wx-qr|nav-panel",
    )
    .unwrap()
});
pub static RE_NOISE_ATTR: LazyLock<Regex> = LazyLock::new(|| Regex::new("data-ad").unwrap());
pub static RE_NEGATIVE_IMG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("avatar|logo|author|title|标题|weibo|wechat|weixin|icon|公众号|更多|关注|landing|loading")
        .unwrap()
});
pub static RE_NEGATIVE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("更多|详细|关注|aboutus|公众号|wechat|weibo").unwrap());

pub static RE_PROFILE_IMG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var hd_head_img = "(.*?)""#).unwrap());
pub static RE_AUTHOR_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var profile_signature = "(.*?)""#).unwrap());
pub static RE_AUTHOR_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"var biz = "(.*?)""#).unwrap());
pub static RE_AUTHOR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"window.name = "(.*?)""#).unwrap());

/// Short noise phrases removed when an element's full text stays under the
/// paired length.
pub const TINY_NOISE_RULES: &[(&str, usize)] = &[
    ("点击上方", 30),
    ("关注我们", 20),
    ("点击蓝字", 30),
    ("阅读原文", 20),
    ("扫码关注", 20),
    ("返回搜狐", 20),
    ("责任编辑", 30),
    ("滑动查看更多", 20),
];

pub const LABEL_NOISE: &str = "O";
pub const LABEL_CONTENT: &str = "content";
pub const LABEL_TITLE: &str = "article_title";
pub const LABEL_AUTHOR: &str = "author";
pub const LABEL_SOURCE: &str = "source";
pub const LABEL_PUB_TIME: &str = "publish_time";
pub const LABEL_INTRO: &str = "introduction";
pub const LABEL_ABSTRACT: &str = "abstract";
pub const LABEL_CATALOG: &str = "catalog";
pub const LABEL_TITLE_L1: &str = "title1";
pub const LABEL_TITLE_L2: &str = "title2";
pub const LABEL_TITLE_L3: &str = "title3";
pub const LABEL_TITLE_L4: &str = "title4";
pub const LABEL_TITLE_OTHER: &str = "title5";
pub const LABEL_LEGEND: &str = "figure_title";
pub const LABEL_FIGURE: &str = "figure";
pub const LABEL_REFERENCE: &str = "reference";

/// Transformation applied to elements carrying a given sentence label.
#[derive(Debug, Clone, Copy)]
pub struct LabelRule {
    pub label: &'static str,
    /// Remove the labeled text (and media) from the tree.
    pub clean: bool,
    pub new_tag: &'static str,
    pub new_attr: &'static str,
}

/// Subtree-merge rule: same-label runs are wrapped in one annotated subtree.
#[derive(Debug, Clone, Copy)]
pub struct SubtreeRule {
    pub rule: LabelRule,
    /// Restrict merging to atoms sharing the same paragraph/segment id.
    pub same_paragraph: bool,
}

pub const LABEL_RULES: &[LabelRule] = &[
    LabelRule { label: LABEL_NOISE, clean: true, new_tag: "", new_attr: "" },
    LabelRule { label: LABEL_REFERENCE, clean: false, new_tag: "", new_attr: "data-pith-reference" },
    LabelRule { label: LABEL_TITLE, clean: true, new_tag: "", new_attr: "" },
    LabelRule { label: LABEL_PUB_TIME, clean: true, new_tag: "", new_attr: "" },
    LabelRule { label: LABEL_AUTHOR, clean: true, new_tag: "", new_attr: "" },
    LabelRule { label: LABEL_SOURCE, clean: true, new_tag: "", new_attr: "" },
];

pub const SUBTREE_RULES: &[SubtreeRule] = &[
    SubtreeRule {
        rule: LabelRule { label: LABEL_INTRO, clean: false, new_tag: "", new_attr: "data-pith-intro" },
        same_paragraph: false,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_ABSTRACT, clean: false, new_tag: "", new_attr: "data-pith-intro" },
        same_paragraph: false,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_CATALOG, clean: false, new_tag: "", new_attr: "data-pith-intro" },
        same_paragraph: false,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_LEGEND, clean: false, new_tag: "", new_attr: "data-pith-legend" },
        same_paragraph: false,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_TITLE_L1, clean: false, new_tag: "", new_attr: "data-pith-h1" },
        same_paragraph: true,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_TITLE_L2, clean: false, new_tag: "", new_attr: "data-pith-h2" },
        same_paragraph: true,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_TITLE_L3, clean: false, new_tag: "", new_attr: "data-pith-h3" },
        same_paragraph: true,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_TITLE_L4, clean: false, new_tag: "", new_attr: "data-pith-h4" },
        same_paragraph: true,
    },
    SubtreeRule {
        rule: LabelRule { label: LABEL_TITLE_OTHER, clean: false, new_tag: "", new_attr: "data-pith-h5" },
        same_paragraph: true,
    },
];

/// Maps xpath components onto the coarse tag vocabulary the labeler sees.
pub const GOLD_TAG_MAPPING: &[(&str, &str)] = &[
    ("h1", "h1"),
    ("h2", "h2"),
    ("h3", "h3"),
    ("h4", "h4"),
    ("h5", "h5"),
    ("h6", "h6"),
    ("strong", "strong"),
    ("b", "b"),
    ("em", "em"),
    ("hr", "hr"),
    ("br", "br"),
    ("img", "img"),
    ("map", "img"),
    ("area", "img"),
    ("canvas", "img"),
    ("picture", "img"),
    ("figure", "img"),
    ("svg", "img"),
    ("figcaption", "figcaption"),
    ("table", "table"),
    ("th", "table"),
    ("tr", "table"),
    ("td", "table"),
    ("thead", "table"),
    ("tbody", "table"),
    ("tfoot", "table"),
    ("col", "table"),
    ("colgroup", "table"),
    ("caption", "caption"),
    ("menu", "li"),
    ("ul", "li"),
    ("ol", "li"),
    ("li", "li"),
    ("dl", "li"),
];

/// Meta xpaths that carry a publish time on standards-following sites.
pub const PUBLISH_TIME_META_PATHS: &[&str] = &[
    r#"//meta[starts-with(@property, "rnews:datePublished")]"#,
    r#"//meta[starts-with(@property, "article:published_time")]"#,
    r#"//meta[starts-with(@property, "og:published_time")]"#,
    r#"//meta[starts-with(@property, "og:release_date")]"#,
    r#"//meta[starts-with(@itemprop, "datePublished")]"#,
    r#"//meta[starts-with(@itemprop, "dateUpdate")]"#,
    r#"//meta[starts-with(@name, "citation_date")]"#,
    r#"//meta[starts-with(@name, "OriginalPublicationDate")]"#,
    r#"//meta[starts-with(@name, "article_date_original")]"#,
    r#"//meta[starts-with(@name, "og:time")]"#,
    r#"//meta[starts-with(@name, "apub:time")]"#,
    r#"//meta[starts-with(@name, "publication_date")]"#,
    r#"//meta[starts-with(@name, "sailthru.date")]"#,
    r#"//meta[starts-with(@name, "PublishDate")]"#,
    r#"//meta[starts-with(@name, "publishdate")]"#,
    r#"//meta[starts-with(@name, "PubDate")]"#,
    r#"//meta[starts-with(@name, "pubtime")]"#,
    r#"//meta[starts-with(@name, "_pubtime")]"#,
    r#"//meta[starts-with(@name, "weibo: article:create_at")]"#,
    r#"//meta[starts-with(@pubdate, "pubdate")]"#,
];

pub const AUTHOR_META_KEYS: &[&str] = &["author", "article:author"];
pub const DESCRIPTION_META_KEYS: &[&str] = &["description", "og:description"];
pub const COVER_IMAGE_META_KEYS: &[&str] = &["og:image"];
pub const TITLE_META_KEYS: &[&str] = &["og:title"];

pub const AUTHOR_KEYWORDS: &[&str] = &[
    "作者", "原创", "来源", "出品", "文", "责编", "责任编辑", "编辑", "撰文", "文案", "文字",
    "翻译", "报道", "记者", "校对", "设计制作", "设计", "审核", "美编", "ID", "排版", "热门专栏",
    "整理", "编导", "策划",
];

/// Script-embedded publish times with a capture group.
pub const DATETIME_SUBMATCH_PATTERNS: &[&str] = &[r"var createTime = '(.+?)';"];

/// Freeform datetime shapes, most specific first.
pub const DATETIME_PATTERNS: &[&str] = &[
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[0-1]?[0-9]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[2][0-3]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[0-1]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[2][0-3]:[0-5]?[0-9])",
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[1-24]\d时[0-60]\d分)([1-24]\d时)",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[0-1]?[0-9]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[2][0-3]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[0-1]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[2][0-3]:[0-5]?[0-9])",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2}\s*?[1-24]\d时[0-60]\d分)([1-24]\d时)",
    r"(\d{4}年\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}年\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}年\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9])",
    r"(\d{4}年\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9])",
    r"(\d{4}年\d{1,2}月\d{1,2}日\s*?[1-24]\d时[0-60]\d分)([1-24]\d时)",
    r"(\d{2}年\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}年\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}年\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9])",
    r"(\d{2}年\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9])",
    r"(\d{2}年\d{1,2}月\d{1,2}日\s*?[1-24]\d时[0-60]\d分)([1-24]\d时)",
    r"(\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9]:[0-5]?[0-9])",
    r"(\d{1,2}月\d{1,2}日\s*?[0-1]?[0-9]:[0-5]?[0-9])",
    r"(\d{1,2}月\d{1,2}日\s*?[2][0-3]:[0-5]?[0-9])",
    r"(\d{1,2}月\d{1,2}日\s*?[1-24]\d时[0-60]\d分)([1-24]\d时)",
    r"(\d{4}[-|/|.]\d{1,2}[-|/|.]\d{1,2})",
    r"(\d{1,2}[-|/|.]\d{1,2}[-|/|.]\d{4})",
    r"(\d{2}[-|/|.]\d{1,2}[-|/|.]\d{1,2})",
    r"(\d{4}年\d{1,2}月\d{1,2}日)",
    r"(\d{2}年\d{1,2}月\d{1,2}日)",
    r"(\d{1,2}月\d{1,2}日)",
];

pub static DATETIME_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DATETIME_PATTERNS
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
});

/// chrono formats with a time component, tried in order.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y年%m月%d日 %H:%M:%S",
    "%Y年%m月%d日 %H:%M",
    "%Y年%m月%d日 %H时%M分%S秒",
    "%Y年%m月%d日 %H时%M分",
    "%b %d %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Date-only chrono formats; midnight is assumed and later trimmed away.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y年%m月%d日",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%d %b %Y",
    "%d %b, %Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
];

pub const NORMALIZED_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Pages shorter than this (in chars) are candidates for worthlessness.
pub const WORTHLESS_TEXT_LEN: usize = 100;
/// Share of a keyword group that must match for a page to be a known error
/// page.
pub const WORTHLESS_KEYWORD_RATIO: f32 = 0.75;

pub const WORTHLESS_PAGE_TITLES: &[&str] = &[
    "账号已迁移",
    "page not found",
    "Captcha Interception",
    "安全验证",
    "404页面",
    "404 Not Found",
    "403 Forbidden",
    "页面没有找到",
    "找不到我要找的页面",
];

pub static WORTHLESS_TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&WORTHLESS_PAGE_TITLES.join("|")).unwrap());

pub const WORTHLESS_PAGE_KEYWORDS: &[&[&str]] = &[
    &["已删除", "不存在", "页面", "跳回"],
    &["节点", "域名", "存在"],
    &["端口", "域名", "绑定"],
    &["nginx", "404", "403"],
    &["请求", "非法"],
    &["网站", "无法", "访问"],
    &["content", "deleted", "author"],
    &["No", "page", "found", "not"],
    &["内容", "发布者", "删除", "作者"],
    &["抱歉", "页面", "没", "找到"],
    &["抱歉", "网页", "出错"],
    &["自动", "跳转", "首页"],
    &["内容", "违规", "无法", "查看"],
    &["链接", "不", "访问"],
    &["公众号", "已迁移"],
    &["网络", "稍后", "重试"],
    &["文章", "找不到"],
    &["检查", "网址", "是否正确"],
    &["输入", "错误", "重新"],
];
