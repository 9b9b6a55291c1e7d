//! The cleaner: ordered pipelines of independent noise-removal passes.
//!
//! Every pass tolerates "nothing found" as a no-op; only structural
//! failures (no parseable tree, a forced rule that matched nothing)
//! propagate as errors.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::consts::{
    CANT_DEL_TAGS, CENTROID_ARTICLE_RATIO, CENTROID_SKIP_HOSTS, IMG_ATTRS, LABEL_AUTHOR,
    LABEL_NOISE, LABEL_PUB_TIME, LABEL_SOURCE, LABEL_TITLE, LINK_BUNDLE_MAX_CLIMB,
    LINK_BUNDLE_TEXT_RATIO, POTENTIAL_NOISE_SAFE_RATIO, RE_NEGATIVE, RE_NEGATIVE_IMG,
    RE_NEGATIVE_LINK, RE_NOISE_ATTR, RE_OK_MAYBE_CANDIDATE, RE_POSITIVE, RE_UNLIKELY_CANDIDATE,
    TINY_NOISE_RULES,
};
use crate::doc::Document;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::label::LabeledSentence;
use crate::util;

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        if num == 0 { 1.0 } else { f32::INFINITY }
    } else {
        num as f32 / den as f32
    }
}

pub struct Cleaner<'d> {
    doc: &'d mut Document,
    sentences: Vec<LabeledSentence>,
}

type Pass<'d> = fn(&mut Cleaner<'d>) -> Result<()>;

impl<'d> Cleaner<'d> {
    pub fn new(doc: &'d mut Document) -> Cleaner<'d> {
        Cleaner {
            doc,
            sentences: Vec::new(),
        }
    }

    /// Labeled sentences steer the post-split passes.
    pub fn set_sentences(&mut self, sentences: Vec<LabeledSentence>) {
        self.sentences = sentences;
    }

    fn run(&mut self, passes: &[(&str, Pass<'d>)]) -> Result<()> {
        for (name, pass) in passes {
            if let Err(err) = pass(self) {
                warn!(pass = name, %err, "clean pass failed");
                return Err(err);
            }
            debug!(pass = name, "clean pass done");
        }
        Ok(())
    }

    /// Pre-split pipeline: runs before sentence splitting on the freshly
    /// parsed document.
    pub fn purify(&mut self) -> Result<()> {
        self.run(&[
            ("centroid", Self::clean_by_centroid),
            ("site-rule", Self::clean_by_site_rule),
            ("tiny-noise", Self::clean_tiny_noise),
            ("potential-noise", Self::clean_potential_noise),
            ("noise-image", Self::clean_noise_images),
            ("meta-link", Self::clean_meta_links),
            ("noise-link", Self::clean_noise_links),
            ("link-bundle", Self::clean_link_bundles),
            ("author-avatar", Self::clean_author_avatars),
        ])
    }

    /// Post-split pipeline: runs after labeling, guided by sentence labels.
    pub fn post_purify(&mut self) -> Result<()> {
        let semantic = !self
            .doc
            .rule
            .as_ref()
            .is_some_and(|r| r.no_semantic_denoise);
        if semantic {
            self.run(&[
                ("duplicate-title", Self::clean_duplicated_titles),
                ("media-beyond-canvas", Self::clean_media_beyond_canvas),
                ("empty-tag", Self::clean_empty_tags),
            ])
        } else {
            self.run(&[("empty-tag", Self::clean_empty_tags)])
        }
    }

    // -- pre-split passes ---------------------------------------------------

    /// Centroid detection: prefer `<article>` when it holds enough of the
    /// page text, otherwise keep the whole `<body>`.
    fn clean_by_centroid(&mut self) -> Result<()> {
        if self.doc.rule.as_ref().is_some_and(|r| !r.bodies.is_empty()) {
            return Ok(());
        }
        if CENTROID_SKIP_HOSTS.iter().any(|h| self.doc.url.contains(h)) {
            return Ok(());
        }
        let Some(&body) = self.doc.query("//body").first() else {
            return Ok(());
        };

        let mut centroids: Vec<NodeId> = Vec::new();
        let articles = self.doc.relative_query(body, ".//article");
        if articles.is_empty() {
            info!("no <article> found, using body as main content");
            centroids.push(body);
        } else {
            let page_text = self.doc.raw_text(self.doc.root());
            let article_text: String = articles
                .iter()
                .map(|&a| self.doc.raw_text(a))
                .collect::<Vec<_>>()
                .join("");
            if ratio(article_text.len(), page_text.len()) > CENTROID_ARTICLE_RATIO {
                info!("<article> dominates page text, using it as main content");
                centroids.extend(articles);
            } else {
                centroids.push(body);
            }
        }

        let new_body = self.doc.arena_mut().create_named("body");
        for elem in centroids {
            self.doc.arena_mut().detach(elem);
            self.doc.arena_mut().append(new_body, elem);
        }
        self.doc.reset_subtree(new_body)
    }

    /// Apply the site rule's explicit noise and body selectors.
    fn clean_by_site_rule(&mut self) -> Result<()> {
        let Some(rule) = self.doc.rule.clone() else {
            return Ok(());
        };
        for path in &rule.noises {
            self.doc.remove_by_path(path);
        }
        if rule.bodies.is_empty() {
            return Ok(());
        }

        let new_body = self.doc.arena_mut().create_named("body");
        let mut matched = 0usize;
        for path in &rule.bodies {
            for elem in self.doc.query(path) {
                self.doc.arena_mut().detach(elem);
                self.doc.arena_mut().append(new_body, elem);
                matched += 1;
            }
        }
        if matched > 0 {
            self.doc.reset_subtree(new_body)?;
        } else if rule.body_use_rule_only {
            return Err(Error::RuleConflict {
                url: self.doc.url.clone(),
            });
        }
        Ok(())
    }

    /// Short boilerplate phrases ("click to follow" and friends) whose
    /// element carries next to no other text.
    fn clean_tiny_noise(&mut self) -> Result<()> {
        for (phrase, max_len) in TINY_NOISE_RULES {
            let path = format!("//*[contains(text(), '{phrase}')]");
            for elem in self.doc.query(&path) {
                let text = self.doc.raw_text(elem);
                if text.chars().count() > *max_len {
                    continue;
                }
                info!(pid = self.doc.position_id(elem), phrase, "removing tiny noise");
                if let Err(err) = self.doc.remove_element(elem) {
                    warn!(%err, "tiny noise removal skipped");
                }
            }
        }
        Ok(())
    }

    /// Class/id scoring: unlikely/negative patterns mark a candidate unless
    /// a positive pattern vouches for it, and deleting it must not take out
    /// half the page.
    fn clean_potential_noise(&mut self) -> Result<()> {
        let body_len = self.doc.raw_text(self.doc.root()).len();
        for elem in self.doc.walk(self.doc.root()) {
            let tag = self.doc.arena().tag(elem);
            if CANT_DEL_TAGS.contains(&tag) {
                continue;
            }

            let attr_names: String = self
                .doc
                .arena()
                .element(elem)
                .map(|e| {
                    e.attrs
                        .iter()
                        .map(|a| a.name.as_str())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            let mut is_noise = RE_NOISE_ATTR.is_match(&attr_names);

            if !is_noise {
                for key in ["class", "id"] {
                    let value = self.doc.arena().attr_or(elem, key, "");
                    if value.is_empty() {
                        continue;
                    }
                    let suspicious =
                        RE_UNLIKELY_CANDIDATE.is_match(value) || RE_NEGATIVE.is_match(value);
                    let vouched =
                        RE_OK_MAYBE_CANDIDATE.is_match(value) || RE_POSITIVE.is_match(value);
                    if suspicious && !vouched {
                        is_noise = true;
                        break;
                    }
                }
            }

            if is_noise {
                let elem_len = self.doc.raw_text(elem).len();
                if ratio(elem_len, body_len) < POTENTIAL_NOISE_SAFE_RATIO {
                    info!(pid = self.doc.position_id(elem), "removing potential noise");
                    if let Err(err) = self.doc.remove_element(elem) {
                        warn!(%err, "potential noise removal skipped");
                    }
                }
            }
        }
        Ok(())
    }

    /// Avatar/logo/qr-code images. Skipped when a site rule matched, to
    /// protect curated cover images.
    fn clean_noise_images(&mut self) -> Result<()> {
        if self.doc.rule.is_some() {
            info!("site rule present, skipping noise-image pass");
            return Ok(());
        }
        for elem in self.doc.query("//img") {
            let haystack: String = IMG_ATTRS
                .iter()
                .chain(["alt", "class"].iter())
                .map(|key| self.doc.arena().attr_or(elem, key, ""))
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(m) = RE_NEGATIVE_IMG.find(&haystack) {
                info!(pid = self.doc.position_id(elem), matched = m.as_str(), "removing noise image");
                if let Err(err) = self.doc.remove_element(elem) {
                    warn!(%err, "noise image removal skipped");
                }
                continue;
            }
            // image nodes never need children
            self.doc.arena_mut().clear_children(elem);
        }
        Ok(())
    }

    fn clean_meta_links(&mut self) -> Result<()> {
        self.doc.remove_by_path("//link | //script");
        Ok(())
    }

    fn clean_noise_links(&mut self) -> Result<()> {
        for elem in self.doc.query("//a") {
            let text = self.doc.raw_text(elem);
            if let Some(m) = RE_NEGATIVE_LINK.find(&text) {
                info!(pid = self.doc.position_id(elem), matched = m.as_str(), "removing noise link");
                if let Err(err) = self.doc.remove_element(elem) {
                    warn!(%err, "noise link removal skipped");
                }
            }
        }
        Ok(())
    }

    fn anchor_pids(&self, root: NodeId) -> (usize, Vec<u32>, String) {
        let mut count = 0usize;
        let mut pids = Vec::new();
        let mut text = String::new();
        for node in self.doc.walk(root) {
            if self.doc.arena().tag(node) == "a" {
                count += 1;
                pids.push(self.doc.position_id(node));
                text.push_str(&self.doc.raw_text(node));
            }
        }
        (count, pids, text)
    }

    /// Climb from an anchor looking for the navigation cluster that owns it.
    fn check_link_bundle(&self, elem: NodeId) -> Option<(NodeId, Vec<u32>)> {
        let (num_links, mut link_pids, _) = self.anchor_pids(elem);
        let mut current_text = util::clean(&self.doc.raw_text(elem));
        let mut current = elem;

        for _ in 0..LINK_BUNDLE_MAX_CLIMB {
            let parent = self.doc.arena().parent(current);
            if !self.doc.arena().is_element(parent) {
                return None;
            }
            let (parent_links, parent_pids, parent_link_text) = self.anchor_pids(parent);
            link_pids.extend(parent_pids);
            let parent_text = util::clean(&self.doc.raw_text(parent));
            let parent_link_text = util::clean(&parent_link_text);

            if parent_links == num_links {
                if parent_text.len() == current_text.len()
                    || ratio(current_text.len(), parent_text.len()) >= LINK_BUNDLE_TEXT_RATIO
                {
                    current_text = parent_text;
                    current = parent;
                    continue;
                }
                return None;
            }
            if parent_links > num_links {
                if parent_text.len() == parent_link_text.len()
                    || ratio(parent_link_text.len(), parent_text.len()) >= LINK_BUNDLE_TEXT_RATIO
                {
                    return Some((parent, link_pids));
                }
                return None;
            }
        }
        None
    }

    /// Remove anchor clusters whose combined text dominates an ancestor;
    /// these are nav bars and link farms, not prose.
    fn clean_link_bundles(&mut self) -> Result<()> {
        let skip = self
            .doc
            .rule
            .as_ref()
            .is_some_and(|r| !r.bodies.is_empty() || !r.noises.is_empty());
        if skip {
            return Ok(());
        }

        let mut visited: HashSet<u32> = HashSet::new();
        for elem in self.doc.walk(self.doc.root()) {
            if self.doc.arena().tag(elem) != "a" {
                continue;
            }
            if self.doc.arena().parent(elem).is_none() {
                continue;
            }
            let pid = self.doc.position_id(elem);
            if !visited.insert(pid) {
                continue;
            }
            if let Some((bundle, link_pids)) = self.check_link_bundle(elem) {
                info!(
                    bundle_pid = self.doc.position_id(bundle),
                    links = link_pids.len(),
                    "removing link bundle"
                );
                if let Err(err) = self.doc.remove_element(bundle) {
                    warn!(%err, "link bundle removal skipped");
                }
                visited.extend(link_pids);
            }
        }
        Ok(())
    }

    /// Reserved hook.
    fn clean_author_avatars(&mut self) -> Result<()> {
        Ok(())
    }

    // -- post-split passes --------------------------------------------------

    /// Reserved hook.
    fn clean_duplicated_titles(&mut self) -> Result<()> {
        Ok(())
    }

    /// Drop svg/video elements whose top-level container falls outside the
    /// span between the first and last article sentence.
    fn clean_media_beyond_canvas(&mut self) -> Result<()> {
        if self.sentences.is_empty() {
            return Ok(());
        }

        let header_labels = [
            LABEL_NOISE,
            LABEL_AUTHOR,
            LABEL_TITLE,
            LABEL_PUB_TIME,
            LABEL_SOURCE,
        ];
        let mut first_pid: u32 = 0;
        for sentence in &self.sentences {
            if header_labels.contains(&sentence.label.as_str()) {
                continue;
            }
            if let Some(atom) = sentence.atoms.first() {
                first_pid = atom.position_id;
            }
            break;
        }
        let mut last_pid: u32 = 0;
        for sentence in self.sentences.iter().rev() {
            if sentence.label == LABEL_NOISE {
                continue;
            }
            if let Some(atom) = sentence.atoms.last() {
                last_pid = atom.position_id;
            }
            break;
        }

        if let Some(node) = self.doc.resolve(first_pid) {
            first_pid = self.doc.position_id(self.doc.most_top_elem(node));
        }
        if let Some(node) = self.doc.resolve(last_pid) {
            last_pid = self.doc.position_id(self.doc.most_top_elem(node));
        }
        if first_pid == 0 && last_pid == 0 {
            return Ok(());
        }
        if last_pid == 0 {
            last_pid = u32::MAX;
        }

        for elem in self.doc.query("//svg | //video") {
            let top = self.doc.most_top_elem(elem);
            let top_pid = self.doc.position_id(top);
            if top_pid < first_pid || top_pid > last_pid {
                info!(pid = top_pid, "removing media beyond canvas");
                if let Err(err) = self.doc.remove_element(elem) {
                    warn!(%err, "out-of-canvas media removal skipped");
                }
            }
        }
        Ok(())
    }

    /// Bottom-up pruning of elements with no text, image or video content.
    /// Running it twice never produces further change.
    fn clean_empty_tags(&mut self) -> Result<()> {
        let root = self.doc.root();
        self.prune_empty(root, true);
        Ok(())
    }

    fn prune_empty(&mut self, id: NodeId, is_root: bool) {
        let children: Vec<NodeId> = self
            .doc
            .arena()
            .children(id)
            .filter(|&c| self.doc.arena().is_element(c))
            .collect();
        for child in children {
            self.prune_empty(child, false);
        }
        if is_root {
            return;
        }
        if ["img", "svg", "video"].contains(&self.doc.arena().tag(id)) {
            return;
        }
        if self.doc.has_text(id) || self.doc.has_image(id) || self.doc.has_video(id) {
            return;
        }
        if let Err(err) = self.doc.remove_element(id) {
            warn!(%err, "empty tag removal skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SiteRule;

    fn doc(html: &str) -> Document {
        Document::parse(html, "https://example.com/post", None).unwrap()
    }

    #[test]
    fn test_centroid_prefers_dominant_article() {
        let mut d = doc(concat!(
            "<html><body>",
            "<div>short sidebar text</div>",
            "<article><p>",
            "这是正文内容这是正文内容这是正文内容这是正文内容这是正文内容",
            "这是正文内容这是正文内容这是正文内容这是正文内容这是正文内容",
            "</p></article>",
            "</body></html>"
        ));
        let mut cleaner = Cleaner::new(&mut d);
        cleaner.clean_by_centroid().unwrap();
        assert_eq!(d.arena().tag(d.root()), "body");
        assert!(!d.query("//article").is_empty());
        assert!(d.query("//div").is_empty());
    }

    #[test]
    fn test_centroid_keeps_body_when_article_small() {
        let mut d = doc(concat!(
            "<html><body>",
            "<article><p>tiny</p></article>",
            "<div><p>",
            "主要内容在文章标签之外主要内容在文章标签之外主要内容在文章标签之外",
            "主要内容在文章标签之外主要内容在文章标签之外主要内容在文章标签之外",
            "</p></div>",
            "</body></html>"
        ));
        let mut cleaner = Cleaner::new(&mut d);
        cleaner.clean_by_centroid().unwrap();
        assert!(!d.query("//div").is_empty());
    }

    #[test]
    fn test_site_rule_body_only_conflict() {
        let rule = SiteRule {
            host: "example.com".into(),
            bodies: vec!["//div[@id='nope']".into()],
            body_use_rule_only: true,
            ..Default::default()
        };
        let mut d = Document::parse(
            "<html><body><p>x</p></body></html>",
            "https://example.com/post",
            Some(rule),
        )
        .unwrap();
        let mut cleaner = Cleaner::new(&mut d);
        let err = cleaner.clean_by_site_rule();
        assert!(matches!(err, Err(Error::RuleConflict { .. })));
    }

    #[test]
    fn test_site_rule_noise_removed() {
        let rule = SiteRule {
            host: "example.com".into(),
            noises: vec!["//div[@id='ad']".into()],
            ..Default::default()
        };
        let mut d = Document::parse(
            r#"<html><body><div id="ad">ad</div><p>keep</p></body></html>"#,
            "https://example.com/post",
            Some(rule),
        )
        .unwrap();
        Cleaner::new(&mut d).clean_by_site_rule().unwrap();
        assert!(d.query("//div").is_empty());
        assert_eq!(d.query("//p").len(), 1);
    }

    #[test]
    fn test_link_bundle_removed() {
        // five sibling anchors carrying ~all of the div text
        let mut d = doc(concat!(
            "<html><body>",
            "<div id=\"menu\">",
            "<a href=\"/1\">首页导航</a>",
            "<a href=\"/2\">新闻中心</a>",
            "<a href=\"/3\">产品介绍</a>",
            "<a href=\"/4\">关于我们啊</a>",
            "<a href=\"/5\">联系方式啊</a>",
            "</div>",
            "<p>这是一段正文,不应该被删除。这是一段正文。</p>",
            "</body></html>"
        ));
        Cleaner::new(&mut d).clean_link_bundles().unwrap();
        assert!(d.query("//a").is_empty());
        assert_eq!(d.query("//p").len(), 1);
    }

    #[test]
    fn test_single_link_in_prose_kept() {
        let mut d = doc(concat!(
            "<html><body><div>",
            "<p>第一段相当长的正文内容,用来稀释链接文本的占比。</p>",
            "<p>第二段相当长的正文内容,继续稀释链接文本的占比。</p>",
            "<p>第三段正文,其中有一个<a href=\"/x\">链接</a>而已。</p>",
            "</div></body></html>"
        ));
        Cleaner::new(&mut d).clean_link_bundles().unwrap();
        assert_eq!(d.query("//a").len(), 1);
    }

    #[test]
    fn test_potential_noise_scoring() {
        let mut d = doc(concat!(
            "<html><body>",
            "<div class=\"sidebar\">related links</div>",
            "<div class=\"article-body\">这里是正文内容,字数比侧栏多得多,",
            "足以让侧栏的占比远小于一半。这里是正文内容。</div>",
            "</body></html>"
        ));
        Cleaner::new(&mut d).clean_potential_noise().unwrap();
        let divs = d.query("//div");
        assert_eq!(divs.len(), 1);
        assert_eq!(d.arena().attr(divs[0], "class"), Some("article-body"));
    }

    #[test]
    fn test_noise_image_removed_but_content_image_kept() {
        let mut d = doc(concat!(
            "<html><body>",
            r#"<img src="https://cdn.example.com/logo.png">"#,
            r#"<img src="https://cdn.example.com/figure1.png">"#,
            "<p>text</p></body></html>"
        ));
        Cleaner::new(&mut d).clean_noise_images().unwrap();
        let imgs = d.query("//img");
        assert_eq!(imgs.len(), 1);
        assert!(d.arena().attr(imgs[0], "src").unwrap().contains("figure1"));
    }

    #[test]
    fn test_empty_tag_prune_is_confluent() {
        let mut d = doc(concat!(
            "<html><body>",
            "<div><span></span><em></em></div>",
            "<div><p>content</p></div>",
            "<div><img src=\"https://a.com/x.png\"></div>",
            "</body></html>"
        ));
        Cleaner::new(&mut d).clean_empty_tags().unwrap();
        let after_first = d.to_html();
        Cleaner::new(&mut d).clean_empty_tags().unwrap();
        assert_eq!(d.to_html(), after_first);
        assert_eq!(d.query("//div").len(), 2);
        assert!(d.query("//span").is_empty());
    }

    #[test]
    fn test_tiny_noise_requires_short_text() {
        let mut d = doc(concat!(
            "<html><body>",
            "<p>点击上方关注我们</p>",
            "<p>点击上方这个短语也出现在一段很长的正文里,长到超过阈值,所以不能删。",
            "继续加一些文字保证长度超过三十个字符。</p>",
            "</body></html>"
        ));
        Cleaner::new(&mut d).clean_tiny_noise().unwrap();
        assert_eq!(d.query("//p").len(), 1);
    }
}
