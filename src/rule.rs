//! Per-host site rules and the collaborator store interfaces.
//!
//! Rules override the heuristic pipeline for hosts that need it: explicit
//! body/noise selectors, metadata paths, and behavior flags. Stores are
//! traits so the engine never touches a database; the in-memory
//! implementations back the tests and the CLI.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Rule lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleStage {
    #[default]
    Testing,
    Production,
}

/// Which stages a lookup should see, and which wins on host collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageGroup {
    TestingOnly,
    ProdOnly,
    TestingPrior,
    #[default]
    ProdPrior,
}

/// Per-host extraction override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteRule {
    pub host: String,
    #[serde(default)]
    pub host_name: String,

    /// Paths selecting the article body; matched elements replace the tree.
    #[serde(default)]
    pub bodies: Vec<String>,
    /// Paths removed before body selection.
    #[serde(default)]
    pub noises: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub pub_time: String,
    /// Tags exempted from useless-tag preprocessing.
    #[serde(default)]
    pub reserved_nodes: Vec<String>,
    /// Skip semantic (label-driven) denoising for this host.
    #[serde(default)]
    pub no_semantic_denoise: bool,
    /// Page requires a browser-rendered crawl.
    #[serde(default)]
    pub need_browser_crawl: bool,
    /// Fail instead of falling back when no body path matches.
    #[serde(default)]
    pub body_use_rule_only: bool,

    #[serde(default)]
    pub stage: RuleStage,
}

fn clean_url_host(url: &str) -> &str {
    let mut host = url;
    loop {
        let mut stripped = false;
        for prefix in ["https://", "http://", "www."] {
            if let Some(rest) = host.strip_prefix(prefix) {
                host = rest;
                stripped = true;
            }
        }
        if !stripped {
            return host;
        }
    }
}

impl SiteRule {
    /// Does this rule apply to the given page url? Hosts containing `*` or
    /// `+` are treated as regexes, everything else as a prefix of the
    /// scheme-stripped url.
    pub fn matches(&self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }
        let host = clean_url_host(url);
        if self.host.contains('*') || self.host.contains('+') {
            if let Ok(re) = Regex::new(&self.host) {
                if re.is_match(host) {
                    return true;
                }
            }
        }
        host.starts_with(&self.host)
    }
}

/// Pick the first matching rule, longest host first.
pub fn match_rule(mut rules: Vec<SiteRule>, url: &str) -> Option<SiteRule> {
    rules.sort_by(|a, b| b.host.len().cmp(&a.host.len()));
    rules.into_iter().find(|r| r.matches(url))
}

/// Site-rule storage collaborator.
pub trait SiteRuleStore {
    /// All valid rules visible to the given stage group.
    fn find_by_stage_group(&self, group: StageGroup) -> Result<Vec<SiteRule>>;
    /// Exact host + stage lookup.
    fn find_one(&self, host: &str, stage: RuleStage) -> Result<Option<SiteRule>>;
    fn upsert_many(&self, rules: Vec<SiteRule>) -> Result<()>;
    /// Soft delete: rules stay addressable for audit, invisible to lookups.
    fn delete_many(&self, hosts: &[(String, RuleStage)]) -> Result<()>;
}

/// Cached raw HTML keyed by url.
pub trait HtmlCache {
    fn find_fresh(&self, url: &str, max_age: Duration) -> Result<Option<String>>;
    fn save(&self, url: &str, html: String) -> Result<()>;
}

/// Mirrored images keyed by source url.
pub trait ImageCache {
    fn upsert_many(&self, mappings: Vec<(String, String)>) -> Result<()>;
    fn find_many(&self, urls: &[String]) -> Result<HashMap<String, String>>;
}

#[derive(Clone)]
struct StoredRule {
    rule: SiteRule,
    deleted: bool,
}

/// In-memory rule store.
#[derive(Default)]
pub struct MemorySiteRuleStore {
    rules: Mutex<Vec<StoredRule>>,
}

impl MemorySiteRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<SiteRule>) -> Self {
        let store = Self::new();
        store.upsert_many(rules).expect("memory store upsert");
        store
    }

    /// Export all live rules as JSON.
    pub fn export_json(&self) -> Result<String> {
        let rules: Vec<SiteRule> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.deleted)
            .map(|s| s.rule.clone())
            .collect();
        Ok(serde_json::to_string_pretty(&rules)?)
    }

    /// Import rules from JSON, upserting by (host, stage).
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let rules: Vec<SiteRule> = serde_json::from_str(json)?;
        let count = rules.len();
        self.upsert_many(rules)?;
        Ok(count)
    }
}

impl SiteRuleStore for MemorySiteRuleStore {
    fn find_by_stage_group(&self, group: StageGroup) -> Result<Vec<SiteRule>> {
        let stored = self.rules.lock().unwrap();
        let mut testing: HashMap<String, SiteRule> = HashMap::new();
        let mut prod: HashMap<String, SiteRule> = HashMap::new();
        for s in stored.iter().filter(|s| !s.deleted) {
            let bucket = match s.rule.stage {
                RuleStage::Testing => &mut testing,
                RuleStage::Production => &mut prod,
            };
            bucket.insert(s.rule.host.clone(), s.rule.clone());
        }

        let mut out = Vec::new();
        match group {
            StageGroup::TestingOnly => out.extend(testing.into_values()),
            StageGroup::ProdOnly => out.extend(prod.into_values()),
            StageGroup::TestingPrior => {
                for (host, rule) in prod {
                    if !testing.contains_key(&host) {
                        out.push(rule);
                    }
                }
                out.extend(testing.into_values());
            }
            StageGroup::ProdPrior => {
                for (host, rule) in testing {
                    if !prod.contains_key(&host) {
                        out.push(rule);
                    }
                }
                out.extend(prod.into_values());
            }
        }
        Ok(out)
    }

    fn find_one(&self, host: &str, stage: RuleStage) -> Result<Option<SiteRule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|s| !s.deleted && s.rule.host == host && s.rule.stage == stage)
            .map(|s| s.rule.clone()))
    }

    fn upsert_many(&self, rules: Vec<SiteRule>) -> Result<()> {
        let mut stored = self.rules.lock().unwrap();
        for rule in rules {
            if let Some(existing) = stored
                .iter_mut()
                .find(|s| !s.deleted && s.rule.host == rule.host && s.rule.stage == rule.stage)
            {
                existing.rule = rule;
            } else {
                stored.push(StoredRule {
                    rule,
                    deleted: false,
                });
            }
        }
        Ok(())
    }

    fn delete_many(&self, hosts: &[(String, RuleStage)]) -> Result<()> {
        let mut stored = self.rules.lock().unwrap();
        for s in stored.iter_mut() {
            if hosts
                .iter()
                .any(|(h, stage)| *h == s.rule.host && *stage == s.rule.stage)
            {
                s.deleted = true;
            }
        }
        Ok(())
    }
}

/// In-memory HTML cache.
#[derive(Default)]
pub struct MemoryHtmlCache {
    entries: Mutex<HashMap<String, (String, SystemTime)>>,
}

impl MemoryHtmlCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HtmlCache for MemoryHtmlCache {
    fn find_fresh(&self, url: &str, max_age: Duration) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(url).and_then(|(html, at)| {
            match at.elapsed() {
                Ok(age) if age <= max_age => Some(html.clone()),
                _ => None,
            }
        }))
    }

    fn save(&self, url: &str, html: String) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(url.to_string(), (html, SystemTime::now()));
        Ok(())
    }
}

/// In-memory image-url cache.
#[derive(Default)]
pub struct MemoryImageCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageCache for MemoryImageCache {
    fn upsert_many(&self, mappings: Vec<(String, String)>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for (src, mirrored) in mappings {
            entries.insert(src, mirrored);
        }
        Ok(())
    }

    fn find_many(&self, urls: &[String]) -> Result<HashMap<String, String>> {
        let entries = self.entries.lock().unwrap();
        Ok(urls
            .iter()
            .filter_map(|u| entries.get(u).map(|m| (u.clone(), m.clone())))
            .collect())
    }
}
