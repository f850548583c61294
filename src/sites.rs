// src/sites.rs
//! Site adapters: which elements on a host are title tiles, where their
//! title comes from, and where the badge goes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::dom::{Candidate, Document, NodeId, Selector};

const BUILTIN_SITES: &str = include_str!("../config/sites.toml");

pub trait SiteAdapter: Send + Sync {
    fn name(&self) -> &str;
    /// Badge scale relative to the default size on this site.
    fn size_multiplier(&self) -> f64;
    fn discover_candidates(&self, doc: &dyn Document) -> Vec<Candidate>;
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachRule {
    #[default]
    Tile,
    Parent,
    /// Nearest matching ancestor-or-self; the tile is dropped without one.
    Closest(Selector),
    ClosestOrParent(Selector),
    /// First matching descendant; the tile is dropped without one.
    Descendant(Selector),
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TitleRuleConfig {
    #[serde(default)]
    within: Option<Selector>,
    #[serde(default)]
    attr: Option<String>,
    #[serde(default)]
    strip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TitleRule {
    within: Option<Selector>,
    attr: Option<String>,
    strip: Option<Regex>,
}

impl TitleRule {
    fn compile(cfg: TitleRuleConfig) -> Result<Self> {
        let strip = cfg
            .strip
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context("compiling title strip pattern")?;
        Ok(Self {
            within: cfg.within,
            attr: cfg.attr,
            strip,
        })
    }

    /// Source node and cleaned title, if this rule yields a non-empty one.
    fn apply(&self, doc: &dyn Document, tile: NodeId) -> Option<(NodeId, String)> {
        let node = match &self.within {
            Some(sel) => doc.select_within(tile, sel)?,
            None => tile,
        };
        let raw = match &self.attr {
            Some(name) => doc.attribute(node, name)?,
            None => doc.text_content(node),
        };
        let mut title = raw.trim().to_string();
        if let Some(re) = &self.strip {
            title = re.replace(&title, "").trim().to_string();
        }
        (!title.is_empty()).then_some((node, title))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SiteConfig {
    host: String,
    #[serde(default = "default_multiplier")]
    size_multiplier: f64,
    tile: Selector,
    #[serde(default)]
    title: Vec<TitleRuleConfig>,
    #[serde(default)]
    attach: AttachRule,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    #[serde(default)]
    site: Vec<SiteConfig>,
}

/// Adapter driven by a declarative rule set.
#[derive(Debug, Clone)]
pub struct SelectorAdapter {
    name: String,
    size_multiplier: f64,
    tile: Selector,
    titles: Vec<TitleRule>,
    attach: AttachRule,
}

impl SelectorAdapter {
    pub fn new(name: &str, tile: Selector, attach: AttachRule) -> Self {
        Self {
            name: name.to_string(),
            size_multiplier: 1.0,
            tile,
            titles: Vec::new(),
            attach,
        }
    }

    pub fn with_size_multiplier(mut self, m: f64) -> Self {
        self.size_multiplier = m;
        self
    }

    /// Read the title from `attr` (or text when `None`) of `within` (or the tile).
    pub fn with_title(mut self, within: Option<Selector>, attr: Option<&str>) -> Self {
        self.titles.push(TitleRule {
            within,
            attr: attr.map(str::to_string),
            strip: None,
        });
        self
    }

    fn from_config(cfg: SiteConfig) -> Result<Self> {
        let titles = if cfg.title.is_empty() {
            vec![TitleRule::compile(TitleRuleConfig::default())?]
        } else {
            cfg.title
                .into_iter()
                .map(TitleRule::compile)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("site {}", cfg.host))?
        };
        Ok(Self {
            name: cfg.host,
            size_multiplier: cfg.size_multiplier,
            tile: cfg.tile,
            titles,
            attach: cfg.attach,
        })
    }

    fn target_for(&self, doc: &dyn Document, tile: NodeId) -> Option<NodeId> {
        match &self.attach {
            AttachRule::Tile => Some(tile),
            AttachRule::Parent => doc.parent(tile),
            AttachRule::Closest(sel) => doc.closest(tile, sel),
            AttachRule::ClosestOrParent(sel) => {
                doc.closest(tile, sel).or_else(|| doc.parent(tile))
            }
            AttachRule::Descendant(sel) => doc.select_within(tile, sel),
        }
    }
}

impl SiteAdapter for SelectorAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn size_multiplier(&self) -> f64 {
        self.size_multiplier
    }

    fn discover_candidates(&self, doc: &dyn Document) -> Vec<Candidate> {
        doc.select_all(&self.tile)
            .into_iter()
            .filter_map(|tile| {
                let (element, title) = self.titles.iter().find_map(|r| r.apply(doc, tile))?;
                let target = self.target_for(doc, tile)?;
                Some(Candidate {
                    element,
                    title,
                    target,
                })
            })
            .collect()
    }
}

/// Adapters keyed by host. A host matches a registered domain when it is the
/// domain itself or a subdomain of it; the first registration wins.
#[derive(Clone, Default)]
pub struct SiteRegistry {
    entries: Vec<(String, Arc<dyn SiteAdapter>)>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, domain: &str, adapter: Arc<dyn SiteAdapter>) {
        self.entries
            .push((domain.trim().to_ascii_lowercase(), adapter));
    }

    pub fn resolve(&self, host: &str) -> Option<Arc<dyn SiteAdapter>> {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(domain, _)| {
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            })
            .map(|(_, a)| a.clone())
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(d, _)| d.as_str())
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: SitesFile = toml::from_str(s).context("parsing sites table")?;
        let mut reg = Self::new();
        for cfg in file.site {
            let domain = cfg.host.clone();
            let adapter = SelectorAdapter::from_config(cfg)?;
            reg.register(&domain, Arc::new(adapter));
        }
        Ok(reg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sites from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// The nine supported streaming hosts.
    pub fn builtin() -> Self {
        Self::from_toml_str(BUILTIN_SITES).expect("embedded sites table is valid")
    }
}
