//! Per-site selector configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CrawlError, CrawlResult};

/// CSS selectors used to pull each field out of a site's pages.
///
/// Field names on the wire keep the `*_selector` suffix used by the JSON
/// config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// Recipe detail links on listing pages.
    #[serde(rename = "recipe_link_selector")]
    pub link: String,

    /// "Next page" anchor on listing pages.
    #[serde(rename = "pagination_selector", default)]
    pub pagination: Option<String>,

    #[serde(rename = "title_selector", default)]
    pub title: Option<String>,

    #[serde(rename = "ingredients_selector", default)]
    pub ingredients: Option<String>,

    #[serde(rename = "instructions_selector", default)]
    pub instructions: Option<String>,

    #[serde(rename = "tags_selector", default)]
    pub tags: Option<String>,
}

/// Immutable description of one recipe site, loaded once per crawl run.
///
/// One generic crawler serves every site; all per-site variability lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site_name: String,

    pub start_urls: Vec<String>,

    /// Base for resolving relative links. Defaults to the first start URL.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(flatten)]
    pub selectors: Selectors,

    /// Fetch through a headless browser instead of plain HTTP.
    #[serde(default, alias = "use_selenium")]
    pub use_rendered_fetch: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(SiteConfig),
    Many(Vec<SiteConfig>),
}

impl SiteConfig {
    /// Create a config with a single start URL and a link selector.
    pub fn new(
        site_name: impl Into<String>,
        start_url: impl Into<String>,
        link_selector: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            start_urls: vec![start_url.into()],
            base_url: None,
            selectors: Selectors {
                link: link_selector.into(),
                ..Default::default()
            },
            use_rendered_fetch: false,
        }
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_urls.push(url.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_pagination(mut self, selector: impl Into<String>) -> Self {
        self.selectors.pagination = Some(selector.into());
        self
    }

    pub fn with_title(mut self, selector: impl Into<String>) -> Self {
        self.selectors.title = Some(selector.into());
        self
    }

    pub fn with_ingredients(mut self, selector: impl Into<String>) -> Self {
        self.selectors.ingredients = Some(selector.into());
        self
    }

    pub fn with_instructions(mut self, selector: impl Into<String>) -> Self {
        self.selectors.instructions = Some(selector.into());
        self
    }

    pub fn with_tags(mut self, selector: impl Into<String>) -> Self {
        self.selectors.tags = Some(selector.into());
        self
    }

    /// Parse one config, or a list of configs, from JSON text.
    pub fn from_json_str(json: &str) -> CrawlResult<Vec<SiteConfig>> {
        let configs = match serde_json::from_str::<OneOrMany>(json)? {
            OneOrMany::One(config) => vec![config],
            OneOrMany::Many(configs) => configs,
        };

        configs
            .into_iter()
            .map(|config| config.validated())
            .collect()
    }

    /// Load and validate site configs from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> CrawlResult<Vec<SiteConfig>> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CrawlError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Check required fields and URL syntax; drop duplicate start URLs.
    pub fn validated(mut self) -> CrawlResult<Self> {
        if self.site_name.trim().is_empty() {
            return Err(CrawlError::Config("site_name must not be empty".into()));
        }
        if self.start_urls.is_empty() {
            return Err(CrawlError::Config(format!(
                "{}: at least one start URL is required",
                self.site_name
            )));
        }
        if self.selectors.link.trim().is_empty() {
            return Err(CrawlError::Config(format!(
                "{}: recipe_link_selector must not be empty",
                self.site_name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        self.start_urls.retain(|u| seen.insert(u.clone()));

        for url in self.start_urls.iter().chain(self.base_url.iter()) {
            Url::parse(url).map_err(|_| CrawlError::InvalidUrl { url: url.clone() })?;
        }

        Ok(self)
    }

    /// Base URL for link resolution.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .or_else(|| self.start_urls.first().map(String::as_str))
            .unwrap_or_default()
    }

    /// Resolve a possibly-relative href against the base URL.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let base = Url::parse(self.base_url()).ok()?;
        base.join(href.trim()).ok().map(|u| u.to_string())
    }
}
