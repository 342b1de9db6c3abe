//! Selector-driven extraction of recipe records and listing links.
//!
//! One implementation serves every site: selectors come from the
//! [`SiteConfig`], so there is no per-site branching here. A selector that is
//! absent, fails to parse, or matches nothing yields a default (placeholder
//! title or empty list) rather than an error.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::types::{RecipeRecord, SiteConfig, UNTITLED};

/// Compiled selectors for one site.
#[derive(Debug, Clone)]
pub struct Extractor {
    site_name: String,
    link: Option<Selector>,
    pagination: Option<Selector>,
    title: Option<Selector>,
    ingredients: Option<Selector>,
    instructions: Option<Selector>,
    tags: Option<Selector>,
}

impl Extractor {
    /// Compile the selectors of a site config.
    pub fn new(config: &SiteConfig) -> Self {
        let site = config.site_name.as_str();
        let s = &config.selectors;
        Self {
            site_name: config.site_name.clone(),
            link: compile(site, "recipe_link", Some(&s.link)),
            pagination: compile(site, "pagination", s.pagination.as_ref()),
            title: compile(site, "title", s.title.as_ref()),
            ingredients: compile(site, "ingredients", s.ingredients.as_ref()),
            instructions: compile(site, "instructions", s.instructions.as_ref()),
            tags: compile(site, "tags", s.tags.as_ref()),
        }
    }

    /// Extract a recipe record from a detail page.
    pub fn extract(&self, html: &str) -> RecipeRecord {
        let document = Html::parse_document(html);

        let title = self
            .title
            .as_ref()
            .and_then(|sel| document.select(sel).map(element_text).find(|t| !t.is_empty()))
            .unwrap_or_else(|| {
                debug!(site = %self.site_name, "No title found, using placeholder");
                UNTITLED.to_string()
            });

        RecipeRecord {
            site_name: self.site_name.clone(),
            title,
            ingredients: select_all(&document, self.ingredients.as_ref()),
            instructions: select_all(&document, self.instructions.as_ref()),
            tags: select_all(&document, self.tags.as_ref()),
        }
    }

    /// Recipe detail links on a listing page, resolved against the base URL.
    pub fn detail_links(&self, html: &str, config: &SiteConfig) -> Vec<String> {
        let Some(selector) = self.link.as_ref() else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        document
            .select(selector)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .filter_map(|href| config.resolve(href))
            .collect()
    }

    /// The "next page" link on a listing page, if any.
    pub fn next_page(&self, html: &str, config: &SiteConfig) -> Option<String> {
        let selector = self.pagination.as_ref()?;
        let document = Html::parse_document(html);

        document
            .select(selector)
            .next()
            .and_then(|el| el.value().attr("href"))
            .filter(|href| !href.trim().is_empty())
            .and_then(|href| config.resolve(href))
    }
}

/// Extract a recipe record from `html` using the selectors in `config`.
pub fn extract_recipe(html: &str, config: &SiteConfig) -> RecipeRecord {
    Extractor::new(config).extract(html)
}

fn compile(site: &str, field: &str, selector: Option<&String>) -> Option<Selector> {
    let raw = selector.map(|s| s.trim()).filter(|s| !s.is_empty())?;
    match Selector::parse(raw) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(site = %site, field = %field, selector = %raw, error = %e, "Invalid selector, field will be empty");
            None
        }
    }
}

fn select_all(document: &Html, selector: Option<&Selector>) -> Vec<String> {
    selector
        .map(|sel| {
            document
                .select(sel)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Element text with whitespace runs collapsed and ends trimmed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
