//! Stage orchestration: scrape → normalize → rule pass → ML pass, plus the
//! offline evaluation entry point.
//!
//! Stages run strictly in sequence over one store handle; the rule and ML
//! passes never overlap.

use std::path::Path;

use recipe_crawler::{fetcher_for, CrawlSummary, FetchSettings, SiteConfig, SiteCrawler};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::classify::ml::MlClassifier;
use crate::classify::{ClassificationSummary, RuleClassifier};
use crate::error::Result;
use crate::evaluate::{evaluate, EvaluationReport, GoldSet};
use crate::normalizer::{self, NormalizeSummary};
use crate::store::{RecipeStore, TagSource};

/// Load and validate every site config in the given files.
///
/// Any unreadable or invalid file is fatal.
pub fn load_site_configs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SiteConfig>> {
    let mut configs = Vec::new();
    for path in paths {
        for config in SiteConfig::load(path.as_ref())? {
            configs.push(config.validated()?);
        }
    }
    info!(sites = configs.len(), "Loaded site configs");
    Ok(configs)
}

/// Per-site crawl outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub site_name: String,
    pub links_found: usize,
    pub saved: usize,
    pub failed: usize,
}

impl SiteReport {
    fn new(site_name: &str, summary: CrawlSummary) -> Self {
        Self {
            site_name: site_name.to_string(),
            links_found: summary.links_found,
            saved: summary.saved,
            failed: summary.failed,
        }
    }
}

/// Crawl each site into the store, one after another.
///
/// A site whose fetcher cannot be built is logged and skipped.
pub async fn scrape_sites(
    store: &RecipeStore,
    sites: &[SiteConfig],
    settings: &FetchSettings,
) -> Vec<SiteReport> {
    let mut reports = Vec::with_capacity(sites.len());
    for site in sites {
        let fetcher = match fetcher_for(site, settings) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!(site = %site.site_name, error = %e, "Cannot build fetcher, skipping site");
                continue;
            }
        };
        let summary = SiteCrawler::new(site, fetcher.as_ref()).crawl(store).await;
        reports.push(SiteReport::new(&site.site_name, summary));
    }
    reports
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub sites: Vec<SiteReport>,
    pub normalize: NormalizeSummary,
    pub rules: ClassificationSummary,
    /// `None` when no model was available
    pub ml: Option<ClassificationSummary>,
}

/// Scrape, normalize, then classify with rules and (when given) the model.
pub async fn run(
    store: &RecipeStore,
    sites: &[SiteConfig],
    settings: &FetchSettings,
    rules: &RuleClassifier,
    ml: Option<&MlClassifier>,
) -> Result<RunSummary> {
    let sites = scrape_sites(store, sites, settings).await;
    let normalize = normalizer::rebuild(store).await?;
    let rules = rules.run(store).await?;
    let ml = match ml {
        Some(classifier) => Some(classifier.run(store).await?),
        None => {
            warn!("No model loaded, ML pass skipped");
            None
        }
    };

    Ok(RunSummary {
        sites,
        normalize,
        rules,
        ml,
    })
}

/// Score stored tags, optionally from one source only, against gold labels.
pub async fn evaluate_store(
    store: &RecipeStore,
    gold: &GoldSet,
    source: Option<TagSource>,
) -> Result<EvaluationReport> {
    let predictions = store.tags_by_recipe(source).await?;
    let report = evaluate(gold, &predictions);
    info!(
        recipes = report.recipes,
        source = source.map(|s| s.as_str()).unwrap_or("all"),
        micro_f1 = report.micro.f1,
        macro_f1 = report.macro_avg.f1,
        "Evaluation complete"
    );
    Ok(report)
}
