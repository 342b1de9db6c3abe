//! Command-line driver for the allergen pipeline.
//!
//! Each stage is its own subcommand; `run` chains scrape → normalize →
//! rules → ML. Process-level state (store, dictionary, model, fetch settings)
//! is built here once and handed to each stage.

use std::path::{Path, PathBuf};

use allergen_pipeline::classify::ml::{self, MlClassifier, TrainOptions, DEFAULT_THRESHOLD};
use allergen_pipeline::evaluate::load_gold_csv;
use allergen_pipeline::pipeline::{self, SiteReport};
use allergen_pipeline::{
    normalizer, AllergenDictionary, AllergenModel, Config, FalsePositiveGuard, RecipeStore,
    RuleClassifier, TagSource,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "allergen")]
#[command(about = "Scrape recipes, normalize ingredients and tag allergens")]
struct Cli {
    /// Database URL (overrides DATABASE_URL)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Allergen dictionary path (overrides ALLERGEN_DICT_PATH)
    #[arg(long, global = true, env = "ALLERGEN_DICT_PATH")]
    dict: Option<PathBuf>,

    /// Model artifact path (overrides MODEL_PATH)
    #[arg(long, global = true, env = "MODEL_PATH")]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the given site configs into the store
    Scrape {
        #[arg(required = true)]
        sites: Vec<PathBuf>,
    },

    /// Rebuild normalized ingredients from stored recipes (drops all tags)
    Normalize,

    /// Tag normalized ingredients with the keyword rules
    ClassifyRules,

    /// Train the ML model from a labeled CSV (ingredient,labels)
    Train {
        csv: PathBuf,
        /// Acceptance threshold recorded in the artifact
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Tag ingredients the rules left untagged with the ML model
    ClassifyMl {
        /// Acceptance threshold (overrides ML_THRESHOLD and the artifact)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Score stored tags against a gold CSV (id,true_allergens)
    Evaluate {
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the built-in allergen dictionary
    BuildDict { path: Option<PathBuf> },

    /// Scrape, normalize, then run the rule and ML passes
    Run {
        #[arg(required = true)]
        sites: Vec<PathBuf>,
    },

    /// Show row counts per table
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Rule,
    Ml,
    All,
}

impl SourceArg {
    fn tag_source(self) -> Option<TagSource> {
        match self {
            SourceArg::Rule => Some(TagSource::Rule),
            SourceArg::Ml => Some(TagSource::Ml),
            SourceArg::All => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,allergen_pipeline=debug,recipe_crawler=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(path) = cli.dict {
        config.allergen_dict_path = path;
    }
    if let Some(path) = cli.model {
        config.model_path = path;
    }

    match cli.command {
        Commands::Scrape { sites } => cmd_scrape(&config, &sites).await,
        Commands::Normalize => cmd_normalize(&config).await,
        Commands::ClassifyRules => cmd_classify_rules(&config).await,
        Commands::Train { csv, threshold } => cmd_train(&config, &csv, threshold),
        Commands::ClassifyMl { threshold } => cmd_classify_ml(&config, threshold).await,
        Commands::Evaluate { csv, source, json } => cmd_evaluate(&config, &csv, source, json).await,
        Commands::BuildDict { path } => cmd_build_dict(&config, path),
        Commands::Run { sites } => cmd_run(&config, &sites).await,
        Commands::Stats => cmd_stats(&config).await,
    }
}

async fn open_store(config: &Config) -> Result<RecipeStore> {
    RecipeStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))
}

fn rule_classifier(config: &Config) -> Result<RuleClassifier> {
    let dictionary = AllergenDictionary::load(&config.allergen_dict_path)
        .context("Allergen dictionary is required (run `allergen build-dict` to create one)")?;
    Ok(RuleClassifier::new(&dictionary, FalsePositiveGuard::new())?)
}

fn ml_classifier(config: &Config, threshold: Option<f64>) -> Result<MlClassifier> {
    let model = AllergenModel::load(&config.model_path)
        .context("Model artifact is required (run `allergen train <csv>` first)")?;
    Ok(MlClassifier::new(
        model,
        FalsePositiveGuard::new(),
        threshold.or(config.ml_threshold),
    )?)
}

fn print_sites(reports: &[SiteReport]) {
    for r in reports {
        println!(
            "{}: {} links, {} saved, {} failed",
            r.site_name, r.links_found, r.saved, r.failed
        );
    }
}

async fn cmd_scrape(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let sites = pipeline::load_site_configs(paths).context("Invalid site config")?;
    let store = open_store(config).await?;
    let reports = pipeline::scrape_sites(&store, &sites, &config.fetch_settings()).await;
    print_sites(&reports);
    Ok(())
}

async fn cmd_normalize(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let summary = normalizer::rebuild(&store)
        .await
        .context("Normalization failed")?;
    println!(
        "Normalized {} lines from {} recipes into {} ingredients",
        summary.lines, summary.recipes, summary.ingredients
    );
    Ok(())
}

async fn cmd_classify_rules(config: &Config) -> Result<()> {
    let classifier = rule_classifier(config)?;
    let store = open_store(config).await?;
    let summary = classifier.run(&store).await?;
    println!(
        "Rule pass: {} ingredients, {} tags inserted, {} suppressed, {} failed",
        summary.ingredients_scanned, summary.tags_inserted, summary.suppressed, summary.failed
    );
    Ok(())
}

fn cmd_train(config: &Config, csv: &Path, threshold: Option<f64>) -> Result<()> {
    let examples = ml::load_training_csv(csv)?;
    let options = TrainOptions {
        threshold: threshold.or(config.ml_threshold).unwrap_or(DEFAULT_THRESHOLD),
        ..TrainOptions::default()
    };
    let model = ml::train(&examples, &options).context("Training failed")?;
    let digest = model.save(&config.model_path)?;
    println!(
        "Model saved to {} (labels: {}, sha256 {})",
        config.model_path.display(),
        model
            .labels
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        digest
    );
    Ok(())
}

async fn cmd_classify_ml(config: &Config, threshold: Option<f64>) -> Result<()> {
    let classifier = ml_classifier(config, threshold)?;
    let store = open_store(config).await?;
    let summary = classifier.run(&store).await?;
    println!(
        "ML pass (threshold {}): {} candidates, {} tags inserted, {} suppressed, {} failed",
        classifier.threshold(),
        summary.ingredients_scanned,
        summary.tags_inserted,
        summary.suppressed,
        summary.failed
    );
    Ok(())
}

async fn cmd_evaluate(config: &Config, csv: &Path, source: SourceArg, json: bool) -> Result<()> {
    let gold = load_gold_csv(csv)?;
    let store = open_store(config).await?;
    let report = pipeline::evaluate_store(&store, &gold, source.tag_source()).await?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("=== Precision / Recall / F1 by allergen ===\n");
        println!("{}", report.render_table());
    }
    Ok(())
}

fn cmd_build_dict(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| config.allergen_dict_path.clone());
    let dictionary = AllergenDictionary::default();
    dictionary.save(&path)?;
    println!(
        "Allergen dictionary ({} keywords) saved to {}",
        dictionary.keyword_count(),
        path.display()
    );
    Ok(())
}

async fn cmd_run(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let sites = pipeline::load_site_configs(paths).context("Invalid site config")?;
    let rules = rule_classifier(config)?;
    let ml = if config.model_path.exists() {
        Some(ml_classifier(config, None)?)
    } else {
        tracing::warn!(path = %config.model_path.display(), "Model artifact not found");
        None
    };
    let store = open_store(config).await?;

    let summary = pipeline::run(&store, &sites, &config.fetch_settings(), &rules, ml.as_ref()).await?;
    print_sites(&summary.sites);
    println!(
        "Normalized {} ingredients; rule tags {}; ML tags {}",
        summary.normalize.ingredients,
        summary.rules.tags_inserted,
        summary
            .ml
            .map(|m| m.tags_inserted.to_string())
            .unwrap_or_else(|| "skipped".to_string())
    );
    Ok(())
}

async fn cmd_stats(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let counts = store.counts().await?;
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}
