use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use dotenvy::dotenv;
use recipe_crawler::{FetchSettings, RenderSettings};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub allergen_dict_path: PathBuf,
    pub model_path: PathBuf,
    /// Overrides the threshold recorded in the model artifact
    pub ml_threshold: Option<f64>,
    pub webdriver_url: String,
    pub render_timeout: Duration,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let ml_threshold = match lookup("ML_THRESHOLD") {
            Some(raw) => {
                let value: f64 = raw.parse().context("ML_THRESHOLD must be a number")?;
                ensure!(
                    (0.0..=1.0).contains(&value),
                    "ML_THRESHOLD must be between 0 and 1, got {}",
                    value
                );
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            database_url: var("DATABASE_URL", "sqlite://allergen_recipes.db"),
            allergen_dict_path: var("ALLERGEN_DICT_PATH", "config/allergen_dict.json").into(),
            model_path: var("MODEL_PATH", "models/allergen_classifier.json").into(),
            ml_threshold,
            webdriver_url: var("WEBDRIVER_URL", "http://localhost:4444"),
            render_timeout: Duration::from_secs(
                var("RENDER_TIMEOUT_SECS", "10")
                    .parse()
                    .context("RENDER_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            http_timeout: Duration::from_secs(
                var("HTTP_TIMEOUT_SECS", "10")
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }

    /// Fetcher settings for the crawler.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            http_timeout: self.http_timeout,
            render: RenderSettings {
                webdriver_url: self.webdriver_url.clone(),
                wait_timeout: self.render_timeout,
                ..RenderSettings::default()
            },
            ..FetchSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite://allergen_recipes.db");
        assert_eq!(config.model_path, PathBuf::from("models/allergen_classifier.json"));
        assert_eq!(config.ml_threshold, None);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.fetch_settings().render.webdriver_url, "http://localhost:4444");
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("ML_THRESHOLD", "0.5"),
            ("RENDER_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.ml_threshold, Some(0.5));
        assert_eq!(config.fetch_settings().render.wait_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("ML_THRESHOLD", "high")]).is_err());
        assert!(config_from(&[("ML_THRESHOLD", "1.5")]).is_err());
        assert!(config_from(&[("HTTP_TIMEOUT_SECS", "-1")]).is_err());
    }
}
