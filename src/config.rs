// Layered settings: defaults, optional config.toml, then APP_* environment variables.

use anyhow::Result;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

use crate::search::SuggestionConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    /// Directory holding the persisted preference and store blobs.
    pub data_dir: String,
    /// JSON array of listings to serve instead of the built-in sample.
    pub catalog_path: Option<String>,
    /// Remote JSON listings endpoint, fetched once at startup.
    pub catalog_url: Option<String>,
    pub seed_notifications: bool,
    pub suggestion_min_length: usize,
    pub max_suggestions: usize,
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server_address", "127.0.0.1:3000")?
        .set_default("data_dir", "data")?
        .set_default("seed_notifications", true)?
        .set_default("suggestion_min_length", 2)?
        .set_default("max_suggestions", 8)
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = with_defaults()?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_DATA_DIR -> data_dir. No nesting separator, field names contain "_".
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn suggestion_config(&self) -> SuggestionConfig {
        SuggestionConfig {
            min_query_length: self.suggestion_min_length,
            max_suggestions: self.max_suggestions.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_any_source() {
        let settings: Settings = with_defaults()
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(settings.server_address, "127.0.0.1:3000");
        assert_eq!(settings.data_dir, "data");
        assert_eq!(settings.catalog_path, None);
        assert!(settings.seed_notifications);
        assert_eq!(settings.suggestion_config(), SuggestionConfig::default());
    }

    #[test]
    fn overrides_replace_defaults() {
        let settings: Settings = with_defaults()
            .and_then(|b| b.set_override("max_suggestions", 0))
            .and_then(|b| b.set_override("catalog_url", "http://localhost:9000/cars.json"))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .unwrap();
        assert_eq!(settings.catalog_url.as_deref(), Some("http://localhost:9000/cars.json"));
        assert_eq!(settings.suggestion_config().max_suggestions, 1);
    }
}
