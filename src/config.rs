//! Importer settings.
//!
//! Loaded from an optional TOML file, then environment variables prefixed
//! `IMPORTER` with `__` between nested keys
//! (`IMPORTER_PRICING__MARGIN_MULTIPLIER=4.5`). Every field has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::estimator::{Estimator, EstimatorTable, DEFAULT_MARGIN_MULTIPLIER};
use crate::parser::classify::ProductTypeClass;
use crate::parser::extract::weight::is_plausible;

const DEFAULT_CONFIG_FILE: &str = "importer";
const ENV_PREFIX: &str = "IMPORTER";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub database_path: PathBuf,
    pub catalog: CatalogConfig,
    pub fetch: FetchConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub alternate_base_url: Option<String>,
    pub product_path: String,
    pub alternate_product_path: Option<String>,
    pub sitemap_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Pause between consecutive fetches.
    pub politeness_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub margin_multiplier: f64,
    pub defaults: EstimatorTable,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/catalog.sqlite"),
            catalog: CatalogConfig::default(),
            fetch: FetchConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.catalog.example.com".to_string(),
            alternate_base_url: None,
            product_path: "produto".to_string(),
            alternate_product_path: Some("produtos".to_string()),
            sitemap_url: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: USER_AGENT.to_string(),
            politeness_delay_ms: 1500,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            margin_multiplier: DEFAULT_MARGIN_MULTIPLIER,
            defaults: EstimatorTable::default(),
        }
    }
}

impl PricingConfig {
    pub fn estimator(&self) -> Estimator {
        Estimator::new(self.defaults.clone(), self.margin_multiplier)
    }
}

impl ImporterConfig {
    /// Load from `path` (required when given) or `./importer.toml`
    /// (optional), then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let loaded: ImporterConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let margin = self.pricing.margin_multiplier;
        if !margin.is_finite() || margin <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "pricing.margin_multiplier must be greater than 1, got {}",
                margin
            )));
        }
        for class in ProductTypeClass::ALL {
            let d = self.pricing.defaults.get(class);
            if !d.cost_price.is_finite() || d.cost_price <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "pricing.defaults.{}.cost_price must be positive",
                    class
                )));
            }
            if !is_plausible(d.weight_grams) {
                return Err(ConfigError::Invalid(format!(
                    "pricing.defaults.{}.weight_grams must be between 0 and 50",
                    class
                )));
            }
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid("fetch.timeout_secs must be positive".into()));
        }
        for (key, value) in [
            ("catalog.base_url", Some(&self.catalog.base_url)),
            ("catalog.alternate_base_url", self.catalog.alternate_base_url.as_ref()),
            ("catalog.sitemap_url", self.catalog.sitemap_url.as_ref()),
        ] {
            let Some(value) = value else { continue };
            match Url::parse(value) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be an absolute http(s) URL, got {:?}",
                        key, value
                    )))
                }
            }
        }
        if self.catalog.product_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("catalog.product_path must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::estimator::CommercialDefaults;

    #[test]
    fn defaults_are_valid() {
        let config = ImporterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.pricing.margin_multiplier, 4.2);
        assert_eq!(config.fetch.timeout_secs, 10);
    }

    #[test]
    fn rejects_margin_at_or_below_one() {
        let mut config = ImporterConfig::default();
        config.pricing.margin_multiplier = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_implausible_default_weight() {
        let mut config = ImporterConfig::default();
        config.pricing.defaults.necklace = CommercialDefaults::new(50.0, 80.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("necklace"));
    }

    #[test]
    fn rejects_relative_base_url() {
        let mut config = ImporterConfig::default();
        config.catalog.base_url = "/produto".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database_path = "/tmp/catalog-test.sqlite"

[catalog]
base_url = "https://fornecedor.example.com"

[pricing]
margin_multiplier = 3.5

[pricing.defaults.ring]
cost_price = 28.0
weight_grams = 2.0
"#
        )
        .unwrap();

        let config = ImporterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/catalog-test.sqlite"));
        assert_eq!(config.catalog.base_url, "https://fornecedor.example.com");
        assert_eq!(config.catalog.product_path, "produto");
        assert_eq!(config.pricing.margin_multiplier, 3.5);
        assert_eq!(config.pricing.defaults.ring, CommercialDefaults::new(28.0, 2.0));
        assert_eq!(config.pricing.defaults.earring, EstimatorTable::default().earring);
        assert_eq!(config.pricing.estimator().sale_price(10.0), 35.0);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ImporterConfig::load(Some(Path::new("/nonexistent/importer.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
