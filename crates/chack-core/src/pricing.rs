//! Token cost estimation.
//!
//! Rates are USD per million tokens, read from a YAML file:
//!
//! ```yaml
//! models:
//!   gpt-4.1-mini:
//!     input: 0.4
//!     cached_input: 0.1
//!     output: 1.6
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::Value;
use tracing::warn;

/// Environment variable naming the pricing file.
pub const PRICING_PATH_ENV: &str = "CHACK_PRICING";
pub const DEFAULT_PRICING_PATH: &str = "./config/pricing.yaml";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub cached_input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn new(models: HashMap<String, ModelPricing>) -> Self {
        Self { models }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pricing file {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    /// Parse a pricing document; entries that are not maps of numbers are skipped.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(raw).context("Invalid pricing YAML")?;
        let mut models = HashMap::new();

        let Some(entries) = doc.get("models").and_then(Value::as_mapping) else {
            return Ok(Self { models });
        };

        for (name, rates) in entries {
            let Some(name) = name.as_str() else {
                continue;
            };
            match parse_rates(rates) {
                Some(pricing) => {
                    models.insert(name.to_string(), pricing);
                }
                None => warn!(model = name, "Skipping malformed pricing entry"),
            }
        }

        Ok(Self { models })
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Estimated cost in USD, or `None` for a model without rates.
    pub fn estimate(
        &self,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
        cached_prompt_tokens: u64,
    ) -> Option<f64> {
        let rates = self.models.get(model)?;
        let billable_prompt = prompt_tokens.saturating_sub(cached_prompt_tokens);
        let total = billable_prompt as f64 * rates.input
            + cached_prompt_tokens as f64 * rates.cached_input
            + completion_tokens as f64 * rates.output;
        Some(total / 1_000_000.0)
    }
}

fn parse_rates(value: &Value) -> Option<ModelPricing> {
    let map = value.as_mapping()?;
    let rate = |key: &str| -> Option<f64> {
        match map.get(key) {
            None | Some(Value::Null) => Some(0.0),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        }
    };
    Some(ModelPricing {
        input: rate("input")?,
        cached_input: rate("cached_input")?,
        output: rate("output")?,
    })
}

/// `$x.xxxxxx`, or `unknown` when the model had no rates.
pub fn format_cost(cost: Option<f64>) -> String {
    match cost {
        Some(cost) => format!("${cost:.6}"),
        None => "unknown".to_string(),
    }
}

pub fn resolve_pricing_path(configured: Option<&str>) -> PathBuf {
    if let Ok(path) = std::env::var(PRICING_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    PathBuf::from(configured.unwrap_or(DEFAULT_PRICING_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PricingTable {
        PricingTable::new(HashMap::from([(
            "m".to_string(),
            ModelPricing {
                input: 2.0,
                cached_input: 1.0,
                output: 4.0,
            },
        )]))
    }

    #[test]
    fn test_estimate_with_cached_tokens() {
        let cost = table().estimate("m", 100, 50, 30).unwrap();
        let expected = (70.0 * 2.0 + 30.0 * 1.0 + 50.0 * 4.0) / 1_000_000.0;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_unknown_model() {
        assert_eq!(table().estimate("other", 100, 50, 0), None);
    }

    #[test]
    fn test_cached_never_makes_billable_negative() {
        let cost = table().estimate("m", 10, 0, 30).unwrap();
        assert!((cost - 30.0 / 1_000_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_yaml_skips_malformed_entries() {
        let table = PricingTable::from_yaml(
            r#"
models:
  good:
    input: 1.25
    output: "10"
  list: [1, 2]
  bad:
    input: lots
"#,
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get("good"),
            Some(&ModelPricing {
                input: 1.25,
                cached_input: 0.0,
                output: 10.0,
            })
        );
    }

    #[test]
    fn test_from_yaml_without_models() {
        assert!(PricingTable::from_yaml("{}").unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.yaml");
        std::fs::write(&path, "models:\n  m:\n    input: 3\n").unwrap();

        let table = PricingTable::load(&path).unwrap();
        assert_eq!(table.get("m").unwrap().input, 3.0);
        assert!(PricingTable::load(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(Some(0.00037)), "$0.000370");
        assert_eq!(format_cost(None), "unknown");
    }
}
