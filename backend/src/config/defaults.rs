use once_cell::sync::Lazy;
use serde_json::Value;

use crate::models::site_config::SiteConfig;

/// Bundled configuration. An admin export has the same layout and can replace this file.
pub const DEFAULT_SITE_CONFIG_JSON: &str = include_str!("../../assets/default_site_config.json");

/// Local store key. Bump the suffix when the stored layout changes incompatibly.
pub const SITE_CONFIG_KEY: &str = "nghub_site_config_v1";

pub static DEFAULT_SITE_CONFIG: Lazy<SiteConfig> = Lazy::new(|| {
    serde_json::from_str(DEFAULT_SITE_CONFIG_JSON).expect("bundled site config must be valid")
});

pub fn default_site_config_value() -> Value {
    serde_json::to_value(&*DEFAULT_SITE_CONFIG).unwrap_or(Value::Null)
}

/// Options shown in the "Faturamento Mensal" select of the lead form.
pub const REVENUE_RANGES: [&str; 5] = [
    "Estou começando (< R$ 10k)",
    "Tracionando (R$ 10k - R$ 50k)",
    "Escalando (R$ 50k - R$ 100k)",
    "Consolidado (R$ 100k - R$ 500k)",
    "High Stakes (R$ 500k+)",
];
