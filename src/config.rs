use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// Directory holding the demo source fixtures
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: String,
    /// Directory the exporter writes extracts into
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
    /// Key handed to the reference encryption service (demo only)
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// Fixed exchange rates, externally supplied and never fetched live
    #[serde(default)]
    pub fx: FxTable,
}

fn default_fixture_dir() -> String {
    "fixtures".to_string()
}

fn default_export_dir() -> String {
    "output".to_string()
}

/// Fixed conversion rates from points to regional currency units.
///
/// The home region is 1:1 by convention and has no entry here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FxTable {
    pub jpy_per_point: Decimal,
    pub usd_per_point: Decimal,
}

impl Default for FxTable {
    fn default() -> Self {
        Self {
            jpy_per_point: Decimal::from_str("9").unwrap(),
            usd_per_point: Decimal::from_str("0.00075").unwrap(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_defaults_match_fixed_rates() {
        let fx = FxTable::default();
        assert_eq!(fx.jpy_per_point, Decimal::from(9));
        assert_eq!(fx.usd_per_point, Decimal::from_str("0.00075").unwrap());
    }

    #[test]
    fn test_config_parses_minimal_yaml() {
        let yaml = r#"
log_level: info
log_dir: logs
log_file: payout_recon.log
use_json: false
rotation: daily
enable_tracing: true
"#;
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.fixture_dir, "fixtures");
        assert_eq!(cfg.fx.jpy_per_point, Decimal::from(9));
        assert!(cfg.encryption_key.is_none());
    }
}
