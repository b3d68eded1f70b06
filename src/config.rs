use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub db_path: String,
    pub instruments: Vec<InstrumentConfig>,
    /// A cached series older than this is reported stale (refreshing it is
    /// the external collector's job).
    #[serde(default = "default_cache_max_age_days")]
    pub cache_max_age_days: i64,
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
    #[serde(default = "default_cluster_count")]
    pub cluster_count: usize,
}

fn default_cache_max_age_days() -> i64 {
    1
}

fn default_correlation_threshold() -> f64 {
    0.5
}

fn default_rolling_window() -> usize {
    20
}

fn default_max_clusters() -> usize {
    10
}

fn default_cluster_count() -> usize {
    3
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "db_path": "data.db",
                "instruments": [{"name": "BYD", "code": "002594.SZ"}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.cache_max_age_days, 1);
        assert_eq!(config.correlation_threshold, 0.5);
        assert_eq!(config.rolling_window, 20);
        assert_eq!(config.max_clusters, 10);
        assert_eq!(config.cluster_count, 3);
        assert_eq!(config.instruments[0].code, "002594.SZ");
    }
}
