//! Engine configuration: every threshold, floor, and expected-coverage list.
//!
//! Stored as a JSON object on disk. Every field is optional; anything not
//! present keeps its documented default. Keyed maps are merged key by key
//! over their defaults, so naming one table's floor leaves the others alone:
//! ```json
//! {
//!   "freshness_window_hours": 72.0,
//!   "minimum_volume": { "covid_countries": 180 },
//!   "thresholds": { "mortality_outlier": 50 },
//!   "disabled_checks": ["geographic_coverage"]
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::model::{CheckCategory, Grade, Metric, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub freshness_window_hours: f64,

    pub mortality_outlier_rate: f64,
    pub mortality_outlier_min_cases: i64,

    pub active_mismatch_tolerance: f64,
    pub active_mismatch_min_cases: i64,

    /// A series with more gaps than this is incomplete.
    pub max_series_gaps: usize,
    /// A series whose days-with-data / expected-days falls below this is incomplete.
    pub min_series_completeness: f64,
    /// Daily changes below the floor for their metric are flagged as anomalies.
    #[serde(deserialize_with = "merge_anomaly_floors")]
    pub anomaly_floors: BTreeMap<Metric, i64>,

    pub drift_tolerance: f64,
    pub drift_min_cases: i64,
    pub drift_window_days: i64,

    pub min_metric_completeness: f64,
    /// Columns with a larger null share (0–1) are reported as warnings.
    pub max_null_percentage: f64,

    #[serde(deserialize_with = "merge_minimum_volume")]
    pub minimum_volume: BTreeMap<Table, usize>,

    pub expected_continents: Vec<String>,
    pub major_countries: Vec<String>,
    pub major_states: Vec<String>,

    pub thresholds: CheckThresholds,
    pub disabled_checks: Vec<String>,

    /// Lowest grade the loader accepts.
    pub min_load_grade: Grade,
    #[serde(deserialize_with = "merge_category_weights")]
    pub category_weights: BTreeMap<CheckCategory, f64>,
}

/// Maximum tolerated violation counts, one per registry check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckThresholds {
    pub duplicate_keys: usize,
    pub null_required_fields: usize,
    pub negative_counts: usize,
    pub malformed_records: usize,
    pub cases_consistency: usize,
    pub mortality_outlier: usize,
    pub active_calc_mismatch: usize,
    pub data_freshness: usize,
    pub historical_gap: usize,
    pub incomplete_series: usize,
    pub daily_change_anomaly: usize,
    pub cross_table_drift: usize,
    pub metric_completeness: usize,
    #[serde(deserialize_with = "merge_geographic_coverage")]
    pub geographic_coverage: BTreeMap<Table, usize>,
}

impl Default for CheckThresholds {
    fn default() -> Self {
        CheckThresholds {
            duplicate_keys: 0,
            null_required_fields: 0,
            negative_counts: 0,
            malformed_records: 0,
            cases_consistency: 0,
            mortality_outlier: 100,
            active_calc_mismatch: 0,
            data_freshness: 0,
            historical_gap: 100,
            incomplete_series: 0,
            daily_change_anomaly: 0,
            cross_table_drift: 20,
            metric_completeness: 0,
            geographic_coverage: default_geographic_coverage(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        QualityConfig {
            freshness_window_hours: 48.0,
            mortality_outlier_rate: 0.20,
            mortality_outlier_min_cases: 1000,
            active_mismatch_tolerance: 0.01,
            active_mismatch_min_cases: 100,
            max_series_gaps: 7,
            min_series_completeness: 0.90,
            anomaly_floors: default_anomaly_floors(),
            drift_tolerance: 0.10,
            drift_min_cases: 1000,
            drift_window_days: 7,
            min_metric_completeness: 0.80,
            max_null_percentage: 0.10,
            minimum_volume: default_minimum_volume(),
            expected_continents: strings(&[
                "North America",
                "South America",
                "Europe",
                "Asia",
                "Africa",
                "Australia-Oceania",
            ]),
            major_countries: strings(&[
                "USA", "India", "Brazil", "France", "Germany", "UK", "Russia", "Japan",
            ]),
            major_states: strings(&[
                "California",
                "Texas",
                "Florida",
                "New York",
                "Illinois",
                "Pennsylvania",
                "Ohio",
                "Georgia",
            ]),
            thresholds: CheckThresholds::default(),
            disabled_checks: Vec::new(),
            min_load_grade: Grade::Fair,
            category_weights: default_category_weights(),
        }
    }
}

fn default_minimum_volume() -> BTreeMap<Table, usize> {
    BTreeMap::from([
        (Table::Global, 1),
        (Table::Countries, 190),
        (Table::Continents, 6),
        (Table::States, 50),
        (Table::Historical, 1),
    ])
}

fn default_anomaly_floors() -> BTreeMap<Metric, i64> {
    BTreeMap::from([(Metric::Cases, -10_000)])
}

fn default_geographic_coverage() -> BTreeMap<Table, usize> {
    BTreeMap::from([
        (Table::Continents, 0),
        (Table::Countries, 1),
        (Table::States, 3),
    ])
}

fn default_category_weights() -> BTreeMap<CheckCategory, f64> {
    BTreeMap::from([
        (CheckCategory::Structural, 3.0),
        (CheckCategory::BusinessRule, 2.0),
        (CheckCategory::Completeness, 2.0),
        (CheckCategory::Temporal, 1.0),
        (CheckCategory::CrossTable, 1.0),
        (CheckCategory::Coverage, 1.0),
    ])
}

/// Reads a map and lays its entries over `defaults`.
fn merge_over<'de, D, K, V>(
    deserializer: D,
    mut defaults: BTreeMap<K, V>,
) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
{
    defaults.extend(BTreeMap::<K, V>::deserialize(deserializer)?);
    Ok(defaults)
}

fn merge_minimum_volume<'de, D>(deserializer: D) -> Result<BTreeMap<Table, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    merge_over(deserializer, default_minimum_volume())
}

fn merge_anomaly_floors<'de, D>(deserializer: D) -> Result<BTreeMap<Metric, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    merge_over(deserializer, default_anomaly_floors())
}

fn merge_geographic_coverage<'de, D>(deserializer: D) -> Result<BTreeMap<Table, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    merge_over(deserializer, default_geographic_coverage())
}

fn merge_category_weights<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<CheckCategory, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    merge_over(deserializer, default_category_weights())
}

impl QualityConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read quality config '{path}'"))?;
        let config: QualityConfig = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse quality config '{path}'"))?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn is_enabled(&self, check_name: &str) -> bool {
        !self.disabled_checks.iter().any(|c| c == check_name)
    }

    pub fn volume_floor(&self, table: Table) -> usize {
        self.minimum_volume.get(&table).copied().unwrap_or(0)
    }

    pub fn anomaly_floor(&self, metric: Metric) -> Option<i64> {
        self.anomaly_floors.get(&metric).copied()
    }

    /// Names that must be present in `table` for full geographic coverage.
    pub fn expected_regions(&self, table: Table) -> &[String] {
        match table {
            Table::Continents => &self.expected_continents,
            Table::Countries => &self.major_countries,
            Table::States => &self.major_states,
            Table::Global | Table::Historical => &[],
        }
    }

    pub fn weight(&self, category: CheckCategory) -> f64 {
        self.category_weights.get(&category).copied().unwrap_or(1.0)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
