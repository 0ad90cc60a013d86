//! Canonical record model shared by every stage of the engine.
//!
//! Regions and historical metrics are closed variants. Everything that
//! applies "per region" or "per metric" works on the tag, never on a
//! region-specific code path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic scope of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    Global,
    Country,
    Continent,
    State,
}

impl RegionType {
    pub const ALL: [RegionType; 4] = [
        RegionType::Global,
        RegionType::Country,
        RegionType::Continent,
        RegionType::State,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::Global => "global",
            RegionType::Country => "country",
            RegionType::Continent => "continent",
            RegionType::State => "state",
        }
    }

    /// Warehouse table holding snapshots of this region type.
    pub fn table(&self) -> Table {
        match self {
            RegionType::Global => Table::Global,
            RegionType::Country => Table::Countries,
            RegionType::Continent => Table::Continents,
            RegionType::State => Table::States,
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warehouse tables the engine produces and validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "covid_global")]
    Global,
    #[serde(rename = "covid_countries")]
    Countries,
    #[serde(rename = "covid_continents")]
    Continents,
    #[serde(rename = "covid_states")]
    States,
    #[serde(rename = "covid_historical")]
    Historical,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Global,
        Table::Countries,
        Table::Continents,
        Table::States,
        Table::Historical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Global => "covid_global",
            Table::Countries => "covid_countries",
            Table::Continents => "covid_continents",
            Table::States => "covid_states",
            Table::Historical => "covid_historical",
        }
    }

    /// Region type stored in this table, `None` for the historical table.
    pub fn region_type(&self) -> Option<RegionType> {
        match self {
            Table::Global => Some(RegionType::Global),
            Table::Countries => Some(RegionType::Country),
            Table::Continents => Some(RegionType::Continent),
            Table::States => Some(RegionType::State),
            Table::Historical => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric carried by a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cases,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Cases, Metric::Deaths, Metric::Recovered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cases => "cases",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    pub fn parse(s: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a region at one extraction instant.
///
/// Counts are signed so that bad source data (negative counts) survives
/// deserialization and can be reported by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub region_type: RegionType,
    pub region_name: Option<String>,
    pub country: Option<String>,
    pub continent: Option<String>,

    pub cases: Option<i64>,
    pub today_cases: Option<i64>,
    pub deaths: Option<i64>,
    pub today_deaths: Option<i64>,
    pub recovered: Option<i64>,
    pub today_recovered: Option<i64>,
    pub active: Option<i64>,
    pub critical: Option<i64>,
    pub tests: Option<i64>,
    pub population: Option<i64>,

    // per-million figures as reported by the source
    pub cases_per_one_million: Option<f64>,
    pub deaths_per_one_million: Option<f64>,
    pub tests_per_one_million: Option<f64>,

    pub updated: DateTime<Utc>,
    pub extraction_date: DateTime<Utc>,
    pub data_source: String,
}

impl Snapshot {
    pub fn new(
        region_type: RegionType,
        region_name: Option<String>,
        updated: DateTime<Utc>,
        extraction_date: DateTime<Utc>,
    ) -> Self {
        Snapshot {
            region_type,
            region_name,
            country: None,
            continent: None,
            cases: None,
            today_cases: None,
            deaths: None,
            today_deaths: None,
            recovered: None,
            today_recovered: None,
            active: None,
            critical: None,
            tests: None,
            population: None,
            cases_per_one_million: None,
            deaths_per_one_million: None,
            tests_per_one_million: None,
            updated,
            extraction_date,
            data_source: DATA_SOURCE.to_string(),
        }
    }

    pub fn with_counts(mut self, cases: i64, deaths: i64, recovered: i64) -> Self {
        self.cases = Some(cases);
        self.deaths = Some(deaths);
        self.recovered = Some(recovered);
        self
    }

    pub fn with_active(mut self, active: i64) -> Self {
        self.active = Some(active);
        self
    }

    pub fn with_population(mut self, population: i64) -> Self {
        self.population = Some(population);
        self
    }

    /// Name used to match this snapshot against other tables, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.region_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Source tag written on every record.
pub const DATA_SOURCE: &str = "disease.sh";

/// A snapshot together with the analytic fields derived from it.
///
/// Rates are fractions; `None` means the ratio is undefined for this row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedSnapshot {
    pub snapshot: Snapshot,

    pub mortality_rate: Option<f64>,
    pub recovery_rate: Option<f64>,
    pub active_rate: Option<f64>,

    /// Authoritative per-million figures: locally computed, else source-provided.
    pub cases_per_million: Option<f64>,
    pub deaths_per_million: Option<f64>,
    /// Locally computed from counts and population only.
    pub cases_per_million_computed: Option<f64>,
    pub deaths_per_million_computed: Option<f64>,

    pub data_freshness_hours: f64,
    pub processed_at: DateTime<Utc>,
}

/// One (country, metric, date) observation of a cumulative value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub country: String,
    pub metric: Metric,
    pub date: NaiveDate,
    pub value: i64,
}

impl HistoricalPoint {
    pub fn new(country: &str, metric: Metric, date: NaiveDate, value: i64) -> Self {
        HistoricalPoint {
            country: country.to_string(),
            metric,
            date,
            value,
        }
    }
}

/// A historical point plus calendar decomposition and trend fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedHistoricalPoint {
    pub country: String,
    pub metric: Metric,
    pub date: NaiveDate,
    pub value: i64,

    pub year: i32,
    pub month: u32,
    /// Monday = 0.
    pub day_of_week: u32,
    /// ISO week number.
    pub week_of_year: u32,

    pub daily_change: Option<i64>,
    pub daily_change_pct: Option<f64>,
    pub value_7day_avg: Option<f64>,
    pub daily_change_7day_avg: Option<f64>,

    /// Relative change against the point 1, 7 and 14 positions back.
    pub growth_rate_1day: Option<f64>,
    pub growth_rate_7day: Option<f64>,
    pub growth_rate_14day: Option<f64>,
    /// Days to double at the current 1-day growth; undefined unless growth is positive.
    pub doubling_time_days: Option<f64>,

    pub days_since_previous: Option<i64>,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Structural,
    BusinessRule,
    Temporal,
    CrossTable,
    Coverage,
    Completeness,
}

impl CheckCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::Structural => "structural",
            CheckCategory::BusinessRule => "business_rule",
            CheckCategory::Temporal => "temporal",
            CheckCategory::CrossTable => "cross_table",
            CheckCategory::Coverage => "coverage",
            CheckCategory::Completeness => "completeness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
}

/// How an observed count is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Violation count: passes while `observed_count <= threshold`.
    AtMost,
    /// Volume floor: passes while `observed_count >= threshold`.
    AtLeast,
}

/// Outcome of one named rule applied to one table or table pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub check_name: String,
    pub category: CheckCategory,
    pub table_name: String,
    pub observed_count: usize,
    pub threshold: usize,
    pub comparison: Comparison,
    pub status: CheckStatus,
}

impl ValidationCheck {
    pub fn evaluate(
        check_name: &str,
        category: CheckCategory,
        table_name: &str,
        observed_count: usize,
        threshold: usize,
        comparison: Comparison,
    ) -> Self {
        let passed = match comparison {
            Comparison::AtMost => observed_count <= threshold,
            Comparison::AtLeast => observed_count >= threshold,
        };

        ValidationCheck {
            check_name: check_name.to_string(),
            category,
            table_name: table_name.to_string(),
            observed_count,
            threshold,
            comparison,
            status: if passed {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }

    /// One-line human readable outcome, used for report errors and warnings.
    pub fn describe(&self) -> String {
        let relation = match self.comparison {
            Comparison::AtMost => "max",
            Comparison::AtLeast => "min",
        };
        format!(
            "{} [{}] on {}: observed {} ({} {})",
            self.check_name,
            self.category.as_str(),
            self.table_name,
            self.observed_count,
            relation,
            self.threshold
        )
    }
}

/// Categorical summary of a run. Ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Poor => "poor",
            Grade::Fair => "fair",
            Grade::Good => "good",
            Grade::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
