//! Registry of named quality checks.
//!
//! Each entry is data: a name, a category, the table(s) it applies to, how
//! its observed count compares to its threshold, and two plain functions
//! that compute the observed count and resolve the threshold from the
//! configuration. Adding a check means adding an entry to [`REGISTRY`].

use std::collections::{BTreeMap, HashSet};

use crate::analyzers::temporal::HistoricalAnalysis;
use crate::analyzers::types::OutlierStats;
use crate::analyzers::utility::pct;
use crate::config::QualityConfig;
use crate::model::CheckCategory::{BusinessRule, Completeness, Coverage, Structural, Temporal};
use crate::model::{
    CheckCategory, Comparison, EnrichedHistoricalPoint, EnrichedSnapshot, Metric, Table,
};

use self::CheckTarget::{Historical, Snapshots};

/// Which partition of a run a check is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTarget {
    /// Once per snapshot table, absent tables included as empty partitions.
    Snapshots,
    /// Once, against the historical table.
    Historical,
    /// Once, against the country snapshots joined with the historical table.
    CrossTable,
}

/// Everything a check predicate may look at.
pub struct CheckContext<'a> {
    pub table: Table,
    /// Snapshots of `table`; the country partition for cross-table checks;
    /// empty for the historical table.
    pub snapshots: &'a [EnrichedSnapshot],
    pub historical: &'a HistoricalAnalysis,
    /// Records of `table` rejected before enrichment.
    pub rejected: usize,
    pub config: &'a QualityConfig,
}

#[derive(Clone, Copy)]
pub struct CheckDefinition {
    pub name: &'static str,
    pub category: CheckCategory,
    pub target: CheckTarget,
    pub comparison: Comparison,
    pub observe: fn(&CheckContext<'_>) -> usize,
    pub threshold: fn(&CheckContext<'_>) -> usize,
}

impl std::fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("target", &self.target)
            .field("comparison", &self.comparison)
            .finish()
    }
}

const fn entry(
    name: &'static str,
    category: CheckCategory,
    target: CheckTarget,
    observe: fn(&CheckContext<'_>) -> usize,
    threshold: fn(&CheckContext<'_>) -> usize,
) -> CheckDefinition {
    CheckDefinition {
        name,
        category,
        target,
        comparison: Comparison::AtMost,
        observe,
        threshold,
    }
}

pub static REGISTRY: &[CheckDefinition] = &[
    entry("duplicate_keys", Structural, Snapshots, duplicate_snapshots, t_duplicate_keys),
    entry("duplicate_keys", Structural, Historical, duplicate_points, t_duplicate_keys),
    entry("null_required_fields", Structural, Snapshots, unnamed_snapshots, t_null_required),
    entry("null_required_fields", Structural, Historical, unnamed_points, t_null_required),
    entry("malformed_records", Structural, Snapshots, rejected_records, t_malformed),
    entry("malformed_records", Structural, Historical, rejected_records, t_malformed),
    entry("negative_counts", BusinessRule, Snapshots, negative_snapshots, t_negative_counts),
    entry("negative_counts", BusinessRule, Historical, negative_points, t_negative_counts),
    entry("cases_consistency", BusinessRule, Snapshots, inconsistent_totals, t_cases_consistency),
    entry("mortality_outlier", BusinessRule, Snapshots, mortality_outliers, t_mortality_outlier),
    entry("active_calc_mismatch", BusinessRule, Snapshots, active_mismatches, t_active_mismatch),
    entry("data_freshness", Temporal, Snapshots, stale_snapshots, t_data_freshness),
    CheckDefinition {
        name: "minimum_volume",
        category: Completeness,
        target: Snapshots,
        comparison: Comparison::AtLeast,
        observe: snapshot_rows,
        threshold: t_volume_floor,
    },
    CheckDefinition {
        name: "minimum_volume",
        category: Completeness,
        target: Historical,
        comparison: Comparison::AtLeast,
        observe: historical_rows,
        threshold: t_volume_floor,
    },
    entry("metric_completeness", Completeness, Snapshots, sparse_metrics, t_metric_completeness),
    entry("geographic_coverage", Coverage, Snapshots, missing_regions, t_geographic_coverage),
    entry("historical_gap", Temporal, Historical, series_gaps, t_historical_gap),
    entry("incomplete_series", Temporal, Historical, incomplete_series, t_incomplete_series),
    entry("daily_change_anomaly", Temporal, Historical, anomalous_changes, t_anomaly),
    entry(
        "cross_table_drift",
        CheckCategory::CrossTable,
        CheckTarget::CrossTable,
        drifting_countries,
        t_cross_table_drift,
    ),
];

/// Numeric snapshot columns a metric-completeness check requires.
pub const REQUIRED_METRICS: [&str; 5] = ["cases", "deaths", "recovered", "active", "population"];

/// Numeric snapshot columns reported in null percentages.
pub const SNAPSHOT_NUMERIC_COLUMNS: [&str; 15] = [
    "cases",
    "today_cases",
    "deaths",
    "today_deaths",
    "recovered",
    "today_recovered",
    "active",
    "critical",
    "tests",
    "population",
    "mortality_rate",
    "recovery_rate",
    "active_rate",
    "cases_per_million",
    "deaths_per_million",
];

/// Numeric historical columns reported in null percentages and outliers.
pub const HISTORICAL_NUMERIC_COLUMNS: [&str; 9] = [
    "value",
    "daily_change",
    "daily_change_pct",
    "value_7day_avg",
    "daily_change_7day_avg",
    "growth_rate_1day",
    "growth_rate_7day",
    "growth_rate_14day",
    "doubling_time_days",
];

/// Value of a numeric snapshot column. Unknown columns are absent.
pub fn column_value(s: &EnrichedSnapshot, column: &str) -> Option<f64> {
    let raw = &s.snapshot;
    let count = match column {
        "cases" => raw.cases,
        "today_cases" => raw.today_cases,
        "deaths" => raw.deaths,
        "today_deaths" => raw.today_deaths,
        "recovered" => raw.recovered,
        "today_recovered" => raw.today_recovered,
        "active" => raw.active,
        "critical" => raw.critical,
        "tests" => raw.tests,
        "population" => raw.population,
        "mortality_rate" => return s.mortality_rate,
        "recovery_rate" => return s.recovery_rate,
        "active_rate" => return s.active_rate,
        "cases_per_million" => return s.cases_per_million,
        "deaths_per_million" => return s.deaths_per_million,
        _ => None,
    };
    count.map(|v| v as f64)
}

/// Whether `column` holds a value on this snapshot.
pub fn column_present(s: &EnrichedSnapshot, column: &str) -> bool {
    column_value(s, column).is_some()
}

/// Value of a numeric historical column. Unknown columns are absent.
pub fn point_value(p: &EnrichedHistoricalPoint, column: &str) -> Option<f64> {
    match column {
        "value" => Some(p.value as f64),
        "daily_change" => p.daily_change.map(|c| c as f64),
        "daily_change_pct" => p.daily_change_pct,
        "value_7day_avg" => p.value_7day_avg,
        "daily_change_7day_avg" => p.daily_change_7day_avg,
        "growth_rate_1day" => p.growth_rate_1day,
        "growth_rate_7day" => p.growth_rate_7day,
        "growth_rate_14day" => p.growth_rate_14day,
        "doubling_time_days" => p.doubling_time_days,
        _ => None,
    }
}

/// Percentage of rows where each numeric column is null.
pub fn snapshot_null_percentages(snapshots: &[EnrichedSnapshot]) -> BTreeMap<String, f64> {
    SNAPSHOT_NUMERIC_COLUMNS
        .iter()
        .map(|column| {
            let nulls = snapshots
                .iter()
                .filter(|s| !column_present(s, column))
                .count();
            (column.to_string(), pct(nulls, snapshots.len()))
        })
        .collect()
}

pub fn historical_null_percentages(historical: &HistoricalAnalysis) -> BTreeMap<String, f64> {
    let total = historical.record_count();
    HISTORICAL_NUMERIC_COLUMNS
        .iter()
        .map(|column| {
            let nulls = historical
                .points()
                .filter(|p| point_value(p, column).is_none())
                .count();
            (column.to_string(), pct(nulls, total))
        })
        .collect()
}

/// IQR outlier statistics per numeric snapshot column.
pub fn snapshot_outliers(snapshots: &[EnrichedSnapshot]) -> BTreeMap<String, OutlierStats> {
    SNAPSHOT_NUMERIC_COLUMNS
        .iter()
        .filter_map(|column| {
            let values: Vec<f64> = snapshots
                .iter()
                .filter_map(|s| column_value(s, column))
                .collect();
            OutlierStats::from_values(values, snapshots.len()).map(|o| (column.to_string(), o))
        })
        .collect()
}

pub fn historical_outliers(historical: &HistoricalAnalysis) -> BTreeMap<String, OutlierStats> {
    let total = historical.record_count();
    HISTORICAL_NUMERIC_COLUMNS
        .iter()
        .filter_map(|column| {
            let values: Vec<f64> = historical
                .points()
                .filter_map(|p| point_value(p, column))
                .collect();
            OutlierStats::from_values(values, total).map(|o| (column.to_string(), o))
        })
        .collect()
}

// -- observations ------------------------------------------------------------

/// Rows whose (region, extraction_date) repeats an earlier row. Unnamed rows
/// are left to `null_required_fields`.
pub fn duplicate_snapshots(ctx: &CheckContext<'_>) -> usize {
    let mut seen = HashSet::new();
    ctx.snapshots
        .iter()
        .filter_map(|s| {
            s.snapshot
                .name()
                .map(|n| (s.snapshot.region_type, n.to_lowercase(), s.snapshot.extraction_date))
        })
        .filter(|key| !seen.insert(key.clone()))
        .count()
}

fn duplicate_points(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.duplicate_points
}

fn unnamed_snapshots(ctx: &CheckContext<'_>) -> usize {
    ctx.snapshots
        .iter()
        .filter(|s| s.snapshot.name().is_none())
        .count()
}

fn unnamed_points(ctx: &CheckContext<'_>) -> usize {
    ctx.historical
        .points()
        .filter(|p| p.country.trim().is_empty())
        .count()
}

fn rejected_records(ctx: &CheckContext<'_>) -> usize {
    ctx.rejected
}

fn negative_snapshots(ctx: &CheckContext<'_>) -> usize {
    ctx.snapshots
        .iter()
        .filter(|s| {
            let raw = &s.snapshot;
            [raw.cases, raw.deaths, raw.recovered]
                .into_iter()
                .flatten()
                .any(|v| v < 0)
        })
        .count()
}

fn negative_points(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.points().filter(|p| p.value < 0).count()
}

/// `cases >= deaths + recovered`, checked only where cases are positive.
/// Sums are widened so extreme counts cannot overflow.
fn inconsistent_totals(ctx: &CheckContext<'_>) -> usize {
    ctx.snapshots
        .iter()
        .filter(|s| {
            let raw = &s.snapshot;
            match raw.cases {
                Some(cases) if cases > 0 => {
                    let deaths = i128::from(raw.deaths.unwrap_or(0));
                    let recovered = i128::from(raw.recovered.unwrap_or(0));
                    i128::from(cases) < deaths + recovered
                }
                _ => false,
            }
        })
        .count()
}

/// Rows with at least the minimum case volume and a mortality rate above the bound.
fn mortality_outliers(ctx: &CheckContext<'_>) -> usize {
    let cfg = ctx.config;
    ctx.snapshots
        .iter()
        .filter(|s| {
            s.snapshot.cases.unwrap_or(0) >= cfg.mortality_outlier_min_cases
                && s.mortality_rate.is_some_and(|r| r > cfg.mortality_outlier_rate)
        })
        .count()
}

/// Reported `active` against `cases - deaths - recovered`, beyond a
/// tolerance proportional to cases. Source `active` is never rewritten.
fn active_mismatches(ctx: &CheckContext<'_>) -> usize {
    let cfg = ctx.config;
    ctx.snapshots
        .iter()
        .filter(|s| {
            let raw = &s.snapshot;
            match (raw.cases, raw.active) {
                (Some(cases), Some(active)) if cases > cfg.active_mismatch_min_cases => {
                    let expected = i128::from(cases)
                        - i128::from(raw.deaths.unwrap_or(0))
                        - i128::from(raw.recovered.unwrap_or(0));
                    let diff = (i128::from(active) - expected).abs();
                    diff as f64 > cases as f64 * cfg.active_mismatch_tolerance
                }
                _ => false,
            }
        })
        .count()
}

fn stale_snapshots(ctx: &CheckContext<'_>) -> usize {
    ctx.snapshots
        .iter()
        .filter(|s| s.data_freshness_hours > ctx.config.freshness_window_hours)
        .count()
}

fn snapshot_rows(ctx: &CheckContext<'_>) -> usize {
    ctx.snapshots.len()
}

fn historical_rows(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.record_count()
}

/// Required numeric fields populated on fewer rows than the configured share.
fn sparse_metrics(ctx: &CheckContext<'_>) -> usize {
    if ctx.snapshots.is_empty() {
        return 0;
    }
    let min_pct = ctx.config.min_metric_completeness * 100.0;
    REQUIRED_METRICS
        .iter()
        .filter(|column| {
            let present = ctx
                .snapshots
                .iter()
                .filter(|s| column_present(s, column))
                .count();
            pct(present, ctx.snapshots.len()) < min_pct
        })
        .count()
}

fn missing_regions(ctx: &CheckContext<'_>) -> usize {
    ctx.config
        .expected_regions(ctx.table)
        .iter()
        .filter(|expected| {
            !ctx.snapshots.iter().any(|s| {
                s.snapshot
                    .name()
                    .is_some_and(|n| n.eq_ignore_ascii_case(expected.trim()))
            })
        })
        .count()
}

fn series_gaps(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.total_gaps()
}

fn incomplete_series(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.incomplete_series()
}

fn anomalous_changes(ctx: &CheckContext<'_>) -> usize {
    ctx.historical.anomalies()
}

/// Country snapshots whose cases differ from the latest historical `cases`
/// value by more than the tolerance, relative to the historical value.
/// Only history dated within the drift window of the snapshot is compared.
pub fn drifting_countries(ctx: &CheckContext<'_>) -> usize {
    let cfg = ctx.config;
    ctx.snapshots
        .iter()
        .filter(|s| {
            let raw = &s.snapshot;
            let (Some(cases), Some(name)) = (raw.cases, raw.name()) else {
                return false;
            };
            if cases <= cfg.drift_min_cases {
                return false;
            }
            let Some(latest) = ctx
                .historical
                .find(name, Metric::Cases)
                .and_then(|series| series.latest())
            else {
                return false;
            };
            let age_days = (raw.updated.date_naive() - latest.date).num_days().abs();
            if age_days > cfg.drift_window_days || latest.value <= 0 {
                return false;
            }
            let diff = (i128::from(cases) - i128::from(latest.value)).abs();
            let drift = diff as f64 / latest.value as f64;
            drift > cfg.drift_tolerance
        })
        .count()
}

// -- thresholds --------------------------------------------------------------

fn t_duplicate_keys(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.duplicate_keys
}

fn t_null_required(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.null_required_fields
}

fn t_malformed(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.malformed_records
}

fn t_negative_counts(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.negative_counts
}

fn t_cases_consistency(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.cases_consistency
}

fn t_mortality_outlier(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.mortality_outlier
}

fn t_active_mismatch(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.active_calc_mismatch
}

fn t_data_freshness(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.data_freshness
}

fn t_volume_floor(ctx: &CheckContext<'_>) -> usize {
    ctx.config.volume_floor(ctx.table)
}

fn t_metric_completeness(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.metric_completeness
}

fn t_geographic_coverage(ctx: &CheckContext<'_>) -> usize {
    ctx.config
        .thresholds
        .geographic_coverage
        .get(&ctx.table)
        .copied()
        .unwrap_or(0)
}

fn t_historical_gap(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.historical_gap
}

fn t_incomplete_series(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.incomplete_series
}

fn t_anomaly(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.daily_change_anomaly
}

fn t_cross_table_drift(ctx: &CheckContext<'_>) -> usize {
    ctx.config.thresholds.cross_table_drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::metrics::enrich_snapshot;
    use crate::analyzers::temporal::TemporalAnalyzer;
    use crate::model::{HistoricalPoint, RegionType, Snapshot};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    #[test]
    fn test_registry_covers_canonical_checks() {
        let names: HashSet<&str> = REGISTRY.iter().map(|c| c.name).collect();
        for name in [
            "duplicate_keys",
            "null_required_fields",
            "negative_counts",
            "cases_consistency",
            "mortality_outlier",
            "active_calc_mismatch",
            "data_freshness",
            "minimum_volume",
            "historical_gap",
            "cross_table_drift",
            "geographic_coverage",
            "metric_completeness",
        ] {
            assert!(names.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_registry_targets_and_categories() {
        let drift = REGISTRY
            .iter()
            .find(|c| c.name == "cross_table_drift")
            .unwrap();
        assert_eq!(drift.category, CheckCategory::CrossTable);
        assert_eq!(drift.target, CheckTarget::CrossTable);

        let gaps = REGISTRY.iter().find(|c| c.name == "historical_gap").unwrap();
        assert_eq!((gaps.category, gaps.target), (Temporal, Historical));
        let volume: Vec<_> = REGISTRY
            .iter()
            .filter(|c| c.name == "minimum_volume")
            .map(|c| (c.category, c.target, c.comparison))
            .collect();
        assert_eq!(
            volume,
            vec![
                (Completeness, Snapshots, Comparison::AtLeast),
                (Completeness, Historical, Comparison::AtLeast),
            ]
        );
    }

    #[test]
    fn test_duplicate_keys_same_extraction() {
        let rows = vec![
            country("Peru", 10, 0, 0),
            country("peru", 10, 0, 0),
            country("Chile", 10, 0, 0),
        ];
        assert_eq!(observe(duplicate_snapshots, &rows), 1);
    }

    #[test]
    fn test_later_extraction_is_not_duplicate() {
        let mut later = country("Peru", 10, 0, 0);
        later.snapshot.extraction_date = now() + Duration::hours(24);
        let rows = vec![country("Peru", 10, 0, 0), later];
        assert_eq!(observe(duplicate_snapshots, &rows), 0);
    }

    #[test]
    fn test_null_and_blank_names() {
        let mut blank = country("x", 1, 0, 0);
        blank.snapshot.region_name = Some(" ".into());
        let mut null = country("x", 1, 0, 0);
        null.snapshot.region_name = None;
        let rows = vec![blank, null, country("Peru", 1, 0, 0)];
        assert_eq!(observe(unnamed_snapshots, &rows), 2);
    }

    #[test]
    fn test_negative_counts() {
        let rows = vec![country("A", -1, 0, 0), country("B", 5, -2, 0), country("C", 5, 0, 0)];
        assert_eq!(observe(negative_snapshots, &rows), 2);
    }

    #[test]
    fn test_cases_consistency() {
        let rows = vec![
            country("A", 100, 10, 95),
            country("B", 100, 10, 90),
            country("C", 0, 5, 5),
        ];
        assert_eq!(observe(inconsistent_totals, &rows), 1);
    }

    #[test]
    fn test_extreme_counts_count_as_violations() {
        let rows = vec![
            country("A", 1000, i64::MAX, 1),
            with_active(country("B", 5000, i64::MAX, i64::MAX), i64::MIN),
        ];
        assert_eq!(observe(inconsistent_totals, &rows), 2);
        assert_eq!(observe(active_mismatches, &rows), 1);
    }

    #[test]
    fn test_mortality_outlier_needs_volume() {
        let rows = vec![
            country("A", 1000, 250, 0),
            country("B", 999, 250, 0),
            country("C", 5000, 100, 0),
        ];
        assert_eq!(observe(mortality_outliers, &rows), 1);
    }

    #[test]
    fn test_active_mismatch_tolerance() {
        let within = with_active(country("A", 10_000, 100, 5_000), 4_950);
        let outside = with_active(country("B", 10_000, 100, 5_000), 4_700);
        let small = with_active(country("C", 100, 0, 0), 0);
        let rows = vec![within, outside, small];
        assert_eq!(observe(active_mismatches, &rows), 1);
    }

    #[test]
    fn test_stale_snapshots() {
        let mut old = country("A", 1, 0, 0);
        old.data_freshness_hours = 49.0;
        let rows = vec![old, country("B", 1, 0, 0)];
        assert_eq!(observe(stale_snapshots, &rows), 1);
    }

    #[test]
    fn test_sparse_metrics() {
        // no row has population or active
        let rows: Vec<_> = (0..5).map(|i| country(&format!("C{i}"), 10, 1, 1)).collect();
        assert_eq!(observe(sparse_metrics, &rows), 2);
        assert_eq!(observe(sparse_metrics, &[]), 0);
    }

    #[test]
    fn test_missing_regions() {
        let config = QualityConfig::default();
        let historical = HistoricalAnalysis::default();
        let rows = vec![country("usa", 1, 0, 0), country("India", 1, 0, 0)];
        let ctx = CheckContext {
            table: Table::Countries,
            snapshots: &rows,
            historical: &historical,
            rejected: 0,
            config: &config,
        };
        assert_eq!(missing_regions(&ctx), config.major_countries.len() - 2);
    }

    #[test]
    fn test_cross_table_drift_flags_twenty_percent() {
        let config = QualityConfig::default();
        let historical = history("Peru", 2500);
        let rows = vec![country("Peru", 2000, 10, 0)];
        let ctx = cross_ctx(&rows, &historical, &config);
        assert_eq!(drifting_countries(&ctx), 1);
    }

    #[test]
    fn test_cross_table_drift_within_tolerance() {
        let config = QualityConfig::default();
        let historical = history("Peru", 2100);
        let rows = vec![country("Peru", 2000, 10, 0)];
        let ctx = cross_ctx(&rows, &historical, &config);
        assert_eq!(drifting_countries(&ctx), 0);
    }

    #[test]
    fn test_cross_table_drift_ignores_small_and_unmatched() {
        let config = QualityConfig::default();
        let historical = history("Peru", 500);
        let rows = vec![country("Peru", 900, 10, 0), country("Chile", 5000, 10, 0)];
        let ctx = cross_ctx(&rows, &historical, &config);
        assert_eq!(drifting_countries(&ctx), 0);
    }

    #[test]
    fn test_null_percentages() {
        let mut rows = vec![country("A", 10, 1, 1), country("B", 10, 1, 1)];
        rows[0].snapshot.population = Some(100);
        let nulls = snapshot_null_percentages(&rows);
        assert_eq!(nulls["population"], 50.0);
        assert_eq!(nulls["cases"], 0.0);
        assert_eq!(nulls["critical"], 100.0);
    }

    fn observe(f: fn(&CheckContext<'_>) -> usize, rows: &[EnrichedSnapshot]) -> usize {
        let config = QualityConfig::default();
        let historical = HistoricalAnalysis::default();
        let ctx = CheckContext {
            table: Table::Countries,
            snapshots: rows,
            historical: &historical,
            rejected: 0,
            config: &config,
        };
        f(&ctx)
    }

    fn cross_ctx<'a>(
        rows: &'a [EnrichedSnapshot],
        historical: &'a HistoricalAnalysis,
        config: &'a QualityConfig,
    ) -> CheckContext<'a> {
        CheckContext {
            table: Table::Countries,
            snapshots: rows,
            historical,
            rejected: 0,
            config,
        }
    }

    fn history(country: &str, latest: i64) -> HistoricalAnalysis {
        let today = now().date_naive();
        let points = vec![
            HistoricalPoint::new(country, Metric::Cases, today - Duration::days(1), latest - 50),
            HistoricalPoint::new(country, Metric::Cases, today, latest),
        ];
        TemporalAnalyzer::new(&QualityConfig::default())
            .analyze_all(points)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    fn country(name: &str, cases: i64, deaths: i64, recovered: i64) -> EnrichedSnapshot {
        let snap = Snapshot::new(RegionType::Country, Some(name.into()), now(), now())
            .with_counts(cases, deaths, recovered);
        enrich_snapshot(&snap, now())
    }

    fn with_active(mut s: EnrichedSnapshot, active: i64) -> EnrichedSnapshot {
        s.snapshot.active = Some(active);
        s
    }
}
