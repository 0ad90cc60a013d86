use crate::analyzers::checks::{
    historical_null_percentages, historical_outliers, snapshot_null_percentages, snapshot_outliers,
};
use crate::analyzers::grade::grade;
use crate::analyzers::temporal::HistoricalAnalysis;
use crate::analyzers::types::{OutlierStats, QualityReport, QualitySummary, TableQualityReport};
use crate::analyzers::utility::pct;
use crate::analyzers::validator::{SnapshotTables, cross_table_name};
use crate::config::QualityConfig;
use crate::model::{Comparison, Table, ValidationCheck};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Reduces a set of check results to totals, weighted score and grade.
///
/// The grade comes from the fixed failed-count policy in [`grade`]; the
/// weighted score is informational and never changes the grade.
pub fn summarize(checks: &[ValidationCheck], config: &QualityConfig) -> QualitySummary {
    let total_checks = checks.len();
    let passed = checks.iter().filter(|c| c.passed()).count();
    let failed = total_checks - passed;

    QualitySummary {
        total_checks,
        passed,
        failed,
        pass_percentage: pass_percentage(passed, total_checks),
        quality_score: weighted_score(checks, config),
        grade: grade(failed),
    }
}

/// `passed / total × 100`. A run with no checks counts as fully passing.
pub fn pass_percentage(passed: usize, total: usize) -> f64 {
    if total == 0 { 100.0 } else { pct(passed, total) }
}

/// Share of passing checks weighted by category, on a 0–100 scale.
pub fn weighted_score(checks: &[ValidationCheck], config: &QualityConfig) -> f64 {
    let mut weighted_total = 0.0;
    let mut weight_sum = 0.0;

    for check in checks {
        let weight = config.weight(check.category);
        if check.passed() {
            weighted_total += weight;
        }
        weight_sum += weight;
    }

    if weight_sum == 0.0 {
        100.0
    } else {
        weighted_total / weight_sum * 100.0
    }
}

/// Builds the run report: overall summary plus one entry per table and
/// one for the country/historical pair.
pub fn build_report(
    checks: Vec<ValidationCheck>,
    snapshots: &SnapshotTables,
    historical: &HistoricalAnalysis,
    rejected: &BTreeMap<Table, usize>,
    config: &QualityConfig,
    now: DateTime<Utc>,
) -> QualityReport {
    let summary = summarize(&checks, config);

    let mut tables = Vec::new();
    for table in Table::ALL {
        let (record_count, profile) = match table {
            Table::Historical => (
                historical.record_count(),
                ColumnProfile {
                    null_percentages: historical_null_percentages(historical),
                    outliers: historical_outliers(historical),
                },
            ),
            _ => {
                let rows = snapshots.get(&table).map(Vec::as_slice).unwrap_or(&[]);
                let profile = ColumnProfile {
                    null_percentages: snapshot_null_percentages(rows),
                    outliers: snapshot_outliers(rows),
                };
                (rows.len(), profile)
            }
        };

        let duplicates = duplicate_count(&checks, table.as_str());
        let duplicate_base = match table {
            Table::Historical => record_count + duplicates,
            _ => record_count,
        };

        tables.push(table_report(
            table.as_str(),
            &checks,
            record_count,
            config.volume_floor(table),
            profile,
            pct(duplicates, duplicate_base),
            config,
            now,
        ));
    }

    let pair = cross_table_name();
    let country_rows = snapshots.get(&Table::Countries).map_or(0, Vec::len);
    tables.push(table_report(
        &pair,
        &checks,
        country_rows,
        0,
        ColumnProfile::default(),
        0.0,
        config,
        now,
    ));

    let failed_checks = checks
        .iter()
        .filter(|c| !c.passed())
        .map(|c| format!("{}@{}", c.check_name, c.table_name))
        .collect();

    QualityReport {
        generated_at: now,
        summary,
        tables,
        checks,
        failed_checks,
        malformed_records: rejected.values().sum(),
    }
}

/// Per-column null shares and outlier statistics of one table.
#[derive(Debug, Default)]
struct ColumnProfile {
    null_percentages: BTreeMap<String, f64>,
    outliers: BTreeMap<String, OutlierStats>,
}

#[allow(clippy::too_many_arguments)]
fn table_report(
    table_name: &str,
    checks: &[ValidationCheck],
    record_count: usize,
    expected_count: usize,
    profile: ColumnProfile,
    duplicate_percentage: f64,
    config: &QualityConfig,
    now: DateTime<Utc>,
) -> TableQualityReport {
    let own: Vec<ValidationCheck> = checks
        .iter()
        .filter(|c| c.table_name == table_name)
        .cloned()
        .collect();
    let summary = summarize(&own, config);

    let errors = own
        .iter()
        .filter(|c| !c.passed())
        .map(ValidationCheck::describe)
        .collect();
    // tolerated violations, then sparse columns
    let max_null = config.max_null_percentage * 100.0;
    let warnings = own
        .iter()
        .filter(|c| c.passed() && c.comparison == Comparison::AtMost && c.observed_count > 0)
        .map(ValidationCheck::describe)
        .chain(
            profile
                .null_percentages
                .iter()
                .filter(|(_, share)| **share > max_null)
                .map(|(column, share)| format!("{column}: {share:.1}% null (max {max_null:.1}%)")),
        )
        .collect();

    TableQualityReport {
        table_name: table_name.to_string(),
        validation_timestamp: now,
        record_count,
        expected_count,
        count_match: record_count >= expected_count,
        is_valid: summary.failed == 0,
        quality_score: summary.quality_score,
        pass_percentage: summary.pass_percentage,
        grade: summary.grade,
        errors,
        warnings,
        null_percentages: profile.null_percentages,
        duplicate_percentage,
        outliers: profile.outliers,
    }
}

fn duplicate_count(checks: &[ValidationCheck], table_name: &str) -> usize {
    checks
        .iter()
        .find(|c| c.check_name == "duplicate_keys" && c.table_name == table_name)
        .map_or(0, |c| c.observed_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::metrics::enrich_snapshot;
    use crate::model::{CheckCategory, Grade, RegionType, Snapshot};

    #[test]
    fn test_twenty_checks_two_failed() {
        let checks = checks_with(20, 2);
        let summary = summarize(&checks, &QualityConfig::default());

        assert_eq!(summary.total_checks, 20);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.pass_percentage, 90.0);
        assert_eq!(summary.grade, Grade::Good);
    }

    #[test]
    fn test_grade_policy_through_summary() {
        let config = QualityConfig::default();
        assert_eq!(summarize(&checks_with(10, 0), &config).grade, Grade::Excellent);
        assert_eq!(summarize(&checks_with(10, 2), &config).grade, Grade::Good);
        assert_eq!(summarize(&checks_with(10, 3), &config).grade, Grade::Fair);
        assert_eq!(summarize(&checks_with(10, 6), &config).grade, Grade::Poor);
    }

    #[test]
    fn test_empty_run() {
        let summary = summarize(&[], &QualityConfig::default());
        assert_eq!(summary.pass_percentage, 100.0);
        assert_eq!(summary.quality_score, 100.0);
        assert_eq!(summary.grade, Grade::Excellent);
    }

    #[test]
    fn test_weighted_score_by_category() {
        // structural weighs 3, temporal 1
        let checks = vec![
            check("a", CheckCategory::Structural, "t", 0, 0),
            check("b", CheckCategory::Temporal, "t", 5, 0),
        ];
        let score = weighted_score(&checks, &QualityConfig::default());
        assert!((score - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_tables_and_failed_list() {
        let checks = vec![
            check("duplicate_keys", CheckCategory::Structural, "covid_countries", 2, 0),
            check("mortality_outlier", CheckCategory::BusinessRule, "covid_countries", 3, 100),
            check("historical_gap", CheckCategory::Temporal, "covid_historical", 0, 100),
        ];
        let config = QualityConfig::default();
        let report = build_report(
            checks,
            &SnapshotTables::new(),
            &HistoricalAnalysis::default(),
            &BTreeMap::from([(Table::States, 4)]),
            &config,
            Utc::now(),
        );

        assert_eq!(report.tables.len(), 6);
        assert_eq!(report.failed_checks, vec!["duplicate_keys@covid_countries"]);
        assert_eq!(report.malformed_records, 4);

        let countries = report.table("covid_countries").unwrap();
        assert!(!countries.is_valid);
        assert_eq!(countries.errors.len(), 1);
        assert_eq!(countries.warnings.len(), 1);
        assert_eq!(countries.expected_count, 190);
        assert!(!countries.count_match);

        let historical = report.table("covid_historical").unwrap();
        assert!(historical.is_valid);
        assert!(historical.warnings.is_empty());
    }

    #[test]
    fn test_sparse_columns_warn_and_outliers_are_profiled() {
        let now = Utc::now();
        let mut rows: Vec<_> = [100, 110, 120, 130, 10_000]
            .iter()
            .enumerate()
            .map(|(i, cases)| {
                let s = Snapshot::new(RegionType::Country, Some(format!("C{i}")), now, now)
                    .with_counts(*cases, 1, 1)
                    .with_population(1_000_000);
                enrich_snapshot(&s, now)
            })
            .collect();
        rows[0].snapshot.tests = Some(10);
        let tables = SnapshotTables::from([(Table::Countries, rows)]);

        let report = build_report(
            Vec::new(),
            &tables,
            &HistoricalAnalysis::default(),
            &BTreeMap::new(),
            &QualityConfig::default(),
            now,
        );
        let countries = report.table("covid_countries").unwrap();

        // tests present on one row of five
        assert!(
            countries
                .warnings
                .contains(&"tests: 80.0% null (max 10.0%)".to_string())
        );
        assert!(!countries.warnings.iter().any(|w| w.starts_with("cases:")));

        // quartiles 110 and 130: bounds 80 and 160
        let cases = &countries.outliers["cases"];
        assert_eq!(cases.count, 1);
        assert_eq!(cases.percentage, 20.0);
        assert_eq!((cases.lower_bound, cases.upper_bound), (80.0, 160.0));
        assert!(!countries.outliers.contains_key("critical"));
    }

    #[test]
    fn test_accepts_against_gate() {
        let report = build_report(
            checks_with(10, 3),
            &SnapshotTables::new(),
            &HistoricalAnalysis::default(),
            &BTreeMap::new(),
            &QualityConfig::default(),
            Utc::now(),
        );
        assert_eq!(report.grade(), Grade::Fair);
        assert!(report.accepts(Grade::Fair));
        assert!(report.accepts(Grade::Poor));
        assert!(!report.accepts(Grade::Good));
    }

    #[test]
    fn test_render_text_lists_errors() {
        let report = build_report(
            vec![check("negative_counts", CheckCategory::BusinessRule, "covid_states", 1, 0)],
            &SnapshotTables::new(),
            &HistoricalAnalysis::default(),
            &BTreeMap::new(),
            &QualityConfig::default(),
            Utc::now(),
        );
        let text = report.render_text();
        assert!(text.contains("Grade: good"));
        assert!(text.contains("Table: covid_states"));
        assert!(
            text.contains("negative_counts [business_rule] on covid_states: observed 1 (max 0)")
        );
    }

    fn checks_with(total: usize, failed: usize) -> Vec<ValidationCheck> {
        (0..total)
            .map(|i| {
                let observed = if i < failed { 1 } else { 0 };
                check(&format!("check_{i}"), CheckCategory::Structural, "t", observed, 0)
            })
            .collect()
    }

    fn check(
        name: &str,
        category: CheckCategory,
        table: &str,
        observed: usize,
        threshold: usize,
    ) -> ValidationCheck {
        ValidationCheck::evaluate(name, category, table, observed, threshold, Comparison::AtMost)
    }
}
