//! Report types handed to the loader and to alerting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::analyzers::utility::{pct, quantile};
use crate::model::{Grade, ValidationCheck};

/// Pass/fail totals, weighted score and grade for a set of checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub total_checks: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_percentage: f64,
    /// Category-weighted share of passing checks, 0–100.
    pub quality_score: f64,
    pub grade: Grade,
}

/// Values of one numeric column outside `Q1 - 1.5·IQR ..= Q3 + 1.5·IQR`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierStats {
    pub count: usize,
    /// Share of all rows, nulls included, 0–100.
    pub percentage: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl OutlierStats {
    /// Profiles the non-null `values` of a column out of `rows` rows.
    /// `None` when the column has no values.
    pub fn from_values(mut values: Vec<f64>, rows: usize) -> Option<Self> {
        values.sort_by(f64::total_cmp);
        let q1 = quantile(&values, 0.25)?;
        let q3 = quantile(&values, 0.75)?;
        let iqr = q3 - q1;
        let lower_bound = q1 - 1.5 * iqr;
        let upper_bound = q3 + 1.5 * iqr;

        let count = values
            .iter()
            .filter(|v| **v < lower_bound || **v > upper_bound)
            .count();
        Some(OutlierStats {
            count,
            percentage: pct(count, rows),
            lower_bound,
            upper_bound,
        })
    }
}

/// Quality outcome for one warehouse table (or table pair).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableQualityReport {
    pub table_name: String,
    pub validation_timestamp: DateTime<Utc>,
    pub record_count: usize,
    pub expected_count: usize,
    pub count_match: bool,
    pub is_valid: bool,
    pub quality_score: f64,
    pub pass_percentage: f64,
    pub grade: Grade,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub null_percentages: BTreeMap<String, f64>,
    pub duplicate_percentage: f64,
    pub outliers: BTreeMap<String, OutlierStats>,
}

/// Complete quality report for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub summary: QualitySummary,
    pub tables: Vec<TableQualityReport>,
    pub checks: Vec<ValidationCheck>,
    /// `check_name@table_name` for every failed check.
    pub failed_checks: Vec<String>,
    pub malformed_records: usize,
}

impl QualityReport {
    pub fn grade(&self) -> Grade {
        self.summary.grade
    }

    /// Whether a loader requiring at least `minimum` should accept this run.
    pub fn accepts(&self, minimum: Grade) -> bool {
        self.summary.grade >= minimum
    }

    pub fn table(&self, table_name: &str) -> Option<&TableQualityReport> {
        self.tables.iter().find(|t| t.table_name == table_name)
    }

    /// Plain-text rendering for logs and terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;

        let _ = writeln!(out, "COVID-19 Data Quality Report");
        let _ = writeln!(out, "{}", "=".repeat(40));
        let _ = writeln!(out, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(
            out,
            "Checks: {} total, {} passed, {} failed ({:.1}%)",
            s.total_checks, s.passed, s.failed, s.pass_percentage
        );
        let _ = writeln!(out, "Quality score: {:.1}/100", s.quality_score);
        let _ = writeln!(out, "Grade: {}", s.grade);
        let _ = writeln!(out, "Malformed records: {}", self.malformed_records);

        for table in &self.tables {
            let _ = writeln!(out);
            let _ = writeln!(out, "Table: {}", table.table_name);
            let _ = writeln!(out, "{}", "-".repeat(20));
            let _ = writeln!(
                out,
                "Records: {} (expected at least {})",
                table.record_count, table.expected_count
            );
            let _ = writeln!(out, "Valid: {}", if table.is_valid { "yes" } else { "no" });
            let _ = writeln!(
                out,
                "Quality score: {:.1}/100 ({})",
                table.quality_score, table.grade
            );
            if !table.errors.is_empty() {
                let _ = writeln!(out, "Errors:");
                for e in &table.errors {
                    let _ = writeln!(out, "  - {e}");
                }
            }
            if !table.warnings.is_empty() {
                let _ = writeln!(out, "Warnings:");
                for w in &table.warnings {
                    let _ = writeln!(out, "  - {w}");
                }
            }
        }

        out
    }
}
