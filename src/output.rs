//! Warehouse-shaped CSV files and the JSON quality report.
//!
//! One CSV per table per run, named `covid_<table>_processed_<ts>.csv`,
//! plus `quality_report_<ts>.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::analyzer::RunOutput;
use crate::analyzers::temporal::HistoricalAnalysis;
use crate::analyzers::types::QualityReport;
use crate::model::{EnrichedHistoricalPoint, EnrichedSnapshot, Metric, RegionType, Table};

/// One row of a region table (`covid_global`, `covid_countries`, ...).
#[derive(Debug, Serialize)]
pub struct SnapshotRow<'a> {
    pub region_type: RegionType,
    pub region_name: Option<&'a str>,
    pub country: Option<&'a str>,
    pub continent: Option<&'a str>,
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
    pub cases_per_one_million: Option<f64>,
    pub deaths_per_one_million: Option<f64>,
    pub tests_per_one_million: Option<f64>,
    pub cases_per_million_computed: Option<f64>,
    pub deaths_per_million_computed: Option<f64>,
    pub mortality_rate: Option<f64>,
    pub recovery_rate: Option<f64>,
    pub active_rate: Option<f64>,
    pub data_freshness_hours: f64,
    pub updated: DateTime<Utc>,
    pub extraction_date: DateTime<Utc>,
    pub data_source: &'a str,
    pub data_type: &'static str,
    pub processed_at: DateTime<Utc>,
}

impl<'a> SnapshotRow<'a> {
    pub fn from_enriched(row: &'a EnrichedSnapshot) -> Self {
        let s = &row.snapshot;
        SnapshotRow {
            region_type: s.region_type,
            region_name: s.region_name.as_deref(),
            country: s.country.as_deref(),
            continent: s.continent.as_deref(),
            cases: s.cases,
            today_cases: s.today_cases,
            deaths: s.deaths,
            today_deaths: s.today_deaths,
            recovered: s.recovered,
            today_recovered: s.today_recovered,
            active: s.active,
            critical: s.critical,
            tests: s.tests,
            population: s.population,
            // warehouse per-million columns carry the authoritative values
            cases_per_one_million: row.cases_per_million,
            deaths_per_one_million: row.deaths_per_million,
            tests_per_one_million: s.tests_per_one_million,
            cases_per_million_computed: row.cases_per_million_computed,
            deaths_per_million_computed: row.deaths_per_million_computed,
            mortality_rate: row.mortality_rate,
            recovery_rate: row.recovery_rate,
            active_rate: row.active_rate,
            data_freshness_hours: row.data_freshness_hours,
            updated: s.updated,
            extraction_date: s.extraction_date,
            data_source: &s.data_source,
            data_type: data_type(s.region_type.table()),
            processed_at: row.processed_at,
        }
    }
}

/// One row of `covid_historical`.
#[derive(Debug, Serialize)]
pub struct HistoricalRow<'a> {
    pub country: &'a str,
    pub date: NaiveDate,
    pub metric: Metric,
    pub value: i64,
    pub year: i32,
    pub month: u32,
    pub day_of_week: u32,
    pub week_of_year: u32,
    pub daily_change: Option<i64>,
    pub daily_change_pct: Option<f64>,
    pub value_7day_avg: Option<f64>,
    pub daily_change_7day_avg: Option<f64>,
    pub days_since_previous: Option<i64>,
    pub is_anomaly: bool,
    pub growth_rate_1day: Option<f64>,
    pub growth_rate_7day: Option<f64>,
    pub growth_rate_14day: Option<f64>,
    pub doubling_time_days: Option<f64>,
    pub data_type: &'static str,
    pub processed_at: DateTime<Utc>,
}

impl<'a> HistoricalRow<'a> {
    pub fn from_enriched(p: &'a EnrichedHistoricalPoint, processed_at: DateTime<Utc>) -> Self {
        HistoricalRow {
            country: &p.country,
            date: p.date,
            metric: p.metric,
            value: p.value,
            year: p.year,
            month: p.month,
            day_of_week: p.day_of_week,
            week_of_year: p.week_of_year,
            daily_change: p.daily_change,
            daily_change_pct: p.daily_change_pct,
            value_7day_avg: p.value_7day_avg,
            daily_change_7day_avg: p.daily_change_7day_avg,
            days_since_previous: p.days_since_previous,
            is_anomaly: p.is_anomaly,
            growth_rate_1day: p.growth_rate_1day,
            growth_rate_7day: p.growth_rate_7day,
            growth_rate_14day: p.growth_rate_14day,
            doubling_time_days: p.doubling_time_days,
            data_type: data_type(Table::Historical),
            processed_at,
        }
    }
}

/// Short table tag written in the `data_type` column.
pub fn data_type(table: Table) -> &'static str {
    match table {
        Table::Global => "global",
        Table::Countries => "countries",
        Table::Continents => "continents",
        Table::States => "states",
        Table::Historical => "historical",
    }
}

pub fn processed_file_name(table: Table, ts: DateTime<Utc>) -> String {
    format!("{}_processed_{}.csv", table.as_str(), ts.format("%Y%m%d_%H%M%S"))
}

pub fn report_file_name(ts: DateTime<Utc>) -> String {
    format!("quality_report_{}.json", ts.format("%Y%m%d_%H%M%S"))
}

/// Writes `rows` to a new CSV file at `path`, replacing any previous file.
///
/// Returns the number of data rows written.
pub fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

pub fn write_snapshots_csv(path: &Path, rows: &[EnrichedSnapshot]) -> Result<usize> {
    write_csv(path, rows.iter().map(SnapshotRow::from_enriched))
}

pub fn write_historical_csv(
    path: &Path,
    historical: &HistoricalAnalysis,
    processed_at: DateTime<Utc>,
) -> Result<usize> {
    write_csv(
        path,
        historical
            .points()
            .map(|p| HistoricalRow::from_enriched(p, processed_at)),
    )
}

/// Writes the report as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &QualityReport) -> Result<()> {
    let body = serde_json::to_vec_pretty(report)?;
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Writes every table of a run plus its report into `output_dir`.
///
/// Tables without rows are skipped. Returns the written paths, report last.
pub fn write_run(output_dir: &Path, output: &RunOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let ts = output.report.generated_at;
    let mut written = Vec::new();

    for (table, rows) in &output.snapshots {
        if rows.is_empty() {
            continue;
        }
        let path = output_dir.join(processed_file_name(*table, ts));
        write_snapshots_csv(&path, rows)?;
        written.push(path);
    }

    if output.historical.record_count() > 0 {
        let path = output_dir.join(processed_file_name(Table::Historical, ts));
        write_historical_csv(&path, &output.historical, ts)?;
        written.push(path);
    }

    let report_path = output_dir.join(report_file_name(ts));
    write_report_json(&report_path, &output.report)?;
    written.push(report_path);

    info!(dir = %output_dir.display(), files = written.len(), "Run outputs written");
    Ok(written)
}
