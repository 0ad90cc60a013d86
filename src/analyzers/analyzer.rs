use crate::analyzers::aggregate::build_report;
use crate::analyzers::metrics::enrich_batch;
use crate::analyzers::temporal::{HistoricalAnalysis, TemporalAnalyzer};
use crate::analyzers::types::QualityReport;
use crate::analyzers::validator::{ConsistencyValidator, SnapshotTables};
use crate::config::QualityConfig;
use crate::error::EngineResult;
use crate::model::{HistoricalPoint, Snapshot, Table};
use crate::parser::ParsedBatch;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::info;

/// Raw records of one pipeline run, already deserialized.
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub snapshots: Vec<Snapshot>,
    pub historical: Vec<HistoricalPoint>,
    /// Records rejected by the parser, per table.
    pub rejected: BTreeMap<Table, usize>,
}

impl RunInput {
    pub fn add_snapshots(&mut self, table: Table, batch: ParsedBatch<Snapshot>) {
        *self.rejected.entry(table).or_default() += batch.rejected.len();
        self.snapshots.extend(batch.records);
    }

    pub fn add_historical(&mut self, batch: ParsedBatch<HistoricalPoint>) {
        *self.rejected.entry(Table::Historical).or_default() += batch.rejected.len();
        self.historical.extend(batch.records);
    }
}

/// Enriched records plus the quality report of one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub snapshots: SnapshotTables,
    pub historical: HistoricalAnalysis,
    pub report: QualityReport,
}

/// Enrichment, temporal analysis, validation and scoring for one run.
#[derive(Debug, Clone)]
pub struct QualityEngine {
    config: QualityConfig,
    temporal: TemporalAnalyzer,
    validator: ConsistencyValidator,
}

impl QualityEngine {
    pub fn new(config: QualityConfig) -> Self {
        QualityEngine {
            temporal: TemporalAnalyzer::new(&config),
            validator: ConsistencyValidator::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Runs the whole engine over one batch, evaluated at `now`.
    ///
    /// Snapshot enrichment and historical analysis run side by side; the
    /// validator waits for both.
    ///
    /// # Errors
    ///
    /// Only a contract violation inside the temporal analyzer escalates.
    /// Bad data never does; it shows up in the report.
    #[tracing::instrument(
        skip_all,
        fields(snapshots = input.snapshots.len(), historical = input.historical.len())
    )]
    pub fn run(&self, input: RunInput, now: DateTime<Utc>) -> EngineResult<RunOutput> {
        let RunInput {
            snapshots,
            historical,
            rejected,
        } = input;

        let (enriched, historical) = rayon::join(
            || enrich_batch(&snapshots, now),
            || self.temporal.analyze_all(historical),
        );
        let historical = historical?;

        let mut tables = SnapshotTables::new();
        for snapshot in enriched {
            tables
                .entry(snapshot.snapshot.region_type.table())
                .or_default()
                .push(snapshot);
        }

        info!(
            tables = tables.len(),
            series = historical.series.len(),
            gaps = historical.total_gaps(),
            "Enrichment complete"
        );

        let checks = self.validator.validate(&tables, &historical, &rejected);
        let report = build_report(checks, &tables, &historical, &rejected, &self.config, now);

        info!(
            total_checks = report.summary.total_checks,
            failed = report.summary.failed,
            pass_percentage = report.summary.pass_percentage,
            grade = %report.summary.grade,
            "Quality report ready"
        );

        Ok(RunOutput {
            snapshots: tables,
            historical,
            report,
        })
    }
}
