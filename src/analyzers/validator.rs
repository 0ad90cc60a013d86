//! Batch-level consistency validation over enriched records.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::analyzers::checks::{CheckContext, CheckDefinition, CheckTarget, REGISTRY};
use crate::analyzers::temporal::HistoricalAnalysis;
use crate::config::QualityConfig;
use crate::model::{EnrichedSnapshot, Table, ValidationCheck};

/// Enriched snapshots partitioned by warehouse table.
pub type SnapshotTables = BTreeMap<Table, Vec<EnrichedSnapshot>>;

const SNAPSHOT_TABLES: [Table; 4] = [
    Table::Global,
    Table::Countries,
    Table::Continents,
    Table::States,
];

/// Evaluates a registry of checks against one run.
#[derive(Debug, Clone)]
pub struct ConsistencyValidator {
    config: QualityConfig,
    checks: Vec<CheckDefinition>,
}

impl ConsistencyValidator {
    /// Validator over the built-in registry, minus checks disabled in `config`.
    pub fn new(config: &QualityConfig) -> Self {
        Self::with_registry(config, REGISTRY.to_vec())
    }

    pub fn with_registry(config: &QualityConfig, checks: Vec<CheckDefinition>) -> Self {
        let checks = checks
            .into_iter()
            .filter(|c| config.is_enabled(c.name))
            .collect();
        ConsistencyValidator {
            config: config.clone(),
            checks,
        }
    }

    pub fn checks(&self) -> &[CheckDefinition] {
        &self.checks
    }

    /// Runs every registered check. A table missing from `snapshots` is
    /// evaluated as an empty partition, so the run always completes.
    pub fn validate(
        &self,
        snapshots: &SnapshotTables,
        historical: &HistoricalAnalysis,
        rejected: &BTreeMap<Table, usize>,
    ) -> Vec<ValidationCheck> {
        let empty: Vec<EnrichedSnapshot> = Vec::new();
        let partition = |table: Table| snapshots.get(&table).unwrap_or(&empty).as_slice();
        let rejected_for = |table: Table| rejected.get(&table).copied().unwrap_or(0);

        let mut results = Vec::new();

        for check in &self.checks {
            match check.target {
                CheckTarget::Snapshots => {
                    for table in SNAPSHOT_TABLES {
                        let ctx = CheckContext {
                            table,
                            snapshots: partition(table),
                            historical,
                            rejected: rejected_for(table),
                            config: &self.config,
                        };
                        results.push(self.evaluate(check, &ctx, table.as_str()));
                    }
                }
                CheckTarget::Historical => {
                    let ctx = CheckContext {
                        table: Table::Historical,
                        snapshots: &[],
                        historical,
                        rejected: rejected_for(Table::Historical),
                        config: &self.config,
                    };
                    results.push(self.evaluate(check, &ctx, Table::Historical.as_str()));
                }
                CheckTarget::CrossTable => {
                    let ctx = CheckContext {
                        table: Table::Countries,
                        snapshots: partition(Table::Countries),
                        historical,
                        rejected: 0,
                        config: &self.config,
                    };
                    results.push(self.evaluate(check, &ctx, &cross_table_name()));
                }
            }
        }

        results
    }

    fn evaluate(
        &self,
        check: &CheckDefinition,
        ctx: &CheckContext<'_>,
        table_name: &str,
    ) -> ValidationCheck {
        let observed = (check.observe)(ctx);
        let threshold = (check.threshold)(ctx);
        let result = ValidationCheck::evaluate(
            check.name,
            check.category,
            table_name,
            observed,
            threshold,
            check.comparison,
        );

        if result.passed() {
            debug!(check = check.name, table = table_name, observed, threshold, "Check passed");
        } else {
            warn!(check = check.name, table = table_name, observed, threshold, "Check failed");
        }

        result
    }
}

/// Name under which cross-table checks are reported.
pub fn cross_table_name() -> String {
    format!("{}/{}", Table::Countries, Table::Historical)
}
