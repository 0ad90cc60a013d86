//! Per-snapshot derived metrics.
//!
//! Enrichment is a pure function of the snapshot and the evaluation
//! instant: no I/O, no errors. A ratio that cannot be computed is `None`,
//! never zero.

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::analyzers::utility::ratio;
use crate::model::{EnrichedSnapshot, Snapshot};

const PER_MILLION: f64 = 1_000_000.0;

/// Derives rates, per-million figures and freshness for one snapshot.
///
/// Rates and per-million figures are computed independently of each other.
/// The authoritative per-million value is the locally computed one; the
/// source-provided figure is used only when the local inputs are missing
/// (null count or null population). A zero population is bad input and
/// leaves the figure undefined.
pub fn enrich_snapshot(snapshot: &Snapshot, now: DateTime<Utc>) -> EnrichedSnapshot {
    let cases_per_million_computed = per_million(snapshot.cases, snapshot.population);
    let deaths_per_million_computed = per_million(snapshot.deaths, snapshot.population);

    let inputs_missing = snapshot.population.is_none();
    let cases_per_million = authoritative(
        cases_per_million_computed,
        snapshot.cases_per_one_million,
        inputs_missing || snapshot.cases.is_none(),
    );
    let deaths_per_million = authoritative(
        deaths_per_million_computed,
        snapshot.deaths_per_one_million,
        inputs_missing || snapshot.deaths.is_none(),
    );

    let freshness = now - snapshot.updated;

    EnrichedSnapshot {
        snapshot: snapshot.clone(),
        mortality_rate: ratio(snapshot.deaths, snapshot.cases),
        recovery_rate: ratio(snapshot.recovered, snapshot.cases),
        active_rate: ratio(snapshot.active, snapshot.cases),
        cases_per_million,
        deaths_per_million,
        cases_per_million_computed,
        deaths_per_million_computed,
        data_freshness_hours: freshness.num_milliseconds() as f64 / 3_600_000.0,
        processed_at: now,
    }
}

/// Enriches every snapshot of a batch in parallel. Output order matches input order.
pub fn enrich_batch(snapshots: &[Snapshot], now: DateTime<Utc>) -> Vec<EnrichedSnapshot> {
    snapshots
        .par_iter()
        .map(|s| enrich_snapshot(s, now))
        .collect()
}

fn per_million(count: Option<i64>, population: Option<i64>) -> Option<f64> {
    ratio(count, population).map(|r| r * PER_MILLION)
}

fn authoritative(computed: Option<f64>, source: Option<f64>, inputs_missing: bool) -> Option<f64> {
    match computed {
        Some(v) => Some(v),
        None if inputs_missing => source,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegionType;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_zero_cases_leaves_rates_undefined() {
        let snap = snapshot(RegionType::Country).with_counts(0, 0, 0).with_active(0);
        let enriched = enrich_snapshot(&snap, now());

        assert_eq!(enriched.mortality_rate, None);
        assert_eq!(enriched.recovery_rate, None);
        assert_eq!(enriched.active_rate, None);
    }

    #[test]
    fn test_rates_for_every_region_type() {
        for region_type in RegionType::ALL {
            let snap = snapshot(region_type)
                .with_counts(3000, 45, 2500)
                .with_active(455);
            let enriched = enrich_snapshot(&snap, now());

            let mortality = enriched.mortality_rate.unwrap();
            assert!((mortality - 45.0 / 3000.0).abs() < 1e-9);
            assert!((enriched.recovery_rate.unwrap() - 2500.0 / 3000.0).abs() < 1e-9);
            assert!((enriched.active_rate.unwrap() - 455.0 / 3000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_per_million_computed_locally() {
        let snap = snapshot(RegionType::Country)
            .with_counts(500, 10, 400)
            .with_population(2_000_000);
        let enriched = enrich_snapshot(&snap, now());

        assert_eq!(enriched.cases_per_million, Some(250.0));
        assert_eq!(enriched.deaths_per_million, Some(5.0));
        assert_eq!(enriched.cases_per_million_computed, Some(250.0));
    }

    #[test]
    fn test_local_figure_wins_over_source() {
        let mut snap = snapshot(RegionType::Country)
            .with_counts(500, 10, 400)
            .with_population(2_000_000);
        snap.cases_per_one_million = Some(999.0);
        let enriched = enrich_snapshot(&snap, now());

        assert_eq!(enriched.cases_per_million, Some(250.0));
    }

    #[test]
    fn test_source_per_million_used_when_population_missing() {
        let mut snap = snapshot(RegionType::Continent).with_counts(500, 10, 400);
        snap.cases_per_one_million = Some(123.0);
        snap.deaths_per_one_million = Some(4.5);
        let enriched = enrich_snapshot(&snap, now());

        assert_eq!(enriched.cases_per_million_computed, None);
        assert_eq!(enriched.cases_per_million, Some(123.0));
        assert_eq!(enriched.deaths_per_million, Some(4.5));
    }

    #[test]
    fn test_zero_population_stays_undefined() {
        let mut snap = snapshot(RegionType::Country)
            .with_counts(1000, 250, 0)
            .with_population(0);
        snap.cases_per_one_million = Some(10.0);
        let enriched = enrich_snapshot(&snap, now());

        assert_eq!(enriched.cases_per_million, None);
        assert_eq!(enriched.deaths_per_million, None);
        assert!((enriched.mortality_rate.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_freshness_hours() {
        let mut snap = snapshot(RegionType::Global);
        snap.updated = now() - Duration::minutes(90);
        let enriched = enrich_snapshot(&snap, now());

        assert!((enriched.data_freshness_hours - 1.5).abs() < 1e-9);
        assert_eq!(enriched.processed_at, now());
    }

    #[test]
    fn test_enrichment_is_idempotent() {
        let snap = snapshot(RegionType::State)
            .with_counts(1200, 30, 900)
            .with_active(270)
            .with_population(800_000);

        assert_eq!(enrich_snapshot(&snap, now()), enrich_snapshot(&snap, now()));
    }

    #[test]
    fn test_enrich_batch_preserves_order() {
        let snaps: Vec<_> = (1..=50)
            .map(|i| {
                let mut s = snapshot(RegionType::Country).with_counts(i * 100, i, 0);
                s.region_name = Some(format!("C{i}"));
                s
            })
            .collect();
        let enriched = enrich_batch(&snaps, now());

        assert_eq!(enriched.len(), 50);
        for (src, out) in snaps.iter().zip(&enriched) {
            assert_eq!(&out.snapshot, src);
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
    }

    fn snapshot(region_type: RegionType) -> Snapshot {
        Snapshot::new(region_type, Some("Somewhere".into()), now(), now())
    }
}
