//! Time-series continuity and trend analysis for historical series.
//!
//! A series is the date-ordered run of points sharing (country, metric).
//! Analysis is metric-agnostic; only the anomaly floor is looked up per metric.
//!
//! Moving averages use a trailing window over the last seven *present*
//! points, not the last seven calendar days. On a gapped series the window
//! therefore spans more than a week. Missing days are never interpolated.
//! Growth rates are positional in the same way: the 7-day rate compares a
//! point with the one seven points back.

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::analyzers::utility::mean;
use crate::config::QualityConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{EnrichedHistoricalPoint, HistoricalPoint, Metric};

const WINDOW: usize = 7;

/// Result of analyzing one (country, metric) series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesAnalysis {
    pub country: String,
    pub metric: Metric,
    pub points: Vec<EnrichedHistoricalPoint>,
    /// Consecutive pairs more than one day apart.
    pub gap_count: usize,
    pub largest_gap_days: i64,
    pub observed_days: usize,
    pub expected_days: usize,
    pub completeness_ratio: f64,
    pub incomplete: bool,
    pub anomaly_count: usize,
}

impl SeriesAnalysis {
    pub fn latest(&self) -> Option<&EnrichedHistoricalPoint> {
        self.points.last()
    }
}

/// All series of one historical batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoricalAnalysis {
    pub series: Vec<SeriesAnalysis>,
    /// Points dropped because their (country, metric, date) was repeated.
    pub duplicate_points: usize,
}

impl HistoricalAnalysis {
    pub fn points(&self) -> impl Iterator<Item = &EnrichedHistoricalPoint> {
        self.series.iter().flat_map(|s| s.points.iter())
    }

    pub fn record_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    pub fn total_gaps(&self) -> usize {
        self.series.iter().map(|s| s.gap_count).sum()
    }

    pub fn incomplete_series(&self) -> usize {
        self.series.iter().filter(|s| s.incomplete).count()
    }

    pub fn anomalies(&self) -> usize {
        self.series.iter().map(|s| s.anomaly_count).sum()
    }

    /// Series for `country` (case-insensitive) and `metric`.
    pub fn find(&self, country: &str, metric: Metric) -> Option<&SeriesAnalysis> {
        self.series
            .iter()
            .find(|s| s.metric == metric && s.country.eq_ignore_ascii_case(country))
    }
}

/// Computes deltas, moving averages, gaps and anomaly flags.
#[derive(Debug, Clone)]
pub struct TemporalAnalyzer {
    max_series_gaps: usize,
    min_series_completeness: f64,
    anomaly_floors: BTreeMap<Metric, i64>,
}

impl TemporalAnalyzer {
    pub fn new(config: &QualityConfig) -> Self {
        TemporalAnalyzer {
            max_series_gaps: config.max_series_gaps,
            min_series_completeness: config.min_series_completeness,
            anomaly_floors: Metric::ALL
                .into_iter()
                .filter_map(|m| config.anomaly_floor(m).map(|floor| (m, floor)))
                .collect(),
        }
    }

    /// Analyzes one series whose points all belong to (`country`, `metric`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfOrder`] if dates are not strictly
    /// ascending. Sorting is the caller's job.
    pub fn analyze_series(
        &self,
        country: &str,
        metric: Metric,
        points: &[HistoricalPoint],
    ) -> EngineResult<SeriesAnalysis> {
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(EngineError::OutOfOrder {
                    country: country.to_string(),
                    metric,
                    index: index + 1,
                    previous: pair[0].date,
                    current: pair[1].date,
                });
            }
        }

        let floor = self.anomaly_floors.get(&metric).copied();
        let mut enriched: Vec<EnrichedHistoricalPoint> = Vec::with_capacity(points.len());
        let mut gap_count = 0;
        let mut largest_gap_days = 0;
        let mut anomaly_count = 0;

        for (i, point) in points.iter().enumerate() {
            let previous = i.checked_sub(1).map(|p| &points[p]);

            let days_since_previous = previous.map(|p| (point.date - p.date).num_days());
            if let Some(days) = days_since_previous {
                if days > 1 {
                    gap_count += 1;
                    largest_gap_days = largest_gap_days.max(days);
                }
            }

            // an unrepresentable change is undefined
            let daily_change = previous.and_then(|p| point.value.checked_sub(p.value));
            let growth_rate_1day = growth_rate(points, i, 1);

            let is_anomaly = matches!((daily_change, floor), (Some(c), Some(f)) if c < f);
            if is_anomaly {
                anomaly_count += 1;
            }

            let start = (i + 1).saturating_sub(WINDOW);
            let (value_7day_avg, daily_change_7day_avg) = if i == 0 {
                (None, None)
            } else {
                let values: Vec<f64> = points[start..=i].iter().map(|p| p.value as f64).collect();
                let changes: Vec<f64> = enriched[start..i]
                    .iter()
                    .filter_map(|p| p.daily_change)
                    .chain(daily_change)
                    .map(|c| c as f64)
                    .collect();
                (mean(&values), mean(&changes))
            };

            enriched.push(EnrichedHistoricalPoint {
                country: country.to_string(),
                metric,
                date: point.date,
                value: point.value,
                year: point.date.year(),
                month: point.date.month(),
                day_of_week: point.date.weekday().num_days_from_monday(),
                week_of_year: point.date.iso_week().week(),
                daily_change,
                daily_change_pct: growth_rate_1day,
                value_7day_avg,
                daily_change_7day_avg,
                growth_rate_1day,
                growth_rate_7day: growth_rate(points, i, 7),
                growth_rate_14day: growth_rate(points, i, 14),
                doubling_time_days: doubling_time(growth_rate_1day),
                days_since_previous,
                is_anomaly,
            });
        }

        let observed_days = points.len();
        let expected_days = match (points.first(), points.last()) {
            (Some(first), Some(last)) => span_days(first.date, last.date),
            _ => 0,
        };
        let completeness_ratio = if expected_days == 0 {
            1.0
        } else {
            observed_days as f64 / expected_days as f64
        };
        let incomplete =
            gap_count > self.max_series_gaps || completeness_ratio < self.min_series_completeness;

        if incomplete {
            debug!(
                country,
                %metric,
                gap_count,
                completeness_ratio,
                "Series flagged incomplete"
            );
        }

        Ok(SeriesAnalysis {
            country: country.to_string(),
            metric,
            points: enriched,
            gap_count,
            largest_gap_days,
            observed_days,
            expected_days,
            completeness_ratio,
            incomplete,
            anomaly_count,
        })
    }

    /// Groups raw points into series, orders them, drops repeated dates
    /// (last one wins) and analyzes every series in parallel.
    pub fn analyze_all(&self, points: Vec<HistoricalPoint>) -> EngineResult<HistoricalAnalysis> {
        let mut groups: BTreeMap<(String, Metric), Vec<HistoricalPoint>> = BTreeMap::new();
        for point in points {
            groups
                .entry((point.country.clone(), point.metric))
                .or_default()
                .push(point);
        }

        let mut duplicate_points = 0;
        let series: Vec<((String, Metric), Vec<HistoricalPoint>)> = groups
            .into_iter()
            .map(|(key, mut group)| {
                group.sort_by_key(|p| p.date);
                let (deduped, dropped) = keep_last_per_date(group);
                duplicate_points += dropped;
                (key, deduped)
            })
            .collect();

        if duplicate_points > 0 {
            warn!(duplicate_points, "Repeated historical dates dropped");
        }

        let series = series
            .par_iter()
            .map(|((country, metric), group)| self.analyze_series(country, *metric, group))
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(HistoricalAnalysis {
            series,
            duplicate_points,
        })
    }
}

/// Relative change of point `i` against the point `lag` positions back.
/// Undefined without such a point or when its value is zero.
fn growth_rate(points: &[HistoricalPoint], i: usize, lag: usize) -> Option<f64> {
    let base = points.get(i.checked_sub(lag)?)?.value;
    (base != 0).then(|| (points[i].value as f64 - base as f64) / base as f64)
}

fn doubling_time(growth: Option<f64>) -> Option<f64> {
    growth
        .filter(|g| *g > 0.0)
        .map(|g| std::f64::consts::LN_2 / g.ln_1p())
}

fn span_days(first: NaiveDate, last: NaiveDate) -> usize {
    ((last - first).num_days() + 1).max(0) as usize
}

fn keep_last_per_date(sorted: Vec<HistoricalPoint>) -> (Vec<HistoricalPoint>, usize) {
    let mut out: Vec<HistoricalPoint> = Vec::with_capacity(sorted.len());
    let mut dropped = 0;
    for point in sorted {
        match out.last_mut() {
            Some(last) if last.date == point.date => {
                *last = point;
                dropped += 1;
            }
            _ => out.push(point),
        }
    }
    (out, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_change_and_first_point() {
        let points = series(&[(0, 100), (1, 130), (2, 125)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();

        let p = &analysis.points;
        assert_eq!(p[0].daily_change, None);
        assert_eq!(p[0].daily_change_pct, None);
        assert_eq!(p[0].value_7day_avg, None);
        assert_eq!(p[0].daily_change_7day_avg, None);
        assert_eq!(p[1].daily_change, Some(30));
        assert_eq!(p[2].daily_change, Some(-5));
        assert!((p[1].daily_change_pct.unwrap() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_unrepresentable_change_is_undefined() {
        let points = series(&[(0, -5), (1, i64::MAX), (2, i64::MAX)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();

        let p = &analysis.points;
        assert_eq!(p[1].daily_change, None);
        assert!(!p[1].is_anomaly);
        assert_eq!(p[2].daily_change, Some(0));
        assert_eq!(p[2].daily_change_7day_avg, Some(0.0));
        assert!(p[1].growth_rate_1day.unwrap() < 0.0);
    }

    #[test]
    fn test_growth_rates_and_doubling_time() {
        let values: Vec<(i64, i64)> = (0..15).map(|d| (d, 100 + d * 10)).collect();
        let analysis = analyzer()
            .analyze_series("Peru", Metric::Cases, &series(&values))
            .unwrap();
        let p = &analysis.points;

        assert_eq!(p[0].growth_rate_1day, None);
        assert_eq!(p[6].growth_rate_7day, None);
        assert_eq!(p[13].growth_rate_14day, None);

        // 110 after 100
        assert!((p[1].growth_rate_1day.unwrap() - 0.10).abs() < 1e-9);
        assert!((p[1].doubling_time_days.unwrap() - 2f64.ln() / 1.1f64.ln()).abs() < 1e-9);
        // 170 after 100, 240 after 100
        assert!((p[7].growth_rate_7day.unwrap() - 0.70).abs() < 1e-9);
        assert!((p[14].growth_rate_14day.unwrap() - 1.40).abs() < 1e-9);
    }

    #[test]
    fn test_growth_undefined_on_zero_base_and_no_growth() {
        let points = series(&[(0, 0), (1, 50), (2, 50), (3, 40)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Deaths, &points).unwrap();
        let p = &analysis.points;

        assert_eq!(p[1].growth_rate_1day, None);
        assert_eq!(p[1].doubling_time_days, None);
        assert_eq!(p[2].growth_rate_1day, Some(0.0));
        assert_eq!(p[2].doubling_time_days, None);
        assert!(p[3].growth_rate_1day.unwrap() < 0.0);
        assert_eq!(p[3].doubling_time_days, None);
    }

    #[test]
    fn test_value_avg_at_seventh_point_is_mean_of_first_seven() {
        let values = [10, 20, 35, 50, 70, 95, 120, 150];
        let points = series(
            &values
                .iter()
                .enumerate()
                .map(|(i, v)| (i as i64, *v))
                .collect::<Vec<_>>(),
        );
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();

        let expected = values[..7].iter().sum::<i64>() as f64 / 7.0;
        assert!((analysis.points[6].value_7day_avg.unwrap() - expected).abs() < 1e-9);

        // window slides: eighth point averages points 2..=8
        let expected = values[1..8].iter().sum::<i64>() as f64 / 7.0;
        assert!((analysis.points[7].value_7day_avg.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_partial_window_uses_available_points() {
        let points = series(&[(0, 10), (1, 20), (2, 60)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Deaths, &points).unwrap();

        assert_eq!(analysis.points[1].value_7day_avg, Some(15.0));
        assert_eq!(analysis.points[2].value_7day_avg, Some(30.0));
        // changes 10 and 40
        assert_eq!(analysis.points[1].daily_change_7day_avg, Some(10.0));
        assert_eq!(analysis.points[2].daily_change_7day_avg, Some(25.0));
    }

    #[test]
    fn test_single_gap_detected() {
        let points = series(&[(0, 10), (1, 20), (3, 40)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();

        assert_eq!(analysis.gap_count, 1);
        assert_eq!(analysis.largest_gap_days, 2);
        assert_eq!(analysis.points[2].days_since_previous, Some(2));
        // change spans the gap, no interpolation
        assert_eq!(analysis.points[2].daily_change, Some(20));
        assert_eq!(analysis.expected_days, 4);
        assert_eq!(analysis.observed_days, 3);
    }

    #[test]
    fn test_contiguous_series_is_complete() {
        let points = series(&(0..30).map(|d| (d, d * 10)).collect::<Vec<_>>());
        let analysis = analyzer().analyze_series("Peru", Metric::Recovered, &points).unwrap();

        assert_eq!(analysis.gap_count, 0);
        assert_eq!(analysis.completeness_ratio, 1.0);
        assert!(!analysis.incomplete);
    }

    #[test]
    fn test_low_completeness_flags_incomplete() {
        // 10 points over 20 days
        let points = series(&(0..10).map(|d| (d * 2, d)).collect::<Vec<_>>());
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();

        assert_eq!(analysis.gap_count, 9);
        assert!(analysis.completeness_ratio < 0.9);
        assert!(analysis.incomplete);
    }

    #[test]
    fn test_gap_count_above_threshold_flags_incomplete() {
        let mut config = QualityConfig::default();
        config.min_series_completeness = 0.0;
        config.max_series_gaps = 2;
        let analyzer = TemporalAnalyzer::new(&config);

        let points = series(&[(0, 1), (2, 2), (4, 3), (6, 4)]);
        let analysis = analyzer.analyze_series("Peru", Metric::Cases, &points).unwrap();
        assert_eq!(analysis.gap_count, 3);
        assert!(analysis.incomplete);
    }

    #[test]
    fn test_anomaly_floor_only_applies_to_configured_metric() {
        let points = series(&[(0, 50_000), (1, 30_000)]);

        let cases = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();
        assert!(cases.points[1].is_anomaly);
        assert_eq!(cases.anomaly_count, 1);

        let deaths = analyzer().analyze_series("Peru", Metric::Deaths, &points).unwrap();
        assert!(!deaths.points[1].is_anomaly);
        assert_eq!(deaths.anomaly_count, 0);
    }

    #[test]
    fn test_configured_floor_applies_to_other_metric() {
        let mut config = QualityConfig::default();
        config.anomaly_floors.insert(Metric::Deaths, -10);
        let analyzer = TemporalAnalyzer::new(&config);

        let points = series(&[(0, 100), (1, 80)]);
        let deaths = analyzer.analyze_series("Peru", Metric::Deaths, &points).unwrap();
        assert!(deaths.points[1].is_anomaly);
        let cases = analyzer.analyze_series("Peru", Metric::Cases, &points).unwrap();
        assert!(!cases.points[1].is_anomaly);
    }

    #[test]
    fn test_small_correction_is_not_anomaly() {
        let points = series(&[(0, 50_000), (1, 45_000)]);
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();
        assert!(!analysis.points[1].is_anomaly);
    }

    #[test]
    fn test_unsorted_series_is_contract_violation() {
        let points = series(&[(0, 1), (2, 2), (1, 3)]);
        let err = analyzer()
            .analyze_series("Chile", Metric::Deaths, &points)
            .unwrap_err();

        match err {
            EngineError::OutOfOrder {
                country,
                metric,
                index,
                ..
            } => {
                assert_eq!(country, "Chile");
                assert_eq!(metric, Metric::Deaths);
                assert_eq!(index, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_date_is_contract_violation() {
        let points = series(&[(0, 1), (0, 2)]);
        assert!(analyzer().analyze_series("Chile", Metric::Cases, &points).is_err());
    }

    #[test]
    fn test_empty_series() {
        let analysis = analyzer().analyze_series("Chile", Metric::Cases, &[]).unwrap();
        assert!(analysis.points.is_empty());
        assert_eq!(analysis.gap_count, 0);
        assert!(!analysis.incomplete);
    }

    #[test]
    fn test_calendar_decomposition() {
        // 2021-03-01 was a Monday in ISO week 9
        let points = vec![HistoricalPoint::new(
            "Peru",
            Metric::Cases,
            NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            5,
        )];
        let analysis = analyzer().analyze_series("Peru", Metric::Cases, &points).unwrap();
        let p = &analysis.points[0];
        assert_eq!((p.year, p.month, p.day_of_week, p.week_of_year), (2021, 3, 0, 9));
    }

    #[test]
    fn test_analyze_all_groups_sorts_and_dedups() {
        let mut points = Vec::new();
        for metric in Metric::ALL {
            for (offset, value) in [(2, 30), (0, 10), (1, 20)] {
                points.push(HistoricalPoint::new("Peru", metric, day(offset), value));
            }
        }
        points.push(HistoricalPoint::new("Chile", Metric::Cases, day(0), 7));
        points.push(HistoricalPoint::new("Chile", Metric::Cases, day(0), 9));

        let analysis = analyzer().analyze_all(points).unwrap();

        assert_eq!(analysis.series.len(), 4);
        assert_eq!(analysis.duplicate_points, 1);
        assert_eq!(analysis.record_count(), 10);

        let chile = analysis.find("chile", Metric::Cases).unwrap();
        assert_eq!(chile.points.len(), 1);
        assert_eq!(chile.points[0].value, 9);

        let peru = analysis.find("Peru", Metric::Deaths).unwrap();
        let values: Vec<i64> = peru.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10, 20, 30]);
        assert_eq!(peru.latest().unwrap().value, 30);
    }

    #[test]
    fn test_analysis_totals() {
        let mut points = series(&[(0, 1), (1, 2), (3, 3)]);
        points.extend(
            series(&[(0, 1), (5, 2)])
                .into_iter()
                .map(|mut p| {
                    p.country = "Chile".into();
                    p
                }),
        );
        let analysis = analyzer().analyze_all(points).unwrap();

        assert_eq!(analysis.total_gaps(), 2);
        assert_eq!(analysis.incomplete_series(), 2);
        assert_eq!(analysis.points().count(), 5);
    }

    fn analyzer() -> TemporalAnalyzer {
        TemporalAnalyzer::new(&QualityConfig::default())
    }

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn series(values: &[(i64, i64)]) -> Vec<HistoricalPoint> {
        values
            .iter()
            .map(|(offset, value)| {
                HistoricalPoint::new("Peru", Metric::Cases, day(*offset), *value)
            })
            .collect()
    }
}
