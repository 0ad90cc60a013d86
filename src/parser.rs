//! JSON payload parser for the upstream disease.sh API.
//!
//! Every record is decoded on its own: a record that cannot become a
//! canonical record is rejected, counted, and skipped. Only a payload that
//! is not JSON at all (or has an unrecognized shape) fails as a whole.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::model::{HistoricalPoint, Metric, RegionType, Snapshot, Table};

/// Records decoded from one payload plus the ones that were rejected.
#[derive(Debug, Clone)]
pub struct ParsedBatch<T> {
    pub records: Vec<T>,
    pub rejected: Vec<EngineError>,
}

impl<T> Default for ParsedBatch<T> {
    fn default() -> Self {
        ParsedBatch {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> ParsedBatch<T> {
    fn reject(&mut self, table: Table, index: usize, reason: impl Into<String>) {
        let err = EngineError::MalformedRecord {
            table,
            index,
            reason: reason.into(),
        };
        warn!(error = %err, "Record rejected");
        self.rejected.push(err);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    updated: Option<i64>,
    country: Option<String>,
    continent: Option<String>,
    state: Option<String>,

    cases: Option<i64>,
    today_cases: Option<i64>,
    deaths: Option<i64>,
    today_deaths: Option<i64>,
    recovered: Option<i64>,
    today_recovered: Option<i64>,
    active: Option<i64>,
    critical: Option<i64>,
    tests: Option<i64>,
    population: Option<i64>,

    cases_per_one_million: Option<f64>,
    deaths_per_one_million: Option<f64>,
    tests_per_one_million: Option<f64>,

    #[serde(rename = "extraction_date")]
    extraction_date: Option<DateTime<Utc>>,
}

/// Upstream spellings mapped to the names the API itself uses elsewhere.
static COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("US", "USA"),
    ("United States", "USA"),
    ("United States of America", "USA"),
    ("United Kingdom", "UK"),
    ("Britain", "UK"),
    ("Great Britain", "UK"),
    ("South Korea", "S. Korea"),
    ("Korea, South", "S. Korea"),
    ("Czech Republic", "Czechia"),
    ("Macedonia", "North Macedonia"),
    ("Burma", "Myanmar"),
    ("Ivory Coast", "Côte d'Ivoire"),
];

const INVALID_NAMES: [&str; 4] = ["", "null", "undefined", "N/A"];

/// Trims a region name; placeholder values become `None`.
pub fn clean_name(name: Option<&str>) -> Option<String> {
    let trimmed = name?.trim();
    if INVALID_NAMES.iter().any(|n| n.eq_ignore_ascii_case(trimmed)) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Cleans a country name and maps known aliases to one spelling.
pub fn standardize_country(name: Option<&str>) -> Option<String> {
    let cleaned = clean_name(name)?;
    let canonical = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(&cleaned))
        .map(|(_, canonical)| canonical.to_string());
    Some(canonical.unwrap_or(cleaned))
}

/// Decodes a snapshot payload (an array of objects, or one object for the
/// global endpoint) for `region_type`.
///
/// Records without their own `extraction_date` get `extracted_at`.
///
/// # Errors
///
/// Returns an error only if `bytes` is not JSON or not an array/object.
pub fn parse_snapshots(
    bytes: &[u8],
    region_type: RegionType,
    extracted_at: DateTime<Utc>,
) -> Result<ParsedBatch<Snapshot>> {
    let table = region_type.table();
    let values = match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => bail!("{table}: expected an array or object, got {}", kind(&other)),
    };

    let mut batch = ParsedBatch::default();
    for (index, value) in values.into_iter().enumerate() {
        if !value.is_object() {
            batch.reject(table, index, format!("expected an object, got {}", kind(&value)));
            continue;
        }
        let raw: RawSnapshot = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                batch.reject(table, index, e.to_string());
                continue;
            }
        };
        match snapshot_from_raw(raw, region_type, extracted_at) {
            Ok(snapshot) => batch.records.push(snapshot),
            Err(reason) => batch.reject(table, index, reason),
        }
    }

    debug!(
        table = %table,
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "Snapshot payload parsed"
    );
    Ok(batch)
}

fn snapshot_from_raw(
    raw: RawSnapshot,
    region_type: RegionType,
    extracted_at: DateTime<Utc>,
) -> std::result::Result<Snapshot, String> {
    let updated_ms = raw.updated.ok_or("missing `updated`")?;
    let updated = DateTime::from_timestamp_millis(updated_ms)
        .ok_or_else(|| format!("`updated` out of range: {updated_ms}"))?;

    let (region_name, country, continent) = match region_type {
        RegionType::Global => (Some("World".to_string()), None, None),
        RegionType::Country => (
            standardize_country(raw.country.as_deref()),
            None,
            clean_name(raw.continent.as_deref()),
        ),
        RegionType::Continent => (clean_name(raw.continent.as_deref()), None, None),
        RegionType::State => (
            clean_name(raw.state.as_deref()),
            Some("USA".to_string()),
            None,
        ),
    };

    let mut snapshot = Snapshot::new(
        region_type,
        region_name,
        updated,
        raw.extraction_date.unwrap_or(extracted_at),
    );
    snapshot.country = country;
    snapshot.continent = continent;
    snapshot.cases = raw.cases;
    snapshot.today_cases = raw.today_cases;
    snapshot.deaths = raw.deaths;
    snapshot.today_deaths = raw.today_deaths;
    snapshot.recovered = raw.recovered;
    snapshot.today_recovered = raw.today_recovered;
    snapshot.active = raw.active;
    snapshot.critical = raw.critical;
    snapshot.tests = raw.tests;
    snapshot.population = raw.population;
    snapshot.cases_per_one_million = raw.cases_per_one_million;
    snapshot.deaths_per_one_million = raw.deaths_per_one_million;
    snapshot.tests_per_one_million = raw.tests_per_one_million;
    Ok(snapshot)
}

/// Decodes a historical payload into flat points.
///
/// Accepted shapes:
/// - `{"cases": {"1/22/20": 555, ..}, "deaths": {..}, "recovered": {..}}`
///   (global, country "Global")
/// - `{"country": "Peru", "province": null, "timeline": {..}}`
/// - an array of the previous shape
///
/// # Errors
///
/// Returns an error if `bytes` is not JSON or matches none of the shapes.
pub fn parse_historical(bytes: &[u8]) -> Result<ParsedBatch<HistoricalPoint>> {
    let mut batch = ParsedBatch::default();
    let mut index = 0;

    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(items) => {
            for item in items {
                parse_country_timeline(&item, &mut index, &mut batch);
            }
        }
        Value::Object(obj) if obj.contains_key("timeline") => {
            parse_country_timeline(&Value::Object(obj), &mut index, &mut batch);
        }
        Value::Object(obj) if Metric::ALL.iter().any(|m| obj.contains_key(m.as_str())) => {
            parse_timeline("Global", &obj, &mut index, &mut batch);
        }
        other => bail!("covid_historical: unrecognized payload ({})", kind(&other)),
    }

    debug!(
        records = batch.records.len(),
        rejected = batch.rejected.len(),
        "Historical payload parsed"
    );
    Ok(batch)
}

fn parse_country_timeline(
    item: &Value,
    index: &mut usize,
    batch: &mut ParsedBatch<HistoricalPoint>,
) {
    let country = standardize_country(item.get("country").and_then(Value::as_str));
    let timeline = item.get("timeline").and_then(Value::as_object);

    let (Some(country), Some(timeline)) = (country, timeline) else {
        batch.reject(Table::Historical, *index, "entry without `country` or `timeline`");
        *index += 1;
        return;
    };

    let name = match item.get("province").and_then(Value::as_str).map(str::trim) {
        Some(p) if !p.is_empty() && !p.eq_ignore_ascii_case("mainland") => {
            format!("{country}/{p}")
        }
        _ => country,
    };
    parse_timeline(&name, timeline, index, batch);
}

fn parse_timeline(
    country: &str,
    timeline: &Map<String, Value>,
    index: &mut usize,
    batch: &mut ParsedBatch<HistoricalPoint>,
) {
    for (key, values) in timeline {
        let Some(metric) = Metric::parse(key) else {
            batch.reject(Table::Historical, *index, format!("unknown metric `{key}`"));
            *index += 1;
            continue;
        };
        let Some(values) = values.as_object() else {
            batch.reject(Table::Historical, *index, format!("`{key}` is not a date map"));
            *index += 1;
            continue;
        };

        for (date, value) in values {
            let point = match (parse_date(date), value.as_i64()) {
                (Some(date), Some(value)) => Ok(HistoricalPoint::new(country, metric, date, value)),
                (None, _) => Err(format!("unparseable date `{date}`")),
                (_, None) => Err(format!("non-integer value {value} on {date}")),
            };
            match point {
                Ok(point) => batch.records.push(point),
                Err(reason) => batch.reject(Table::Historical, *index, reason),
            }
            *index += 1;
        }
    }
}

/// Parses upstream `m/d/yy` dates and ISO `YYYY-MM-DD` dates.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%m/%d/%y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
