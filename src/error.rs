//! Error types for the quality engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Metric, Table};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A series handed to the temporal analyzer was not strictly ascending by date.
    #[error(
        "series ({country}, {metric}) out of order at index {index}: {current} does not follow {previous}"
    )]
    OutOfOrder {
        country: String,
        metric: Metric,
        index: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    /// A single raw record could not be turned into a canonical record.
    #[error("malformed record #{index} in {table}: {reason}")]
    MalformedRecord {
        table: Table,
        index: usize,
        reason: String,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
