//! Data quality and transformation engine.
//!
//! Raw snapshots are enriched with derived rates ([`metrics`]), historical
//! series get deltas, moving averages and gap flags ([`temporal`]), the
//! registry of named checks runs over the enriched batch ([`checks`],
//! [`validator`]), and the outcomes are reduced to a graded report
//! ([`aggregate`], [`grade`]). [`analyzer::QualityEngine`] runs the stages
//! in order for one pipeline run.

pub mod aggregate;
pub mod analyzer;
pub mod checks;
pub mod grade;
pub mod metrics;
pub mod temporal;
pub mod types;
pub mod utility;
pub mod validator;
