//! Calibrated win-probability curves for basketball point deficits. Aggregates
//! historical game outcomes into margin buckets, fits a probit-linked line via
//! least squares seeding and maximum-likelihood refinement, and assembles the
//! fitted curves into chart documents with shared axis scaling.

pub mod aggregate;
pub mod chart;
pub mod clock;
pub mod curve;
pub mod data;
pub mod filter;
pub mod link;
pub mod regression;
pub mod series;

#[cfg(test)]
pub(crate) mod testing;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
