//! Link functions mapping win probabilities to and from the linear scale the
//! regression operates on.

use serde::Deserialize;
use statrs::distribution::{ContinuousCDF, Normal};
use strum_macros::{Display, EnumString};

/// Transform between probability space and the regression's linear space.
/// The probit link is the default and matches how narrow blowout tails
/// behave empirically; the identity link exists for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Link {
    #[default]
    Probit,
    Logit,
    Identity,
}

impl Link {
    /// Probability to linear scale. The input must lie strictly inside
    /// (0, 1) for the probit and logit links.
    pub fn forward(&self, probability: f64) -> f64 {
        match self {
            Link::Probit => standard_normal().inverse_cdf(probability),
            Link::Logit => (probability / (1.0 - probability)).ln(),
            Link::Identity => probability,
        }
    }

    /// Linear scale back to probability.
    pub fn inverse(&self, value: f64) -> f64 {
        match self {
            Link::Probit => standard_normal().cdf(value),
            Link::Logit => 1.0 / (1.0 + (-value).exp()),
            Link::Identity => value,
        }
    }
}

fn standard_normal() -> Normal {
    // Unit normal construction cannot fail.
    Normal::new(0.0, 1.0).unwrap()
}
