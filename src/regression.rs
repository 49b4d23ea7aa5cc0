//! Two-stage line fitting: an ordinary least-squares seed over bucket
//! estimates, then a derivative-free maximum-likelihood refinement over the
//! raw game outcomes.

use anyhow::bail;
use linregress::fit_low_level_regression_model;
use thiserror::Error;
use tracing::debug;

use crate::link::Link;

/// Probabilities are clamped this far from 0 and 1 before taking logs.
const LIKELIHOOD_CLAMP: f64 = 1e-16;

const MIN_FIT_POINTS: usize = 2;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("need at least {needed} points to fit a line, got {available}")]
    InsufficientPoints { needed: usize, available: usize },

    #[error("least-squares seed failed: {0}")]
    Seed(#[from] linregress::Error),
}

/// A straight line on the link scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLine {
    pub slope: f64,
    pub intercept: f64,
}

impl FittedLine {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// The x at which the line attains `y`.
    pub fn invert(&self, y: f64) -> f64 {
        (y - self.intercept) / self.slope
    }
}

/// Ordinary least-squares fit of `y` on `x` with an intercept term.
pub fn least_squares(points: &[(f64, f64)]) -> Result<FittedLine, FitError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(FitError::InsufficientPoints {
            needed: MIN_FIT_POINTS,
            available: points.len(),
        });
    }
    // Two points determine the line exactly, and leave no residual degree of
    // freedom for the model-fitting statistics.
    if points.len() == MIN_FIT_POINTS {
        let (x0, y0) = points[0];
        let (x1, y1) = points[1];
        let slope = (y1 - y0) / (x1 - x0);
        return Ok(FittedLine {
            slope,
            intercept: y0 - slope * x0,
        });
    }
    // Row-major layout: response first, then the intercept and slope columns.
    let mut data = Vec::with_capacity(points.len() * 3);
    for &(x, y) in points {
        data.extend_from_slice(&[y, 1.0, x]);
    }
    let model = fit_low_level_regression_model(&data, points.len(), 3)?;
    let parameters = model.parameters();
    Ok(FittedLine {
        intercept: parameters[0],
        slope: parameters[1],
    })
}

/// A raw per-game observation: the statistic value from the subject's
/// perspective and whether the subject went on to win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub value: f64,
    pub won: bool,
}

/// Negative log-likelihood of the observations under a line on the link
/// scale. Predicted probabilities are clamped away from 0 and 1 so a single
/// contradicting game cannot produce an infinite residual.
pub fn neg_log_likelihood(line: &FittedLine, observations: &[Observation], link: Link) -> f64 {
    let mut residual = 0.0;
    for observation in observations {
        let win_probability = link
            .inverse(line.at(observation.value))
            .clamp(LIKELIHOOD_CLAMP, 1.0 - LIKELIHOOD_CLAMP);
        let probability = if observation.won {
            win_probability
        } else {
            1.0 - win_probability
        };
        residual -= probability.ln();
    }
    residual
}

#[derive(Clone, Debug)]
pub struct RefineConfig {
    pub max_steps: u64,
    /// Grid points per dimension in each shrinking pass.
    pub resolution: usize,
    /// Half-width of the initial slope search interval around the seed.
    pub slope_span: f64,
    /// Half-width of the initial intercept search interval around the seed.
    pub intercept_span: f64,
    pub acceptable_residual: f64,
}

impl RefineConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_steps == 0 {
            bail!("at least one step must be specified")
        }
        const MIN_RESOLUTION: usize = 3;
        if self.resolution < MIN_RESOLUTION {
            bail!("search resolution must be at least {MIN_RESOLUTION}")
        }
        if self.slope_span <= 0.0 || self.intercept_span <= 0.0 {
            bail!("search spans must be positive")
        }
        if self.acceptable_residual < 0.0 {
            bail!("acceptable residual must be non-negative")
        }
        Ok(())
    }
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            max_steps: 32,
            resolution: 7,
            slope_span: 0.2,
            intercept_span: 1.0,
            acceptable_residual: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct RefineOutcome {
    pub steps: u64,
    pub optimal: FittedLine,
    pub optimal_residual: f64,
}

/// Derivative-free maximum-likelihood refinement of a seeded line. Evaluates
/// a slope-intercept grid around the seed and repeatedly shrinks it around
/// the running optimum.
pub fn refine_max_likelihood(
    seed: FittedLine,
    observations: &[Observation],
    link: Link,
    config: &RefineConfig,
) -> RefineOutcome {
    config.validate().unwrap();

    let mut optimal = seed;
    let mut optimal_residual = neg_log_likelihood(&seed, observations, link);

    let mut slope_bounds = (seed.slope - config.slope_span, seed.slope + config.slope_span);
    let mut intercept_bounds = (
        seed.intercept - config.intercept_span,
        seed.intercept + config.intercept_span,
    );
    let inv_resolution = 1.0 / (config.resolution - 1) as f64;

    let mut steps = 0;
    'outer: while steps < config.max_steps {
        steps += 1;

        for slope_ordinal in 0..config.resolution {
            let slope = slope_bounds.0
                + slope_ordinal as f64 * (slope_bounds.1 - slope_bounds.0) * inv_resolution;
            for intercept_ordinal in 0..config.resolution {
                let intercept = intercept_bounds.0
                    + intercept_ordinal as f64
                        * (intercept_bounds.1 - intercept_bounds.0)
                        * inv_resolution;
                let candidate = FittedLine { slope, intercept };
                let residual = neg_log_likelihood(&candidate, observations, link);
                if residual < optimal_residual {
                    optimal_residual = residual;
                    optimal = candidate;
                    if residual <= config.acceptable_residual {
                        break 'outer;
                    }
                }
            }
        }

        let slope_range = (slope_bounds.1 - slope_bounds.0) / config.resolution as f64;
        slope_bounds = (
            optimal.slope - slope_range / 2.0,
            optimal.slope + slope_range / 2.0,
        );
        let intercept_range = (intercept_bounds.1 - intercept_bounds.0) / config.resolution as f64;
        intercept_bounds = (
            optimal.intercept - intercept_range / 2.0,
            optimal.intercept + intercept_range / 2.0,
        );
    }

    debug!(
        "refined {seed:?} to {optimal:?} in {steps} steps, residual {optimal_residual:.6}"
    );
    RefineOutcome {
        steps,
        optimal,
        optimal_residual,
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;

    #[test]
    fn least_squares_exact_line() {
        let points: Vec<(f64, f64)> = (-5..=5).map(|x| (x as f64, 2.0 * x as f64 + 1.0)).collect();
        let line = least_squares(&points).unwrap();
        assert_float_absolute_eq!(2.0, line.slope, 1e-12);
        assert_float_absolute_eq!(1.0, line.intercept, 1e-12);
        assert_float_absolute_eq!(7.0, line.at(3.0), 1e-12);
        assert_float_absolute_eq!(3.0, line.invert(7.0), 1e-12);
    }

    #[test]
    fn least_squares_noisy_line() {
        let points = [
            (-4.0, -6.9),
            (-3.0, -5.1),
            (-2.0, -3.0),
            (-1.0, -0.9),
            (0.0, 1.1),
        ];
        let line = least_squares(&points).unwrap();
        assert_float_absolute_eq!(2.0, line.slope, 0.1);
        assert_float_absolute_eq!(1.0, line.intercept, 0.2);
    }

    #[test]
    fn least_squares_two_points_exact() {
        let line = least_squares(&[(-10.0, -1.2), (10.0, 1.2)]).unwrap();
        assert_float_absolute_eq!(0.12, line.slope, 1e-12);
        assert_float_absolute_eq!(0.0, line.intercept, 1e-12);
    }

    #[test]
    fn least_squares_needs_two_points() {
        assert!(matches!(
            least_squares(&[(1.0, 1.0)]),
            Err(FitError::InsufficientPoints {
                needed: 2,
                available: 1
            })
        ));
    }

    fn synthetic_observations(truth: &FittedLine) -> Vec<Observation> {
        // Deterministic pseudo-sample: at each deficit, mark a share of the
        // games won proportional to the true probability.
        let mut observations = Vec::new();
        for value in -20..0 {
            let value = value as f64;
            let probability = Link::Probit.inverse(truth.at(value));
            let games = 40;
            let wins = (probability * games as f64).round() as usize;
            for game in 0..games {
                observations.push(Observation {
                    value,
                    won: game < wins,
                });
            }
        }
        observations
    }

    #[test]
    fn refine_improves_on_perturbed_seed() {
        let truth = FittedLine {
            slope: 0.15,
            intercept: 0.4,
        };
        let observations = synthetic_observations(&truth);
        let seed = FittedLine {
            slope: 0.1,
            intercept: 0.0,
        };
        let seed_residual = neg_log_likelihood(&seed, &observations, Link::Probit);
        let outcome =
            refine_max_likelihood(seed, &observations, Link::Probit, &RefineConfig::default());
        assert!(outcome.optimal_residual < seed_residual);
        assert_float_absolute_eq!(truth.slope, outcome.optimal.slope, 0.02);
        assert_float_absolute_eq!(truth.intercept, outcome.optimal.intercept, 0.15);
    }

    #[test]
    fn likelihood_clamps_contradictions() {
        // A sure loss predicted as a sure win must cost a lot, not infinity.
        let line = FittedLine {
            slope: 0.0,
            intercept: 50.0,
        };
        let observations = [Observation {
            value: 0.0,
            won: false,
        }];
        let residual = neg_log_likelihood(&line, &observations, Link::Probit);
        assert!(residual.is_finite());
        assert!(residual > 30.0);
    }

    #[test]
    #[should_panic(expected = "search resolution must be at least 3")]
    fn refine_config_validation() {
        let config = RefineConfig {
            resolution: 2,
            ..Default::default()
        };
        refine_max_likelihood(
            FittedLine {
                slope: 1.0,
                intercept: 0.0,
            },
            &[],
            Link::Probit,
            &config,
        );
    }
}
