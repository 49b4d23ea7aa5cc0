//! Assembly of a single analysis line: aggregation, optional cumulation,
//! endpoint cleanup, the two-stage fit and the point queries against it.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::aggregate::{
    aggregate, aggregate_occurrences, cleanup_endpoints, cumulate, AggregateError, Aggregation,
    BucketMap, Statistic,
};
use crate::data::GameCollection;
use crate::filter::GameFilter;
use crate::link::Link;
use crate::regression::{
    least_squares, refine_max_likelihood, FitError, FittedLine, Observation, RefineConfig,
};
use crate::series::SeriesMap;

/// Win rates are pinned this far inside (0, 1) before the link transform.
pub const MIN_PERCENT: f64 = 1e-10;
pub const MAX_PERCENT: f64 = 1.0 - MIN_PERCENT;

/// Hard floor on a percentile-resolved fit cutoff.
const CUTOFF_FLOOR: i32 = -18;

/// A percentile cutoff never sits above this margin when at least ten
/// buckets are available.
const CUTOFF_SAFETY_CAP: i32 = -2;

#[derive(Debug, Error)]
pub enum CurveError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("no bucket's win rate exceeds the requested percentile {percentile}")]
    PercentileNotFound { percentile: f64 },

    #[error("no games matched the requested curve")]
    EmptyAggregation,
}

/// Upper bound on the statistic values a curve retains for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Value(i32),
    /// Derived from the resolved fit cutoff.
    Auto,
    Open,
}

impl Bound {
    fn resolve(&self, fit_cutoff: i32) -> Option<i32> {
        match self {
            Bound::Value(value) => Some(*value),
            Bound::Auto => Some(fit_cutoff + 6),
            Bound::Open => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid bound; expected a number, 'auto' or 'open'")]
pub struct BoundParseError(String);

impl std::str::FromStr for Bound {
    type Err = BoundParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Bound::Auto),
            "open" => Ok(Bound::Open),
            _ => s
                .parse()
                .map(Bound::Value)
                .map_err(|_| BoundParseError(s.into())),
        }
    }
}

impl<'de> Deserialize<'de> for Bound {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i32),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Bound::Value(value)),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Which buckets feed the regression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitWindow {
    /// All buckets at or below this statistic value.
    Cutoff(i32),
    /// All buckets up to the first whose win rate exceeds this fraction.
    Percentile(f64),
    Open,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid fit window; expected a number, a percentage like '10%' or 'open'")]
pub struct FitWindowParseError(String);

impl std::str::FromStr for FitWindow {
    type Err = FitWindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || FitWindowParseError(s.into());
        if s == "open" {
            return Ok(FitWindow::Open);
        }
        if let Some(percent) = s.strip_suffix('%') {
            let percent: f64 = percent.parse().map_err(|_| malformed())?;
            if !(0.0..=100.0).contains(&percent) {
                return Err(malformed());
            }
            return Ok(FitWindow::Percentile(percent / 100.0));
        }
        s.parse().map(FitWindow::Cutoff).map_err(|_| malformed())
    }
}

impl<'de> Deserialize<'de> for FitWindow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(i32),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(FitWindow::Cutoff(value)),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Everything that shapes one curve.
#[derive(Debug, Clone)]
pub struct CurveConfig {
    pub statistic: Statistic,
    pub filter: GameFilter,
    /// Fold each bucket into the less extreme ones ("N or worse").
    pub cumulate: bool,
    pub min_value: Option<i32>,
    pub max_value: Bound,
    pub fit_window: FitWindow,
    /// Buckets with fewer wins than this are withheld from the
    /// least-squares seed.
    pub min_fit_wins: usize,
    /// Plot occurrence rates instead of win probabilities; disables the fit.
    pub occurrences: bool,
    pub link: Link,
}

impl CurveConfig {
    /// Conventional defaults per statistic: level margins cut at -1,
    /// interval minima fit to the 10% tail with an automatic display bound.
    pub fn new(statistic: Statistic) -> Self {
        let (max_value, fit_window) = match statistic {
            Statistic::MarginAt(_) => (Bound::Value(-1), FitWindow::Cutoff(-1)),
            Statistic::MinMarginFrom(_) => (Bound::Auto, FitWindow::Percentile(0.10)),
            Statistic::FinalScore | Statistic::SeriesScore => (Bound::Open, FitWindow::Open),
        };
        Self {
            statistic,
            filter: GameFilter::default(),
            cumulate: false,
            min_value: None,
            max_value,
            fit_window,
            min_fit_wins: 0,
            occurrences: false,
            link: Link::default(),
        }
    }

    pub fn with_filter(mut self, filter: GameFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn cumulated(mut self) -> Self {
        self.cumulate = true;
        self
    }
}

/// The result of snapping an inverted probability onto the empirical grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticAtProbability {
    /// Where the fitted line crosses the probability, before snapping.
    pub exact: f64,
    /// The nearer of the two surrounding integer buckets, judged by
    /// empirical win rate; ties go to the higher value.
    pub snapped: i32,
    /// Empirical win rate of the snapped bucket, if it exists.
    pub empirical: Option<f64>,
}

/// A fitted analysis line and the vectors behind it. The four parallel
/// vectors (`values`, `percents`, `occurrences`, `sigmas`) always share one
/// length and ordering.
#[derive(Debug)]
pub struct Curve {
    pub statistic: Statistic,
    pub link: Link,
    /// Sorted statistic values retained for display.
    pub values: Vec<i32>,
    /// Clamped win rates, or occurrence rates in occurrence mode.
    pub percents: Vec<f64>,
    pub occurrences: Vec<f64>,
    /// `percents` through the link transform.
    pub sigmas: Vec<f64>,
    pub buckets: BucketMap,
    pub line: Option<FittedLine>,
    pub game_count: usize,
    pub series_count: Option<usize>,
    /// Boundary values absorbed by endpoint cleanup.
    pub or_less: Option<i32>,
    pub or_more: Option<i32>,
    /// The resolved fit window, absent in occurrence mode.
    pub fit_cutoff: Option<i32>,
    /// Display bound on the statistic axis, `None` when open.
    pub max_value: Option<i32>,
}

impl Curve {
    pub fn build(
        games: &GameCollection,
        config: &CurveConfig,
        series: Option<&SeriesMap>,
    ) -> Result<Curve, CurveError> {
        let aggregation = if config.occurrences {
            aggregate_occurrences(games, config.statistic, series)?
        } else {
            aggregate(games, config.statistic, &config.filter, series)?
        };
        if aggregation.buckets.is_empty() {
            return Err(CurveError::EmptyAggregation);
        }

        let Aggregation {
            buckets,
            game_count,
            series_count,
        } = aggregation;
        let buckets = if config.cumulate {
            cumulate(&buckets)
        } else {
            buckets
        };

        // Degenerate tails drag the fit, but series ladders and occurrence
        // counts keep theirs.
        let series_mode = config.statistic.requires_series();
        let (buckets, or_less, or_more) = if series_mode || config.occurrences {
            (buckets, None, None)
        } else {
            cleanup_endpoints(&buckets)
        };

        let values: Vec<i32> = buckets.keys().copied().collect();
        let denominator = series_count.unwrap_or(game_count).max(1);
        let occurrences_vec: Vec<f64> = if series_mode {
            values
                .iter()
                .map(|value| {
                    let bucket = &buckets[value];
                    let distinct: rustc_hash::FxHashSet<&str> = bucket
                        .wins
                        .iter()
                        .chain(bucket.losses.iter())
                        .map(|id| crate::aggregate::base_game_id(id))
                        .collect();
                    distinct.len() as f64 / denominator as f64
                })
                .collect()
        } else {
            values
                .iter()
                .map(|value| buckets[value].occupancy() as f64 / denominator as f64)
                .collect()
        };
        let mut percents: Vec<f64> = if config.occurrences {
            occurrences_vec.clone()
        } else {
            values
                .iter()
                .map(|value| buckets[value].win_rate().unwrap_or(0.0))
                .collect()
        };
        for percent in &mut percents {
            *percent = percent.clamp(MIN_PERCENT, MAX_PERCENT);
        }
        let sigmas: Vec<f64> = percents
            .iter()
            .map(|&percent| config.link.forward(percent))
            .collect();

        let (line, fit_cutoff) = if config.occurrences {
            (None, None)
        } else {
            let cutoff = resolve_fit_cutoff(&config.fit_window, &values, &percents)?;
            let line = fit(&buckets, &values, &sigmas, cutoff, config)?;
            (Some(line), Some(cutoff))
        };

        let mut curve = Curve {
            statistic: config.statistic,
            link: config.link,
            values,
            percents,
            occurrences: occurrences_vec,
            sigmas,
            buckets,
            line,
            game_count,
            series_count,
            or_less,
            or_more,
            fit_cutoff,
            max_value: None,
        };

        if series_mode {
            // Only deficits matter on a series ladder; a leading standing is
            // the mirror of a trailing one.
            curve.retain_range(None, Some(0));
            curve.max_value = Some(100);
        } else {
            let max_value = match config.max_value {
                Bound::Auto => Bound::Auto.resolve(fit_cutoff.unwrap_or(0)),
                other => other.resolve(0),
            };
            let trims = !matches!(config.statistic, Statistic::FinalScore)
                && !config.occurrences
                && (config.min_value.is_some() || max_value.is_some());
            if trims {
                curve.retain_range(config.min_value, max_value);
            }
            curve.max_value = max_value;
        }

        debug!(
            "built curve for {}: {} buckets over {} games",
            config.statistic,
            curve.values.len(),
            curve.game_count
        );
        Ok(curve)
    }

    fn retain_range(&mut self, min: Option<i32>, max: Option<i32>) {
        let admits = |value: i32| {
            min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
        };
        let mut values = Vec::new();
        let mut percents = Vec::new();
        let mut occurrences = Vec::new();
        let mut sigmas = Vec::new();
        for (index, &value) in self.values.iter().enumerate() {
            if admits(value) {
                values.push(value);
                percents.push(self.percents[index]);
                occurrences.push(self.occurrences[index]);
                sigmas.push(self.sigmas[index]);
            }
        }
        self.buckets.retain(|&value, _| admits(value));
        self.values = values;
        self.percents = percents;
        self.occurrences = occurrences;
        self.sigmas = sigmas;
    }

    /// Win probability the fitted line assigns to a statistic value.
    pub fn probability_at(&self, value: f64) -> Option<f64> {
        self.line
            .map(|line| self.link.inverse(line.at(value)))
    }

    /// Inverts the fitted line at `probability` (a fraction), snapping to
    /// the surrounding integer bucket whose empirical rate is closer.
    pub fn statistic_at(&self, probability: f64) -> Option<StatisticAtProbability> {
        let line = self.line?;
        let exact = line.invert(self.link.forward(probability));
        let ceil = exact.ceil() as i32;
        let floor = exact.floor() as i32;
        let empirical = |value: i32| {
            self.buckets
                .get(&value)
                .and_then(|bucket| bucket.win_rate())
        };
        let distance = |value: i32| (empirical(value).unwrap_or(0.0) - probability).abs();
        let snapped = if distance(ceil) <= distance(floor) {
            ceil
        } else {
            floor
        };
        Some(StatisticAtProbability {
            exact,
            snapped,
            empirical: empirical(snapped),
        })
    }

    /// Occurrence rate at a statistic value, if the bucket exists.
    pub fn occurrence_at(&self, value: i32) -> Option<f64> {
        self.values
            .iter()
            .position(|&v| v == value)
            .map(|index| self.occurrences[index])
    }

    /// The most extreme statistic value any eventual winner survived.
    pub fn record_margin(&self) -> Option<(i32, f64)> {
        self.values.iter().find_map(|&value| {
            let bucket = &self.buckets[&value];
            if bucket.wins.is_empty() {
                None
            } else {
                Some((value, bucket.win_rate().unwrap_or(0.0)))
            }
        })
    }

    /// Legend line, e.g. `"Down 10 or More (12,345 Games)"`.
    pub fn legend(&self, base: &str) -> String {
        format!("{base} ({} Games)", group_thousands(self.game_count))
    }
}

fn resolve_fit_cutoff(
    window: &FitWindow,
    values: &[i32],
    percents: &[f64],
) -> Result<i32, CurveError> {
    let mut cutoff = match *window {
        FitWindow::Cutoff(cutoff) => cutoff,
        FitWindow::Open => *values.last().unwrap_or(&0),
        FitWindow::Percentile(percentile) => {
            let crossing = values
                .iter()
                .zip(percents)
                .find(|(_, &percent)| percent > percentile)
                .map(|(&value, _)| value)
                .ok_or(CurveError::PercentileNotFound { percentile })?;
            // Retain at least ten buckets where available, but never let the
            // cutoff climb past the safety cap or sink below the floor.
            let safe = values.get(10).or(values.last()).copied().unwrap_or(0);
            let safe = safe.min(CUTOFF_SAFETY_CAP);
            crossing.max(safe).max(CUTOFF_FLOOR)
        }
    };
    // A fit needs breadth: widen a window covering fewer than three buckets.
    if values.len() >= 3 && values.iter().filter(|&&value| value <= cutoff).count() < 3 {
        cutoff = values[2];
    }
    Ok(cutoff)
}

fn fit(
    buckets: &BucketMap,
    values: &[i32],
    sigmas: &[f64],
    cutoff: i32,
    config: &CurveConfig,
) -> Result<FittedLine, CurveError> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .zip(sigmas)
        .filter(|(&value, _)| {
            value <= cutoff && buckets[&value].wins.len() >= config.min_fit_wins
        })
        .map(|(&value, &sigma)| (value as f64, sigma))
        .collect();
    let seed = least_squares(&points)?;

    let mut observations = Vec::new();
    for &value in values.iter().filter(|&&value| value <= cutoff) {
        let bucket = &buckets[&value];
        observations.extend(bucket.wins.iter().map(|_| Observation {
            value: value as f64,
            won: true,
        }));
        observations.extend(bucket.losses.iter().map(|_| Observation {
            value: value as f64,
            won: false,
        }));
    }
    let outcome =
        refine_max_likelihood(seed, &observations, config.link, &RefineConfig::default());
    Ok(outcome.optimal)
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;

    use super::*;
    use crate::aggregate::OutcomeBucket;
    use crate::clock::{Checkpoint, CHECKPOINTS};
    use crate::data::fixtures::{collection, game_with_margins};
    use crate::data::{Game, MarginSnapshot};
    use crate::testing::assert_slice_f64_relative;

    const HALF: Checkpoint = Checkpoint::Minutes(24);

    /// Games whose home side sits at `margin` at halftime; `home_won`
    /// decides the final outcome.
    fn games_at_margin(prefix: &str, margin: i32, count: usize, home_won: bool) -> Vec<Game> {
        let index = HALF.index().unwrap();
        (0..count)
            .map(|ordinal| {
                let mut snapshots = vec![MarginSnapshot::level(margin); CHECKPOINTS.len()];
                snapshots[index] = MarginSnapshot::level(margin);
                let (home_points, away_points) = if home_won { (100, 90) } else { (90, 100) };
                game_with_margins(
                    &format!("{prefix}_{margin}_{ordinal}"),
                    "1996-11-01",
                    "CHI",
                    "SEA",
                    home_points,
                    away_points,
                    snapshots,
                )
            })
            .collect()
    }

    /// Deficits from -12 to -1 with win counts rising as the deficit
    /// shrinks, 20 games per margin.
    fn graded_games() -> Vec<Game> {
        let mut games = Vec::new();
        for margin in -12..=-1i32 {
            let wins = (12 + margin) as usize + 2;
            games.extend(games_at_margin("w", margin, wins, true));
            games.extend(games_at_margin("l", margin, 20 - wins, false));
        }
        games
    }

    fn margin_config() -> CurveConfig {
        CurveConfig::new(Statistic::MarginAt(HALF))
    }

    #[test]
    fn degenerate_extremes_fit_sanely() {
        // Every game at +10 won, every game at -10 lost. The slope must
        // point the right way and the midpoint must stay strictly inside
        // the clamp.
        let mut games = games_at_margin("w", 10, 8, true);
        games.extend(games_at_margin("l", 10, 0, false));
        games.extend(games_at_margin("x", -10, 8, false));
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Open,
            max_value: Bound::Open,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        let line = curve.line.unwrap();
        assert!(line.slope > 0.0);
        let midpoint = curve.probability_at(0.0).unwrap();
        assert!(midpoint > MIN_PERCENT && midpoint < MAX_PERCENT);
        // Endpoint cleanup left the boundary buckets degenerate.
        assert!(curve.buckets[curve.values.first().unwrap()].wins.is_empty());
        assert!(curve.buckets[curve.values.last().unwrap()].losses.is_empty());
    }

    #[test]
    fn inverse_consistency_within_one_bucket() {
        let games = graded_games();
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Cutoff(-1),
            max_value: Bound::Open,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        for value in [-8.0, -5.0, -3.0] {
            let probability = curve.probability_at(value).unwrap();
            let inverted = curve.statistic_at(probability).unwrap();
            assert_float_absolute_eq!(value, inverted.exact, 1.0);
        }
    }

    #[test]
    fn percentile_window_honors_safety_bounds() {
        let games = graded_games();
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Percentile(0.10),
            max_value: Bound::Open,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        let cutoff = curve.fit_cutoff.unwrap();
        // Crossing happens early, but at least ten buckets are retained and
        // the cap keeps the window in the deficit range.
        assert!(cutoff >= CUTOFF_FLOOR);
        assert!(cutoff <= CUTOFF_SAFETY_CAP);
        assert!(curve.values.iter().filter(|&&value| value <= cutoff).count() >= 3);
    }

    #[test]
    fn percentile_above_all_rates_fails() {
        let mut games = games_at_margin("l", -10, 10, false);
        games.extend(games_at_margin("w", -10, 1, true));
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Percentile(0.99),
            ..margin_config()
        };
        assert!(matches!(
            Curve::build(&games, &config, None),
            Err(CurveError::PercentileNotFound { .. })
        ));
    }

    #[test]
    fn auto_bound_tracks_fit_cutoff() {
        let games = graded_games();
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Cutoff(-4),
            max_value: Bound::Auto,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        assert_eq!(Some(-4), curve.fit_cutoff);
        assert_eq!(Some(2), curve.max_value);
        assert!(curve.values.iter().all(|&value| value <= 2));
    }

    #[test]
    fn occurrence_mode_skips_fit() {
        let games = graded_games();
        let games = collection(games.iter());
        let config = CurveConfig {
            occurrences: true,
            cumulate: true,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        assert!(curve.line.is_none());
        assert!(curve.fit_cutoff.is_none());
        // Percents mirror the occurrence rates, clamped inside (0, 1).
        let expected: Vec<f64> = curve
            .occurrences
            .iter()
            .map(|occurrence| occurrence.clamp(MIN_PERCENT, MAX_PERCENT))
            .collect();
        assert_slice_f64_relative(&expected, &curve.percents, 1e-12);
        // Cumulated occurrences are non-decreasing and end at 1.
        assert!(curve
            .occurrences
            .windows(2)
            .all(|pair| pair[0] <= pair[1]));
        assert_float_absolute_eq!(1.0, *curve.occurrences.last().unwrap(), 1e-12);
    }

    #[test]
    fn snapping_prefers_closer_empirical_bucket() {
        let mut buckets = BucketMap::new();
        // Bucket -5 sits at 30% empirical, bucket -6 at 10%.
        for (value, wins, losses) in [(-6, 1, 9), (-5, 3, 7)] {
            let bucket = buckets.entry(value).or_insert_with(OutcomeBucket::default);
            for ordinal in 0..wins {
                bucket.wins.insert(format!("w{value}_{ordinal}"));
            }
            for ordinal in 0..losses {
                bucket.losses.insert(format!("l{value}_{ordinal}"));
            }
        }
        let link = Link::Probit;
        // Chosen so the line inverts 20% to roughly -5.5.
        let slope = 0.3;
        let intercept = link.forward(0.2) + 5.5 * slope;
        let curve = Curve {
            statistic: Statistic::MarginAt(HALF),
            link,
            values: vec![-6, -5],
            percents: vec![0.1, 0.3],
            occurrences: vec![0.5, 0.5],
            sigmas: vec![link.forward(0.1), link.forward(0.3)],
            buckets,
            line: Some(FittedLine { slope, intercept }),
            game_count: 20,
            series_count: None,
            or_less: None,
            or_more: None,
            fit_cutoff: Some(-1),
            max_value: None,
        };
        // 20% is nearer to -6's 10% than to -5's 30%... equidistant, so the
        // tie goes to the higher bucket.
        let snapped = curve.statistic_at(0.2).unwrap();
        assert_float_absolute_eq!(-5.5, snapped.exact, 0.01);
        assert_eq!(-5, snapped.snapped);
        assert_float_absolute_eq!(0.3, snapped.empirical.unwrap(), 1e-12);
        // 12% is clearly nearer the -6 bucket.
        let lower = curve.statistic_at(0.12).unwrap();
        assert_eq!(-6, lower.snapped);
    }

    #[test]
    fn record_margin_finds_deepest_comeback() {
        let games = graded_games();
        let games = collection(games.iter());
        let config = CurveConfig {
            fit_window: FitWindow::Cutoff(-1),
            max_value: Bound::Open,
            ..margin_config()
        };
        let curve = Curve::build(&games, &config, None).unwrap();
        let (margin, rate) = curve.record_margin().unwrap();
        assert_eq!(-12, margin);
        assert!(rate > 0.0);
    }

    #[test]
    fn legend_groups_thousands() {
        assert_eq!("999", group_thousands(999));
        assert_eq!("1,000", group_thousands(1000));
        assert_eq!("12,345,678", group_thousands(12_345_678));
    }

    #[test]
    fn fit_window_and_bound_parsing() {
        assert_eq!(FitWindow::Cutoff(-2), "-2".parse().unwrap());
        assert_eq!(FitWindow::Percentile(0.10), "10%".parse().unwrap());
        assert_eq!(FitWindow::Open, "open".parse().unwrap());
        assert!("110%".parse::<FitWindow>().is_err());
        assert_eq!(Bound::Value(-1), "-1".parse().unwrap());
        assert_eq!(Bound::Auto, "auto".parse().unwrap());
        assert_eq!(Bound::Open, "open".parse().unwrap());
        assert!("sideways".parse::<Bound>().is_err());
    }

    #[test]
    fn min_fit_wins_screens_seed_points() {
        let games = graded_games();
        let games = collection(games.iter());
        let lax = Curve::build(
            &games,
            &CurveConfig {
                fit_window: FitWindow::Cutoff(-1),
                max_value: Bound::Open,
                ..margin_config()
            },
            None,
        )
        .unwrap();
        let strict = Curve::build(
            &games,
            &CurveConfig {
                fit_window: FitWindow::Cutoff(-1),
                max_value: Bound::Open,
                min_fit_wins: 5,
                ..margin_config()
            },
            None,
        )
        .unwrap();
        // Both fits succeed; the screened seed shifts the refined line.
        assert!(lax.line.is_some());
        assert!(strict.line.is_some());
    }
}
