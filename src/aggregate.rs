//! Aggregation of game outcomes into statistic-value buckets, with optional
//! cumulation and endpoint cleanup applied before fitting.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::clock::Checkpoint;
use crate::data::GameCollection;
use crate::filter::{GameFilter, Perspective};
use crate::series::SeriesMap;

/// Appended to a game id when its losing perspective would otherwise collide
/// with its winning perspective in the same bucket, as happens at a tied
/// series score.
pub const SECONDARY_ID_SUFFIX: &str = "~opp";

/// The underlying game id, with any secondary suffix stripped.
pub fn base_game_id(id: &str) -> &str {
    id.strip_suffix(SECONDARY_ID_SUFFIX).unwrap_or(id)
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("statistic '{statistic}' requires playoff series context")]
    SeriesRequired { statistic: Statistic },

    #[error("filter '{label}' requires playoff series context")]
    SeriesFilterRequired { label: String },

    #[error("playoff game {game_id} does not belong to any reconstructed series")]
    GameWithoutSeries { game_id: String },
}

/// The per-game quantity whose distinct values become buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    /// Signed margin at one checkpoint, from the eventual winner's
    /// perspective; the loser records the negation.
    MarginAt(Checkpoint),
    /// Worst margin each side faced anywhere between the start checkpoint
    /// and the final buzzer.
    MinMarginFrom(Checkpoint),
    /// Final points scored, winner and loser bucketed independently.
    FinalScore,
    /// Series standing after each playoff game, on the ordinal ladder.
    SeriesScore,
}

impl Statistic {
    pub fn requires_series(&self) -> bool {
        matches!(self, Statistic::SeriesScore)
    }

    /// Legend fragment naming the statistic.
    pub fn label(&self) -> String {
        match self {
            Statistic::MarginAt(checkpoint) => format!("Margin at {checkpoint}"),
            Statistic::MinMarginFrom(checkpoint) => format!("Min Margin from {checkpoint}"),
            Statistic::FinalScore => "Final Score".into(),
            Statistic::SeriesScore => "Series Score".into(),
        }
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Statistic::MarginAt(checkpoint) => write!(f, "margin_at_{checkpoint}"),
            Statistic::MinMarginFrom(checkpoint) => write!(f, "min_margin_from_{checkpoint}"),
            Statistic::FinalScore => write!(f, "final_score"),
            Statistic::SeriesScore => write!(f, "series_score"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a recognized statistic")]
pub struct StatisticParseError(String);

impl FromStr for Statistic {
    type Err = StatisticParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || StatisticParseError(s.into());
        if let Some(checkpoint) = s.strip_prefix("margin_at_") {
            return checkpoint
                .parse()
                .map(Statistic::MarginAt)
                .map_err(|_| malformed());
        }
        if let Some(checkpoint) = s.strip_prefix("min_margin_from_") {
            return checkpoint
                .parse()
                .map(Statistic::MinMarginFrom)
                .map_err(|_| malformed());
        }
        match s {
            "final_score" => Ok(Statistic::FinalScore),
            "series_score" => Ok(Statistic::SeriesScore),
            _ => Err(malformed()),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Statistic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Win and loss game-id sets observed at one statistic value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeBucket {
    pub wins: FxHashSet<String>,
    pub losses: FxHashSet<String>,
}

impl OutcomeBucket {
    /// Fraction of records in this bucket that won; `None` when empty.
    pub fn win_rate(&self) -> Option<f64> {
        let total = self.wins.len() + self.losses.len();
        if total == 0 {
            return None;
        }
        Some(self.wins.len() as f64 / total as f64)
    }

    /// Distinct records in the bucket. Cumulation may place an id in both
    /// sets; it still counts once.
    pub fn occupancy(&self) -> usize {
        self.wins.union(&self.losses).count()
    }

    fn absorb(&mut self, other: &OutcomeBucket) {
        self.wins.extend(other.wins.iter().cloned());
        self.losses.extend(other.losses.iter().cloned());
    }
}

pub type BucketMap = BTreeMap<i32, OutcomeBucket>;

/// The bucketed outcomes of one aggregation pass, with the denominators used
/// for occurrence rates.
#[derive(Debug)]
pub struct Aggregation {
    pub buckets: BucketMap,
    /// Distinct games that contributed at least one record.
    pub game_count: usize,
    /// Distinct series contributing, for series-scoped denominators.
    pub series_count: Option<usize>,
}

impl Aggregation {
    /// Denominator for occurrence rates: series in series mode, games
    /// otherwise.
    pub fn denominator(&self) -> usize {
        self.series_count.unwrap_or(self.game_count)
    }
}

/// Buckets every accepted game perspective by its statistic value. Each game
/// yields an independent winner record and loser record; the filter passes
/// judgement on the two perspectives separately.
pub fn aggregate(
    games: &GameCollection,
    statistic: Statistic,
    filter: &GameFilter,
    series: Option<&SeriesMap>,
) -> Result<Aggregation, AggregateError> {
    if statistic.requires_series() && series.is_none() {
        return Err(AggregateError::SeriesRequired { statistic });
    }
    if filter.requires_series() && series.is_none() {
        return Err(AggregateError::SeriesFilterRequired {
            label: filter.label(),
        });
    }

    let mut buckets = BucketMap::new();
    let mut game_ids = FxHashSet::default();
    let mut series_ids = FxHashSet::default();
    for game in games.iter() {
        let series_ctx = series.and_then(|map| map.series_for(&game.id));
        let (win_value, loss_value) = match statistic {
            Statistic::MarginAt(checkpoint) => {
                let index = checkpoint.index().unwrap_or(0);
                let margin = game.snapshots[index].margin;
                let winner_margin = if game.home_won() { margin } else { -margin };
                (winner_margin, -winner_margin)
            }
            Statistic::MinMarginFrom(checkpoint) => {
                let index = checkpoint.index().unwrap_or(0);
                min_margins(game, index)
            }
            Statistic::FinalScore => {
                if game.home_won() {
                    (game.home_points, game.away_points)
                } else {
                    (game.away_points, game.home_points)
                }
            }
            Statistic::SeriesScore => {
                let (series, position) =
                    series_ctx.ok_or_else(|| AggregateError::GameWithoutSeries {
                        game_id: game.id.clone(),
                    })?;
                let ordinal = series.score_after(position).ordinal();
                (ordinal, -ordinal)
            }
        };

        let series_only = series_ctx.map(|(series, _)| series);
        let winner_perspective = Perspective {
            game,
            subject_is_home: game.home_won(),
        };
        let mut recorded = false;
        if filter.matches(&winner_perspective, series_only) {
            buckets
                .entry(win_value)
                .or_default()
                .wins
                .insert(game.id.clone());
            recorded = true;
        }
        let loser_perspective = Perspective {
            game,
            subject_is_home: !game.home_won(),
        };
        if filter.matches(&loser_perspective, series_only) {
            let loss_id = if statistic.requires_series() {
                format!("{}{SECONDARY_ID_SUFFIX}", game.id)
            } else {
                game.id.clone()
            };
            buckets.entry(loss_value).or_default().losses.insert(loss_id);
            recorded = true;
        }
        if recorded {
            game_ids.insert(game.id.as_str());
            if let Some((series, _)) = series_ctx {
                series_ids.insert(series.id());
            }
        }
    }

    Ok(Aggregation {
        buckets,
        game_count: game_ids.len(),
        series_count: statistic
            .requires_series()
            .then_some(series_ids.len()),
    })
}

/// Buckets occurrence records instead of win/loss outcomes: one record per
/// game at the deeper of its two deficits for margin statistics, one per
/// side for scores and series standings. Occurrence lines answer "how often
/// does a team face this at all", so no predicate screening applies and
/// every record lands in the win set.
pub fn aggregate_occurrences(
    games: &GameCollection,
    statistic: Statistic,
    series: Option<&SeriesMap>,
) -> Result<Aggregation, AggregateError> {
    if statistic.requires_series() && series.is_none() {
        return Err(AggregateError::SeriesRequired { statistic });
    }

    let mut buckets = BucketMap::new();
    let mut game_ids = FxHashSet::default();
    let mut series_ids = FxHashSet::default();
    let mut record = |buckets: &mut BucketMap, value: i32, id: String| {
        buckets.entry(value).or_default().wins.insert(id);
    };
    for game in games.iter() {
        let series_ctx = series.and_then(|map| map.series_for(&game.id));
        match statistic {
            Statistic::MarginAt(checkpoint) => {
                let index = checkpoint.index().unwrap_or(0);
                let margin = game.snapshots[index].margin;
                record(&mut buckets, -margin.abs(), game.id.clone());
            }
            Statistic::MinMarginFrom(checkpoint) => {
                let index = checkpoint.index().unwrap_or(0);
                let (winner_low, loser_low) = min_margins(game, index);
                record(&mut buckets, winner_low.min(loser_low), game.id.clone());
            }
            Statistic::FinalScore => {
                let (win_score, loss_score) = if game.home_won() {
                    (game.home_points, game.away_points)
                } else {
                    (game.away_points, game.home_points)
                };
                record(&mut buckets, win_score, game.id.clone());
                record(
                    &mut buckets,
                    loss_score,
                    format!("{}{SECONDARY_ID_SUFFIX}", game.id),
                );
            }
            Statistic::SeriesScore => {
                let (series, position) =
                    series_ctx.ok_or_else(|| AggregateError::GameWithoutSeries {
                        game_id: game.id.clone(),
                    })?;
                let ordinal = series.score_after(position).ordinal();
                record(&mut buckets, ordinal, game.id.clone());
                record(&mut buckets, -ordinal, game.id.clone());
                // Near-tied standings also count toward the tied bucket.
                if ordinal != 0 && (-3..=3).contains(&ordinal) {
                    record(&mut buckets, 0, game.id.clone());
                }
            }
        }
        game_ids.insert(game.id.as_str());
        if let Some((series, _)) = series_ctx {
            series_ids.insert(series.id());
        }
    }

    Ok(Aggregation {
        buckets,
        game_count: game_ids.len(),
        series_count: statistic
            .requires_series()
            .then_some(series_ids.len()),
    })
}

/// Worst margins over the window `[start_index, end]` for the winner and the
/// loser. The opening checkpoint contributes its level margin only, since
/// its recorded extremes predate the window.
fn min_margins(game: &crate::data::Game, start_index: usize) -> (i32, i32) {
    let mut home_low = i32::MAX;
    let mut home_high = i32::MIN;
    for (offset, snapshot) in game.snapshots[start_index..].iter().enumerate() {
        let (low, high) = if offset == 0 {
            (snapshot.margin, snapshot.margin)
        } else {
            (snapshot.min_margin, snapshot.max_margin)
        };
        home_low = home_low.min(low);
        home_high = home_high.max(high);
    }
    // The away perspective negates, so its worst deficit is the negated
    // home-side high-water mark.
    if game.home_won() {
        (home_low, -home_high)
    } else {
        (-home_high, home_low)
    }
}

/// Folds each bucket into every bucket above it, turning exact-value buckets
/// into "this value or worse" buckets. Ascending statistic order; lower
/// values are the more extreme deficits.
pub fn cumulate(buckets: &BucketMap) -> BucketMap {
    let mut cumulated = BucketMap::new();
    let mut running = OutcomeBucket::default();
    for (&value, bucket) in buckets {
        running.absorb(bucket);
        cumulated.insert(value, running.clone());
    }
    cumulated
}

/// Collapses the degenerate tails: every all-loss bucket below the boundary
/// all-loss bucket merges into it, and mirrored for all-win buckets at the
/// top. Afterwards the lowest retained bucket has zero wins and the highest
/// zero losses. Returns the map along with the "or less" and "or more"
/// boundary values, reported whenever a degenerate boundary bucket exists,
/// whether or not anything merged into it.
pub fn cleanup_endpoints(buckets: &BucketMap) -> (BucketMap, Option<i32>, Option<i32>) {
    let mut cleaned = buckets.clone();

    let mut or_less = None;
    let low_tail: Vec<i32> = cleaned
        .iter()
        .take_while(|(_, bucket)| bucket.wins.is_empty())
        .map(|(&value, _)| value)
        .collect();
    if let Some((&boundary, rest)) = low_tail.split_last() {
        or_less = Some(boundary);
        if !rest.is_empty() {
            let mut absorbed = OutcomeBucket::default();
            for value in rest {
                absorbed.absorb(&cleaned.remove(value).unwrap_or_default());
            }
            cleaned.entry(boundary).or_default().absorb(&absorbed);
        }
    }

    let mut or_more = None;
    let high_tail: Vec<i32> = cleaned
        .iter()
        .rev()
        .take_while(|(_, bucket)| bucket.losses.is_empty())
        .map(|(&value, _)| value)
        .collect();
    if let Some((&boundary, rest)) = high_tail.split_last() {
        or_more = Some(boundary);
        if !rest.is_empty() {
            let mut absorbed = OutcomeBucket::default();
            for value in rest {
                absorbed.absorb(&cleaned.remove(value).unwrap_or_default());
            }
            cleaned.entry(boundary).or_default().absorb(&absorbed);
        }
    }

    (cleaned, or_less, or_more)
}
