//! Assembly of fitted curves into chart documents: shared axis scaling,
//! normally-spaced probability ticks and per-bucket game samples.

use std::fs::File;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tinyrand::Rand;
use tracing::debug;

use crate::aggregate::{base_game_id, Statistic};
use crate::clock::{Checkpoint, CHECKPOINTS};
use crate::curve::{Bound, Curve, CurveConfig, CurveError, FitWindow};
use crate::data::{Game, GameCollection};

/// Probability-scale tick ladder, from one-in-a-hundred-thousand up to five
/// nines. Trimmed per chart to the span the data actually covers.
pub const PROBABILITY_TICKS: &[(f64, &str)] = &[
    (1.0 / 100_000.0, "1/100000"),
    (1.0 / 10_000.0, "1/10000"),
    (1.0 / 1_000.0, "1/1000"),
    (1.0 / 500.0, "1/500"),
    (1.0 / 200.0, "1/200"),
    (0.01, "1%"),
    (0.025, "2.5%"),
    (0.05, "5%"),
    (0.10, "10%"),
    (0.20, "20%"),
    (0.30, "30%"),
    (0.40, "40%"),
    (0.50, "50%"),
    (0.60, "60%"),
    (0.70, "70%"),
    (0.80, "80%"),
    (0.90, "90%"),
    (0.95, "95%"),
    (0.975, "97.5%"),
    (0.99, "99.0%"),
    (0.995, "99.5%"),
    (0.998, "99.8%"),
    (0.999, "99.9%"),
    (0.9999, "99.99%"),
    (0.99999, "99.999%"),
    (0.999999, "99.9999%"),
    (0.9999999, "99.99999%"),
];

/// Evenly spaced ladder for linear-probability charts.
pub const LINEAR_TICKS: &[(f64, &str)] = &[
    (0.001, "0%"),
    (0.10, "10%"),
    (0.20, "20%"),
    (0.30, "30%"),
    (0.40, "40%"),
    (0.50, "50%"),
    (0.60, "60%"),
    (0.70, "70%"),
    (0.80, "80%"),
    (0.90, "90%"),
    (0.999, "100%"),
];

/// Percents at or past the clamp are treated as "never"/"always" when
/// choosing the tick span.
const TICK_EPSILON: f64 = 1e-9;

const MAX_GAME_SAMPLES: usize = 10;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("unable to write chart document: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to encode chart document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Vertical axis flavor: normally spaced probabilities or a linear scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    #[default]
    Probability,
    Linear,
}

impl AxisScale {
    fn ladder(&self) -> &'static [(f64, &'static str)] {
        match self {
            AxisScale::Probability => PROBABILITY_TICKS,
            AxisScale::Linear => LINEAR_TICKS,
        }
    }
}

/// One fitted curve plus the context needed to render it.
pub struct ChartLine<'a> {
    pub curve: Curve,
    pub legend: String,
    pub games: &'a GameCollection<'a>,
}

#[derive(Debug, Serialize)]
pub struct GameSample {
    pub game_id: String,
    pub game_date: chrono::NaiveDate,
    pub game_summary: String,
}

#[derive(Debug, Serialize)]
pub struct PointDocument {
    pub x_value: i32,
    pub y_value: f64,
    pub sigma: f64,
    pub percent: f64,
    pub point_margin_occurs_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_count: Option<usize>,
    pub win_plus_loss_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_games: Option<Vec<GameSample>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_games: Option<Vec<GameSample>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_games: Option<Vec<GameSample>>,
}

#[derive(Debug, Serialize)]
pub struct LineDocument {
    pub legend: String,
    pub m: Option<f64>,
    pub b: Option<f64>,
    pub number_of_games: usize,
    pub or_less_point_margin: Option<i32>,
    pub or_more_point_margin: Option<i32>,
    pub x_values: Vec<i32>,
    pub y_values: Vec<PointDocument>,
}

#[derive(Debug, Serialize)]
pub struct ChartDocument {
    pub plot_type: &'static str,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub y_ticks: Vec<f64>,
    pub y_tick_labels: Vec<String>,
    pub min_x: i32,
    pub max_x: i32,
    pub cumulate: bool,
    pub calculate_occurrences: bool,
    pub lines: Vec<LineDocument>,
}

impl ChartDocument {
    pub fn write(&self, path: &Path) -> Result<(), ChartError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Merges fitted curves into one chart: a shared x range, a tick span
/// trimmed to the observed probabilities, and per-point game samples.
pub fn assemble(
    title: String,
    lines: Vec<ChartLine>,
    scale: AxisScale,
    cumulate: bool,
    occurrences: bool,
    rand: &mut impl Rand,
) -> ChartDocument {
    let link = lines
        .first()
        .map(|line| line.curve.link)
        .unwrap_or_default();
    let bound_x = lines
        .iter()
        .filter_map(|line| line.curve.max_value)
        .min()
        .unwrap_or(i32::MAX);

    let span = TickSpan::measure(&lines, bound_x);
    let (tick_values, tick_labels) = span.select(scale.ladder());
    let (min_tick, max_tick) = (tick_values[0], *tick_values.last().unwrap());

    let line_documents = lines
        .iter()
        .map(|line| render_line(line, min_tick, max_tick, occurrences, rand))
        .collect();
    debug!("assembled chart '{title}' with {} lines", lines.len());
    ChartDocument {
        plot_type: "point_margin_v_win_percent",
        title,
        x_label: "Point Margin".into(),
        y_label: if occurrences {
            "Occurrence %".into()
        } else {
            "Win %".into()
        },
        y_ticks: tick_values.iter().map(|&tick| link.forward(tick)).collect(),
        y_tick_labels: tick_labels,
        min_x: span.min_x,
        max_x: span.max_x,
        cumulate,
        calculate_occurrences: occurrences,
        lines: line_documents,
    }
}

struct TickSpan {
    min_x: i32,
    max_x: i32,
    min_y: f64,
    max_y: f64,
    /// The y extremes ignoring clamped endpoint values.
    next_min_y: f64,
    next_max_y: f64,
}

impl TickSpan {
    fn measure(lines: &[ChartLine], bound_x: i32) -> TickSpan {
        let mut span = TickSpan {
            min_x: i32::MAX,
            max_x: i32::MIN,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
            next_min_y: f64::INFINITY,
            next_max_y: f64::NEG_INFINITY,
        };
        for line in lines {
            let curve = &line.curve;
            if let (Some(&first), Some(&last)) = (curve.values.first(), curve.values.last()) {
                span.min_x = span.min_x.min(first);
                span.max_x = span.max_x.max(last.min(bound_x));
            }
            for &percent in &curve.percents {
                span.min_y = span.min_y.min(percent);
                span.max_y = span.max_y.max(percent);
                if percent > TICK_EPSILON {
                    span.next_min_y = span.next_min_y.min(percent);
                }
                if percent < 1.0 - TICK_EPSILON {
                    span.next_max_y = span.next_max_y.max(percent);
                }
            }
            if let Some(fitted) = curve.line {
                for &value in &curve.values {
                    let probability = curve.link.inverse(fitted.at(value as f64));
                    span.min_y = span.min_y.min(probability);
                    span.max_y = span.max_y.max(probability);
                    span.next_min_y = span.next_min_y.min(probability);
                    span.next_max_y = span.next_max_y.max(probability);
                }
            }
        }
        span
    }

    /// Ladder entries spanning `[next_min_y, next_max_y]`, widened by one
    /// tick on each side. Spans the data escaped entirely get the "Never"
    /// and "100%" sentinels.
    fn select(&self, ladder: &'static [(f64, &'static str)]) -> (Vec<f64>, Vec<String>) {
        // With no unclamped percents the interior span is empty; fall back
        // to the whole ladder rather than indexing out of order.
        let (lo, hi) = if self.next_min_y > self.next_max_y {
            (0, ladder.len() - 1)
        } else {
            let first_in = ladder.partition_point(|&(value, _)| value < self.next_min_y);
            let last_in = ladder
                .partition_point(|&(value, _)| value <= self.next_max_y)
                .saturating_sub(1);
            (
                first_in.saturating_sub(1),
                (last_in + 1).min(ladder.len() - 1),
            )
        };
        let mut values = Vec::with_capacity(hi - lo + 1);
        let mut labels = Vec::with_capacity(hi - lo + 1);
        for &(value, label) in &ladder[lo..=hi] {
            values.push(value);
            labels.push(label.to_string());
        }
        if self.min_y < self.next_min_y {
            labels[0] = "Never".into();
        }
        if self.max_y > self.next_max_y {
            *labels.last_mut().unwrap() = "100%".into();
        }
        (values, labels)
    }
}

fn render_line(
    line: &ChartLine,
    min_tick: f64,
    max_tick: f64,
    occurrences: bool,
    rand: &mut impl Rand,
) -> LineDocument {
    let curve = &line.curve;
    let mut points = Vec::with_capacity(curve.values.len());
    for (index, &value) in curve.values.iter().enumerate() {
        let bucket = &curve.buckets[&value];
        // The plotted ordinate is the link-transformed percent, pinned to
        // the visible tick span.
        let sigma = curve
            .link
            .forward(curve.percents[index].clamp(min_tick, max_tick));
        let (win_games, loss_games, occurred_games) = if occurrences {
            (None, None, Some(sample_games(&bucket.wins, line.games, rand)))
        } else {
            (
                Some(sample_games(&bucket.wins, line.games, rand)),
                Some(sample_games(&bucket.losses, line.games, rand)),
                None,
            )
        };
        points.push(PointDocument {
            x_value: value,
            y_value: sigma,
            sigma,
            percent: curve.percents[index],
            point_margin_occurs_percent: curve.occurrences[index],
            win_count: (!occurrences).then_some(bucket.wins.len()),
            loss_count: (!occurrences).then_some(bucket.losses.len()),
            win_plus_loss_count: bucket.wins.len() + bucket.losses.len(),
            win_games,
            loss_games,
            occurred_games,
        });
    }
    LineDocument {
        legend: line.legend.clone(),
        m: curve.line.map(|line| line.slope),
        b: curve.line.map(|line| line.intercept),
        number_of_games: curve.game_count,
        or_less_point_margin: curve.or_less,
        or_more_point_margin: curve.or_more,
        x_values: curve.values.clone(),
        y_values: points,
    }
}

/// Up to ten games drawn without replacement from a bucket's id set,
/// reported in date order. Secondary ids collapse to their base game.
fn sample_games(
    ids: &rustc_hash::FxHashSet<String>,
    games: &GameCollection,
    rand: &mut impl Rand,
) -> Vec<GameSample> {
    let mut pool: Vec<&str> = ids.iter().map(|id| base_game_id(id)).collect();
    pool.sort_unstable();
    pool.dedup();
    let mut sampled: Vec<&Game> = Vec::with_capacity(MAX_GAME_SAMPLES.min(pool.len()));
    while !pool.is_empty() && sampled.len() < MAX_GAME_SAMPLES {
        let pick = (rand.next_u64() % pool.len() as u64) as usize;
        let id = pool.swap_remove(pick);
        if let Some(game) = games.get(id) {
            sampled.push(game);
        }
    }
    sampled.sort_by_key(|game| (game.date, game.id.as_str()));
    sampled
        .into_iter()
        .map(|game| GameSample {
            game_id: game.id.clone(),
            game_date: game.date,
            game_summary: game.summary(),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct TimelineLine {
    pub legend: String,
    pub number_of_games: usize,
    pub deficits: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct TimelineDocument {
    pub plot_type: &'static str,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Minutes remaining, descending.
    pub x_values: Vec<u8>,
    pub lines: Vec<TimelineLine>,
}

impl TimelineDocument {
    pub fn write(&self, path: &Path) -> Result<(), ChartError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Tracks, for each minute from `start` down to the final minute, the
/// deficit that corresponds to each requested comeback probability, with an
/// optional record-comeback line and `k·√t` guide lines.
pub fn deficit_timeline(
    title: String,
    games: &GameCollection,
    template: &CurveConfig,
    start: Checkpoint,
    percents: &[f64],
    record: bool,
    guide_multipliers: &[f64],
) -> Result<TimelineDocument, CurveError> {
    let start_index = start.index().unwrap_or(0);
    let minutes: Vec<u8> = CHECKPOINTS[start_index..]
        .iter()
        .filter_map(|checkpoint| match checkpoint {
            Checkpoint::Minutes(minutes) if *minutes > 0 => Some(*minutes),
            _ => None,
        })
        .collect();

    let mut deficit_rows: Vec<Vec<f64>> = vec![Vec::with_capacity(minutes.len()); percents.len()];
    let mut record_row: Vec<f64> = Vec::with_capacity(minutes.len());
    let mut game_count = 0;
    for &minute in &minutes {
        let config = CurveConfig {
            statistic: Statistic::MarginAt(Checkpoint::Minutes(minute)),
            fit_window: FitWindow::Cutoff(-1),
            max_value: Bound::Value(-1),
            ..template.clone()
        };
        let curve = Curve::build(games, &config, None)?;
        game_count = curve.game_count;
        for (row, &percent) in deficit_rows.iter_mut().zip(percents) {
            let deficit = curve
                .statistic_at(percent)
                .map(|at| at.exact)
                .unwrap_or(f64::NAN);
            row.push(deficit);
        }
        if record {
            let deepest = curve
                .record_margin()
                .map(|(margin, _)| margin as f64)
                .unwrap_or(f64::NAN);
            record_row.push(deepest);
        }
    }

    let mut lines: Vec<TimelineLine> = deficit_rows
        .into_iter()
        .zip(percents)
        .map(|(deficits, &percent)| TimelineLine {
            legend: format!("{:.0}% Win Deficit", percent * 100.0),
            number_of_games: game_count,
            deficits,
        })
        .collect();
    if record {
        lines.push(TimelineLine {
            legend: "Record Win Deficit".into(),
            number_of_games: game_count,
            deficits: record_row,
        });
    }
    for &multiplier in guide_multipliers {
        lines.push(TimelineLine {
            legend: format!("-{multiplier}\u{221a}t Guide"),
            number_of_games: 0,
            deficits: minutes
                .iter()
                .map(|&minute| -multiplier * (minute as f64).sqrt())
                .collect(),
        });
    }

    Ok(TimelineDocument {
        plot_type: "time_v_point_margin",
        title,
        x_label: "Minutes Remaining".into(),
        y_label: "Point Margin".into(),
        x_values: minutes,
        lines,
    })
}
