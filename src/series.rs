//! Reconstruction of playoff series from individual playoff games: running
//! series scores, eventual winners, and round numbers.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::data::GameCollection;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("series {series_id} ended {own}-{opp} without a winner")]
    UnfinishedSeries {
        series_id: String,
        own: u8,
        opp: u8,
    },

    #[error("series {series_id} continued past a fourth win")]
    OverrunSeries { series_id: String },
}

/// A series score from one participant's perspective, own wins first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesScore {
    pub own: u8,
    pub opp: u8,
}

impl SeriesScore {
    pub fn new(own: u8, opp: u8) -> Self {
        Self { own, opp }
    }

    /// The same score from the other participant's perspective.
    pub fn flip(&self) -> Self {
        Self {
            own: self.opp,
            opp: self.own,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.own == 4 || self.opp == 4
    }

    /// Position of this score on the series-standing ladder. Scores rank by
    /// lead and then by games played, the winner's clinching scores highest:
    /// 4-0 maps to 10, down through 4-3 at 7, then partial leads 3-0 at 6
    /// down to 1-0 at 1. A tied score is 0 and a trailing score is the
    /// negation of the lead it mirrors.
    pub fn ordinal(&self) -> i32 {
        if self.own < self.opp {
            return -self.flip().ordinal();
        }
        match (self.own, self.opp) {
            (4, 0) => 10,
            (4, 1) => 9,
            (4, 2) => 8,
            (4, 3) => 7,
            (3, 0) => 6,
            (3, 1) => 5,
            (3, 2) => 4,
            (2, 0) => 3,
            (2, 1) => 2,
            (1, 0) => 1,
            _ => 0,
        }
    }
}

impl Display for SeriesScore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.own, self.opp)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid series score")]
pub struct SeriesScoreParseError(String);

impl FromStr for SeriesScore {
    type Err = SeriesScoreParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SeriesScoreParseError(s.into());
        let (own, opp) = s.split_once('-').ok_or_else(malformed)?;
        let own: u8 = own.parse().map_err(|_| malformed())?;
        let opp: u8 = opp.parse().map_err(|_| malformed())?;
        if own > 4 || opp > 4 || (own == 4 && opp == 4) {
            return Err(malformed());
        }
        Ok(SeriesScore { own, opp })
    }
}

/// A best-of-seven series: its games in chronological order and the running
/// score from the eventual winner's perspective after each game.
#[derive(Debug)]
pub struct Series {
    pub season_year: u16,
    /// Both participants, ordered lexicographically for a stable identity.
    pub teams: (String, String),
    pub winner: String,
    /// Home team of the opening game, i.e. the side holding home-court
    /// advantage for the series.
    pub home_court: String,
    pub game_ids: Vec<String>,
    /// Winner-perspective score after each game of `game_ids`.
    pub running_scores: Vec<SeriesScore>,
    pub first_date: NaiveDate,
    /// 1-based playoff round, inferred from each team's prior series wins
    /// that postseason.
    pub round: u8,
}

impl Series {
    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.season_year, self.teams.0, self.teams.1)
    }

    pub fn loser(&self) -> &str {
        if self.winner == self.teams.0 {
            &self.teams.1
        } else {
            &self.teams.0
        }
    }

    /// Winner-perspective score after the game at `position` in this series.
    pub fn score_after(&self, position: usize) -> SeriesScore {
        self.running_scores[position]
    }
}

/// All playoff series reconstructed from a game collection, indexed by the
/// games that belong to them.
pub struct SeriesMap {
    series: Vec<Series>,
    /// Game id to (series index, position of the game within the series).
    by_game: FxHashMap<String, (usize, usize)>,
}

impl SeriesMap {
    /// Groups playoff games by season and participant pair, orders each group
    /// chronologically and derives running scores and rounds. Fails if any
    /// grouped series never reaches four wins.
    pub fn build(games: &GameCollection) -> Result<Self, SeriesError> {
        let mut grouped: FxHashMap<(u16, String, String), Vec<&crate::data::Game>> =
            FxHashMap::default();
        for game in games.iter() {
            if !matches!(game.game_type, crate::data::GameType::Playoffs) {
                continue;
            }
            let (first, second) = ordered_pair(&game.home_team, &game.away_team);
            grouped
                .entry((game.season_year, first.into(), second.into()))
                .or_default()
                .push(game);
        }

        let mut pending: Vec<Series> = Vec::with_capacity(grouped.len());
        for ((season_year, first, second), mut members) in grouped {
            members.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
            pending.push(assemble(season_year, (first, second), &members)?);
        }

        // Rounds depend on each team's earlier series wins that postseason,
        // so assign them in chronological order.
        pending.sort_by(|a, b| {
            a.first_date
                .cmp(&b.first_date)
                .then_with(|| a.id().cmp(&b.id()))
        });
        let mut prior_wins: FxHashMap<(u16, String), u8> = FxHashMap::default();
        for series in &mut pending {
            let wins_of = |team: &str| {
                prior_wins
                    .get(&(series.season_year, team.into()))
                    .copied()
                    .unwrap_or(0)
            };
            series.round = 1 + wins_of(&series.teams.0).min(wins_of(&series.teams.1));
            *prior_wins
                .entry((series.season_year, series.winner.clone()))
                .or_default() += 1;
        }

        let mut by_game = FxHashMap::default();
        for (series_index, series) in pending.iter().enumerate() {
            for (position, game_id) in series.game_ids.iter().enumerate() {
                by_game.insert(game_id.clone(), (series_index, position));
            }
        }
        debug!("reconstructed {} playoff series", pending.len());
        Ok(SeriesMap {
            series: pending,
            by_game,
        })
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.iter()
    }

    /// The series a playoff game belongs to, with the game's position in it.
    pub fn series_for(&self, game_id: &str) -> Option<(&Series, usize)> {
        self.by_game
            .get(game_id)
            .map(|&(series_index, position)| (&self.series[series_index], position))
    }
}

fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn assemble(
    season_year: u16,
    teams: (String, String),
    members: &[&crate::data::Game],
) -> Result<Series, SeriesError> {
    let series_id = format!("{}_{}_{}", season_year, teams.0, teams.1);
    let mut first_wins = 0u8;
    let mut second_wins = 0u8;
    let mut winners = Vec::with_capacity(members.len());
    for game in members {
        if first_wins == 4 || second_wins == 4 {
            return Err(SeriesError::OverrunSeries { series_id });
        }
        if game.winner() == teams.0 {
            first_wins += 1;
        } else {
            second_wins += 1;
        }
        winners.push((first_wins, second_wins));
    }
    let winner = if first_wins == 4 {
        teams.0.clone()
    } else if second_wins == 4 {
        teams.1.clone()
    } else {
        return Err(SeriesError::UnfinishedSeries {
            series_id,
            own: first_wins,
            opp: second_wins,
        });
    };

    let winner_is_first = winner == teams.0;
    let running_scores = winners
        .into_iter()
        .map(|(first, second)| {
            if winner_is_first {
                SeriesScore::new(first, second)
            } else {
                SeriesScore::new(second, first)
            }
        })
        .collect();
    Ok(Series {
        season_year,
        teams,
        winner,
        home_court: members[0].home_team.clone(),
        game_ids: members.iter().map(|game| game.id.clone()).collect(),
        running_scores,
        first_date: members[0].date,
        round: 0,
    })
}
