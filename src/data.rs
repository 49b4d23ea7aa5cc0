//! Season and game records loaded from per-season JSON documents, and the
//! [SeasonStore] repository that owns them.

use std::fs::File;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::debug;

use crate::clock::CHECKPOINTS;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("season data file not found: {path}")]
    DataNotFound { path: PathBuf },

    #[error("unable to read season document {path}: {source}")]
    UnreadableDocument {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse season document {path}: {source}")]
    MalformedDocument {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("game {game_id} has a drawn final score '{score}'")]
    DrawnGame { game_id: String, score: String },

    #[error("game {game_id} has a malformed score string '{score}'")]
    MalformedScore { game_id: String, score: String },

    #[error("game {game_id} has a malformed margin entry '{entry}'")]
    MalformedMargin { game_id: String, entry: String },

    #[error("game {game_id} has no margin at checkpoint index {index} and no earlier value to carry forward")]
    MissingMargin { game_id: String, index: usize },

    #[error("game {game_id} references unknown team {team}")]
    UnknownTeam { game_id: String, team: String },

    #[error("season {year} has not been loaded")]
    SeasonNotLoaded { year: u16 },
}

/// Season-scope filter applied when collecting games across years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SeasonType {
    #[default]
    All,
    RegularSeason,
    Playoffs,
}

impl SeasonType {
    pub fn admits(&self, game_type: GameType) -> bool {
        match self {
            SeasonType::All => true,
            SeasonType::RegularSeason => game_type == GameType::RegularSeason,
            SeasonType::Playoffs => game_type == GameType::Playoffs,
        }
    }

    /// Human-readable suffix for era labels; empty for [SeasonType::All].
    pub fn label_suffix(&self) -> &'static str {
        match self {
            SeasonType::All => "",
            SeasonType::RegularSeason => " Regular Season",
            SeasonType::Playoffs => " Playoffs",
        }
    }
}

/// The phase of the season a single game belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GameType {
    #[serde(rename = "Regular Season")]
    RegularSeason,
    Playoffs,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeamStats {
    pub wins: u32,
    pub losses: u32,
    pub win_pct: f64,
    /// Rank by win percentage within the season; tied teams share a rank.
    pub rank: u32,
}

/// Margin snapshot at one checkpoint: the margin when the clock reached it,
/// and the extremes observed since the previous checkpoint. All three are
/// home-team score minus away-team score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginSnapshot {
    pub margin: i32,
    pub min_margin: i32,
    pub max_margin: i32,
}

impl MarginSnapshot {
    pub fn level(margin: i32) -> Self {
        Self {
            margin,
            min_margin: margin,
            max_margin: margin,
        }
    }
}

#[derive(Debug)]
pub struct Game {
    pub id: String,
    pub date: NaiveDate,
    pub game_type: GameType,
    pub season_year: u16,
    pub home_team: String,
    pub away_team: String,
    pub home_points: i32,
    pub away_points: i32,
    /// One snapshot per entry of [CHECKPOINTS], gaps carried forward at load.
    pub snapshots: Vec<MarginSnapshot>,
    pub home_rank: u32,
    pub away_rank: u32,
    pub home_win_pct: f64,
    pub away_win_pct: f64,
    pub team_count: u32,
}

impl Game {
    /// Final home score minus final away score. Never zero.
    pub fn score_diff(&self) -> i32 {
        self.home_points - self.away_points
    }

    pub fn home_won(&self) -> bool {
        self.score_diff() > 0
    }

    pub fn winner(&self) -> &str {
        if self.home_won() {
            &self.home_team
        } else {
            &self.away_team
        }
    }

    pub fn loser(&self) -> &str {
        if self.home_won() {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    /// One-line game summary for chart tooltips, e.g.
    /// `"SEA(2nd/0.785) @ CHI(1st/0.841): 98-107"`.
    pub fn summary(&self) -> String {
        format!(
            "{}({}/{:.3}) @ {}({}/{:.3}): {}-{}",
            self.away_team,
            rank_label(self.away_rank),
            self.away_win_pct,
            self.home_team,
            rank_label(self.home_rank),
            self.home_win_pct,
            self.away_points,
            self.home_points
        )
    }
}

fn rank_label(rank: u32) -> String {
    if rank == 0 {
        return "N/A".into();
    }
    let suffix = if (10..=20).contains(&(rank % 100)) {
        "th"
    } else {
        match rank % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{rank}{suffix}")
}

#[derive(Debug)]
pub struct Season {
    pub year: u16,
    pub team_count: u32,
    pub teams: Vec<String>,
    pub team_stats: FxHashMap<String, TeamStats>,
    pub games: FxHashMap<String, Game>,
}

#[derive(Debug, Deserialize)]
struct SeasonDocument {
    season_year: u16,
    team_count: u32,
    teams: Vec<String>,
    team_stats: FxHashMap<String, TeamStats>,
    games: FxHashMap<String, GameDocument>,
}

#[derive(Debug, Deserialize)]
struct GameDocument {
    game_date: NaiveDate,
    season_type: GameType,
    season_year: u16,
    home_team_abbr: String,
    away_team_abbr: String,
    score: String,
    point_margins: Vec<String>,
}

impl Season {
    fn from_document(document: SeasonDocument) -> Result<Self, DataError> {
        let mut games =
            FxHashMap::with_capacity_and_hasher(document.games.len(), Default::default());
        for (game_id, game) in document.games {
            let game = build_game(
                game_id.clone(),
                game,
                document.team_count,
                &document.team_stats,
            )?;
            games.insert(game_id, game);
        }
        Ok(Season {
            year: document.season_year,
            team_count: document.team_count,
            teams: document.teams,
            team_stats: document.team_stats,
            games,
        })
    }
}

fn build_game(
    game_id: String,
    document: GameDocument,
    team_count: u32,
    team_stats: &FxHashMap<String, TeamStats>,
) -> Result<Game, DataError> {
    let (away_points, home_points) = parse_score(&game_id, &document.score)?;
    if home_points == away_points {
        return Err(DataError::DrawnGame {
            game_id,
            score: document.score,
        });
    }
    let snapshots = parse_point_margins(&game_id, &document.point_margins)?;
    let stats_for = |team: &str| {
        team_stats.get(team).ok_or_else(|| DataError::UnknownTeam {
            game_id: game_id.clone(),
            team: team.into(),
        })
    };
    let home_stats = stats_for(&document.home_team_abbr)?.clone();
    let away_stats = stats_for(&document.away_team_abbr)?.clone();
    Ok(Game {
        id: game_id,
        date: document.game_date,
        game_type: document.season_type,
        season_year: document.season_year,
        home_team: document.home_team_abbr,
        away_team: document.away_team_abbr,
        home_points,
        away_points,
        snapshots,
        home_rank: home_stats.rank,
        away_rank: away_stats.rank,
        home_win_pct: home_stats.win_pct,
        away_win_pct: away_stats.win_pct,
        team_count,
    })
}

fn parse_score(game_id: &str, score: &str) -> Result<(i32, i32), DataError> {
    let malformed = || DataError::MalformedScore {
        game_id: game_id.into(),
        score: score.into(),
    };
    // Scores are recorded visiting team first.
    let (away, home) = score.split_once(" - ").ok_or_else(malformed)?;
    let away = away.trim().parse().map_err(|_| malformed())?;
    let home = home.trim().parse().map_err(|_| malformed())?;
    Ok((away, home))
}

/// Expands the compact `"index=margin"` / `"index=margin,min,max"` entries
/// into one snapshot per checkpoint. A missing checkpoint inherits the last
/// known margin; a gap before the first recorded value is a load error.
fn parse_point_margins(
    game_id: &str,
    entries: &[String],
) -> Result<Vec<MarginSnapshot>, DataError> {
    let mut recorded: FxHashMap<usize, MarginSnapshot> = FxHashMap::default();
    for entry in entries {
        let malformed = || DataError::MalformedMargin {
            game_id: game_id.into(),
            entry: entry.clone(),
        };
        let (index, points) = entry.split_once('=').ok_or_else(malformed)?;
        let index: usize = index.parse().map_err(|_| malformed())?;
        if index >= CHECKPOINTS.len() {
            return Err(malformed());
        }
        let fields = points
            .split(',')
            .map(i32::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;
        let snapshot = match fields.as_slice() {
            &[margin] => MarginSnapshot::level(margin),
            &[margin, min_margin, max_margin] => MarginSnapshot {
                margin,
                min_margin,
                max_margin,
            },
            _ => return Err(malformed()),
        };
        recorded.insert(index, snapshot);
    }

    let mut snapshots = Vec::with_capacity(CHECKPOINTS.len());
    let mut last_margin = None;
    for index in 0..CHECKPOINTS.len() {
        let snapshot = match recorded.get(&index) {
            Some(&snapshot) => snapshot,
            None => match last_margin {
                Some(margin) => MarginSnapshot::level(margin),
                None => {
                    return Err(DataError::MissingMargin {
                        game_id: game_id.into(),
                        index,
                    })
                }
            },
        };
        last_margin = Some(snapshot.margin);
        snapshots.push(snapshot);
    }
    Ok(snapshots)
}

/// Repository of immutable per-season records. Seasons are loaded explicitly
/// and at most once; every view handed out afterwards borrows immutably.
pub struct SeasonStore {
    base_path: PathBuf,
    seasons: FxHashMap<u16, Season>,
}

impl SeasonStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            seasons: FxHashMap::default(),
        }
    }

    fn season_path(&self, year: u16) -> PathBuf {
        self.base_path.join(format!("nba_season_{year}.json"))
    }

    /// Loads the backing document for `year` unless already resident.
    pub fn load(&mut self, year: u16) -> Result<&Season, DataError> {
        if !self.seasons.contains_key(&year) {
            let season = read_season(&self.season_path(year))?;
            debug!(
                "loaded season {year}: {} teams, {} games",
                season.team_count,
                season.games.len()
            );
            self.seasons.insert(year, season);
        }
        Ok(&self.seasons[&year])
    }

    pub fn load_range(&mut self, years: RangeInclusive<u16>) -> Result<(), DataError> {
        for year in years {
            self.load(year)?;
        }
        Ok(())
    }

    /// Drops a resident season. Returns whether anything was evicted.
    pub fn evict(&mut self, year: u16) -> bool {
        self.seasons.remove(&year).is_some()
    }

    pub fn season(&self, year: u16) -> Option<&Season> {
        self.seasons.get(&year)
    }

    /// A filtered view over the games of already-loaded seasons.
    pub fn collect(
        &self,
        start_year: u16,
        stop_year: u16,
        season_type: SeasonType,
    ) -> Result<GameCollection<'_>, DataError> {
        let mut games = FxHashMap::default();
        for year in start_year..=stop_year {
            let season = self
                .seasons
                .get(&year)
                .ok_or(DataError::SeasonNotLoaded { year })?;
            for game in season.games.values() {
                if season_type.admits(game.game_type) {
                    games.insert(game.id.as_str(), game);
                }
            }
        }
        Ok(GameCollection {
            games,
            start_year,
            stop_year,
            season_type,
        })
    }
}

fn read_season(path: &Path) -> Result<Season, DataError> {
    if !path.exists() {
        return Err(DataError::DataNotFound { path: path.into() });
    }
    let file = File::open(path).map_err(|source| DataError::UnreadableDocument {
        path: path.into(),
        source,
    })?;
    let document: SeasonDocument =
        serde_json::from_reader(file).map_err(|source| DataError::MalformedDocument {
            path: path.into(),
            source,
        })?;
    Season::from_document(document)
}

/// View over one or more seasons restricted to a year range and season type.
pub struct GameCollection<'a> {
    games: FxHashMap<&'a str, &'a Game>,
    pub start_year: u16,
    pub stop_year: u16,
    pub season_type: SeasonType,
}

impl<'a> GameCollection<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Game> + '_ {
        self.games.values().copied()
    }

    pub fn get(&self, game_id: &str) -> Option<&'a Game> {
        self.games.get(game_id).copied()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Era label such as `"1996-97 to 2022-23 Playoffs"`.
    pub fn era_label(&self) -> String {
        fn short(year: u16) -> String {
            format!("{:02}", (year + 1) % 100)
        }
        let suffix = self.season_type.label_suffix();
        if self.start_year == self.stop_year {
            format!("{}-{}{suffix}", self.start_year, short(self.start_year))
        } else {
            format!(
                "{}-{} to {}-{}{suffix}",
                self.start_year,
                short(self.start_year),
                self.stop_year,
                short(self.stop_year)
            )
        }
    }
}

/// A year range with a season-type restriction, e.g. `"P1996-2023"` for the
/// 1996 through 2023 playoffs. A bare year span covers both season phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Era {
    pub start_year: u16,
    pub stop_year: u16,
    pub season_type: SeasonType,
}

impl Era {
    pub fn years(&self) -> RangeInclusive<u16> {
        self.start_year..=self.stop_year
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a valid era; expected e.g. '2004', 'R1996-2004' or 'P2010-2023'")]
pub struct EraParseError(String);

impl FromStr for Era {
    type Err = EraParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || EraParseError(s.into());
        let (season_type, years) = match s.chars().next() {
            Some('R') => (SeasonType::RegularSeason, &s[1..]),
            Some('P') => (SeasonType::Playoffs, &s[1..]),
            Some(_) => (SeasonType::All, s),
            None => return Err(malformed()),
        };
        let (start_year, stop_year) = match years.split_once('-') {
            Some((start, stop)) => (
                start.parse().map_err(|_| malformed())?,
                stop.parse().map_err(|_| malformed())?,
            ),
            None => {
                let year = years.parse().map_err(|_| malformed())?;
                (year, year)
            }
        };
        if start_year > stop_year {
            return Err(malformed());
        }
        Ok(Era {
            start_year,
            stop_year,
            season_type,
        })
    }
}

impl TryFrom<String> for Era {
    type Error = EraParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A bare game with a flat margin history, suitable for most tests.
    pub fn game(
        id: &str,
        date: &str,
        home: &str,
        away: &str,
        home_points: i32,
        away_points: i32,
    ) -> Game {
        game_with_margins(
            id,
            date,
            home,
            away,
            home_points,
            away_points,
            vec![MarginSnapshot::level(0); CHECKPOINTS.len()],
        )
    }

    pub fn game_with_margins(
        id: &str,
        date: &str,
        home: &str,
        away: &str,
        home_points: i32,
        away_points: i32,
        snapshots: Vec<MarginSnapshot>,
    ) -> Game {
        Game {
            id: id.into(),
            date: date.parse().unwrap(),
            game_type: GameType::RegularSeason,
            season_year: 2000,
            home_team: home.into(),
            away_team: away.into(),
            home_points,
            away_points,
            snapshots,
            home_rank: 1,
            away_rank: 2,
            home_win_pct: 0.700,
            away_win_pct: 0.600,
            team_count: 30,
        }
    }

    pub fn collection<'a>(games: impl IntoIterator<Item = &'a Game>) -> GameCollection<'a> {
        let games: FxHashMap<&str, &Game> = games
            .into_iter()
            .map(|game| (game.id.as_str(), game))
            .collect();
        GameCollection {
            games,
            start_year: 2000,
            stop_year: 2000,
            season_type: SeasonType::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn margins(entries: &[&str]) -> Result<Vec<MarginSnapshot>, DataError> {
        let entries: Vec<String> = entries.iter().map(|entry| entry.to_string()).collect();
        parse_point_margins("test", &entries)
    }

    #[test]
    fn margins_carry_forward() {
        let snapshots = margins(&["0=5"]).unwrap();
        assert_eq!(CHECKPOINTS.len(), snapshots.len());
        for snapshot in &snapshots {
            assert_eq!(MarginSnapshot::level(5), *snapshot);
        }
    }

    #[test]
    fn margins_with_extremes() {
        let snapshots = margins(&["0=2", "1=-3,-8,4"]).unwrap();
        assert_eq!(MarginSnapshot::level(2), snapshots[0]);
        assert_eq!(
            MarginSnapshot {
                margin: -3,
                min_margin: -8,
                max_margin: 4
            },
            snapshots[1]
        );
        // Carried forward from the margin, not the extremes.
        assert_eq!(MarginSnapshot::level(-3), snapshots[2]);
    }

    #[test]
    fn margins_without_opening_value() {
        assert!(matches!(
            margins(&["3=1"]),
            Err(DataError::MissingMargin { index: 0, .. })
        ));
    }

    #[test]
    fn margins_malformed_entry() {
        assert!(matches!(
            margins(&["0=1,2"]),
            Err(DataError::MalformedMargin { .. })
        ));
        assert!(matches!(
            margins(&["99=1"]),
            Err(DataError::MalformedMargin { .. })
        ));
    }

    #[test]
    fn score_parses() {
        assert_eq!((98, 107), parse_score("g", "98 - 107").unwrap());
        assert!(matches!(
            parse_score("g", "98:107"),
            Err(DataError::MalformedScore { .. })
        ));
    }

    #[test]
    fn drawn_game_rejected() {
        let document = GameDocument {
            game_date: "1997-06-01".parse().unwrap(),
            season_type: GameType::Playoffs,
            season_year: 1996,
            home_team_abbr: "CHI".into(),
            away_team_abbr: "UTA".into(),
            score: "90 - 90".into(),
            point_margins: vec!["0=0".into()],
        };
        let team_stats = FxHashMap::from_iter([
            (
                "CHI".to_string(),
                TeamStats {
                    wins: 69,
                    losses: 13,
                    win_pct: 0.841,
                    rank: 1,
                },
            ),
            (
                "UTA".to_string(),
                TeamStats {
                    wins: 64,
                    losses: 18,
                    win_pct: 0.780,
                    rank: 2,
                },
            ),
        ]);
        assert!(matches!(
            build_game("g".into(), document, 29, &team_stats),
            Err(DataError::DrawnGame { .. })
        ));
    }

    #[test]
    fn season_type_parse() {
        assert_eq!(
            SeasonType::RegularSeason,
            "regular_season".parse().unwrap()
        );
        assert_eq!(SeasonType::Playoffs, "playoffs".parse().unwrap());
        assert_eq!(SeasonType::All, "all".parse().unwrap());
        assert!("preseason".parse::<SeasonType>().is_err());
    }

    #[test]
    fn era_parse() {
        assert_eq!(
            Era {
                start_year: 1996,
                stop_year: 2023,
                season_type: SeasonType::Playoffs
            },
            "P1996-2023".parse().unwrap()
        );
        assert_eq!(
            Era {
                start_year: 2004,
                stop_year: 2004,
                season_type: SeasonType::All
            },
            "2004".parse().unwrap()
        );
        assert!("2010-2005".parse::<Era>().is_err());
        assert!("X1996".parse::<Era>().is_err());
    }

    #[test]
    fn era_label() {
        let game = fixtures::game("g1", "1996-11-01", "CHI", "SEA", 100, 90);
        let games = [game];
        let mut collection = fixtures::collection(games.iter());
        collection.start_year = 1996;
        collection.stop_year = 1996;
        assert_eq!("1996-97", collection.era_label());
        collection.stop_year = 2022;
        collection.season_type = SeasonType::Playoffs;
        assert_eq!("1996-97 to 2022-23 Playoffs", collection.era_label());
    }

    #[test]
    fn rank_labels() {
        assert_eq!("1st", rank_label(1));
        assert_eq!("2nd", rank_label(2));
        assert_eq!("3rd", rank_label(3));
        assert_eq!("11th", rank_label(11));
        assert_eq!("12th", rank_label(12));
        assert_eq!("21st", rank_label(21));
        assert_eq!("N/A", rank_label(0));
    }

    #[test]
    fn missing_season_file() {
        let mut store = SeasonStore::new("/nonexistent/base/path");
        assert!(matches!(
            store.load(1996),
            Err(DataError::DataNotFound { .. })
        ));
    }

    #[test]
    fn collect_requires_loaded_season() {
        let store = SeasonStore::new("/nonexistent/base/path");
        assert!(matches!(
            store.collect(1996, 1996, SeasonType::All),
            Err(DataError::SeasonNotLoaded { year: 1996 })
        ));
    }
}
