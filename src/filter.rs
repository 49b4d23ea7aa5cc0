//! Predicates narrowing which game sides contribute to an aggregation: venue,
//! team strength brackets, specific franchises, and playoff-series context.

use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::data::Game;
use crate::series::Series;

/// Strength bracket by season rank. The middle and bottom brackets scale with
/// the league size of the subject's season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
pub enum RankBracket {
    #[strum(serialize = "top_5")]
    #[serde(rename = "top_5")]
    Top5,
    #[strum(serialize = "top_10")]
    #[serde(rename = "top_10")]
    Top10,
    #[strum(serialize = "mid_10")]
    #[serde(rename = "mid_10")]
    Mid10,
    #[strum(serialize = "bot_10")]
    #[serde(rename = "bot_10")]
    Bot10,
    #[strum(serialize = "bot_5")]
    #[serde(rename = "bot_5")]
    Bot5,
}

impl RankBracket {
    pub fn admits(&self, rank: u32, team_count: u32) -> bool {
        if rank == 0 {
            return false;
        }
        let mid = team_count / 2;
        match self {
            RankBracket::Top5 => rank <= 5,
            RankBracket::Top10 => rank <= 10,
            RankBracket::Mid10 => rank >= mid.saturating_sub(5) && rank <= mid + 4,
            RankBracket::Bot10 => rank > team_count.saturating_sub(10),
            RankBracket::Bot5 => rank > team_count.saturating_sub(5),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RankBracket::Top5 => "Top 5",
            RankBracket::Top10 => "Top 10",
            RankBracket::Mid10 => "Mid 10",
            RankBracket::Bot10 => "Bottom 10",
            RankBracket::Bot5 => "Bottom 5",
        }
    }
}

/// Selects teams either by strength bracket or by explicit franchise codes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TeamCriterion {
    Rank(RankBracket),
    Codes(Vec<String>),
}

impl TeamCriterion {
    fn admits(&self, team: &str, rank: u32, team_count: u32) -> bool {
        match self {
            TeamCriterion::Rank(bracket) => bracket.admits(rank, team_count),
            TeamCriterion::Codes(codes) => codes.iter().any(|code| code == team),
        }
    }

    fn label(&self) -> String {
        match self {
            TeamCriterion::Rank(bracket) => format!("{} Teams", bracket.label()),
            TeamCriterion::Codes(codes) => codes.join("/"),
        }
    }
}

/// One perspective on a game: the side whose deficit and outcome are being
/// tracked, against its opponent.
#[derive(Debug, Clone, Copy)]
pub struct Perspective<'a> {
    pub game: &'a Game,
    pub subject_is_home: bool,
}

impl<'a> Perspective<'a> {
    pub fn subject(&self) -> &'a str {
        if self.subject_is_home {
            &self.game.home_team
        } else {
            &self.game.away_team
        }
    }

    pub fn opponent(&self) -> &'a str {
        if self.subject_is_home {
            &self.game.away_team
        } else {
            &self.game.home_team
        }
    }

    pub fn subject_won(&self) -> bool {
        self.game.home_won() == self.subject_is_home
    }

    fn subject_rank(&self) -> u32 {
        if self.subject_is_home {
            self.game.home_rank
        } else {
            self.game.away_rank
        }
    }

    fn opponent_rank(&self) -> u32 {
        if self.subject_is_home {
            self.game.away_rank
        } else {
            self.game.home_rank
        }
    }
}

/// Conjunction of optional predicates. Unset fields admit everything; an
/// entirely empty filter matches every game side.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameFilter {
    /// Whether the subject must be the home side of the game.
    pub subject_at_home: Option<bool>,
    pub subject: Option<TeamCriterion>,
    pub opponent: Option<TeamCriterion>,
    /// Whether the subject must hold home-court advantage for the series.
    pub series_home: Option<bool>,
    /// Playoff round the game's series must belong to, 1-based.
    pub round: Option<u8>,
}

impl GameFilter {
    pub fn requires_series(&self) -> bool {
        self.series_home.is_some() || self.round.is_some()
    }

    /// Whether a game side passes every set predicate. Series context must
    /// be supplied whenever [GameFilter::requires_series] holds; without it,
    /// series predicates reject the side.
    pub fn matches(&self, perspective: &Perspective, series: Option<&Series>) -> bool {
        if let Some(at_home) = self.subject_at_home {
            if perspective.subject_is_home != at_home {
                return false;
            }
        }
        if let Some(subject) = &self.subject {
            if !subject.admits(
                perspective.subject(),
                perspective.subject_rank(),
                perspective.game.team_count,
            ) {
                return false;
            }
        }
        if let Some(opponent) = &self.opponent {
            if !opponent.admits(
                perspective.opponent(),
                perspective.opponent_rank(),
                perspective.game.team_count,
            ) {
                return false;
            }
        }
        if self.requires_series() {
            let Some(series) = series else {
                return false;
            };
            if let Some(series_home) = self.series_home {
                if (perspective.subject() == series.home_court) != series_home {
                    return false;
                }
            }
            if let Some(round) = self.round {
                if series.round != round {
                    return false;
                }
            }
        }
        true
    }

    /// Legend fragment describing the set predicates, e.g.
    /// `"For Top 5 Teams @ Home vs Bottom 10 Teams"`. Empty when
    /// unconstrained.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(subject) = &self.subject {
            parts.push(format!("For {}", subject.label()));
        }
        match self.subject_at_home {
            Some(true) => parts.push("@ Home".into()),
            Some(false) => parts.push("@ Away".into()),
            None => {}
        }
        if let Some(opponent) = &self.opponent {
            parts.push(format!("vs {}", opponent.label()));
        }
        match self.series_home {
            Some(true) => parts.push("With Series Home Court".into()),
            Some(false) => parts.push("Without Series Home Court".into()),
            None => {}
        }
        if let Some(round) = self.round {
            parts.push(format!("Round {round}"));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::game;

    fn perspective(game: &Game, subject_is_home: bool) -> Perspective<'_> {
        Perspective {
            game,
            subject_is_home,
        }
    }

    #[test]
    fn brackets_scale_with_league_size() {
        assert!(RankBracket::Top5.admits(5, 30));
        assert!(!RankBracket::Top5.admits(6, 30));
        assert!(RankBracket::Top10.admits(10, 30));
        // The middle bracket sits at ranks 10..=19 in a 30-team league.
        assert!(RankBracket::Mid10.admits(10, 30));
        assert!(RankBracket::Mid10.admits(19, 30));
        assert!(!RankBracket::Mid10.admits(9, 30));
        assert!(!RankBracket::Mid10.admits(20, 30));
        assert!(RankBracket::Bot10.admits(21, 30));
        assert!(!RankBracket::Bot10.admits(20, 30));
        assert!(RankBracket::Bot5.admits(26, 30));
        // Smaller league from an earlier season.
        assert!(RankBracket::Bot5.admits(25, 29));
        assert!(!RankBracket::Bot5.admits(24, 29));
        // Unranked never qualifies.
        assert!(!RankBracket::Top10.admits(0, 30));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let game = game("g", "1996-11-01", "CHI", "SEA", 100, 90);
        let filter = GameFilter::default();
        assert!(filter.matches(&perspective(&game, true), None));
        assert!(filter.matches(&perspective(&game, false), None));
    }

    #[test]
    fn venue_and_team_predicates() {
        // Fixture ranks: home 1st, away 2nd, league of 30.
        let game = game("g", "1996-11-01", "CHI", "SEA", 100, 90);
        let filter = GameFilter {
            subject_at_home: Some(true),
            subject: Some(TeamCriterion::Rank(RankBracket::Top5)),
            opponent: Some(TeamCriterion::Codes(vec!["SEA".into()])),
            ..Default::default()
        };
        assert!(filter.matches(&perspective(&game, true), None));
        assert!(!filter.matches(&perspective(&game, false), None));

        let wrong_opponent = GameFilter {
            opponent: Some(TeamCriterion::Codes(vec!["LAL".into()])),
            ..Default::default()
        };
        assert!(!wrong_opponent.matches(&perspective(&game, true), None));
    }

    #[test]
    fn series_predicates_need_context() {
        let game = game("g", "1997-05-01", "CHI", "SEA", 100, 90);
        let filter = GameFilter {
            round: Some(4),
            ..Default::default()
        };
        assert!(filter.requires_series());
        assert!(!filter.matches(&perspective(&game, true), None));
    }

    #[test]
    fn perspective_outcomes() {
        let game = game("g", "1996-11-01", "CHI", "SEA", 90, 100);
        let home = perspective(&game, true);
        assert_eq!("CHI", home.subject());
        assert_eq!("SEA", home.opponent());
        assert!(!home.subject_won());
        assert!(perspective(&game, false).subject_won());
    }

    #[test]
    fn labels() {
        let filter = GameFilter {
            subject_at_home: Some(true),
            subject: Some(TeamCriterion::Rank(RankBracket::Top5)),
            opponent: Some(TeamCriterion::Rank(RankBracket::Bot10)),
            ..Default::default()
        };
        assert_eq!("For Top 5 Teams @ Home vs Bottom 10 Teams", filter.label());
        assert_eq!("", GameFilter::default().label());
    }

    #[test]
    fn bracket_names_parse() {
        assert_eq!(RankBracket::Top5, "top_5".parse().unwrap());
        assert_eq!(RankBracket::Mid10, "mid_10".parse().unwrap());
        assert_eq!(RankBracket::Bot5, "bot_5".parse().unwrap());
        assert_eq!("bot_10", RankBracket::Bot10.to_string());
        assert!("top5".parse::<RankBracket>().is_err());
    }

    #[test]
    fn deserialize_criteria() {
        let filter: GameFilter =
            serde_json::from_str(r#"{"subject": "top_5", "opponent": ["LAL", "BOS"]}"#).unwrap();
        assert_eq!(
            Some(TeamCriterion::Rank(RankBracket::Top5)),
            filter.subject
        );
        assert_eq!(
            Some(TeamCriterion::Codes(vec!["LAL".into(), "BOS".into()])),
            filter.opponent
        );
    }
}
