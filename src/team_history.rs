//! Per-team, time-ordered fixture history with trailing aggregates.
//!
//! Every trailing value at position `i` covers fixtures strictly before `i`:
//! `[0, i)` for cumulative values and `[i - window, i)` (clipped at 0) for the
//! recent window. The fixture's own result never feeds its own features.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FeatureError, Result};
use crate::features::{FeatureKey, Metric, Scope, Window};
use crate::match_store::{Match, SeasonMatches};
use crate::season::Season;

pub const DEFAULT_FORM_WINDOW: usize = 5;
pub const POINTS_PER_WIN: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    pub fn flip(self) -> Venue {
        match self {
            Venue::Home => Venue::Away,
            Venue::Away => Venue::Home,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamFixtureRecord {
    pub date: NaiveDate,
    /// Position of the match in the season listing; same-day tie-break.
    pub listing_order: usize,
    /// 1-based, over all of the team's fixtures.
    pub round: u32,
    pub venue: Venue,
    /// 1-based, within the team's fixtures of `venue`.
    pub venue_round: u32,
    pub opponent: String,
    pub goals_for: u32,
    pub goals_against: u32,
    pub points: u32,
    /// Cumulative points including this fixture.
    pub cum_points: u32,
}

impl TeamFixtureRecord {
    pub fn is_home(&self) -> bool {
        self.venue == Venue::Home
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrailingStats {
    pub cum_points: u32,
    pub cum_goals: u32,
    pub cum_conceded: u32,
    pub recent_points: u32,
    pub recent_goals: u32,
    pub recent_conceded: u32,
    /// Fixtures actually inside the recent window (< window early on).
    pub recent_count: u32,
    /// `recent_points / (recent_count * 3)`; `None` when the window is empty.
    pub recent_point_ratio: Option<f64>,
}

/// Trailing features of a fixture. `home` is set only on home fixtures and
/// `away` only on away fixtures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingFeatureSet {
    pub window: usize,
    pub overall: TrailingStats,
    pub home: Option<TrailingStats>,
    pub away: Option<TrailingStats>,
}

impl RollingFeatureSet {
    pub fn scope(&self, scope: Scope) -> Option<&TrailingStats> {
        match scope {
            Scope::Overall => Some(&self.overall),
            Scope::Home => self.home.as_ref(),
            Scope::Away => self.away.as_ref(),
        }
    }

    pub fn features(&self) -> Vec<(FeatureKey, Option<f64>)> {
        let recent = Window::Recent(self.window);
        let mut out = Vec::with_capacity(21);
        for scope in [Scope::Overall, Scope::Home, Scope::Away] {
            let stats = self.scope(scope);
            let value = |f: fn(&TrailingStats) -> u32| stats.map(|s| f64::from(f(s)));
            out.push((
                FeatureKey::trailing(scope, Window::Cumulative, Metric::Points),
                value(|s| s.cum_points),
            ));
            out.push((
                FeatureKey::trailing(scope, Window::Cumulative, Metric::Goals),
                value(|s| s.cum_goals),
            ));
            out.push((
                FeatureKey::trailing(scope, Window::Cumulative, Metric::Conceded),
                value(|s| s.cum_conceded),
            ));
            out.push((
                FeatureKey::trailing(scope, recent, Metric::Points),
                value(|s| s.recent_points),
            ));
            out.push((
                FeatureKey::trailing(scope, recent, Metric::Goals),
                value(|s| s.recent_goals),
            ));
            out.push((
                FeatureKey::trailing(scope, recent, Metric::Conceded),
                value(|s| s.recent_conceded),
            ));
            out.push((
                FeatureKey::trailing(scope, recent, Metric::PointRatio),
                stats.and_then(|s| s.recent_point_ratio),
            ));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub fixture: TeamFixtureRecord,
    pub rolling: RollingFeatureSet,
}

pub trait FixtureRow {
    fn history(&self) -> &HistoryRow;

    fn fixture(&self) -> &TeamFixtureRecord {
        &self.history().fixture
    }

    fn rolling(&self) -> &RollingFeatureSet {
        &self.history().rolling
    }
}

impl FixtureRow for HistoryRow {
    fn history(&self) -> &HistoryRow {
        self
    }
}

/// A team's season table. Later stages widen `R` by wrapping it; rows are
/// never rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamTable<R> {
    pub season: Season,
    pub team: String,
    pub rows: Vec<R>,
}

impl<R> TeamTable<R> {
    pub fn try_widen<S, E>(
        self,
        f: impl FnMut(R) -> std::result::Result<S, E>,
    ) -> std::result::Result<TeamTable<S>, E> {
        let rows = self
            .rows
            .into_iter()
            .map(f)
            .collect::<std::result::Result<Vec<_>, E>>()?;
        Ok(TeamTable {
            season: self.season,
            team: self.team,
            rows,
        })
    }

    pub fn widen<S>(self, f: impl FnMut(R) -> S) -> TeamTable<S> {
        TeamTable {
            season: self.season,
            team: self.team,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}

impl<R: FixtureRow> TeamTable<R> {
    /// Rows played on `date`; more than one means a same-day collision.
    pub fn rows_on(&self, date: NaiveDate) -> impl Iterator<Item = &R> {
        self.rows.iter().filter(move |r| r.fixture().date == date)
    }

    pub fn total_points(&self) -> u32 {
        self.rows.iter().map(|r| r.fixture().points).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    points: u32,
    goals: u32,
    conceded: u32,
}

fn trailing_stats(series: &[Outcome], window: usize) -> Vec<TrailingStats> {
    // prefix[i] holds sums over series[0..i].
    let mut prefix = Vec::with_capacity(series.len() + 1);
    prefix.push((0u32, 0u32, 0u32));
    for o in series {
        let (p, g, c) = *prefix.last().unwrap_or(&(0, 0, 0));
        prefix.push((p + o.points, g + o.goals, c + o.conceded));
    }

    (0..series.len())
        .map(|i| {
            let start = i.saturating_sub(window);
            let (cp, cg, cc) = prefix[i];
            let (sp, sg, sc) = prefix[start];
            let count = (i - start) as u32;
            let recent_points = cp - sp;
            TrailingStats {
                cum_points: cp,
                cum_goals: cg,
                cum_conceded: cc,
                recent_points,
                recent_goals: cg - sg,
                recent_conceded: cc - sc,
                recent_count: count,
                recent_point_ratio: (count > 0)
                    .then(|| f64::from(recent_points) / f64::from(count * POINTS_PER_WIN)),
            }
        })
        .collect()
}

/// One match from `team`'s side: venue, opponent, goals for/against, points.
fn team_view<'a>(
    season: Season,
    order: usize,
    m: &'a Match,
    team: &str,
) -> Result<(Venue, &'a str, u8, u8, u8)> {
    match (
        m.is_home(team),
        m.opponent(team),
        m.score_for(team),
        m.points_for(team),
    ) {
        (Some(is_home), Some(opponent), Some((gf, ga)), Some(points)) => {
            let venue = if is_home { Venue::Home } else { Venue::Away };
            Ok((venue, opponent, gf, ga, points))
        }
        _ => Err(FeatureError::MalformedInput {
            season,
            record: format!("#{order} {} {} v {}", m.date, m.home_team, m.away_team),
            reason: format!("{team} does not play in this match"),
        }),
    }
}

pub fn build_team_history(
    data: &SeasonMatches,
    team: &str,
    window: usize,
) -> Result<TeamTable<HistoryRow>> {
    let mut fixtures = data.matches_for(team).collect::<Vec<_>>();
    if fixtures.is_empty() {
        return Err(FeatureError::MalformedInput {
            season: data.season,
            record: team.to_string(),
            reason: "team has no fixtures this season".to_string(),
        });
    }
    fixtures.sort_by(|(ia, a), (ib, b)| a.date.cmp(&b.date).then(ia.cmp(ib)));

    let mut records = Vec::with_capacity(fixtures.len());
    let mut outcomes = Vec::with_capacity(fixtures.len());
    let (mut home_round, mut away_round, mut cum_points) = (0u32, 0u32, 0u32);
    for (order, m) in &fixtures {
        let (venue, opponent, gf, ga, points) = team_view(data.season, *order, m, team)?;
        let venue_round = match venue {
            Venue::Home => {
                home_round += 1;
                home_round
            }
            Venue::Away => {
                away_round += 1;
                away_round
            }
        };
        let points = u32::from(points);
        cum_points += points;
        records.push(TeamFixtureRecord {
            date: m.date,
            listing_order: *order,
            round: records.len() as u32 + 1,
            venue,
            venue_round,
            opponent: opponent.to_string(),
            goals_for: u32::from(gf),
            goals_against: u32::from(ga),
            points,
            cum_points,
        });
        outcomes.push(Outcome {
            points,
            goals: u32::from(gf),
            conceded: u32::from(ga),
        });
    }

    let overall = trailing_stats(&outcomes, window);
    let mut home = vec![None; records.len()];
    let mut away = vec![None; records.len()];
    for (venue, slot) in [(Venue::Home, &mut home), (Venue::Away, &mut away)] {
        let idxs = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.venue == venue)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        let sub = idxs.iter().map(|&i| outcomes[i]).collect::<Vec<_>>();
        for (i, stats) in idxs.into_iter().zip(trailing_stats(&sub, window)) {
            slot[i] = Some(stats);
        }
    }

    let rows = records
        .into_iter()
        .enumerate()
        .map(|(i, fixture)| HistoryRow {
            fixture,
            rolling: RollingFeatureSet {
                window,
                overall: overall[i],
                home: home[i],
                away: away[i],
            },
        })
        .collect::<Vec<_>>();

    debug!(season = %data.season, team, fixtures = rows.len(), "built team history");
    Ok(TeamTable {
        season: data.season,
        team: team.to_string(),
        rows,
    })
}

/// Histories for every team of the season, sorted by team name.
pub fn build_season_histories(
    data: &SeasonMatches,
    window: usize,
) -> Result<Vec<TeamTable<HistoryRow>>> {
    data.teams()
        .par_iter()
        .map(|team| build_team_history(data, team, window))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn o(points: u32, goals: u32, conceded: u32) -> Outcome {
        Outcome {
            points,
            goals,
            conceded,
        }
    }

    #[test]
    fn first_position_is_empty() {
        let stats = trailing_stats(&[o(3, 2, 0)], 5);
        assert_eq!(stats[0].cum_points, 0);
        assert_eq!(stats[0].recent_points, 0);
        assert_eq!(stats[0].recent_count, 0);
        assert!(stats[0].recent_point_ratio.is_none());
    }

    #[test]
    fn recent_window_drops_oldest_after_five() {
        let series = [o(3, 1, 0), o(0, 0, 1), o(1, 1, 1), o(3, 2, 1), o(3, 3, 0), o(0, 0, 2), o(1, 0, 0)];
        let stats = trailing_stats(&series, 5);
        // position 5 sees fixtures 0..5
        assert_eq!(stats[5].recent_points, 10);
        assert_eq!(stats[5].recent_count, 5);
        assert_eq!(stats[5].recent_point_ratio, Some(10.0 / 15.0));
        // position 6 sees fixtures 1..6
        assert_eq!(stats[6].recent_points, 7);
        assert_eq!(stats[6].recent_goals, 6);
        assert_eq!(stats[6].recent_conceded, 5);
        assert_eq!(stats[6].cum_points, 10);
        assert_eq!(stats[6].cum_conceded, 5);
    }

    #[test]
    fn match_without_team_is_malformed() {
        let m = Match {
            date: NaiveDate::from_ymd_opt(2019, 8, 10).unwrap(),
            home_team: "Alpha".to_string(),
            away_team: "Beta".to_string(),
            home_score: 2,
            away_score: 1,
            venue: String::new(),
            city: String::new(),
        };
        let season: Season = "1920".parse().unwrap();
        let err = team_view(season, 4, &m, "Gamma").unwrap_err();
        match err {
            FeatureError::MalformedInput { record, reason, .. } => {
                assert!(record.starts_with("#4"));
                assert!(reason.contains("Gamma"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let (venue, opponent, gf, ga, points) = team_view(season, 4, &m, "Beta").unwrap();
        assert_eq!(venue, Venue::Away);
        assert_eq!(opponent, "Alpha");
        assert_eq!((gf, ga, points), (1, 2, 0));
    }

    #[test]
    fn truncated_window_early_in_season() {
        let stats = trailing_stats(&[o(1, 1, 1), o(3, 2, 0), o(0, 0, 4)], 5);
        assert_eq!(stats[2].recent_count, 2);
        assert_eq!(stats[2].recent_point_ratio, Some(4.0 / 6.0));
    }
}
