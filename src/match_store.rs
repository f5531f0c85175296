use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::config::app_cache_dir;
use crate::error::{FeatureError, Result};
use crate::season::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    HomeWin,
    AwayWin,
    Draw,
}

impl Outcome {
    pub fn code(&self) -> char {
        match self {
            Outcome::HomeWin => 'H',
            Outcome::AwayWin => 'A',
            Outcome::Draw => 'D',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u8,
    pub away_score: u8,
    pub venue: String,
    pub city: String,
}

impl Match {
    pub fn outcome(&self) -> Outcome {
        match self.home_score.cmp(&self.away_score) {
            std::cmp::Ordering::Greater => Outcome::HomeWin,
            std::cmp::Ordering::Less => Outcome::AwayWin,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    pub fn is_home(&self, team: &str) -> Option<bool> {
        if team == self.home_team {
            Some(true)
        } else if team == self.away_team {
            Some(false)
        } else {
            None
        }
    }

    pub fn opponent(&self, team: &str) -> Option<&str> {
        match self.is_home(team)? {
            true => Some(self.away_team.as_str()),
            false => Some(self.home_team.as_str()),
        }
    }

    /// Goals (for, against) from `team`'s side.
    pub fn score_for(&self, team: &str) -> Option<(u8, u8)> {
        match self.is_home(team)? {
            true => Some((self.home_score, self.away_score)),
            false => Some((self.away_score, self.home_score)),
        }
    }

    pub fn points_for(&self, team: &str) -> Option<u8> {
        let (gf, ga) = self.score_for(team)?;
        Some(match gf.cmp(&ga) {
            std::cmp::Ordering::Greater => 3,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Less => 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RawMatch {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i64,
    pub away_score: i64,
    pub venue: String,
    pub city: String,
    /// Winner column of clean CSVs (team name or "Draw"), cross-checked when present.
    pub winner: Option<String>,
}

impl RawMatch {
    fn describe(&self, order: usize) -> String {
        format!(
            "#{order} {} {} {}-{} {}",
            self.date, self.home_team, self.home_score, self.away_score, self.away_team
        )
    }

    fn validate(self, season: Season, order: usize) -> Result<Match> {
        let malformed = |reason: String| FeatureError::MalformedInput {
            season,
            record: self.describe(order),
            reason,
        };
        let home_team = self.home_team.trim().to_string();
        let away_team = self.away_team.trim().to_string();
        if home_team.is_empty() || away_team.is_empty() {
            return Err(malformed("empty team name".to_string()));
        }
        if home_team == away_team {
            return Err(malformed("team plays itself".to_string()));
        }
        let home_score = u8::try_from(self.home_score)
            .map_err(|_| malformed(format!("home score {} out of range", self.home_score)))?;
        let away_score = u8::try_from(self.away_score)
            .map_err(|_| malformed(format!("away score {} out of range", self.away_score)))?;

        let m = Match {
            date: self.date,
            home_team,
            away_team,
            home_score,
            away_score,
            venue: self.venue.trim().trim_end_matches(',').to_string(),
            city: self.city.trim().to_string(),
        };

        if let Some(winner) = self.winner.as_deref().map(str::trim)
            && !winner.is_empty()
        {
            let expected = match m.outcome() {
                Outcome::HomeWin => m.home_team.as_str(),
                Outcome::AwayWin => m.away_team.as_str(),
                Outcome::Draw => "Draw",
            };
            if winner != expected {
                return Err(malformed(format!(
                    "winner column says {winner:?}, score says {expected:?}"
                )));
            }
        }
        Ok(m)
    }
}

/// Canonical per-season match table. Listing order is the vector order and is
/// the tie-break for same-day fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonMatches {
    pub season: Season,
    pub matches: Vec<Match>,
}

impl SeasonMatches {
    pub fn from_raw(season: Season, rows: Vec<RawMatch>) -> Result<Self> {
        let matches = rows
            .into_iter()
            .enumerate()
            .map(|(order, raw)| raw.validate(season, order))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { season, matches })
    }

    pub fn teams(&self) -> Vec<String> {
        let mut set = BTreeSet::new();
        for m in &self.matches {
            set.insert(m.home_team.as_str());
            set.insert(m.away_team.as_str());
        }
        set.into_iter().map(str::to_string).collect()
    }

    /// `(listing_order, match)` for every fixture involving `team`.
    pub fn matches_for<'a>(&'a self, team: &'a str) -> impl Iterator<Item = (usize, &'a Match)> {
        self.matches
            .iter()
            .enumerate()
            .filter(move |(_, m)| m.involves(team))
    }

    pub fn appearances(&self) -> HashMap<&str, usize> {
        let mut out: HashMap<&str, usize> = HashMap::new();
        for m in &self.matches {
            *out.entry(m.home_team.as_str()).or_default() += 1;
            *out.entry(m.away_team.as_str()).or_default() += 1;
        }
        out
    }

    pub fn check_schedule(&self, expected_per_team: usize) -> Result<()> {
        let mut counts = self.appearances().into_iter().collect::<Vec<_>>();
        counts.sort_unstable();
        for (team, count) in counts {
            if count != expected_per_team {
                return Err(FeatureError::MalformedInput {
                    season: self.season,
                    record: team.to_string(),
                    reason: format!("{count} matches listed, schedule expects {expected_per_team}"),
                });
            }
        }
        Ok(())
    }

    /// Teams listed twice on the same calendar date. Date-keyed joins are
    /// ambiguous for these.
    pub fn same_day_collisions(&self) -> Vec<(String, NaiveDate)> {
        let mut seen: HashMap<(&str, NaiveDate), usize> = HashMap::new();
        for m in &self.matches {
            *seen.entry((m.home_team.as_str(), m.date)).or_default() += 1;
            *seen.entry((m.away_team.as_str(), m.date)).or_default() += 1;
        }
        let mut out = seen
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|((team, date), _)| (team.to_string(), date))
            .collect::<Vec<_>>();
        out.sort();
        out
    }
}

#[derive(Debug, Deserialize)]
struct CleanCsvRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "HomeTeam")]
    home_team: String,
    #[serde(rename = "HomeScore")]
    home_score: i64,
    #[serde(rename = "AwayScore")]
    away_score: i64,
    #[serde(rename = "AwayTeam")]
    away_team: String,
    #[serde(rename = "Winner", default)]
    winner: Option<String>,
    #[serde(rename = "Stadium", default)]
    stadium: String,
    #[serde(rename = "City", default)]
    city: String,
}

/// Reads a clean season CSV (`Date,Weekday,HomeTeam,HomeScore,AwayScore,AwayTeam,Winner,Stadium,City`,
/// optionally with a leading index column).
pub fn read_clean_csv(path: &Path, season: Season) -> anyhow::Result<SeasonMatches> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open match csv {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, rec) in reader.deserialize::<CleanCsvRow>().enumerate() {
        let row = rec.with_context(|| format!("decode row {idx} of {}", path.display()))?;
        rows.push(RawMatch {
            date: row.date,
            home_team: row.home_team,
            away_team: row.away_team,
            home_score: row.home_score,
            away_score: row.away_score,
            venue: row.stadium,
            city: row.city,
            winner: row.winner,
        });
    }
    Ok(SeasonMatches::from_raw(season, rows)?)
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("matches.sqlite"))
}

pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            season TEXT NOT NULL,
            listing_order INTEGER NOT NULL,
            match_date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NOT NULL,
            away_score INTEGER NOT NULL,
            venue TEXT NOT NULL,
            city TEXT NOT NULL,
            outcome TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (season, listing_order)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);

        CREATE TABLE IF NOT EXISTS feature_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            season TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            teams_total INTEGER NOT NULL,
            teams_written INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Replaces every stored match of `season` with `data`. Returns rows written.
pub fn upsert_season(conn: &mut Connection, data: &SeasonMatches) -> anyhow::Result<usize> {
    let season = data.season.to_string();
    let tx = conn.transaction().context("begin season transaction")?;
    tx.execute("DELETE FROM matches WHERE season = ?1", params![season])
        .context("clear season matches")?;
    let now = Utc::now().to_rfc3339();
    for (order, m) in data.matches.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO matches (
                season, listing_order, match_date, home_team, away_team,
                home_score, away_score, venue, city, outcome, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                season,
                order as i64,
                m.date.format("%Y-%m-%d").to_string(),
                m.home_team,
                m.away_team,
                m.home_score as i64,
                m.away_score as i64,
                m.venue,
                m.city,
                m.outcome().code().to_string(),
                now,
            ],
        )
        .context("insert match")?;
    }
    tx.commit().context("commit season transaction")?;
    Ok(data.matches.len())
}

pub fn stored_seasons(conn: &Connection) -> anyhow::Result<Vec<Season>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT season FROM matches ORDER BY season ASC")
        .context("prepare seasons query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query seasons")?;
    let mut out = Vec::new();
    for row in rows {
        let raw = row.context("decode season row")?;
        let season = raw
            .parse::<Season>()
            .map_err(|err| anyhow!("stored season {raw:?}: {err}"))?;
        out.push(season);
    }
    out.sort();
    Ok(out)
}

pub fn load_season(conn: &Connection, season: Season) -> anyhow::Result<SeasonMatches> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT match_date, home_team, away_team, home_score, away_score, venue, city
            FROM matches
            WHERE season = ?1
            ORDER BY listing_order ASC
            "#,
        )
        .context("prepare load season query")?;
    let rows = stmt
        .query_map(params![season.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .context("query season matches")?;

    let mut raw = Vec::new();
    for row in rows {
        let (date, home_team, away_team, home_score, away_score, venue, city) =
            row.context("decode match row")?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("bad stored date {date:?}"))?;
        raw.push(RawMatch {
            date,
            home_team,
            away_team,
            home_score,
            away_score,
            venue,
            city,
            winner: None,
        });
    }
    if raw.is_empty() {
        return Err(anyhow!("no stored matches for season {season}"));
    }
    Ok(SeasonMatches::from_raw(season, raw)?)
}

/// Opens a `feature_runs` audit row; returns its id.
pub fn record_run_start(conn: &Connection, season: Season, teams_total: usize) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO feature_runs(season, started_at, finished_at, teams_total, teams_written, errors_json)
         VALUES (?1, ?2, NULL, ?3, 0, '[]')",
        params![season.to_string(), Utc::now().to_rfc3339(), teams_total as i64],
    )
    .context("insert feature run")?;
    Ok(conn.last_insert_rowid())
}

pub fn record_run_finish(
    conn: &Connection,
    run_id: i64,
    teams_written: usize,
    errors: &[String],
) -> anyhow::Result<()> {
    let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE feature_runs SET finished_at = ?1, teams_written = ?2, errors_json = ?3 WHERE run_id = ?4",
        params![Utc::now().to_rfc3339(), teams_written as i64, errors_json, run_id],
    )
    .context("update feature run")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, home: &str, hs: i64, as_: i64, away: &str) -> RawMatch {
        RawMatch {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_score: hs,
            away_score: as_,
            venue: "Ground,".to_string(),
            city: "Town".to_string(),
            winner: None,
        }
    }

    fn season() -> Season {
        "1920".parse().unwrap()
    }

    #[test]
    fn negative_score_is_rejected_with_record() {
        let err = SeasonMatches::from_raw(season(), vec![raw("2019-08-10", "Alpha", -1, 0, "Beta")])
            .unwrap_err();
        match err {
            FeatureError::MalformedInput { record, .. } => assert!(record.contains("Alpha")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn winner_column_is_cross_checked() {
        let mut bad = raw("2019-08-10", "Alpha", 2, 1, "Beta");
        bad.winner = Some("Beta".to_string());
        assert!(SeasonMatches::from_raw(season(), vec![bad]).is_err());

        let mut good = raw("2019-08-10", "Alpha", 1, 1, "Beta");
        good.winner = Some("Draw".to_string());
        let data = SeasonMatches::from_raw(season(), vec![good]).unwrap();
        assert_eq!(data.matches[0].venue, "Ground");
        assert_eq!(data.matches[0].outcome(), Outcome::Draw);
    }

    #[test]
    fn schedule_and_collisions() {
        let data = SeasonMatches::from_raw(
            season(),
            vec![
                raw("2019-08-10", "Alpha", 2, 1, "Beta"),
                raw("2019-08-10", "Gamma", 0, 0, "Alpha"),
                raw("2019-08-17", "Beta", 1, 3, "Gamma"),
            ],
        )
        .unwrap();
        assert!(data.check_schedule(2).is_ok());
        assert!(data.check_schedule(3).is_err());
        assert_eq!(
            data.same_day_collisions(),
            vec![("Alpha".to_string(), NaiveDate::from_ymd_opt(2019, 8, 10).unwrap())]
        );
        assert_eq!(data.teams(), vec!["Alpha", "Beta", "Gamma"]);
    }
}
