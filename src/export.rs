use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::features::{FeatureKey, Metric, Scope, Window};
use crate::form::HasForm;
use crate::league_table::LeagueTable;
use crate::pipeline::{FeatureRow, FeatureTable, SeasonFeatures};
use crate::strength::SideStrength;
use crate::team_history::FixtureRow;

pub struct ExportReport {
    pub csv_files: Vec<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub rows: usize,
}

const STD_POINTS: FeatureKey =
    FeatureKey::trailing(Scope::Overall, Window::Cumulative, Metric::StandardizedPoints);

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn side_cells(prefix: &str, side: Option<SideStrength>) -> Vec<(String, String)> {
    vec![
        (
            format!("{prefix}_attack_strength"),
            opt_to_string(side.and_then(|s| s.attack)),
        ),
        (
            format!("{prefix}_defense_strength"),
            opt_to_string(side.and_then(|s| s.defense)),
        ),
        (
            format!("{prefix}_from_second_tier"),
            opt_to_string(side.map(|s| s.from_second_tier)),
        ),
    ]
}

/// Named cells of one output row, in column order. Undefined values are blank.
pub fn row_cells(team: &str, row: &FeatureRow) -> Vec<(String, String)> {
    let f = row.fixture();
    let mut cells = vec![
        ("team".to_string(), team.to_string()),
        ("date".to_string(), f.date.format("%Y-%m-%d").to_string()),
        ("round".to_string(), f.round.to_string()),
        ("is_home".to_string(), f.is_home().to_string()),
        ("venue_round".to_string(), f.venue_round.to_string()),
        ("opponent".to_string(), f.opponent.clone()),
    ];
    for (key, value) in [
        (FeatureKey::as_of(Window::Match, Metric::Goals), f.goals_for),
        (FeatureKey::as_of(Window::Match, Metric::Conceded), f.goals_against),
        (FeatureKey::as_of(Window::Match, Metric::Points), f.points),
        (FeatureKey::as_of(Window::Cumulative, Metric::Points), f.cum_points),
    ] {
        cells.push((key.column_name(), value.to_string()));
    }
    for (key, value) in row.rolling().features() {
        cells.push((key.column_name(), opt_to_string(value)));
    }
    cells.push((STD_POINTS.column_name(), opt_to_string(row.std_cum_points())));

    let strength = row.base.base.strength;
    cells.extend(side_cells("own", strength.own));
    cells.extend(side_cells("opponent", strength.opponent));

    let opp = &row.opponent;
    cells.push(("opponent_round".to_string(), opp.round.to_string()));
    for (key, value) in opp.rolling.features() {
        cells.push((key.opponent_column_name(), opt_to_string(value)));
    }
    cells.push((
        STD_POINTS.opponent_column_name(),
        opt_to_string(opp.std_cum_points),
    ));
    cells
}

pub fn table_rows(table: &FeatureTable) -> Vec<Vec<String>> {
    let mut out = Vec::with_capacity(table.rows.len() + 1);
    for (idx, row) in table.rows.iter().enumerate() {
        let cells = row_cells(&table.team, row);
        if idx == 0 {
            out.push(cells.iter().map(|(name, _)| name.clone()).collect());
        }
        out.push(cells.into_iter().map(|(_, value)| value).collect());
    }
    out
}

fn standings_rows(table: &LeagueTable) -> Vec<Vec<String>> {
    let mut rows = vec![
        [
            "Rank", "Team", "Played", "Win", "Draw", "Loss", "Goals", "Points", "WinHome",
            "DrawHome", "LossHome", "GoalsHome", "WinAway", "DrawAway", "LossAway", "GoalsAway",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>(),
    ];
    for r in &table.rows {
        rows.push(vec![
            r.rank.to_string(),
            r.team.clone(),
            r.played.to_string(),
            r.wins.to_string(),
            r.draws.to_string(),
            r.losses.to_string(),
            r.goals.to_string(),
            r.points.to_string(),
            r.home.wins.to_string(),
            r.home.draws.to_string(),
            r.home.losses.to_string(),
            r.home.goals.to_string(),
            r.away.wins.to_string(),
            r.away.draws.to_string(),
            r.away.losses.to_string(),
            r.away.goals.to_string(),
        ]);
    }
    rows
}

/// Writes `<dir>/<season>/<team>.csv`.
pub fn write_team_csv(dir: &Path, table: &FeatureTable) -> Result<PathBuf> {
    let season_dir = dir.join(table.season.to_string());
    fs::create_dir_all(&season_dir)
        .with_context(|| format!("create {}", season_dir.display()))?;
    let path = season_dir.join(format!("{}.csv", table.team));
    let mut writer =
        csv::Writer::from_path(&path).with_context(|| format!("open {}", path.display()))?;
    for row in table_rows(table) {
        writer
            .write_record(&row)
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(path)
}

const STANDINGS_SHEET: &str = "Standings";
const SHEET_NAME_MAX: usize = 31;

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`.
fn sheet_name(raw: &str) -> String {
    let name = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(SHEET_NAME_MAX)
        .collect::<String>();
    if name.trim().is_empty() {
        "Sheet".to_string()
    } else {
        name
    }
}

/// One sheet name per team, distinct from each other and from the standings
/// sheet. Excel compares names case-insensitively; clashes get `_2`, `_3`, ...
fn team_sheet_names<'a>(teams: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::from([STANDINGS_SHEET.to_lowercase()]);
    let mut out = Vec::new();
    for team in teams {
        let base = sheet_name(team);
        let mut name = base.clone();
        let mut n = 2usize;
        while taken.contains(&name.to_lowercase()) {
            let suffix = format!("_{n}");
            let keep = SHEET_NAME_MAX - suffix.chars().count();
            name = base.chars().take(keep).chain(suffix.chars()).collect();
            n += 1;
        }
        taken.insert(name.to_lowercase());
        out.push(name);
    }
    out
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

pub fn write_season_workbook(path: &Path, features: &SeasonFeatures) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(STANDINGS_SHEET)?;
        write_rows(sheet, &standings_rows(&features.league_table))?;
    }
    let names = team_sheet_names(features.tables.iter().map(|t| t.team.as_str()));
    for (table, name) in features.tables.iter().zip(names) {
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(name)
            .with_context(|| format!("name sheet for {}", table.team))?;
        write_rows(sheet, &table_rows(table))?;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

/// Per-team CSVs plus `<dir>/<season>.xlsx`.
pub fn export_season(dir: &Path, features: &SeasonFeatures) -> Result<ExportReport> {
    let mut csv_files = Vec::with_capacity(features.tables.len());
    let mut rows = 0usize;
    for table in &features.tables {
        csv_files.push(write_team_csv(dir, table)?);
        rows += table.rows.len();
    }
    let workbook = dir.join(format!("{}.xlsx", features.season));
    write_season_workbook(&workbook, features)?;
    Ok(ExportReport {
        csv_files,
        workbook: Some(workbook),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::{sheet_name, team_sheet_names};

    #[test]
    fn sheet_names_are_sanitised() {
        assert_eq!(sheet_name("Brighton & Hove Albion"), "Brighton & Hove Albion");
        assert_eq!(sheet_name("A/B"), "A_B");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
        assert_eq!(sheet_name("??"), "__");
    }

    #[test]
    fn clashing_sheet_names_get_suffixes() {
        let long_a = format!("{}Athletic", "y".repeat(31));
        let long_b = format!("{}Rovers", "y".repeat(31));
        let names = team_sheet_names([
            long_a.as_str(),
            long_b.as_str(),
            "Standings",
            "A/B",
            "A:B",
            "a_b",
        ]);
        assert_eq!(names[0], "y".repeat(31));
        assert_eq!(names[1], format!("{}_2", "y".repeat(29)));
        assert_eq!(names[2], "Standings_2");
        assert_eq!(names[3], "A_B");
        assert_eq!(names[4], "A_B_2");
        assert_eq!(names[5], "a_b_3");
        assert!(names.iter().all(|n| n.chars().count() <= 31));
    }
}
