use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use league_features::Season;
use league_features::config::{self, PipelineConfig};
use league_features::export;
use league_features::league_table::{self, LeagueTable, Tier};
use league_features::match_store;
use league_features::pipeline;
use league_features::strength::LineageHints;

fn main() -> Result<()> {
    config::init_runtime("league_features=info");
    let mut cfg = PipelineConfig::from_env();
    if let Some(out) = parse_arg("out") {
        cfg.out_dir = PathBuf::from(out);
    }
    if let Some(window) = parse_arg("window").and_then(|raw| raw.parse::<usize>().ok()) {
        cfg.form_window = window.clamp(1, 38);
    }

    let db_path = parse_arg("db")
        .map(PathBuf::from)
        .or_else(|| cfg.db_path.clone())
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let conn = match_store::open_db(&db_path)?;

    let stored = match_store::stored_seasons(&conn)?;
    let wanted = match parse_arg("season") {
        Some(raw) => {
            let s = raw
                .parse::<Season>()
                .map_err(|err| anyhow!("--season {raw:?}: {err}"))?;
            if !stored.contains(&s) {
                return Err(anyhow!("season {s} is not stored in {}", db_path.display()));
            }
            vec![s]
        }
        None => stored.clone(),
    };
    if wanted.is_empty() {
        return Err(anyhow!("no stored seasons in {}", db_path.display()));
    }

    let mut seasons = Vec::with_capacity(wanted.len());
    for season in &wanted {
        seasons.push(match_store::load_season(&conn, *season)?);
    }
    // Predecessors outside the selection are loaded for their standings only.
    let mut priors = Vec::new();
    for prior in wanted.iter().filter_map(|s| s.previous()) {
        if stored.contains(&prior) && !wanted.contains(&prior) {
            priors.push(match_store::load_season(&conn, prior)?);
        }
    }

    let second_tier = load_second_tier(&cfg, &wanted);
    let hints = parse_hints()?;

    let mut written_total = 0usize;
    let mut failed = 0usize;
    for (season, result) in pipeline::run_seasons(&seasons, &priors, &second_tier, &hints, &cfg) {
        let teams_total = result.as_ref().map(|f| f.tables.len()).unwrap_or(0);
        let run_id = match_store::record_run_start(&conn, season, teams_total)?;
        match result {
            Ok(features) => {
                let mut errors = features
                    .missing_strength
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>();
                let written = match export::export_season(&cfg.out_dir, &features) {
                    Ok(report) => {
                        println!(
                            "{season}: {} teams, {} rows -> {}",
                            report.csv_files.len(),
                            report.rows,
                            cfg.out_dir.join(season.to_string()).display()
                        );
                        report.csv_files.len()
                    }
                    Err(err) => {
                        errors.push(format!("export: {err:#}"));
                        0
                    }
                };
                written_total += written;
                match_store::record_run_finish(&conn, run_id, written, &errors)?;
            }
            Err(err) => {
                failed += 1;
                warn!(%season, "season failed: {err}");
                println!("{season}: failed: {err}");
                match_store::record_run_finish(&conn, run_id, 0, &[err.to_string()])?;
            }
        }
    }

    info!(seasons = wanted.len(), failed, "feature build finished");
    println!("Feature build complete");
    println!("DB: {}", db_path.display());
    println!("Seasons: {}/{}", wanted.len() - failed, wanted.len());
    println!("Team files written: {written_total}");
    Ok(())
}

/// Second-tier standings for the season before each wanted season, read from
/// `<second_tier_dir>/<season>.csv` when present.
fn load_second_tier(cfg: &PipelineConfig, wanted: &[Season]) -> HashMap<Season, LeagueTable> {
    let aliases = league_table::default_aliases();
    let mut out = HashMap::new();
    for prior in wanted.iter().filter_map(|s| s.previous()) {
        let path = cfg.second_tier_dir.join(format!("{prior}.csv"));
        if !path.exists() {
            continue;
        }
        match league_table::read_table_csv(&path, prior, Tier::Second, &aliases) {
            Ok(table) => {
                out.insert(prior, table);
            }
            Err(err) => warn!(path = %path.display(), "second-tier table unreadable: {err:#}"),
        }
    }
    out
}

/// `--hint 1920:Fulham=second` pins a team that appears in both prior tiers.
fn parse_hints() -> Result<HashMap<Season, LineageHints>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut raw_hints = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--hint=") {
            raw_hints.push(raw.to_string());
        } else if arg == "--hint"
            && let Some(next) = args.get(idx + 1)
        {
            raw_hints.push(next.clone());
        }
    }

    let mut out: HashMap<Season, LineageHints> = HashMap::new();
    for raw in raw_hints {
        let (season, rest) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("hint {raw:?} must look like season:Team=tier"))?;
        let (team, tier) = rest
            .rsplit_once('=')
            .ok_or_else(|| anyhow!("hint {raw:?} must look like season:Team=tier"))?;
        let season = season
            .trim()
            .parse::<Season>()
            .map_err(|err| anyhow!("hint {raw:?}: {err}"))?;
        let tier = match tier.trim().to_ascii_lowercase().as_str() {
            "top" => Tier::Top,
            "second" => Tier::Second,
            other => return Err(anyhow!("hint {raw:?}: unknown tier {other:?}")),
        };
        out.entry(season)
            .or_default()
            .insert(team.trim().to_string(), tier);
    }
    Ok(out)
}

fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let flag = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
