use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use league_features::Season;
use league_features::config::{self, PipelineConfig};
use league_features::match_store;

struct Job {
    season: Season,
    path: PathBuf,
}

fn main() -> Result<()> {
    config::init_runtime("league_features=info");
    let cfg = PipelineConfig::from_env();

    let jobs = resolve_jobs()?;
    if jobs.is_empty() {
        return Err(anyhow!(
            "nothing to ingest: pass --csv <file> --season <code> or --dir <folder>"
        ));
    }

    let db_path = parse_path_arg("db")
        .or(cfg.db_path)
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut conn = match_store::open_db(&db_path)?;

    let mut upserted = 0usize;
    let mut errors = Vec::new();
    for job in &jobs {
        match ingest_one(&mut conn, job) {
            Ok(n) => {
                info!(season = %job.season, matches = n, "season stored");
                upserted += n;
            }
            Err(err) => {
                warn!(season = %job.season, "ingest failed: {err:#}");
                errors.push(format!("{}: {err:#}", job.season));
            }
        }
    }

    println!("Match ingest complete");
    println!("DB: {}", db_path.display());
    println!("Seasons: {}/{}", jobs.len() - errors.len(), jobs.len());
    println!("Matches upserted: {upserted}");
    if !errors.is_empty() {
        println!("  errors: {}", errors.len());
        for err in errors.iter().take(6) {
            println!("   - {err}");
        }
    }
    Ok(())
}

fn ingest_one(conn: &mut rusqlite::Connection, job: &Job) -> Result<usize> {
    let data = match_store::read_clean_csv(&job.path, job.season)?;
    for (team, date) in data.same_day_collisions() {
        warn!(season = %job.season, team = %team, %date, "team listed twice on one date");
    }
    match_store::upsert_season(conn, &data)
}

fn resolve_jobs() -> Result<Vec<Job>> {
    if let Some(path) = parse_path_arg("csv") {
        let season = match parse_arg("season") {
            Some(raw) => raw
                .parse::<Season>()
                .map_err(|err| anyhow!("--season {raw:?}: {err}"))?,
            None => season_from_path(&path)
                .with_context(|| format!("cannot infer season from {}", path.display()))?,
        };
        return Ok(vec![Job { season, path }]);
    }
    let Some(dir) = parse_path_arg("dir") else {
        return Ok(Vec::new());
    };
    let mut jobs = Vec::new();
    for entry in std::fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        match season_from_path(&path) {
            Some(season) => jobs.push(Job { season, path }),
            None => warn!(path = %path.display(), "skipping file without a season name"),
        }
    }
    jobs.sort_by_key(|j| j.season);
    Ok(jobs)
}

/// `1920.csv` or `season-1920.csv`.
fn season_from_path(path: &Path) -> Option<Season> {
    path.file_stem()?.to_str()?.parse().ok()
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_arg(name).map(PathBuf::from)
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
