use std::path::PathBuf;

use league_features::match_store::{self, Outcome};
use league_features::{FeatureError, Season};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn season(code: &str) -> Season {
    code.parse().expect("season code")
}

#[test]
fn clean_csv_fixture_parses() {
    let data = match_store::read_clean_csv(&fixture_path("mini_season.csv"), season("2021"))
        .expect("fixture should parse");
    assert_eq!(data.matches.len(), 12);
    assert_eq!(data.teams(), vec!["Alpha", "Beta", "Delta", "Gamma"]);
    assert!(data.same_day_collisions().is_empty());
    assert!(data.check_schedule(6).is_ok());

    let first = &data.matches[0];
    assert_eq!(first.venue, "Alpha Park");
    assert_eq!(first.outcome(), Outcome::HomeWin);
    assert_eq!(first.score_for("Beta"), Some((1, 2)));
    assert_eq!(data.matches[1].outcome(), Outcome::Draw);
}

#[test]
fn winner_column_must_agree_with_score() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.csv");
    std::fs::write(
        &path,
        "Date,HomeTeam,HomeScore,AwayScore,AwayTeam,Winner,Stadium,City\n\
         2020-09-12,Alpha,2,1,Beta,Beta,Ground,Town\n",
    )
    .expect("write csv");
    let err = match_store::read_clean_csv(&path, season("2021")).expect_err("mismatch");
    let inner = err.downcast_ref::<FeatureError>().expect("feature error");
    assert!(matches!(inner, FeatureError::MalformedInput { .. }));
}

#[test]
fn sqlite_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("nested").join("matches.sqlite");
    let mut conn = match_store::open_db(&db).expect("open db");

    let data = match_store::read_clean_csv(&fixture_path("mini_season.csv"), season("2021"))
        .expect("fixture should parse");
    assert_eq!(match_store::upsert_season(&mut conn, &data).expect("upsert"), 12);
    // Re-ingesting replaces rather than duplicates.
    assert_eq!(match_store::upsert_season(&mut conn, &data).expect("upsert"), 12);

    assert_eq!(match_store::stored_seasons(&conn).expect("seasons"), vec![season("2021")]);
    let loaded = match_store::load_season(&conn, season("2021")).expect("load");
    assert_eq!(loaded, data);

    assert!(match_store::load_season(&conn, season("1920")).is_err());

    let run = match_store::record_run_start(&conn, season("2021"), 4).expect("run start");
    match_store::record_run_finish(&conn, run, 3, &["Omega: no prior data".to_string()])
        .expect("run finish");
    let (written, errors): (i64, String) = conn
        .query_row(
            "SELECT teams_written, errors_json FROM feature_runs WHERE run_id = ?1",
            [run],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("run row");
    assert_eq!(written, 3);
    let errors: Vec<String> = serde_json::from_str(&errors).expect("errors json");
    assert_eq!(errors, vec!["Omega: no prior data"]);
}
