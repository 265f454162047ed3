use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// A throwaway copy of the sample project.
struct SchoolCanonTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl SchoolCanonTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_project");

        let dest = tmp.path().join("sample_project");
        Self::copy_dir(&fixture, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &PathBuf, dst: &PathBuf) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        std::fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn schoolcanon(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("schoolcanon"));
        cmd.current_dir(&self.root);
        cmd
    }

    fn target(&self, file: &str) -> PathBuf {
        self.root.join("target").join(file)
    }

    fn run_results(&self) -> Result<serde_json::Value> {
        let content = fs::read_to_string(self.target("run_results.json"))
            .context("run_results.json not written")?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Header plus rows of an exported CSV. Fixture values carry no commas.
fn read_export(path: &PathBuf) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let content = fs::read_to_string(path)?;
    let mut lines = content.lines();
    let header = lines
        .next()
        .context("empty export")?
        .split(',')
        .map(str::to_string)
        .collect();
    let rows = lines
        .map(|l| l.split(',').map(str::to_string).collect())
        .collect();
    Ok((header, rows))
}

/// Shares within [0, 1] and bounded counts within the population column.
fn assert_row_invariants(path: &PathBuf, population: &str, bounded: impl Fn(&str) -> bool) -> Result<()> {
    let (header, rows) = read_export(path)?;
    let pop = header
        .iter()
        .position(|h| h == population)
        .context("population column missing")?;
    for row in &rows {
        assert_eq!(row.len(), header.len(), "{:?}", row);
        let limit: f64 = row[pop].parse()?;
        for (name, cell) in header.iter().zip(row) {
            if cell.is_empty() {
                continue;
            }
            if name.ends_with("_pct") || name == "eni" {
                let share: f64 = cell.parse()?;
                assert!((0.0..=1.0).contains(&share), "{} = {} in {:?}", name, share, row);
            } else if bounded(name) {
                let count: f64 = cell.parse()?;
                assert!(count <= limit, "{} = {} exceeds {} in {:?}", name, count, population, row);
            }
        }
    }
    Ok(())
}

fn vintage<'a>(results: &'a serde_json::Value, id: &str) -> Option<&'a serde_json::Value> {
    results["vintages"]
        .as_array()?
        .iter()
        .find(|v| v["vintage_id"] == id)
}

#[test]
fn test_run_writes_canonical_tables() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;

    env.schoolcanon()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS"));

    assert!(env.target("schoolcanon.duckdb").exists());

    let exams = fs::read_to_string(env.target("exams.csv"))?;
    let header = exams.lines().next().unwrap_or_default();
    insta::assert_snapshot!(header, @"dbn,beds,ay,test_year,exam,grade,category,charter,number_tested,number_not_tested,total_enrollment,mean_scale_score,level_1_n,level_1_pct,level_2_n,level_2_pct,level_3_n,level_3_pct,level_4_n,level_4_pct,level_3_4_n,level_3_4_pct,source_vintage");
    // 2 charter rows + 2 state rows + 1 synthesized state rollup
    assert_eq!(exams.lines().count(), 6);
    // BEDS codes resolved through data/crosswalk/dbn_beds.csv
    assert!(exams.lines().any(|l| l.starts_with("02M001,310200010001,2018,2019,math,All Grades,All Students")));

    let demographics = fs::read_to_string(env.target("demographics.csv"))?;
    assert_eq!(demographics.lines().count(), 3);
    assert!(demographics.lines().nth(1).unwrap_or_default().starts_with("01M015,2016,2016-17"));

    let results = env.run_results()?;
    assert_eq!(results["success"], true);
    assert_eq!(vintage(&results, "demo_2016").unwrap()["status"], "adapted");
    assert_eq!(vintage(&results, "demo_2016").unwrap()["quarantined"], 1);
    assert_eq!(vintage(&results, "demo_2023").unwrap()["status"], "skipped");

    let quarantine: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(env.target("quarantine.json"))?)?;
    assert_eq!(quarantine.as_array().map(Vec::len), Some(1));
    assert_eq!(quarantine[0]["key"], "01M019");
    Ok(())
}

#[test]
fn test_exported_rows_hold_share_and_count_bounds() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon().arg("run").assert().success();

    // synthesized rollups included
    assert_row_invariants(&env.target("exams.csv"), "number_tested", |name| {
        name.starts_with("level_") && name.ends_with("_n")
    })?;
    assert_row_invariants(&env.target("demographics.csv"), "total_enrollment", |name| {
        name.ends_with("_n") || (name.starts_with("grade_") && name != "grade_level")
    })?;
    Ok(())
}

#[test]
fn test_run_is_idempotent() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;

    env.schoolcanon().arg("run").assert().success();
    let first = fs::read_to_string(env.target("exams.csv"))?;
    env.schoolcanon().arg("run").assert().success();
    let second = fs::read_to_string(env.target("exams.csv"))?;

    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_broken_vintage_is_isolated_unless_strict() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    fs::write(env.root.join("data/demographics/demo_2023.xlsx"), "not a workbook")?;

    env.schoolcanon().arg("run").assert().success();
    let results = env.run_results()?;
    assert_eq!(vintage(&results, "demo_2023").unwrap()["status"], "failed");
    assert!(env.target("demographics.csv").exists());

    env.schoolcanon()
        .args(["run", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("FAILURE"));
    assert_eq!(env.run_results()?["success"], false);
    Ok(())
}

#[test]
fn test_select_limits_the_run() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;

    env.schoolcanon()
        .args(["run", "--select", "state_exams"])
        .assert()
        .success();

    let results = env.run_results()?;
    assert_eq!(results["vintages"].as_array().map(Vec::len), Some(1));
    assert!(!env.target("demographics.csv").exists());
    Ok(())
}

#[test]
fn test_inspect_after_run() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon().arg("run").assert().success();

    env.schoolcanon()
        .args(["inspect", "--table", "demographics", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Columns: [dbn, ay, year"))
        .stdout(predicate::str::contains("01M015"));
    Ok(())
}

#[test]
fn test_inspect_without_run_fails() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon()
        .args(["inspect", "-t", "exams"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Database not found"));
    Ok(())
}

#[test]
fn test_vintages_lists_the_catalog() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon()
        .args(["vintages", "--dataset", "exams"])
        .assert()
        .success()
        .stdout(predicate::str::contains("state_exams"))
        .stdout(predicate::str::contains("synthesized"))
        .stdout(predicate::str::contains("demo_2016").not());
    Ok(())
}

#[test]
fn test_docs_includes_last_run() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon().arg("run").assert().success();
    env.schoolcanon().arg("docs").assert().success();

    let catalog = fs::read_to_string(env.target("catalog.md"))?;
    assert!(catalog.starts_with("# sample_schools data dictionary"));
    assert!(catalog.contains("Last run:"));
    assert!(catalog.contains("| `demo_2016` | demographics | demographics | 2016 | 30 | all | native | adapted |"));
    assert!(env.target("catalog.json").exists());
    Ok(())
}

#[test]
fn test_clean_removes_target() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    env.schoolcanon().arg("run").assert().success();
    assert!(env.root.join("target").exists());

    env.schoolcanon()
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Artifact removed: target"));
    assert!(!env.root.join("target").exists());
    Ok(())
}

#[test]
fn test_clean_refuses_traversal() -> Result<()> {
    let env = SchoolCanonTestEnv::new()?;
    let config = fs::read_to_string(env.root.join("schoolcanon.yaml"))?
        .replace("clean-targets: [target]", "clean-targets: [\"../outside\"]");
    fs::write(env.root.join("schoolcanon.yaml"), config)?;

    env.schoolcanon()
        .arg("clean")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsafe path traversal"));
    Ok(())
}

#[test]
fn test_missing_config_fails() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    Command::new(assert_cmd::cargo::cargo_bin!("schoolcanon"))
        .current_dir(tmp.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load project configuration"));
    Ok(())
}
