// schoolcanon-core/src/application/clean.rs

use std::fs;
use std::path::{Component, Path};

use crate::error::CanonError;
use crate::infrastructure::config::ProjectConfig;
use crate::infrastructure::error::InfrastructureError;

/// Removes the configured `clean-targets` and returns the ones that existed.
/// Targets must stay inside the project directory.
pub fn clean_project(project_dir: &Path, config: &ProjectConfig) -> Result<Vec<String>, CanonError> {
    tracing::info!("🧹 Initializing SchoolCanon cleanup sequence...");

    let targets = if config.clean_targets.is_empty() {
        vec![config.target_path.clone()]
    } else {
        config.clean_targets.clone()
    };

    // Checked up front so a bad entry removes nothing.
    for target_rel_path in &targets {
        let rel = Path::new(target_rel_path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        let full_path = project_dir.join(rel);

        // Zero-Trust Path Traversal Guard
        if escapes || rel.as_os_str().is_empty() || !full_path.starts_with(project_dir) {
            return Err(CanonError::UnsafePath(target_rel_path.clone()));
        }
    }

    let mut removed = Vec::new();
    for target_rel_path in targets {
        let full_path = project_dir.join(&target_rel_path);
        if !full_path.exists() {
            continue;
        }
        if full_path.is_dir() {
            fs::remove_dir_all(&full_path).map_err(InfrastructureError::Io)?;
        } else {
            fs::remove_file(&full_path).map_err(InfrastructureError::Io)?;
        }
        println!("   🗑️  Artifact removed: {}", target_rel_path);
        removed.push(target_rel_path);
    }

    Ok(removed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn config(targets: &[&str]) -> ProjectConfig {
        let mut config: ProjectConfig = serde_yaml::from_str("name: nyc\n").unwrap();
        config.clean_targets = targets.iter().map(|t| t.to_string()).collect();
        config
    }

    #[test]
    fn test_removes_existing_targets() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("target/nested"))?;
        fs::write(dir.path().join("target/nested/exams.csv"), "dbn\n")?;
        fs::write(dir.path().join("scratch.log"), "x")?;

        let removed = clean_project(dir.path(), &config(&["target", "scratch.log", "absent"]))?;
        assert_eq!(removed, vec!["target", "scratch.log"]);
        assert!(!dir.path().join("target").exists());
        assert!(!dir.path().join("scratch.log").exists());
        Ok(())
    }

    #[test]
    fn test_rejects_paths_outside_the_project() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("target"))?;

        for bad in ["../elsewhere", "/etc", "target/../../x"] {
            let err = clean_project(dir.path(), &config(&["target", bad])).unwrap_err();
            assert!(matches!(err, CanonError::UnsafePath(p) if p == bad));
        }
        // nothing was removed
        assert!(dir.path().join("target").exists());
        Ok(())
    }

    #[test]
    fn test_empty_list_falls_back_to_target_path() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("target"))?;
        let removed = clean_project(dir.path(), &config(&[]))?;
        assert_eq!(removed, vec!["target"]);
        Ok(())
    }
}
