// schoolcanon-core/src/application/pipeline.rs

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

// Domain
use crate::domain::adapter::{AdaptedBatch, Crosswalk, QuarantinedRow, adapt_with};
use crate::domain::harmonize::UnmappedLabel;
use crate::domain::merge::merge;
use crate::domain::schema::{CanonicalRecord, CanonicalValue, DatasetKind};
use crate::domain::synthesize::{DEFAULT_GROUP_KEYS, synthesize_all_grades};
use crate::domain::vintage::{CompiledVintage, VintageRegistry};

// Ports & infrastructure
use crate::error::CanonError;
use crate::infrastructure::config::ProjectConfig;
use crate::infrastructure::fs::write_json;
use crate::ports::{DatasetSink, RawSource};

pub const RUN_RESULTS_FILE: &str = "run_results.json";
pub const QUARANTINE_FILE: &str = "quarantine.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VintageStatus {
    Adapted,
    /// No input file was found.
    Skipped,
    Failed,
}

impl VintageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adapted => "adapted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VintageOutcome {
    pub vintage_id: String,
    pub dataset: DatasetKind,
    pub status: VintageStatus,
    pub source: Option<String>,
    pub raw_rows: usize,
    pub adapted: usize,
    pub quarantined: usize,
    pub filtered: usize,
    pub superseded: usize,
    pub degraded: BTreeMap<String, u64>,
    pub unmapped: Vec<UnmappedLabel>,
    pub error: Option<String>,
    pub execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetOutcome {
    pub dataset: DatasetKind,
    pub rows: usize,
    pub synthesized: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub generated_at: String,
    pub project_name: String,
    pub schema_version: u32,
    pub success: bool,
    pub strict: bool,
    pub vintages: Vec<VintageOutcome>,
    pub datasets: Vec<DatasetOutcome>,
    pub quarantined: usize,
    pub elapsed: f64,
}

impl RunResult {
    pub fn failures(&self) -> impl Iterator<Item = &VintageOutcome> + '_ {
        self.vintages
            .iter()
            .filter(|v| v.status == VintageStatus::Failed)
    }
}

/// Result of fetching and adapting one vintage. `Err` holds the reason the
/// vintage was excluded.
struct VintageRun {
    index: usize,
    vintage: Arc<CompiledVintage>,
    source: Option<String>,
    raw_rows: usize,
    result: Result<Option<AdaptedBatch>, String>,
    elapsed: f64,
}

async fn run_vintage(index: usize, vintage: Arc<CompiledVintage>, source: &dyn RawSource) -> VintageRun {
    let start = Instant::now();
    let location = source.locate(&vintage.descriptor);
    let mut raw_rows = 0;

    let result = match source.fetch(&vintage.descriptor).await {
        Ok(None) => Ok(None),
        Err(e) => Err(format!("ingestion failed: {}", e)),
        Ok(Some(table)) => {
            raw_rows = table.len();
            match load_crosswalk(&vintage, source).await {
                Err(reason) => Err(reason),
                Ok(crosswalk) => {
                    let compiled = vintage.clone();
                    let task = move || adapt_with(&compiled, table, crosswalk.as_ref());
                    match tokio::task::spawn_blocking(task).await {
                        Ok(Ok(batch)) => Ok(Some(batch)),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(e) => Err(format!("adapter panicked: {}", e)),
                    }
                }
            }
        }
    };

    VintageRun {
        index,
        vintage,
        source: location,
        raw_rows,
        result,
        elapsed: start.elapsed().as_secs_f64(),
    }
}

async fn load_crosswalk(
    vintage: &CompiledVintage,
    source: &dyn RawSource,
) -> Result<Option<Crosswalk>, String> {
    let Some(spec) = &vintage.descriptor.crosswalk else {
        return Ok(None);
    };
    let table = source
        .fetch_crosswalk(spec)
        .await
        .map_err(|e| format!("crosswalk ingestion failed: {}", e))?;
    Crosswalk::from_table(vintage.id(), spec, table)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// RAW → ADAPTED → MERGED → AUGMENTED → CANONICAL for every selected vintage.
///
/// Vintages are adapted in parallel and fail independently; a failed vintage
/// is reported and left out unless `strict` is set, in which case nothing is
/// written. A merge conflict aborts the run.
#[instrument(skip_all, fields(project = %config.name))]
pub async fn run_pipeline(
    project_dir: &Path,
    config: &ProjectConfig,
    registry: &VintageRegistry,
    source: &dyn RawSource,
    sink: &dyn DatasetSink,
    select: &[String],
) -> Result<RunResult, CanonError> {
    println!("🚀 Starting SchoolCanon pipeline...");
    let start_time = Instant::now();

    // 1. SETUP
    let target_dir = config.target_dir(project_dir);
    if !target_dir.exists() {
        fs::create_dir_all(&target_dir)?;
    }

    // 2. PLAN
    for id in select {
        registry.get(id)?;
    }
    let vintages: Vec<Arc<CompiledVintage>> = registry
        .iter()
        .filter(|v| select.is_empty() || select.iter().any(|id| id == v.id()))
        .cloned()
        .collect();

    println!(
        "📝 Execution Plan: {} vintages, up to {} at a time",
        vintages.len(),
        config.concurrency
    );
    if config.strict {
        println!("    🔒 Strict Mode: ON");
    } else {
        println!("    🔓 Strict Mode: OFF");
    }

    // 3. ADAPT (parallel, isolated per vintage)
    println!("🟢 Adapting vintages...");
    let futures = vintages
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, vintage)| run_vintage(index, vintage, source));
    let mut runs: Vec<VintageRun> = futures::stream::iter(futures)
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;
    runs.sort_by_key(|r| r.index);

    let mut outcomes = Vec::with_capacity(runs.len());
    let mut quarantine: Vec<QuarantinedRow> = Vec::new();
    let mut batches: BTreeMap<DatasetKind, Vec<AdaptedBatch>> = BTreeMap::new();

    for run in runs {
        let id = run.vintage.id().to_string();
        let mut outcome = VintageOutcome {
            vintage_id: id.clone(),
            dataset: run.vintage.dataset(),
            status: VintageStatus::Skipped,
            source: run.source,
            raw_rows: run.raw_rows,
            adapted: 0,
            quarantined: 0,
            filtered: 0,
            superseded: 0,
            degraded: BTreeMap::new(),
            unmapped: Vec::new(),
            error: None,
            execution_time: run.elapsed,
        };

        match run.result {
            Ok(Some(mut batch)) => {
                outcome.status = VintageStatus::Adapted;
                outcome.adapted = batch.rows.len();
                outcome.quarantined = batch.quarantine.len();
                outcome.filtered = batch.filtered;
                outcome.degraded = std::mem::take(&mut batch.degraded);
                outcome.unmapped = batch.unmapped.clone();
                quarantine.append(&mut batch.quarantine);
                println!(
                    "    ✅ Adapted {}: {} rows ({} quarantined, {} filtered)",
                    id, outcome.adapted, outcome.quarantined, outcome.filtered
                );
                batches.entry(batch.dataset).or_default().push(batch);
            }
            Ok(None) => {
                println!("    ⏭️  Skipped {}: no input file", id);
            }
            Err(reason) => {
                eprintln!("    ❌ Failed {}: {}", id, reason);
                warn!(vintage = %id, error = %reason, "Vintage excluded");
                outcome.status = VintageStatus::Failed;
                outcome.error = Some(reason);
            }
        }
        outcomes.push(outcome);
    }

    let failed = outcomes
        .iter()
        .filter(|o| o.status == VintageStatus::Failed)
        .count();
    let aborted = config.strict && failed > 0;

    // 4. MERGE → SYNTHESIZE → SORT → WRITE (barrier: all adapters are done)
    let mut datasets = Vec::new();
    if aborted {
        eprintln!(
            "🔒 Strict mode: {} vintage(s) failed, no dataset written",
            failed
        );
    } else {
        for (dataset, dataset_batches) in &batches {
            let dataset = *dataset;
            println!(
                "🔀 Merging {} from {} source(s)...",
                dataset,
                dataset_batches.len()
            );
            let merged = merge(dataset, dataset_batches)?;
            for contribution in &merged.report.sources {
                if let Some(outcome) = outcomes
                    .iter_mut()
                    .find(|o| o.vintage_id == contribution.vintage_id)
                {
                    outcome.superseded = contribution.superseded;
                }
            }

            let mut rows = merged.rows;
            let lacking_rollup: BTreeSet<String> = dataset_batches
                .iter()
                .filter(|b| !b.has_rollup)
                .map(|b| b.vintage_id.clone())
                .collect();
            let mut synthesized = 0;
            if dataset == DatasetKind::Exams && !lacking_rollup.is_empty() {
                println!("🧮 Synthesizing All Grades rows...");
                let extra = synthesize_all_grades(&rows, &lacking_rollup, &DEFAULT_GROUP_KEYS)?;
                synthesized = extra.len();
                rows.extend(extra);
            }

            sort_canonical(dataset, &mut rows);
            let files = sink.write(dataset, &rows).await?;
            println!(
                "    💾 {}: {} rows written via {} ({} synthesized)",
                dataset,
                rows.len(),
                sink.engine_name(),
                synthesized
            );
            datasets.push(DatasetOutcome {
                dataset,
                rows: rows.len(),
                synthesized,
                files: files.iter().map(|p| p.display().to_string()).collect(),
            });
        }
    }

    // 5. FINALIZE
    let duration = start_time.elapsed();
    let result = RunResult {
        generated_at: chrono::Utc::now().to_rfc3339(),
        project_name: config.name.clone(),
        schema_version: DatasetKind::Exams.schema().version,
        success: !aborted,
        strict: config.strict,
        vintages: outcomes,
        datasets,
        quarantined: quarantine.len(),
        elapsed: duration.as_secs_f64(),
    };

    write_json(&target_dir.join(QUARANTINE_FILE), &quarantine)?;
    write_json(&target_dir.join(RUN_RESULTS_FILE), &result)?;
    info!(
        success = result.success,
        failed,
        quarantined = result.quarantined,
        "Run finished"
    );

    println!(
        "✨ Done in {:.2}s. {} vintages adapted, {} failed, {} rows quarantined.",
        result.elapsed,
        result
            .vintages
            .iter()
            .filter(|v| v.status == VintageStatus::Adapted)
            .count(),
        failed,
        result.quarantined
    );

    Ok(result)
}

/// Last `run_results.json` under the target directory, if any.
pub fn load_run_results(target_dir: &Path) -> Option<RunResult> {
    let content = fs::read_to_string(target_dir.join(RUN_RESULTS_FILE)).ok()?;
    match serde_json::from_str(&content) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable run results");
            None
        }
    }
}

fn compare_values(a: Option<&CanonicalValue>, b: Option<&CanonicalValue>) -> Ordering {
    use CanonicalValue as V;
    match (a, b) {
        (Some(V::Int(x)), Some(V::Int(y))) => x.cmp(y),
        (Some(V::Grade(x)), Some(V::Grade(y))) => x.cmp(y),
        (Some(V::Category(x)), Some(V::Category(y))) => x.cmp(y),
        (Some(V::Subject(x)), Some(V::Subject(y))) => x.cmp(y),
        (a, b) => a.map(V::render).cmp(&b.map(V::render)),
    }
}

/// Orders rows by the schema key, comparing typed values so that years and
/// grades sort numerically and "All Grades" comes after the numbered grades.
fn sort_canonical(dataset: DatasetKind, rows: &mut [CanonicalRecord]) {
    let key = dataset.schema().key;
    rows.sort_by(|a, b| {
        key.iter()
            .map(|k| compare_values(a.get(k), b.get(k)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}
