use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use crate::cli::EvaluateArgs;
use crate::config::EvaluationConfig;
use crate::dataset::{load_dataset, load_gold_index};
use crate::evaluation::{EvaluationOutcome, Evaluator, HttpQueryExecutor};
use crate::model::{EvaluationReport, EvaluationRunManifest, InputFileDigest};
use crate::store::{self, DB_SCHEMA_VERSION, RunRecord};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let base_stamp = utc_compact_string(started_ts);

    let config = EvaluationConfig::from_args(&args)?;
    let mut connection = resolve_db_path(&args)
        .as_deref()
        .map(store::open_store)
        .transpose()?;
    let stamp = claim_run_stamp(&args, &base_stamp, connection.as_ref())?;
    let run_id = format!("run-{stamp}");
    let paths = ArtifactPaths::resolve(&args, &stamp);

    info!(
        run_id = %run_id,
        graph = %config.graph,
        endpoint = %config.endpoint,
        timeout_secs = config.timeout.as_secs(),
        "starting evaluation"
    );

    let dataset = load_dataset(&args.dataset, &config)?;
    let gold_index = load_gold_index(&args.solution, &config)?;
    let dataset_digest = digest(&args.dataset)?;
    let solution_digest = digest(&args.solution)?;

    let executor = HttpQueryExecutor::new()?;
    let evaluator = Evaluator::new(&config, &executor)?;
    let outcome = evaluator.evaluate(&dataset, &gold_index);
    let completed_at = now_utc_string();

    let report = EvaluationReport {
        run_id: run_id.clone(),
        graph: config.graph,
        generated_at: completed_at.clone(),
        summary: outcome.summary.clone(),
        records: outcome.records.clone(),
    };
    write_json_pretty(&paths.report, &report)?;
    info!(path = %paths.report.display(), records = report.records.len(), "wrote evaluation report");

    if let (Some(connection), Some(db_path)) = (connection.as_mut(), &paths.db) {
        let run = RunRecord {
            run_id: run_id.clone(),
            graph: config.graph,
            endpoint: config.endpoint.clone(),
            dataset_path: dataset_digest.path.clone(),
            dataset_sha256: dataset_digest.sha256.clone(),
            solution_path: solution_digest.path.clone(),
            solution_sha256: solution_digest.sha256.clone(),
            started_at: started_at.clone(),
            completed_at: completed_at.clone(),
        };
        persist(connection, db_path, &run, &outcome)?;
    }

    let manifest = EvaluationRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id: run_id.clone(),
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        completed_at,
        command: render_evaluate_command(&args),
        graph: config.graph,
        endpoint: config.endpoint.clone(),
        timeout_secs: config.timeout.as_secs(),
        query_key: config.query_key.clone(),
        dataset: dataset_digest,
        solution: solution_digest,
        db_path: paths.db.as_ref().map(|path| path.display().to_string()),
        report_path: paths.report.display().to_string(),
        dataset_entries: dataset.len(),
        skipped_entries: outcome.skipped,
        summary: outcome.summary.clone(),
    };
    write_json_pretty(&paths.manifest, &manifest)?;
    info!(path = %paths.manifest.display(), "wrote evaluation run manifest");

    let summary = &outcome.summary;
    info!(
        run_id = %run_id,
        total = summary.total,
        correct = summary.correct,
        incorrect = summary.incorrect,
        failed = summary.failed,
        empty = summary.empty,
        accuracy = format_args!("{:.2}%", summary.accuracy),
        "evaluation run completed"
    );

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
struct ArtifactPaths {
    report: PathBuf,
    manifest: PathBuf,
    db: Option<PathBuf>,
}

impl ArtifactPaths {
    fn resolve(args: &EvaluateArgs, stamp: &str) -> Self {
        let report_dir = args.cache_root.join("reports");
        let report = args.report_path.clone().unwrap_or_else(|| {
            report_dir.join(format!("evaluation_{}_{stamp}.json", args.graph.as_str()))
        });
        let manifest = args
            .manifest_path
            .clone()
            .unwrap_or_else(|| report_dir.join(format!("evaluation_run_{stamp}.json")));

        Self {
            report,
            manifest,
            db: resolve_db_path(args),
        }
    }
}

fn resolve_db_path(args: &EvaluateArgs) -> Option<PathBuf> {
    if args.no_store {
        return None;
    }
    Some(
        args.db_path
            .clone()
            .unwrap_or_else(|| store::default_db_path(&args.cache_root)),
    )
}

/// Picks the first stamp, `base` then `base-2`, `base-3`, ..., whose run id
/// is not stored yet and whose default artifacts do not exist.
fn claim_run_stamp(
    args: &EvaluateArgs,
    base: &str,
    connection: Option<&Connection>,
) -> Result<String> {
    let mut attempt = 1_u32;
    loop {
        let stamp = if attempt == 1 {
            base.to_string()
        } else {
            format!("{base}-{attempt}")
        };
        let paths = ArtifactPaths::resolve(args, &stamp);
        let report_taken = args.report_path.is_none() && paths.report.exists();
        let manifest_taken = args.manifest_path.is_none() && paths.manifest.exists();
        let run_taken = match connection {
            Some(connection) => store::run_exists(connection, &format!("run-{stamp}"))?,
            None => false,
        };

        if !(report_taken || manifest_taken || run_taken) {
            return Ok(stamp);
        }
        attempt += 1;
    }
}

fn digest(path: &Path) -> Result<InputFileDigest> {
    Ok(InputFileDigest {
        path: path.display().to_string(),
        sha256: sha256_file(path)?,
    })
}

fn persist(
    connection: &mut Connection,
    db_path: &Path,
    run: &RunRecord,
    outcome: &EvaluationOutcome,
) -> Result<()> {
    store::insert_run(connection, run, &outcome.summary, &outcome.records)?;
    info!(
        path = %db_path.display(),
        run_id = %run.run_id,
        comparisons = outcome.records.len(),
        "stored evaluation run"
    );
    Ok(())
}

fn render_evaluate_command(args: &EvaluateArgs) -> String {
    let mut command = vec![
        "sparql-eval".to_string(),
        "evaluate".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--graph".to_string(),
        args.graph.as_str().to_string(),
        "--dataset".to_string(),
        args.dataset.display().to_string(),
        "--solution".to_string(),
        args.solution.display().to_string(),
        "--query-key".to_string(),
        args.query_key.clone(),
        "--question-key".to_string(),
        args.question_key.clone(),
        "--timeout-secs".to_string(),
        args.timeout_secs.to_string(),
    ];

    if let Some(endpoint) = &args.endpoint {
        command.push("--endpoint".to_string());
        command.push(endpoint.clone());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.report_path {
        command.push("--report-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.no_store {
        command.push("--no-store".to_string());
    }

    command.join(" ")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rusqlite::Connection;

    use super::{ArtifactPaths, claim_run_stamp, render_evaluate_command};
    use crate::cli::EvaluateArgs;
    use crate::graph::Graph;
    use crate::model::Summary;
    use crate::store::{self, RunRecord};

    fn args() -> EvaluateArgs {
        EvaluateArgs {
            cache_root: PathBuf::from(".cache/sparql-eval"),
            graph: Graph::Wikidata,
            dataset: PathBuf::from("generated.json"),
            solution: PathBuf::from("solution.json"),
            query_key: "sparql_query".to_string(),
            question_key: "natural_language_question".to_string(),
            endpoint: None,
            timeout_secs: 60,
            db_path: None,
            report_path: None,
            manifest_path: None,
            no_store: false,
        }
    }

    #[test]
    fn artifact_paths_default_under_cache_root() {
        let paths = ArtifactPaths::resolve(&args(), "20260101T000000Z");
        assert_eq!(
            paths.report,
            PathBuf::from(".cache/sparql-eval/reports/evaluation_wikidata_20260101T000000Z.json")
        );
        assert_eq!(
            paths.manifest,
            PathBuf::from(".cache/sparql-eval/reports/evaluation_run_20260101T000000Z.json")
        );
        assert_eq!(
            paths.db,
            Some(PathBuf::from(".cache/sparql-eval/sparql_eval.sqlite"))
        );
    }

    #[test]
    fn no_store_skips_the_database() {
        let mut args = args();
        args.no_store = true;
        args.report_path = Some(PathBuf::from("out/report.json"));

        let paths = ArtifactPaths::resolve(&args, "20260101T000000Z");
        assert_eq!(paths.db, None);
        assert_eq!(paths.report, PathBuf::from("out/report.json"));
    }

    #[test]
    fn rendered_command_includes_overrides() {
        let mut args = args();
        args.endpoint = Some("http://example.org/sparql".to_string());
        args.no_store = true;

        let command = render_evaluate_command(&args);
        assert!(command.starts_with("sparql-eval evaluate --cache-root .cache/sparql-eval"));
        assert!(command.contains("--graph wikidata"));
        assert!(command.contains("--endpoint http://example.org/sparql"));
        assert!(command.ends_with("--no-store"));
    }

    #[test]
    fn existing_default_report_moves_to_next_stamp() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut args = args();
        args.cache_root = dir.path().to_path_buf();
        args.no_store = true;

        let taken = ArtifactPaths::resolve(&args, "20260101T000000Z");
        std::fs::create_dir_all(dir.path().join("reports")).expect("reports dir");
        std::fs::write(&taken.report, "{}").expect("earlier report");

        let stamp = claim_run_stamp(&args, "20260101T000000Z", None).expect("stamp");
        assert_eq!(stamp, "20260101T000000Z-2");
    }

    #[test]
    fn stored_run_id_moves_to_next_stamp() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut args = args();
        args.cache_root = dir.path().to_path_buf();

        let mut connection = Connection::open_in_memory().expect("in-memory db");
        store::ensure_schema(&connection).expect("schema");
        for run_id in ["run-20260101T000000Z", "run-20260101T000000Z-2"] {
            let run = RunRecord {
                run_id: run_id.to_string(),
                graph: Graph::Wikidata,
                endpoint: "http://localhost:7001".to_string(),
                dataset_path: "generated.json".to_string(),
                dataset_sha256: "aa".to_string(),
                solution_path: "solution.json".to_string(),
                solution_sha256: "bb".to_string(),
                started_at: "2026-01-01T00:00:00Z".to_string(),
                completed_at: "2026-01-01T00:00:00Z".to_string(),
            };
            store::insert_run(&mut connection, &run, &Summary::default(), &[]).expect("insert");
        }

        let stamp =
            claim_run_stamp(&args, "20260101T000000Z", Some(&connection)).expect("stamp");
        assert_eq!(stamp, "20260101T000000Z-3");
    }

    #[test]
    fn free_stamp_is_kept() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let mut args = args();
        args.cache_root = dir.path().to_path_buf();

        let stamp = claim_run_stamp(&args, "20260101T000000Z", None).expect("stamp");
        assert_eq!(stamp, "20260101T000000Z");
    }
}
