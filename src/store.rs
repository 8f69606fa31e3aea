use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use crate::graph::Graph;
use crate::model::{AnswerSet, AnswerStatus, ComparisonRecord, ErrorCategory, Summary};
use crate::util::{ensure_directory, now_utc_string};

pub const DB_SCHEMA_VERSION: &str = "1";
pub const DB_FILE_NAME: &str = "sparql_eval.sqlite";

pub fn default_db_path(cache_root: &Path) -> PathBuf {
    cache_root.join(DB_FILE_NAME)
}

/// Identity and provenance of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub graph: Graph,
    pub endpoint: String,
    pub dataset_path: String,
    pub dataset_sha256: String,
    pub solution_path: String,
    pub solution_sha256: String,
    pub started_at: String,
    pub completed_at: String,
}

/// Tallies as persisted on the run row.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTotals {
    pub total: i64,
    pub correct: i64,
    pub incorrect: i64,
    pub failed: i64,
    pub empty: i64,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct StoredRun {
    pub run: RunRecord,
    pub records: Vec<ComparisonRecord>,
}

pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn open_existing(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(anyhow!(
            "database {} does not exist; run `evaluate` first",
            db_path.display()
        ));
    }
    Connection::open(db_path).with_context(|| format!("failed to open {}", db_path.display()))
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
              run_id TEXT PRIMARY KEY,
              graph TEXT NOT NULL,
              endpoint TEXT NOT NULL,
              dataset_path TEXT NOT NULL,
              dataset_sha256 TEXT NOT NULL,
              solution_path TEXT NOT NULL,
              solution_sha256 TEXT NOT NULL,
              started_at TEXT NOT NULL,
              completed_at TEXT NOT NULL,
              total INTEGER NOT NULL,
              correct INTEGER NOT NULL,
              incorrect INTEGER NOT NULL,
              failed INTEGER NOT NULL,
              empty INTEGER NOT NULL,
              accuracy REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS comparisons (
              run_id TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
              seq INTEGER NOT NULL,
              question TEXT NOT NULL,
              generated_query TEXT NOT NULL,
              gold_query TEXT NOT NULL,
              gold_answers_json TEXT NOT NULL,
              generated_answers_json TEXT NOT NULL,
              answer_status TEXT NOT NULL,
              error_message TEXT,
              correct INTEGER NOT NULL,
              error_category TEXT,
              PRIMARY KEY (run_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_comparisons_category ON comparisons(run_id, error_category);
            ",
        )
        .context("failed to initialize evaluation schema")?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

pub fn insert_run(
    connection: &mut Connection,
    run: &RunRecord,
    summary: &Summary,
    records: &[ComparisonRecord],
) -> Result<()> {
    let tx = connection
        .transaction()
        .context("failed to start run transaction")?;

    tx.execute(
        "INSERT INTO runs(
           run_id, graph, endpoint, dataset_path, dataset_sha256, solution_path, solution_sha256,
           started_at, completed_at, total, correct, incorrect, failed, empty, accuracy
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            run.run_id,
            run.graph.as_str(),
            run.endpoint,
            run.dataset_path,
            run.dataset_sha256,
            run.solution_path,
            run.solution_sha256,
            run.started_at,
            run.completed_at,
            summary.total as i64,
            summary.correct as i64,
            summary.incorrect as i64,
            summary.failed as i64,
            summary.empty as i64,
            summary.accuracy,
        ],
    )
    .with_context(|| format!("failed to insert run {}", run.run_id))?;

    {
        let mut statement = tx.prepare(
            "INSERT INTO comparisons(
               run_id, seq, question, generated_query, gold_query, gold_answers_json,
               generated_answers_json, answer_status, error_message, correct, error_category
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        for (seq, record) in records.iter().enumerate() {
            let gold_answers_json = serde_json::to_string(&record.gold_answers)
                .context("failed to serialize gold answers")?;
            let generated_answers_json = serde_json::to_string(&record.generated_answers.values)
                .context("failed to serialize generated answers")?;

            statement
                .execute(params![
                    run.run_id,
                    seq as i64,
                    record.question,
                    record.generated_query,
                    record.gold_query,
                    gold_answers_json,
                    generated_answers_json,
                    record.generated_answers.status.as_str(),
                    record.error_message,
                    record.correct,
                    record.error_category.map(ErrorCategory::as_str),
                ])
                .with_context(|| format!("failed to insert comparison {seq} of {}", run.run_id))?;
        }
    }

    tx.commit().context("failed to commit run transaction")?;
    Ok(())
}

pub fn latest_run_id(connection: &Connection) -> Result<Option<String>> {
    let run_id = connection
        .query_row(
            "SELECT run_id FROM runs ORDER BY started_at DESC, run_id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("failed to query latest run")?;
    Ok(run_id)
}

pub fn run_exists(connection: &Connection, run_id: &str) -> Result<bool> {
    let found = connection
        .query_row("SELECT 1 FROM runs WHERE run_id = ?1", [run_id], |_| Ok(()))
        .optional()
        .with_context(|| format!("failed to look up run {run_id}"))?;
    Ok(found.is_some())
}

pub fn load_run_totals(connection: &Connection, run_id: &str) -> Result<Option<RunTotals>> {
    let totals = connection
        .query_row(
            "SELECT total, correct, incorrect, failed, empty, accuracy FROM runs WHERE run_id = ?1",
            [run_id],
            |row| {
                Ok(RunTotals {
                    total: row.get(0)?,
                    correct: row.get(1)?,
                    incorrect: row.get(2)?,
                    failed: row.get(3)?,
                    empty: row.get(4)?,
                    accuracy: row.get(5)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to query totals of run {run_id}"))?;
    Ok(totals)
}

pub fn load_run(connection: &Connection, run_id: &str) -> Result<StoredRun> {
    let row = connection
        .query_row(
            "SELECT run_id, graph, endpoint, dataset_path, dataset_sha256, solution_path,
                    solution_sha256, started_at, completed_at
             FROM runs WHERE run_id = ?1",
            [run_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                ))
            },
        )
        .optional()
        .with_context(|| format!("failed to query run {run_id}"))?
        .ok_or_else(|| anyhow!("run {run_id} not found"))?;

    let graph = Graph::from_str(&row.1)
        .with_context(|| format!("run {run_id} has an invalid graph"))?;
    let run = RunRecord {
        run_id: row.0,
        graph,
        endpoint: row.2,
        dataset_path: row.3,
        dataset_sha256: row.4,
        solution_path: row.5,
        solution_sha256: row.6,
        started_at: row.7,
        completed_at: row.8,
    };

    let records = load_comparisons(connection, run_id)?;
    Ok(StoredRun { run, records })
}

struct ComparisonRow {
    question: String,
    generated_query: String,
    gold_query: String,
    gold_answers_json: String,
    generated_answers_json: String,
    answer_status: String,
    error_message: Option<String>,
    correct: bool,
    error_category: Option<String>,
}

fn load_comparisons(connection: &Connection, run_id: &str) -> Result<Vec<ComparisonRecord>> {
    let mut statement = connection.prepare(
        "SELECT question, generated_query, gold_query, gold_answers_json, generated_answers_json,
                answer_status, error_message, correct, error_category
         FROM comparisons WHERE run_id = ?1 ORDER BY seq",
    )?;

    let rows = statement
        .query_map([run_id], |row| {
            Ok(ComparisonRow {
                question: row.get(0)?,
                generated_query: row.get(1)?,
                gold_query: row.get(2)?,
                gold_answers_json: row.get(3)?,
                generated_answers_json: row.get(4)?,
                answer_status: row.get(5)?,
                error_message: row.get(6)?,
                correct: row.get(7)?,
                error_category: row.get(8)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("failed to read comparisons of run {run_id}"))?;

    rows.into_iter().map(comparison_from_row).collect()
}

fn comparison_from_row(row: ComparisonRow) -> Result<ComparisonRecord> {
    let gold_answers: BTreeSet<String> = serde_json::from_str(&row.gold_answers_json)
        .with_context(|| format!("invalid gold answers for question {:?}", row.question))?;
    let values: BTreeSet<String> = serde_json::from_str(&row.generated_answers_json)
        .with_context(|| format!("invalid generated answers for question {:?}", row.question))?;
    let status = AnswerStatus::parse(&row.answer_status)
        .ok_or_else(|| anyhow!("unknown answer status {:?}", row.answer_status))?;
    let error_category = row
        .error_category
        .as_deref()
        .map(|value| {
            ErrorCategory::parse(value).ok_or_else(|| anyhow!("unknown error category {value:?}"))
        })
        .transpose()?;

    Ok(ComparisonRecord {
        question: row.question,
        generated_query: row.generated_query,
        gold_query: row.gold_query,
        gold_answers,
        generated_answers: AnswerSet { status, values },
        error_message: row.error_message,
        correct: row.correct,
        error_category,
    })
}

pub fn query_count(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

pub fn schema_version(connection: &Connection) -> Result<Option<String>> {
    let version = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version' LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}
