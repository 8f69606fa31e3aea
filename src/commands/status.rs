use std::fs;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::{self, DB_SCHEMA_VERSION};

pub fn run(args: StatusArgs) -> Result<()> {
    let report_dir = args.cache_root.join("reports");
    let db_path = store::default_db_path(&args.cache_root);

    info!(cache_root = %args.cache_root.display(), "status requested");

    if report_dir.is_dir() {
        let report_count = fs::read_dir(&report_dir)
            .with_context(|| format!("failed to read {}", report_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .count();
        info!(path = %report_dir.display(), files = report_count, "report directory");
    } else {
        warn!(path = %report_dir.display(), "report directory missing");
    }

    if db_path.exists() {
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let schema_version = store::schema_version(&conn).unwrap_or(None);
        let runs_count = store::query_count(&conn, "SELECT COUNT(*) FROM runs").unwrap_or(0);
        let comparisons_count =
            store::query_count(&conn, "SELECT COUNT(*) FROM comparisons").unwrap_or(0);

        info!(
            path = %db_path.display(),
            schema_version = %schema_version.as_deref().unwrap_or_default(),
            runs = runs_count,
            comparisons = comparisons_count,
            "database status"
        );
        if schema_version.as_deref() != Some(DB_SCHEMA_VERSION) {
            warn!(expected = DB_SCHEMA_VERSION, "database schema version mismatch");
        }

        if let Err(err) = log_latest_run(&conn) {
            warn!(error = %err, "failed to read latest run");
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    Ok(())
}

fn log_latest_run(conn: &Connection) -> Result<()> {
    let Some(run_id) = store::latest_run_id(conn)? else {
        warn!("no evaluation runs stored");
        return Ok(());
    };

    if let Some(totals) = store::load_run_totals(conn, &run_id)? {
        info!(
            run_id = %run_id,
            total = totals.total,
            correct = totals.correct,
            incorrect = totals.incorrect,
            failed = totals.failed,
            empty = totals.empty,
            accuracy = format_args!("{:.2}%", totals.accuracy),
            "latest run"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::run;
    use crate::cli::StatusArgs;
    use crate::store;

    #[test]
    fn database_without_run_tables_still_reports() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let db_path = store::default_db_path(dir.path());
        Connection::open(&db_path)
            .expect("db should open")
            .execute_batch("CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL);")
            .expect("partial schema");

        run(StatusArgs {
            cache_root: dir.path().to_path_buf(),
        })
        .expect("status tolerates a partial database");
    }

    #[test]
    fn missing_cache_root_is_not_an_error() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        run(StatusArgs {
            cache_root: dir.path().join("absent"),
        })
        .expect("status only warns");
    }
}
