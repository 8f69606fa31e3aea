use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::info;

use crate::cli::ReportArgs;
use crate::graph::Graph;
use crate::model::{ComparisonRecord, ErrorCategory, Summary};
use crate::store::{self, StoredRun};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub category: ErrorCategory,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDistribution {
    pub labels: Vec<LabelCount>,
    pub total_errors: usize,
    pub correct: usize,
    pub total: usize,
    /// Error labels per evaluated query, rounded to two decimals.
    pub average_errors_per_query: f64,
}

#[derive(Debug, Serialize)]
struct ReportResponse<'a> {
    run_id: &'a str,
    graph: Graph,
    started_at: &'a str,
    completed_at: &'a str,
    summary: &'a Summary,
    distribution: &'a ErrorDistribution,
}

pub fn run(args: ReportArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| store::default_db_path(&args.cache_root));
    let connection = store::open_existing(&db_path)?;

    let run_id = match args.run_id.clone() {
        Some(run_id) => run_id,
        None => store::latest_run_id(&connection)?
            .ok_or_else(|| anyhow!("no evaluation runs stored in {}", db_path.display()))?,
    };

    let stored = store::load_run(&connection, &run_id)?;
    let summary = Summary::from_records(&stored.records);
    let distribution = error_distribution(&stored.records);

    info!(
        run_id = %run_id,
        records = stored.records.len(),
        errors = distribution.total_errors,
        "loaded stored run"
    );

    if args.json {
        write_json_response(&stored, &summary, &distribution)
    } else {
        write_text_response(&stored, &summary, &distribution, args.records)
    }
}

/// Counts error labels over incorrect records, most frequent first and ties
/// broken by label.
pub fn error_distribution(records: &[ComparisonRecord]) -> ErrorDistribution {
    let mut counts = BTreeMap::<ErrorCategory, usize>::new();
    let mut correct = 0_usize;

    for record in records {
        match record.error_category {
            Some(category) if !record.correct => *counts.entry(category).or_insert(0) += 1,
            _ => correct += usize::from(record.correct),
        }
    }

    let mut labels = counts
        .into_iter()
        .map(|(category, count)| LabelCount {
            category,
            label: category.label(),
            count,
        })
        .collect::<Vec<_>>();
    labels.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.label.cmp(right.label))
    });

    let total_errors = labels.iter().map(|entry| entry.count).sum::<usize>();
    let total = records.len();
    let average_errors_per_query = if total == 0 {
        0.0
    } else {
        (total_errors as f64 / total as f64 * 100.0).round() / 100.0
    };

    ErrorDistribution {
        labels,
        total_errors,
        correct,
        total,
        average_errors_per_query,
    }
}

fn write_json_response(
    stored: &StoredRun,
    summary: &Summary,
    distribution: &ErrorDistribution,
) -> Result<()> {
    let response = ReportResponse {
        run_id: &stored.run.run_id,
        graph: stored.run.graph,
        started_at: &stored.run.started_at,
        completed_at: &stored.run.completed_at,
        summary,
        distribution,
    };

    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to serialize report json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(
    stored: &StoredRun,
    summary: &Summary,
    distribution: &ErrorDistribution,
    include_records: bool,
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Run: {} ({}) started {} completed {}",
        stored.run.run_id, stored.run.graph, stored.run.started_at, stored.run.completed_at
    )?;
    writeln!(
        output,
        "Summary: total={} correct={} incorrect={} failed={} empty={} accuracy={:.2}%",
        summary.total,
        summary.correct,
        summary.incorrect,
        summary.failed,
        summary.empty,
        summary.accuracy,
    )?;
    writeln!(output, "Error labels:")?;

    if distribution.labels.is_empty() {
        writeln!(output, "\t(none)")?;
    }
    for entry in &distribution.labels {
        writeln!(output, "\t{}\t{}", entry.count, entry.label)?;
    }

    writeln!(
        output,
        "Correctly answered: {}/{}",
        distribution.correct, distribution.total
    )?;
    writeln!(
        output,
        "Average errors per query: {:.2}",
        distribution.average_errors_per_query
    )?;

    if include_records {
        for (index, record) in stored.records.iter().enumerate() {
            if record.correct {
                continue;
            }
            writeln!(
                output,
                "{}.\t{}\t{}",
                index + 1,
                record.category_or_correct().label(),
                record.question
            )?;
            writeln!(output, "\tgold={}", join_values(&record.gold_answers))?;
            writeln!(
                output,
                "\tgenerated={}",
                join_values(&record.generated_answers.display_values())
            )?;
            if let Some(message) = &record.error_message {
                writeln!(output, "\terror={}", first_line(message))?;
            }
        }
    }

    output.flush()?;
    Ok(())
}

fn join_values(values: &BTreeSet<String>) -> String {
    if values.is_empty() {
        return "(none)".to_string();
    }
    values.iter().map(String::as_str).collect::<Vec<_>>().join(" | ")
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{error_distribution, first_line, join_values};
    use crate::model::{AnswerSet, ComparisonRecord, ErrorCategory};

    fn record(category: Option<ErrorCategory>) -> ComparisonRecord {
        ComparisonRecord {
            question: "q".to_string(),
            generated_query: String::new(),
            gold_query: String::new(),
            gold_answers: BTreeSet::from(["a".to_string()]),
            generated_answers: AnswerSet::empty(),
            error_message: None,
            correct: category.is_none(),
            error_category: category,
        }
    }

    #[test]
    fn labels_sort_by_count_then_label() {
        let records = vec![
            record(Some(ErrorCategory::WrongProperty)),
            record(Some(ErrorCategory::WrongEntity)),
            record(Some(ErrorCategory::WrongProperty)),
            record(Some(ErrorCategory::Other)),
            record(None),
        ];

        let distribution = error_distribution(&records);
        let labels = distribution
            .labels
            .iter()
            .map(|entry| (entry.label, entry.count))
            .collect::<Vec<_>>();

        assert_eq!(
            labels,
            vec![("Wrong Property", 2), ("Other", 1), ("Wrong Entity", 1)]
        );
        assert_eq!(distribution.total_errors, 4);
        assert_eq!(distribution.correct, 1);
        assert_eq!(distribution.total, 5);
        assert!((distribution.average_errors_per_query - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn average_is_rounded_to_two_decimals() {
        let records = vec![
            record(Some(ErrorCategory::StructuralError)),
            record(None),
            record(None),
        ];

        let distribution = error_distribution(&records);
        assert!((distribution.average_errors_per_query - 0.33).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_run_has_no_labels() {
        let distribution = error_distribution(&[]);
        assert!(distribution.labels.is_empty());
        assert_eq!(distribution.average_errors_per_query, 0.0);
    }

    #[test]
    fn record_listing_helpers_render_compactly() {
        assert_eq!(join_values(&BTreeSet::new()), "(none)");
        assert_eq!(
            join_values(&AnswerSet::failed().display_values()),
            "Query failed"
        );
        assert_eq!(first_line("QueryBadFormed: bad\n\nResponse:\nx"), "QueryBadFormed: bad");
    }
}
