use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::EvaluationConfig;
use crate::evaluation::answers::{is_correct, normalize};
use crate::evaluation::classify::Classifier;
use crate::evaluation::executor::QueryExecutor;
use crate::evaluation::prefixes::reconcile;
use crate::model::{ComparisonRecord, ExecutionResult, GoldIndex, QueryRecord, Summary};

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub records: Vec<ComparisonRecord>,
    pub summary: Summary,
    /// Dataset entries without a generated query.
    pub skipped: usize,
}

/// Runs each generated query through reconcile, execute, normalize, compare
/// and, on mismatch, classify. Records are processed strictly in order.
pub struct Evaluator<'a> {
    config: &'a EvaluationConfig,
    executor: &'a dyn QueryExecutor,
    classifier: Classifier,
}

impl<'a> Evaluator<'a> {
    pub fn new(config: &'a EvaluationConfig, executor: &'a dyn QueryExecutor) -> Result<Self> {
        Ok(Self {
            config,
            executor,
            classifier: Classifier::new(config.graph)?,
        })
    }

    pub fn evaluate(&self, dataset: &[QueryRecord], gold_index: &GoldIndex) -> EvaluationOutcome {
        let mut records = Vec::with_capacity(dataset.len());
        let mut summary = Summary::default();
        let mut skipped = 0_usize;

        info!(
            graph = %self.config.graph,
            endpoint = %self.config.endpoint,
            entries = dataset.len(),
            gold_questions = gold_index.len(),
            "evaluating generated queries"
        );

        for (index, entry) in dataset.iter().enumerate() {
            if entry.generated_query.is_empty() {
                debug!(index, question = %entry.question, "skipping entry without generated query");
                skipped += 1;
                continue;
            }

            let record = self.evaluate_one(entry, gold_index);
            summary.record(&record);
            records.push(record);
        }

        summary.finalize();
        info!(
            total = summary.total,
            correct = summary.correct,
            incorrect = summary.incorrect,
            failed = summary.failed,
            empty = summary.empty,
            skipped,
            accuracy = format_args!("{:.2}%", summary.accuracy),
            "evaluation completed"
        );

        EvaluationOutcome {
            records,
            summary,
            skipped,
        }
    }

    pub fn evaluate_one(&self, entry: &QueryRecord, gold_index: &GoldIndex) -> ComparisonRecord {
        let graph = self.config.graph;
        let query = reconcile(&entry.generated_query, graph);

        let result = self
            .executor
            .execute(&self.config.endpoint, &query, self.config.timeout);
        let error_message = match &result {
            ExecutionResult::Failure(message) => Some(message.clone()),
            _ => None,
        };
        let answers = normalize(&result);

        let gold = gold_index.get(&entry.question);
        if gold.is_none() {
            warn!(question = %entry.question, "question missing from solution file");
        }
        let gold_answers = gold
            .map(|gold| gold.gold_answers.clone())
            .unwrap_or_default();
        let gold_query = gold.map(|gold| gold.gold_query.clone()).unwrap_or_default();

        let correct = is_correct(&gold_answers, &answers);
        let error_category = if correct {
            None
        } else {
            let classification =
                self.classifier
                    .classify(&query, &gold_query, &answers, error_message.as_deref());
            debug!(
                question = %entry.question,
                category = classification.category.as_str(),
                rule = classification.rule.unwrap_or("fallback"),
                "classified mismatch"
            );
            Some(classification.category)
        };

        debug!(
            question = %entry.question,
            status = answers.status.as_str(),
            answers = answers.values.len(),
            correct,
            "evaluated query"
        );

        ComparisonRecord {
            question: entry.question.clone(),
            generated_query: query,
            gold_query,
            gold_answers,
            generated_answers: answers,
            error_message,
            correct,
            error_category,
        }
    }
}
