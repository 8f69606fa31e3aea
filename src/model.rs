use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

/// One generated query taken from the dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub question: String,
    pub generated_query: String,
}

/// Reference query and answers for a question, taken from the solution file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoldRecord {
    pub question: String,
    pub gold_query: String,
    pub gold_answers: BTreeSet<String>,
}

/// Gold records keyed by exact question text.
pub type GoldIndex = BTreeMap<String, GoldRecord>;

/// Outcome of running a query against an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Each row maps variable names to bound values.
    Success(Vec<BTreeMap<String, String>>),
    Boolean(bool),
    Failure(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Ok,
    Failed,
    Empty,
}

impl AnswerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Empty => "empty",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(Self::Ok),
            "failed" => Some(Self::Failed),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

pub const QUERY_FAILED_LABEL: &str = "Query failed";
pub const NO_ANSWER_LABEL: &str = "No answer";

/// Canonical answers of one execution. `values` holds real answers only; the
/// failure and absence cases are carried by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    pub status: AnswerStatus,
    pub values: BTreeSet<String>,
}

impl AnswerSet {
    pub fn ok(values: BTreeSet<String>) -> Self {
        Self {
            status: AnswerStatus::Ok,
            values,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: AnswerStatus::Failed,
            values: BTreeSet::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            status: AnswerStatus::Empty,
            values: BTreeSet::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnswerStatus::Failed
    }

    pub fn is_empty(&self) -> bool {
        self.status == AnswerStatus::Empty
    }

    /// Values as shown in reports, with the sentinel label standing in for a
    /// failed or answer-less execution.
    pub fn display_values(&self) -> BTreeSet<String> {
        match self.status {
            AnswerStatus::Ok => self.values.clone(),
            AnswerStatus::Failed => BTreeSet::from([QUERY_FAILED_LABEL.to_string()]),
            AnswerStatus::Empty => BTreeSet::from([NO_ANSWER_LABEL.to_string()]),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Correct,
    UnadaptedDatasetPatterns,
    QueryBadFormed,
    PropertyTreatedAsEntity,
    EntityTreatedAsProperty,
    MissingInstanceOf,
    WrongProperty,
    WrongEntity,
    OntologyTreatedAsResource,
    ResourceTreatedAsOntology,
    MissingTypeAssertion,
    IncompleteQuery,
    StructuralError,
    Other,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 14] = [
        Self::Correct,
        Self::UnadaptedDatasetPatterns,
        Self::QueryBadFormed,
        Self::PropertyTreatedAsEntity,
        Self::EntityTreatedAsProperty,
        Self::MissingInstanceOf,
        Self::WrongProperty,
        Self::WrongEntity,
        Self::OntologyTreatedAsResource,
        Self::ResourceTreatedAsOntology,
        Self::MissingTypeAssertion,
        Self::IncompleteQuery,
        Self::StructuralError,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::UnadaptedDatasetPatterns => "unadapted_dataset_patterns",
            Self::QueryBadFormed => "query_bad_formed",
            Self::PropertyTreatedAsEntity => "property_treated_as_entity",
            Self::EntityTreatedAsProperty => "entity_treated_as_property",
            Self::MissingInstanceOf => "missing_instance_of",
            Self::WrongProperty => "wrong_property",
            Self::WrongEntity => "wrong_entity",
            Self::OntologyTreatedAsResource => "ontology_treated_as_resource",
            Self::ResourceTreatedAsOntology => "resource_treated_as_ontology",
            Self::MissingTypeAssertion => "missing_type_assertion",
            Self::IncompleteQuery => "incomplete_query",
            Self::StructuralError => "structural_error",
            Self::Other => "other",
        }
    }

    /// Human-readable label used in text reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::UnadaptedDatasetPatterns => "Unadapted Dataset Patterns",
            Self::QueryBadFormed => "Query Bad Formed",
            Self::PropertyTreatedAsEntity => "Property treated as Entity",
            Self::EntityTreatedAsProperty => "Entity treated as Property",
            Self::MissingInstanceOf => "Missing P31",
            Self::WrongProperty => "Wrong Property",
            Self::WrongEntity => "Wrong Entity",
            Self::OntologyTreatedAsResource => "Ontology treated as Resource",
            Self::ResourceTreatedAsOntology => "Resource treated as Ontology",
            Self::MissingTypeAssertion => "Missing rdf:type",
            Self::IncompleteQuery => "Incomplete Query",
            Self::StructuralError => "Structural Error",
            Self::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub question: String,
    /// Query text as sent to the endpoint, prefixes included.
    pub generated_query: String,
    pub gold_query: String,
    pub gold_answers: BTreeSet<String>,
    pub generated_answers: AnswerSet,
    pub error_message: Option<String>,
    pub correct: bool,
    pub error_category: Option<ErrorCategory>,
}

impl ComparisonRecord {
    pub fn category_or_correct(&self) -> ErrorCategory {
        self.error_category.unwrap_or(ErrorCategory::Correct)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub correct: usize,
    /// Wrong answers from queries that did execute and return something.
    pub incorrect: usize,
    pub failed: usize,
    pub empty: usize,
    /// Percentage of `correct` over `total`.
    pub accuracy: f64,
    pub category_counts: BTreeMap<ErrorCategory, usize>,
}

impl Summary {
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        let mut summary = Summary::default();
        for record in records {
            summary.record(record);
        }
        summary.finalize();
        summary
    }

    pub fn record(&mut self, record: &ComparisonRecord) {
        self.total += 1;
        if record.correct {
            self.correct += 1;
        }
        match record.generated_answers.status {
            AnswerStatus::Failed => self.failed += 1,
            AnswerStatus::Empty => self.empty += 1,
            AnswerStatus::Ok if !record.correct => self.incorrect += 1,
            AnswerStatus::Ok => {}
        }
        *self
            .category_counts
            .entry(record.category_or_correct())
            .or_insert(0) += 1;
    }

    pub fn finalize(&mut self) {
        self.accuracy = if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        };
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub graph: Graph,
    pub generated_at: String,
    pub summary: Summary,
    pub records: Vec<ComparisonRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputFileDigest {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub command: String,
    pub graph: Graph,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub query_key: String,
    pub dataset: InputFileDigest,
    pub solution: InputFileDigest,
    pub db_path: Option<String>,
    pub report_path: String,
    pub dataset_entries: usize,
    pub skipped_entries: usize,
    pub summary: Summary,
}
