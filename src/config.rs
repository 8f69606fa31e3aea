use std::time::Duration;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::cli::EvaluateArgs;
use crate::graph::{DEFAULT_TIMEOUT, Graph};

pub const DEFAULT_QUESTION_KEY: &str = "natural_language_question";
pub const DEFAULT_QUERY_KEY: &str = "sparql_query";
pub const GOLD_QUESTION_KEY: &str = "question";

/// Fixed settings of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationConfig {
    pub graph: Graph,
    pub endpoint: String,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub question_key: String,
    pub query_key: String,
    pub gold_question_key: String,
    pub gold_query_key: String,
    pub gold_answers_key: String,
}

impl EvaluationConfig {
    pub fn for_graph(graph: Graph) -> Self {
        let profile = graph.profile();
        Self {
            graph,
            endpoint: profile.default_endpoint.to_string(),
            timeout: DEFAULT_TIMEOUT,
            question_key: DEFAULT_QUESTION_KEY.to_string(),
            query_key: DEFAULT_QUERY_KEY.to_string(),
            gold_question_key: GOLD_QUESTION_KEY.to_string(),
            gold_query_key: profile.gold_query_key.to_string(),
            gold_answers_key: profile.gold_answers_key.to_string(),
        }
    }

    pub fn from_args(args: &EvaluateArgs) -> Result<Self> {
        let mut config = Self::for_graph(args.graph);

        if let Some(endpoint) = args.endpoint.as_deref().map(str::trim) {
            if endpoint.is_empty() {
                bail!("endpoint must not be empty");
            }
            config.endpoint = endpoint.to_string();
        }
        if args.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }
        if args.query_key.trim().is_empty() || args.question_key.trim().is_empty() {
            bail!("dataset keys must not be empty");
        }

        config.timeout = Duration::from_secs(args.timeout_secs);
        config.query_key = args.query_key.clone();
        config.question_key = args.question_key.clone();
        Ok(config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
