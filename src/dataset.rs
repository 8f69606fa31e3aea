use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::EvaluationConfig;
use crate::model::{GoldIndex, GoldRecord, QueryRecord};
use crate::util::read_json;

pub fn load_dataset(path: &Path, config: &EvaluationConfig) -> Result<Vec<QueryRecord>> {
    let entries = read_entries(path)?;
    let records = parse_dataset(&entries, config);

    info!(
        path = %path.display(),
        entries = records.len(),
        query_key = %config.query_key,
        "loaded dataset"
    );
    Ok(records)
}

pub fn load_gold_index(path: &Path, config: &EvaluationConfig) -> Result<GoldIndex> {
    let entries = read_entries(path)?;
    let index = parse_gold_index(&entries, config);

    info!(
        path = %path.display(),
        questions = index.len(),
        answers_key = %config.gold_answers_key,
        "loaded solution file"
    );
    Ok(index)
}

fn read_entries(path: &Path) -> Result<Vec<Value>> {
    let value: Value = read_json(path)?;
    match value {
        Value::Array(entries) => Ok(entries),
        other => bail!(
            "expected a JSON array in {}, found {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

/// Entries lacking a question or query keep empty strings; the evaluator
/// decides what to skip.
pub fn parse_dataset(entries: &[Value], config: &EvaluationConfig) -> Vec<QueryRecord> {
    entries
        .iter()
        .map(|entry| QueryRecord {
            question: string_field(entry, &config.question_key),
            generated_query: string_field(entry, &config.query_key),
        })
        .collect()
}

pub fn parse_gold_index(entries: &[Value], config: &EvaluationConfig) -> GoldIndex {
    let mut index = GoldIndex::new();

    for (position, entry) in entries.iter().enumerate() {
        let Some(question) = entry
            .get(&config.gold_question_key)
            .and_then(Value::as_str)
        else {
            warn!(position, "solution entry without question skipped");
            continue;
        };

        let record = GoldRecord {
            question: question.to_string(),
            gold_query: string_field(entry, &config.gold_query_key),
            gold_answers: answer_values(entry.get(&config.gold_answers_key)),
        };

        if index.insert(question.to_string(), record).is_some() {
            warn!(position, question, "duplicate solution question; keeping the later entry");
        }
    }

    index
}

fn string_field(entry: &Value, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn answer_values(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(answer_text).collect(),
        Some(single) => answer_text(single).into_iter().collect(),
        None => BTreeSet::new(),
    }
}

fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{load_dataset, load_gold_index, parse_dataset, parse_gold_index};
    use crate::config::EvaluationConfig;
    use crate::graph::Graph;

    #[test]
    fn dataset_reads_configured_query_key() {
        let mut config = EvaluationConfig::for_graph(Graph::Wikidata);
        config.query_key = "generated".to_string();
        let entries = vec![
            json!({"natural_language_question": "q1", "generated": "SELECT 1"}),
            json!({"natural_language_question": "q2", "sparql_query": "ignored"}),
        ];

        let records = parse_dataset(&entries, &config);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].generated_query, "SELECT 1");
        assert_eq!(records[1].generated_query, "");
    }

    #[test]
    fn gold_index_uses_graph_specific_keys() {
        let config = EvaluationConfig::for_graph(Graph::Dbpedia);
        let entries = vec![json!({
            "question": "Is Berlin in Germany?",
            "wikidata_query": "ASK { wd:Q64 wdt:P17 wd:Q183 }",
            "wikidata_results": ["ignored"],
            "dbpedia_query": "ASK { dbr:Berlin dbo:country dbr:Germany }",
            "dbpedia_results": [true]
        })];

        let index = parse_gold_index(&entries, &config);
        let gold = index.get("Is Berlin in Germany?").expect("gold entry");
        assert_eq!(gold.gold_query, "ASK { dbr:Berlin dbo:country dbr:Germany }");
        assert_eq!(
            gold.gold_answers.iter().collect::<Vec<_>>(),
            vec!["True"]
        );
    }

    #[test]
    fn gold_answers_default_to_empty_and_numbers_render_as_text() {
        let config = EvaluationConfig::for_graph(Graph::Wikidata);
        let entries = vec![
            json!({"question": "How many?", "wikidata_results": [42, "42", null]}),
            json!({"question": "Unanswered"}),
            json!({"no_question": true}),
        ];

        let index = parse_gold_index(&entries, &config);
        assert_eq!(index.len(), 2);
        assert_eq!(index["How many?"].gold_answers.len(), 1);
        assert!(index["Unanswered"].gold_answers.is_empty());
        assert!(index["Unanswered"].gold_query.is_empty());
    }

    #[test]
    fn duplicate_questions_keep_the_later_entry() {
        let config = EvaluationConfig::for_graph(Graph::Wikidata);
        let entries = vec![
            json!({"question": "q", "wikidata_results": ["first"]}),
            json!({"question": "q", "wikidata_results": ["second"]}),
        ];

        let index = parse_gold_index(&entries, &config);
        assert!(index["q"].gold_answers.contains("second"));
    }

    #[test]
    fn files_must_hold_json_arrays() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let config = EvaluationConfig::for_graph(Graph::Wikidata);

        let object_path = dir.path().join("object.json");
        std::fs::write(&object_path, r#"{"question": "q"}"#).expect("write");
        let error = load_gold_index(&object_path, &config).expect_err("object is rejected");
        assert!(error.to_string().contains("expected a JSON array"));

        let dataset_path = dir.path().join("dataset.json");
        std::fs::write(
            &dataset_path,
            r#"[{"natural_language_question": "q", "sparql_query": "ASK {}"}]"#,
        )
        .expect("write");
        let records = load_dataset(&dataset_path, &config).expect("dataset loads");
        assert_eq!(records[0].question, "q");
    }
}
