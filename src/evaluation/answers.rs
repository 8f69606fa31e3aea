use std::collections::BTreeSet;

use crate::model::{AnswerSet, AnswerStatus, ExecutionResult};

/// Flattens an execution result into its canonical answer set. Row order,
/// variable order and duplicates do not survive.
pub fn normalize(result: &ExecutionResult) -> AnswerSet {
    match result {
        ExecutionResult::Failure(_) => AnswerSet::failed(),
        ExecutionResult::Boolean(value) => {
            let label = if *value { "True" } else { "False" };
            AnswerSet::ok(BTreeSet::from([label.to_string()]))
        }
        ExecutionResult::Success(bindings) => {
            let values = bindings
                .iter()
                .flat_map(|row| row.values().cloned())
                .collect::<BTreeSet<String>>();
            if values.is_empty() {
                AnswerSet::empty()
            } else {
                AnswerSet::ok(values)
            }
        }
    }
}

/// Exact set equality against a non-empty gold set. An empty gold set never
/// matches, not even an empty answer.
pub fn is_correct(gold: &BTreeSet<String>, generated: &AnswerSet) -> bool {
    !gold.is_empty() && generated.status == AnswerStatus::Ok && *gold == generated.values
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::{is_correct, normalize};
    use crate::model::{AnswerSet, AnswerStatus, ExecutionResult, NO_ANSWER_LABEL};

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn failure_normalizes_to_failed_regardless_of_message() {
        for message in ["", "timed out", "QueryBadFormed: bad request", "No answer"] {
            let answers = normalize(&ExecutionResult::Failure(message.to_string()));
            assert_eq!(answers.status, AnswerStatus::Failed);
            assert_eq!(answers.display_values(), set(&["Query failed"]));
        }
    }

    #[test]
    fn boolean_result_becomes_capitalized_literal() {
        assert_eq!(
            normalize(&ExecutionResult::Boolean(true)),
            AnswerSet::ok(set(&["True"]))
        );
        assert_eq!(
            normalize(&ExecutionResult::Boolean(false)),
            AnswerSet::ok(set(&["False"]))
        );
    }

    #[test]
    fn bindings_flatten_across_rows_and_variables() {
        let result = ExecutionResult::Success(vec![
            row(&[("city", "Paris"), ("country", "France")]),
            row(&[("city", "Lyon"), ("country", "France")]),
        ]);

        assert_eq!(
            normalize(&result),
            AnswerSet::ok(set(&["France", "Lyon", "Paris"]))
        );
    }

    #[test]
    fn zero_bindings_is_empty() {
        let answers = normalize(&ExecutionResult::Success(Vec::new()));
        assert_eq!(answers.status, AnswerStatus::Empty);
        assert_eq!(answers.display_values(), set(&[NO_ANSWER_LABEL]));

        let unbound_rows = normalize(&ExecutionResult::Success(vec![BTreeMap::new()]));
        assert!(unbound_rows.is_empty());
    }

    #[test]
    fn matching_sets_are_correct() {
        assert!(is_correct(&set(&["Paris"]), &AnswerSet::ok(set(&["Paris"]))));
        assert!(!is_correct(
            &set(&["Paris"]),
            &AnswerSet::ok(set(&["Paris", "Lyon"]))
        ));
        assert!(!is_correct(&set(&["paris"]), &AnswerSet::ok(set(&["Paris"]))));
    }

    #[test]
    fn empty_gold_is_never_correct() {
        let gold = BTreeSet::new();
        assert!(!is_correct(&gold, &AnswerSet::empty()));
        assert!(!is_correct(&gold, &AnswerSet::ok(BTreeSet::new())));
        assert!(!is_correct(&gold, &AnswerSet::failed()));
    }

    #[test]
    fn sentinel_text_in_gold_does_not_match_a_failure() {
        assert!(!is_correct(&set(&["Query failed"]), &AnswerSet::failed()));
        assert!(!is_correct(&set(&["No answer"]), &AnswerSet::empty()));
    }
}
