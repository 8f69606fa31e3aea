use crate::graph::{Graph, GraphProfile};
use crate::model::{AnswerSet, ErrorCategory};

use super::features::QueryFeatures;

/// Everything a rule may look at for one non-matching record.
pub struct RuleInput<'a> {
    pub profile: &'static GraphProfile,
    pub generated: &'a QueryFeatures,
    pub gold: &'a QueryFeatures,
    pub answers: &'a AnswerSet,
    pub error_message: Option<&'a str>,
}

pub struct Rule {
    pub name: &'static str,
    pub category: ErrorCategory,
    pub applies: fn(&RuleInput<'_>) -> bool,
}

/// Rules in precedence order; the first one that applies decides.
pub fn rules_for(graph: Graph) -> &'static [Rule] {
    match graph {
        Graph::Wikidata => WIKIDATA_RULES,
        Graph::Dbpedia => DBPEDIA_RULES,
    }
}

const UNADAPTED_DATASET_PATTERNS: Rule = Rule {
    name: "foreign_vocabulary",
    category: ErrorCategory::UnadaptedDatasetPatterns,
    applies: foreign_vocabulary,
};

const QUERY_BAD_FORMED: Rule = Rule {
    name: "malformed_query",
    category: ErrorCategory::QueryBadFormed,
    applies: malformed_query,
};

const STRUCTURAL_ERROR: Rule = Rule {
    name: "empty_without_error",
    category: ErrorCategory::StructuralError,
    applies: empty_without_error,
};

static WIKIDATA_RULES: &[Rule] = &[
    UNADAPTED_DATASET_PATTERNS,
    QUERY_BAD_FORMED,
    Rule {
        name: "entity_without_property",
        category: ErrorCategory::PropertyTreatedAsEntity,
        applies: entity_without_property,
    },
    Rule {
        name: "property_without_entity",
        category: ErrorCategory::EntityTreatedAsProperty,
        applies: property_without_entity,
    },
    Rule {
        name: "missing_instance_of",
        category: ErrorCategory::MissingInstanceOf,
        applies: missing_type_assertion,
    },
    Rule {
        name: "empty_with_different_properties",
        category: ErrorCategory::WrongProperty,
        applies: empty_with_different_properties,
    },
    Rule {
        name: "gold_property_missing",
        category: ErrorCategory::WrongProperty,
        applies: gold_property_missing,
    },
    Rule {
        name: "empty_with_different_entities",
        category: ErrorCategory::WrongEntity,
        applies: empty_with_different_entities,
    },
    Rule {
        name: "gold_entity_missing",
        category: ErrorCategory::WrongEntity,
        applies: gold_entity_missing,
    },
    STRUCTURAL_ERROR,
];

static DBPEDIA_RULES: &[Rule] = &[
    UNADAPTED_DATASET_PATTERNS,
    QUERY_BAD_FORMED,
    Rule {
        name: "resource_without_ontology",
        category: ErrorCategory::OntologyTreatedAsResource,
        applies: resource_without_ontology,
    },
    Rule {
        name: "ontology_without_resource",
        category: ErrorCategory::ResourceTreatedAsOntology,
        applies: ontology_without_resource,
    },
    Rule {
        name: "missing_type_assertion",
        category: ErrorCategory::MissingTypeAssertion,
        applies: missing_type_assertion,
    },
    Rule {
        name: "empty_and_short",
        category: ErrorCategory::IncompleteQuery,
        applies: empty_and_short,
    },
    STRUCTURAL_ERROR,
];

pub(super) fn foreign_vocabulary(input: &RuleInput<'_>) -> bool {
    input.generated.uses_foreign_vocabulary && !input.generated.uses_own_vocabulary
}

pub(super) fn malformed_query(input: &RuleInput<'_>) -> bool {
    input.answers.is_failed()
        && input
            .error_message
            .is_some_and(|message| message.contains(input.profile.malformed_signal))
}

fn gold_uses_both_term_kinds(input: &RuleInput<'_>) -> bool {
    input.gold.uses_instance_terms && input.gold.uses_schema_terms
}

pub(super) fn entity_without_property(input: &RuleInput<'_>) -> bool {
    input.generated.uses_instance_terms
        && !input.generated.uses_schema_terms
        && gold_uses_both_term_kinds(input)
}

pub(super) fn property_without_entity(input: &RuleInput<'_>) -> bool {
    input.generated.uses_schema_terms
        && !input.generated.uses_instance_terms
        && gold_uses_both_term_kinds(input)
}

pub(super) fn resource_without_ontology(input: &RuleInput<'_>) -> bool {
    input.generated.uses_instance_terms
        && !input.generated.uses_schema_terms
        && input.gold.uses_schema_terms
}

pub(super) fn ontology_without_resource(input: &RuleInput<'_>) -> bool {
    input.generated.uses_schema_terms
        && !input.generated.uses_instance_terms
        && input.gold.uses_instance_terms
}

pub(super) fn missing_type_assertion(input: &RuleInput<'_>) -> bool {
    input.gold.has_type_assertion && !input.generated.has_type_assertion
}

pub(super) fn empty_with_different_properties(input: &RuleInput<'_>) -> bool {
    input.answers.is_empty()
        && !input.gold.property_ids.is_empty()
        && !input.generated.property_ids.is_empty()
        && input.gold.property_ids != input.generated.property_ids
}

pub(super) fn gold_property_missing(input: &RuleInput<'_>) -> bool {
    !input
        .gold
        .property_ids
        .is_subset(&input.generated.property_ids)
}

pub(super) fn empty_with_different_entities(input: &RuleInput<'_>) -> bool {
    input.answers.is_empty()
        && !input.gold.entity_ids.is_empty()
        && !input.generated.entity_ids.is_empty()
        && input.gold.entity_ids != input.generated.entity_ids
}

pub(super) fn gold_entity_missing(input: &RuleInput<'_>) -> bool {
    !input.gold.entity_ids.is_subset(&input.generated.entity_ids)
}

pub(super) fn empty_and_short(input: &RuleInput<'_>) -> bool {
    input.answers.is_empty()
        && (input.generated.length as f64)
            < input.gold.length as f64 * input.profile.incomplete_length_ratio
}

pub(super) fn empty_without_error(input: &RuleInput<'_>) -> bool {
    input.answers.is_empty() && input.error_message.is_none()
}
