//! Error classification for records whose answers did not match gold.
//!
//! Each graph owns an ordered rule list. Rules read lexical
//! features of the generated and gold queries after boilerplate prefixes are
//! stripped, plus the answer status and execution error. The first rule that
//! applies decides the category; a record no rule explains is `Other`.

use anyhow::Result;

use crate::evaluation::prefixes::strip_known_prefixes;
use crate::graph::{Graph, GraphProfile};
use crate::model::{AnswerSet, ErrorCategory};

mod features;
mod rules;

use features::FeatureExtractor;
pub use features::QueryFeatures;
use rules::{RuleInput, rules_for};

/// Category together with the name of the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub rule: Option<&'static str>,
}

pub struct Classifier {
    graph: Graph,
    profile: &'static GraphProfile,
    extractor: FeatureExtractor,
}

impl Classifier {
    pub fn new(graph: Graph) -> Result<Self> {
        let profile = graph.profile();
        Ok(Self {
            graph,
            profile,
            extractor: FeatureExtractor::new(profile)?,
        })
    }

    pub fn features(&self, query: &str) -> QueryFeatures {
        self.extractor
            .extract(&strip_known_prefixes(query, self.graph))
    }

    pub fn classify(
        &self,
        generated_query: &str,
        gold_query: &str,
        answers: &AnswerSet,
        error_message: Option<&str>,
    ) -> Classification {
        let generated = self.features(generated_query);
        let gold = self.features(gold_query);
        let input = RuleInput {
            profile: self.profile,
            generated: &generated,
            gold: &gold,
            answers,
            error_message,
        };

        rules_for(self.graph)
            .iter()
            .find(|rule| (rule.applies)(&input))
            .map(|rule| Classification {
                category: rule.category,
                rule: Some(rule.name),
            })
            .unwrap_or(Classification {
                category: ErrorCategory::Other,
                rule: None,
            })
    }
}
