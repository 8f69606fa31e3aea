use std::collections::BTreeSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::graph::{GraphProfile, IdentifierPattern, TypeAssertion, Vocabulary};

/// Detects use of a namespace, either through one of its prefix tokens or
/// through a full IRI under one of its roots.
pub(super) struct VocabularyMatcher {
    prefix_pattern: Option<Regex>,
    iris: &'static [&'static str],
}

impl VocabularyMatcher {
    pub(super) fn new(vocabulary: Vocabulary) -> Result<Self> {
        let prefix_pattern = if vocabulary.prefixes.is_empty() {
            None
        } else {
            let alternatives = vocabulary
                .prefixes
                .iter()
                .map(|prefix| regex::escape(prefix))
                .collect::<Vec<String>>()
                .join("|");
            let pattern = format!(r"(?:^|[^\w\-])(?:{alternatives}):");
            Some(
                Regex::new(&pattern)
                    .with_context(|| format!("failed to compile vocabulary regex: {pattern}"))?,
            )
        };

        Ok(Self {
            prefix_pattern,
            iris: vocabulary.iris,
        })
    }

    pub(super) fn is_match(&self, text: &str) -> bool {
        self.prefix_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(text))
            || self.iris.iter().any(|iri| text.contains(iri))
    }
}

/// Pulls identifiers such as `wdt:P17` out of query text, canonicalizing the
/// full-IRI spelling to the compact one.
pub(super) struct IdentifierExtractor {
    prefix: &'static str,
    pattern: Regex,
}

impl IdentifierExtractor {
    pub(super) fn new(identifier: IdentifierPattern) -> Result<Self> {
        let pattern = format!(
            r"(?:^|[^\w\-]){prefix}:({local})\b|<{iri}({local})>",
            prefix = regex::escape(identifier.prefix),
            iri = regex::escape(identifier.iri),
            local = identifier.local,
        );
        let pattern = Regex::new(&pattern)
            .with_context(|| format!("failed to compile identifier regex: {pattern}"))?;

        Ok(Self {
            prefix: identifier.prefix,
            pattern,
        })
    }

    pub(super) fn extract(&self, text: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|captures| captures.get(1).or_else(|| captures.get(2)))
            .map(|local| format!("{}:{}", self.prefix, local.as_str()))
            .collect()
    }
}

pub(super) enum TypeAssertionMatcher {
    Property(&'static str),
    Predicate {
        compact: &'static str,
        iri: &'static str,
        keyword: Regex,
    },
}

impl TypeAssertionMatcher {
    pub(super) fn new(assertion: TypeAssertion) -> Result<Self> {
        match assertion {
            TypeAssertion::Property(identifier) => Ok(Self::Property(identifier)),
            TypeAssertion::Predicate { compact, iri } => {
                let keyword = Regex::new(r"(?:^|[\s;,{.])a\s+(?:[?$<]|[A-Za-z][\w\-]*:)")
                    .context("failed to compile type keyword regex")?;
                Ok(Self::Predicate {
                    compact,
                    iri,
                    keyword,
                })
            }
        }
    }

    fn is_present(&self, text: &str, property_ids: &BTreeSet<String>) -> bool {
        match self {
            Self::Property(identifier) => property_ids.contains(*identifier),
            Self::Predicate {
                compact,
                iri,
                keyword,
            } => text.contains(compact) || text.contains(iri) || keyword.is_match(text),
        }
    }
}

/// Matchers compiled once per graph.
pub(super) struct FeatureExtractor {
    own: VocabularyMatcher,
    foreign: VocabularyMatcher,
    instance: VocabularyMatcher,
    schema: VocabularyMatcher,
    property_ids: Option<IdentifierExtractor>,
    entity_ids: Option<IdentifierExtractor>,
    type_assertion: TypeAssertionMatcher,
}

/// Lexical signals of a single query, read after boilerplate prefixes are
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFeatures {
    pub uses_own_vocabulary: bool,
    pub uses_foreign_vocabulary: bool,
    pub uses_instance_terms: bool,
    pub uses_schema_terms: bool,
    pub property_ids: BTreeSet<String>,
    pub entity_ids: BTreeSet<String>,
    pub has_type_assertion: bool,
    pub length: usize,
}

impl FeatureExtractor {
    pub(super) fn new(profile: &GraphProfile) -> Result<Self> {
        Ok(Self {
            own: VocabularyMatcher::new(profile.own_vocabulary)?,
            foreign: VocabularyMatcher::new(profile.foreign_vocabulary)?,
            instance: VocabularyMatcher::new(profile.terms.instance)?,
            schema: VocabularyMatcher::new(profile.terms.schema)?,
            property_ids: profile.property_ids.map(IdentifierExtractor::new).transpose()?,
            entity_ids: profile.entity_ids.map(IdentifierExtractor::new).transpose()?,
            type_assertion: TypeAssertionMatcher::new(profile.type_assertion)?,
        })
    }

    pub(super) fn extract(&self, text: &str) -> QueryFeatures {
        let property_ids = self
            .property_ids
            .as_ref()
            .map(|extractor| extractor.extract(text))
            .unwrap_or_default();
        let entity_ids = self
            .entity_ids
            .as_ref()
            .map(|extractor| extractor.extract(text))
            .unwrap_or_default();
        let has_type_assertion = self.type_assertion.is_present(text, &property_ids);

        QueryFeatures {
            uses_own_vocabulary: self.own.is_match(text),
            uses_foreign_vocabulary: self.foreign.is_match(text),
            uses_instance_terms: self.instance.is_match(text),
            uses_schema_terms: self.schema.is_match(text),
            property_ids,
            entity_ids,
            has_type_assertion,
            length: text.chars().count(),
        }
    }
}
