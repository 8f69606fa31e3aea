use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const WIKIDATA_PREFIX_BLOCK: &str = "
PREFIX wdt: <http://www.wikidata.org/prop/direct/>
PREFIX wd: <http://www.wikidata.org/entity/>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX p: <http://www.wikidata.org/prop/>
PREFIX ps: <http://www.wikidata.org/prop/statement/>
PREFIX pq: <http://www.wikidata.org/prop/qualifier/>
";

const DBPEDIA_PREFIX_BLOCK: &str = "
PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX res: <http://dbpedia.org/resource/>
PREFIX yago: <http://dbpedia.org/class/yago/>
PREFIX onto: <http://dbpedia.org/ontology/>
PREFIX dbp: <http://dbpedia.org/property/>
PREFIX dbr: <http://dbpedia.org/resource/>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX dbc: <http://dbpedia.org/resource/Category:>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
";

const DBPEDIA_REQUIRED_PREFIXES: &[&str] = &[
    "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>",
    "PREFIX dbo: <http://dbpedia.org/ontology/>",
    "PREFIX dbr: <http://dbpedia.org/resource/>",
];

const WIKIDATA_VOCABULARY: Vocabulary = Vocabulary {
    prefixes: &["wd", "wdt", "p", "ps", "pq"],
    iris: &["http://www.wikidata.org/"],
};

const DBPEDIA_VOCABULARY: Vocabulary = Vocabulary {
    prefixes: &["dbo", "dbp", "dbr", "dbc", "dct", "rdf"],
    iris: &["http://dbpedia.org/"],
};

/// Knowledge graphs an evaluation run can target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Graph {
    /// Statement-oriented graph (`wd:`/`wdt:` identifiers).
    Wikidata,
    /// Resource/ontology-oriented graph (`dbr:`/`dbo:` namespaces).
    Dbpedia,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown knowledge graph '{0}'; expected 'wikidata' or 'dbpedia'")]
    Unknown(String),
}

impl Graph {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wikidata => "wikidata",
            Self::Dbpedia => "dbpedia",
        }
    }

    pub fn profile(self) -> &'static GraphProfile {
        match self {
            Self::Wikidata => &WIKIDATA_PROFILE,
            Self::Dbpedia => &DBPEDIA_PROFILE,
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Graph {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wikidata" => Ok(Self::Wikidata),
            "dbpedia" => Ok(Self::Dbpedia),
            _ => Err(GraphError::Unknown(value.to_string())),
        }
    }
}

/// A namespace expressed both as compact prefix tokens and as IRI roots.
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub prefixes: &'static [&'static str],
    pub iris: &'static [&'static str],
}

/// How a graph expects missing prefix declarations to be supplied.
#[derive(Debug, Clone, Copy)]
pub enum PrefixPolicy {
    /// Prepend the whole block unless the query already opens with `PREFIX`.
    WholeBlock(&'static str),
    /// Prepend each listed declaration that is absent from the query.
    Required(&'static [&'static str]),
}

/// Namespace pair the classifier contrasts when it looks for one kind of term
/// standing in for the other.
#[derive(Debug, Clone, Copy)]
pub struct TermNamespaces {
    /// `wd:` on the statement graph, `dbr:` on the resource graph.
    pub instance: Vocabulary,
    /// `wdt:` on the statement graph, `dbo:` on the resource graph.
    pub schema: Vocabulary,
}

/// Compact identifier such as `wdt:P31`, also recognized in full-IRI form.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierPattern {
    pub prefix: &'static str,
    pub iri: &'static str,
    /// Regex for the local part after the prefix or IRI root.
    pub local: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub enum TypeAssertion {
    /// A property identifier that must appear among the extracted property ids.
    Property(&'static str),
    /// A type predicate written compactly, as a full IRI, or as the `a` keyword.
    Predicate {
        compact: &'static str,
        iri: &'static str,
    },
}

#[derive(Debug)]
pub struct GraphProfile {
    pub default_endpoint: &'static str,
    pub gold_query_key: &'static str,
    pub gold_answers_key: &'static str,
    pub prefix_policy: PrefixPolicy,
    /// Exact substrings removed before lexical feature extraction, in order.
    pub strip_blocks: &'static [&'static str],
    pub own_vocabulary: Vocabulary,
    pub foreign_vocabulary: Vocabulary,
    pub terms: TermNamespaces,
    pub property_ids: Option<IdentifierPattern>,
    pub entity_ids: Option<IdentifierPattern>,
    pub type_assertion: TypeAssertion,
    /// Marker the executor embeds in the failure message of a rejected query.
    pub malformed_signal: &'static str,
    /// Answer-less queries shorter than this share of the gold query length
    /// count as incomplete.
    pub incomplete_length_ratio: f64,
}

pub static WIKIDATA_PROFILE: GraphProfile = GraphProfile {
    default_endpoint: "http://localhost:7001",
    gold_query_key: "wikidata_query",
    gold_answers_key: "wikidata_results",
    prefix_policy: PrefixPolicy::WholeBlock(WIKIDATA_PREFIX_BLOCK),
    strip_blocks: &[
        WIKIDATA_PREFIX_BLOCK.trim_ascii_end(),
        WIKIDATA_PREFIX_BLOCK.trim_ascii(),
    ],
    own_vocabulary: WIKIDATA_VOCABULARY,
    foreign_vocabulary: DBPEDIA_VOCABULARY,
    terms: TermNamespaces {
        instance: Vocabulary {
            prefixes: &["wd"],
            iris: &["http://www.wikidata.org/entity/"],
        },
        schema: Vocabulary {
            prefixes: &["wdt"],
            iris: &["http://www.wikidata.org/prop/direct/"],
        },
    },
    property_ids: Some(IdentifierPattern {
        prefix: "wdt",
        iri: "http://www.wikidata.org/prop/direct/",
        local: r"P\d+",
    }),
    entity_ids: Some(IdentifierPattern {
        prefix: "wd",
        iri: "http://www.wikidata.org/entity/",
        local: r"Q\d+",
    }),
    type_assertion: TypeAssertion::Property("wdt:P31"),
    malformed_signal: "QueryBadFormed",
    incomplete_length_ratio: 0.6,
};

pub static DBPEDIA_PROFILE: GraphProfile = GraphProfile {
    default_endpoint: "http://localhost:7012",
    gold_query_key: "dbpedia_query",
    gold_answers_key: "dbpedia_results",
    prefix_policy: PrefixPolicy::Required(DBPEDIA_REQUIRED_PREFIXES),
    strip_blocks: &[
        DBPEDIA_PREFIX_BLOCK.trim_ascii_end(),
        DBPEDIA_PREFIX_BLOCK.trim_ascii(),
        DBPEDIA_REQUIRED_PREFIXES[0],
        DBPEDIA_REQUIRED_PREFIXES[1],
        DBPEDIA_REQUIRED_PREFIXES[2],
    ],
    own_vocabulary: Vocabulary {
        prefixes: &[
            "dbo",
            "dbp",
            "dbr",
            "dbc",
            "dct",
            "res",
            "onto",
            "yago",
            "dbpedia-ontology",
            "dbpedia-resource",
        ],
        iris: &["http://dbpedia.org/"],
    },
    foreign_vocabulary: WIKIDATA_VOCABULARY,
    terms: TermNamespaces {
        instance: Vocabulary {
            prefixes: &["dbr", "res", "dbpedia-resource"],
            iris: &["http://dbpedia.org/resource/"],
        },
        schema: Vocabulary {
            prefixes: &["dbo", "onto", "dbpedia-ontology"],
            iris: &["http://dbpedia.org/ontology/"],
        },
    },
    property_ids: None,
    entity_ids: None,
    type_assertion: TypeAssertion::Predicate {
        compact: "rdf:type",
        iri: "http://www.w3.org/1999/02/22-rdf-syntax-ns#type",
    },
    malformed_signal: "QueryBadFormed",
    incomplete_length_ratio: 0.6,
};

#[cfg(test)]
mod tests {
    use super::{Graph, GraphError, PrefixPolicy};

    #[test]
    fn graph_parses_case_insensitively() {
        assert_eq!("Wikidata".parse::<Graph>(), Ok(Graph::Wikidata));
        assert_eq!(" DBPEDIA ".parse::<Graph>(), Ok(Graph::Dbpedia));
    }

    #[test]
    fn unknown_graph_is_a_typed_error() {
        let error = "yago".parse::<Graph>().expect_err("yago is not supported");
        assert_eq!(error, GraphError::Unknown("yago".to_string()));
        assert!(error.to_string().contains("unknown knowledge graph"));
    }

    #[test]
    fn profiles_expose_graph_specific_gold_keys() {
        assert_eq!(Graph::Wikidata.profile().gold_answers_key, "wikidata_results");
        assert_eq!(Graph::Dbpedia.profile().gold_query_key, "dbpedia_query");
        assert!(matches!(
            Graph::Dbpedia.profile().prefix_policy,
            PrefixPolicy::Required(lines) if lines.len() == 3
        ));
    }
}
