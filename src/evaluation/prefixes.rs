use crate::graph::{Graph, PrefixPolicy};

/// Adds whatever prefix declarations `graph` needs before the query can run.
pub fn reconcile(query: &str, graph: Graph) -> String {
    match graph.profile().prefix_policy {
        PrefixPolicy::WholeBlock(block) => {
            if query.trim_start().starts_with("PREFIX") {
                query.to_string()
            } else {
                format!("{block}{query}")
            }
        }
        PrefixPolicy::Required(lines) => {
            let missing = lines
                .iter()
                .copied()
                .filter(|line| !query.contains(line))
                .collect::<Vec<&str>>();
            if missing.is_empty() {
                query.to_string()
            } else {
                format!("{}\n{query}", missing.join("\n"))
            }
        }
    }
}

/// Removes the boilerplate prefix declarations of `graph` so they never count
/// as vocabulary use during classification.
pub fn strip_known_prefixes(query: &str, graph: Graph) -> String {
    let mut stripped = query.to_string();
    for block in graph.profile().strip_blocks {
        stripped = stripped.replace(block, "").trim().to_string();
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::{reconcile, strip_known_prefixes};
    use crate::graph::Graph;

    const WIKIDATA_QUERY: &str = "SELECT ?capital WHERE { wd:Q142 wdt:P36 ?capital . }";
    const DBPEDIA_QUERY: &str = "SELECT ?capital WHERE { dbr:France dbo:capital ?capital . }";

    #[test]
    fn wikidata_query_without_prefixes_gets_full_block() {
        let reconciled = reconcile(WIKIDATA_QUERY, Graph::Wikidata);

        assert!(reconciled.starts_with("\nPREFIX wdt: <http://www.wikidata.org/prop/direct/>"));
        assert!(reconciled.contains("PREFIX pq: <http://www.wikidata.org/prop/qualifier/>\n"));
        assert!(reconciled.ends_with(WIKIDATA_QUERY));
    }

    #[test]
    fn wikidata_query_with_leading_prefix_passes_through() {
        let query = "  PREFIX wd: <http://www.wikidata.org/entity/>\nSELECT ?x WHERE { ?x ?p wd:Q1 }";
        assert_eq!(reconcile(query, Graph::Wikidata), query);
    }

    #[test]
    fn dbpedia_adds_only_missing_required_prefixes() {
        let query = format!("PREFIX dbo: <http://dbpedia.org/ontology/>\n{DBPEDIA_QUERY}");
        let reconciled = reconcile(&query, Graph::Dbpedia);

        assert!(reconciled.starts_with(
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\nPREFIX dbr: <http://dbpedia.org/resource/>\nPREFIX dbo:"
        ));
        assert_eq!(reconciled.matches("PREFIX dbo:").count(), 1);
    }

    #[test]
    fn dbpedia_query_with_all_required_prefixes_is_unchanged() {
        let query = format!(
            "PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\nPREFIX dbo: <http://dbpedia.org/ontology/>\nPREFIX dbr: <http://dbpedia.org/resource/>\n{DBPEDIA_QUERY}"
        );
        assert_eq!(reconcile(&query, Graph::Dbpedia), query);
    }

    #[test]
    fn reconcile_then_strip_restores_the_query() {
        for (graph, query) in [
            (Graph::Wikidata, WIKIDATA_QUERY),
            (Graph::Dbpedia, DBPEDIA_QUERY),
        ] {
            let restored = strip_known_prefixes(&reconcile(query, graph), graph);
            assert_eq!(restored, query, "round trip failed for {graph}");
        }
    }

    #[test]
    fn strip_removes_full_dbpedia_block() {
        let query = "PREFIX dbo: <http://dbpedia.org/ontology/>
PREFIX res: <http://dbpedia.org/resource/>
PREFIX yago: <http://dbpedia.org/class/yago/>
PREFIX onto: <http://dbpedia.org/ontology/>
PREFIX dbp: <http://dbpedia.org/property/>
PREFIX dbr: <http://dbpedia.org/resource/>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX dbc: <http://dbpedia.org/resource/Category:>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
ASK WHERE { res:Berlin onto:country res:Germany }";

        assert_eq!(
            strip_known_prefixes(query, Graph::Dbpedia),
            "ASK WHERE { res:Berlin onto:country res:Germany }"
        );
    }

    #[test]
    fn strip_keeps_author_supplied_prefixes() {
        let query = "PREFIX wd: <http://www.wikidata.org/entity/>\nSELECT ?x WHERE { ?x ?p wd:Q1 }";
        assert_eq!(strip_known_prefixes(query, Graph::Wikidata), query);
    }
}
