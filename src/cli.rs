use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::graph::Graph;

#[derive(Parser, Debug)]
#[command(
    name = "sparql-eval",
    version,
    about = "Evaluate generated SPARQL queries against gold answers and classify their errors"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Report(ReportArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = ".cache/sparql-eval")]
    pub cache_root: PathBuf,

    #[arg(long, value_enum)]
    pub graph: Graph,

    /// JSON array of generated queries.
    #[arg(long)]
    pub dataset: PathBuf,

    /// JSON array of gold queries and answers.
    #[arg(long)]
    pub solution: PathBuf,

    #[arg(long, default_value = "sparql_query")]
    pub query_key: String,

    #[arg(long, default_value = "natural_language_question")]
    pub question_key: String,

    /// Defaults to the local endpoint of the selected graph.
    #[arg(long, env = "SPARQL_EVAL_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_store: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = ".cache/sparql-eval")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Defaults to the most recent run.
    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// List every mismatched record after the distribution.
    #[arg(long, default_value_t = false)]
    pub records: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/sparql-eval")]
    pub cache_root: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands};
    use crate::graph::Graph;

    #[test]
    fn evaluate_args_apply_defaults() {
        let cli = Cli::try_parse_from([
            "sparql-eval",
            "evaluate",
            "--graph",
            "dbpedia",
            "--dataset",
            "generated.json",
            "--solution",
            "solution.json",
        ])
        .expect("evaluate args should parse");

        let Commands::Evaluate(args) = cli.command else {
            panic!("expected evaluate command");
        };
        assert_eq!(args.graph, Graph::Dbpedia);
        assert_eq!(args.query_key, "sparql_query");
        assert_eq!(args.timeout_secs, 60);
        assert!(!args.no_store);
    }

    #[test]
    fn unknown_graph_is_rejected() {
        let result = Cli::try_parse_from([
            "sparql-eval",
            "evaluate",
            "--graph",
            "freebase",
            "--dataset",
            "generated.json",
            "--solution",
            "solution.json",
        ]);
        assert!(result.is_err());
    }
}
