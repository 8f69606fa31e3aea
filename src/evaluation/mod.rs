pub mod answers;
pub mod classify;
pub mod executor;
pub mod orchestrator;
pub mod prefixes;

pub use executor::HttpQueryExecutor;
pub use orchestrator::{EvaluationOutcome, Evaluator};
