use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::model::ExecutionResult;

const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Runs a query against an endpoint. Implementations never fail: transport,
/// status and decoding problems come back as [`ExecutionResult::Failure`].
pub trait QueryExecutor {
    fn execute(&self, endpoint: &str, query: &str, timeout: Duration) -> ExecutionResult;
}

#[derive(Debug, Deserialize)]
struct SparqlJsonResponse {
    #[serde(default)]
    boolean: Option<bool>,
    #[serde(default)]
    results: Option<SparqlBindings>,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    #[serde(default)]
    bindings: Vec<BTreeMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    value: String,
}

pub struct HttpQueryExecutor {
    client: Client,
}

impl HttpQueryExecutor {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("sparql-eval/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build SPARQL HTTP client")?;
        Ok(Self { client })
    }
}

impl QueryExecutor for HttpQueryExecutor {
    fn execute(&self, endpoint: &str, query: &str, timeout: Duration) -> ExecutionResult {
        let response = self
            .client
            .get(endpoint)
            .query(&[("query", query), ("format", "json")])
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .timeout(timeout)
            .send();

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return ExecutionResult::Failure(format!("timed out: {err}"));
            }
            Err(err) => return ExecutionResult::Failure(err.to_string()),
        };

        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(err) => return ExecutionResult::Failure(err.to_string()),
        };
        debug!(endpoint, status = status.as_u16(), bytes = body.len(), "endpoint responded");

        if !status.is_success() {
            return ExecutionResult::Failure(describe_http_failure(status, &body));
        }

        parse_sparql_json(&body)
    }
}

/// Decodes a SPARQL 1.1 JSON results document.
pub fn parse_sparql_json(body: &str) -> ExecutionResult {
    let response: SparqlJsonResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(err) => {
            return ExecutionResult::Failure(format!("invalid SPARQL JSON results: {err}"));
        }
    };

    if let Some(value) = response.boolean {
        return ExecutionResult::Boolean(value);
    }

    let rows = response
        .results
        .map(|results| results.bindings)
        .unwrap_or_default()
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(name, term)| (name, term.value))
                .collect::<BTreeMap<String, String>>()
        })
        .collect();

    ExecutionResult::Success(rows)
}

/// Names HTTP failures the way SPARQL clients conventionally do, so a rejected
/// query is always recognizable by its `QueryBadFormed` marker.
pub fn describe_http_failure(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    match status.as_u16() {
        400 => format!(
            "QueryBadFormed: A bad request has been sent to the endpoint: probably the SPARQL query is badly formed.\n\nResponse:\n{body}"
        ),
        401 => format!(
            "Unauthorized: access to that endpoint is denied due to invalid credentials (unauthorized).\n\nResponse:\n{body}"
        ),
        404 => format!(
            "EndPointNotFound: It was impossible to connect with the endpoint in that address, check if it is correct.\n\nResponse:\n{body}"
        ),
        414 => format!(
            "URITooLong: The URI requested by the client is longer than the server is willing to interpret.\n\nResponse:\n{body}"
        ),
        500..=599 => format!(
            "EndPointInternalError: The endpoint returned the HTTP status code {}.\n\nResponse:\n{body}",
            status.as_u16()
        ),
        code => format!("HTTP status {code}.\n\nResponse:\n{body}"),
    }
}
