//! Remote pipeline boundary: wire types, the `Pipeline` seam and its HTTP client.

mod http;
mod schema;

use std::future::Future;

use serde::Serialize;

use crate::error::PipelineError;
use crate::query::Query;

pub use http::HttpPipeline;
pub use schema::WireSchema;

/// Outbound body: `{"intent": ..., "model": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRequest {
    #[serde(rename = "intent")]
    pub query: String,
    #[serde(rename = "model")]
    pub model_id: String,
}

impl PipelineRequest {
    pub fn new(query: Query, model_id: impl Into<String>) -> Self {
        Self { query: query.into_inner(), model_id: model_id.into() }
    }
}

/// Decoded pipeline answer. Absent fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResponse {
    pub report_html: String,
    pub chart_html_list: Vec<String>,
    pub sql_query: Option<String>,
    /// The pipeline's rewrite of the question, when it reports one.
    pub reformulated_intent: Option<String>,
}

impl PipelineResponse {
    pub fn has_report(&self) -> bool {
        !self.report_html.trim().is_empty()
    }
}

/// One request against the remote pipeline. Implementations perform exactly
/// one outbound call per invocation and never retry.
pub trait Pipeline: Send + Sync {
    fn run(
        &self,
        request: &PipelineRequest,
    ) -> impl Future<Output = Result<PipelineResponse, PipelineError>> + Send;
}
