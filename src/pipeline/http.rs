//! Reqwest-based pipeline client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};

use super::{Pipeline, PipelineRequest, PipelineResponse, WireSchema};
use crate::config::Config;
use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct HttpPipeline {
    http: reqwest::Client,
    endpoint: String,
    schema: WireSchema,
}

impl HttpPipeline {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Self::new(cfg.pipeline_url(), cfg.wire_schema(), cfg.request_timeout())
    }

    pub fn new(
        endpoint: impl Into<String>,
        schema: WireSchema,
        timeout: Option<std::time::Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, endpoint: endpoint.into(), schema })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn schema(&self) -> WireSchema {
        self.schema
    }
}

impl Pipeline for HttpPipeline {
    async fn run(&self, request: &PipelineRequest) -> Result<PipelineResponse, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        tracing::debug!(endpoint = %self.endpoint, model = %request.model_id, "sending pipeline request");
        let resp = self
            .http
            .post(&self.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Status { status: status.as_u16(), body });
        }

        let body = resp.text().await?;
        self.schema.decode(&body)
    }
}
