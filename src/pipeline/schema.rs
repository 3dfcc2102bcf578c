//! Response shapes the pipeline has shipped, selected by configuration.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use super::PipelineResponse;
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireSchema {
    /// `{"report": "...", "charts": ["..."]}`
    #[default]
    Split,
    /// `{"html_report": "...", "plots": ["..."], "sql_query": "..."}`
    Gateway,
    /// `{"html_plots": ["..."]}`
    Flat,
}

impl WireSchema {
    pub fn name(self) -> &'static str {
        match self {
            WireSchema::Split => "split",
            WireSchema::Gateway => "gateway",
            WireSchema::Flat => "flat",
        }
    }

    pub fn decode(self, body: &str) -> Result<PipelineResponse, PipelineError> {
        let value: Value = serde_json::from_str(body)?;
        self.decode_value(value)
    }

    pub fn decode_value(self, value: Value) -> Result<PipelineResponse, PipelineError> {
        if !value.is_object() {
            return Err(PipelineError::Malformed(format!(
                "expected a JSON object, got {}",
                json_type(&value)
            )));
        }
        let response = match self {
            WireSchema::Split => {
                let body: SplitBody = serde_json::from_value(value)?;
                PipelineResponse {
                    report_html: body.report.unwrap_or_default(),
                    chart_html_list: body.charts.unwrap_or_default(),
                    sql_query: None,
                    reformulated_intent: None,
                }
            }
            WireSchema::Gateway => {
                let body: GatewayBody = serde_json::from_value(value)?;
                PipelineResponse {
                    report_html: body.html_report.unwrap_or_default(),
                    chart_html_list: body.plots.unwrap_or_default(),
                    sql_query: body.sql_query.filter(|s| !s.trim().is_empty()),
                    reformulated_intent: body.reformulated_intent.filter(|s| !s.trim().is_empty()),
                }
            }
            WireSchema::Flat => {
                let body: FlatBody = serde_json::from_value(value)?;
                PipelineResponse {
                    report_html: String::new(),
                    chart_html_list: body.html_plots.unwrap_or_default(),
                    sql_query: None,
                    reformulated_intent: None,
                }
            }
        };
        Ok(response)
    }
}

impl FromStr for WireSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "split" => Ok(WireSchema::Split),
            "gateway" => Ok(WireSchema::Gateway),
            "flat" => Ok(WireSchema::Flat),
            other => Err(format!("unknown wire schema: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SplitBody {
    #[serde(default)]
    report: Option<String>,
    #[serde(default)]
    charts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct GatewayBody {
    #[serde(default)]
    html_report: Option<String>,
    #[serde(default)]
    plots: Option<Vec<String>>,
    #[serde(default)]
    sql_query: Option<String>,
    #[serde(default)]
    reformulated_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatBody {
    #[serde(default)]
    html_plots: Option<Vec<String>>,
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
