use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Sends a dataset report to a local text-generation service and returns its
/// free-text risk assessment.
#[derive(Debug, Clone)]
pub struct RiskAnalyzer {
    client: Client,
    url: String,
    model: String,
}

impl RiskAnalyzer {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.llm_url.clone(), config.llm_model.clone(), config.llm_timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn analyze(&self, report: &str) -> Result<String, AppError> {
        let prompt = build_prompt(report);
        let start = std::time::Instant::now();
        tracing::info!(
            "Sending risk analysis request to {} (model: {}, prompt: {} chars)",
            self.url,
            self.model,
            prompt.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| AppError::LlmError(format!("Failed to reach LLM: {}", e)))?;

        let status = response.status();
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmError(format!("Unreadable LLM response ({}): {}", status, e)))?;

        if !status.is_success() {
            return Err(AppError::LlmError(format!(
                "LLM returned {}: {}",
                status,
                body.error.unwrap_or_default()
            )));
        }

        let text = body
            .response
            .ok_or_else(|| AppError::LlmError("LLM response has no 'response' field".to_string()))?;

        tracing::info!("Risk analysis received in {:?} ({} chars)", start.elapsed(), text.len());
        Ok(text)
    }
}

pub fn build_prompt(report: &str) -> String {
    format!(
        r#"
You are a data quality expert. Analyze this dataset summary and identify risks such as:
- PII (personally identifiable info)
- Data leakage (e.g. derived columns)
- Bias (gender, age, location)
- Class imbalance
- Missing data
- High-cardinality columns

Suggest fixes for each issue.

Dataset Summary:
{}
"#,
        report
    )
}
