use serde_json::Value;
use std::time::Duration;

use super::field_check::values_equal;
use super::http::{ApiResponse, RateLimitedApiClient};
use super::template;
use super::types::{Evaluation, PrerequisiteEvaluationError};
use crate::definition::{ApiMethod, ExpectedResponse};
use crate::process::{lookup_value_path, ProcessInstance};

#[derive(Debug, Clone)]
pub struct ExternalApiStrategy {
    client: RateLimitedApiClient,
}

impl ExternalApiStrategy {
    pub fn new(client: RateLimitedApiClient) -> Self {
        Self { client }
    }

    pub async fn evaluate(
        &self,
        process: &ProcessInstance,
        endpoint: &str,
        method: ApiMethod,
        payload: &Value,
        expected: &ExpectedResponse,
        timeout: Duration,
    ) -> Result<Evaluation, PrerequisiteEvaluationError> {
        let endpoint = template::render_text(endpoint, process)?;
        let payload = template::render(payload, process)?;

        let response = self.client.call(method, &endpoint, &payload, timeout).await?;
        Ok(match_response(&response, expected))
    }
}

/// Compare a response against the expected shape
pub fn match_response(response: &ApiResponse, expected: &ExpectedResponse) -> Evaluation {
    let status_ok = match expected.status {
        Some(status) => response.status == status,
        None => (200..300).contains(&response.status),
    };
    if !status_ok {
        return Evaluation::unsatisfied(format!("unexpected status {}", response.status));
    }

    for path in &expected.required_fields {
        if lookup_value_path(&response.body, path).is_none() {
            return Evaluation::unsatisfied(format!("response is missing '{path}'"));
        }
    }

    for (path, want) in &expected.fields {
        match lookup_value_path(&response.body, path) {
            Some(got) if values_equal(got, want) => {}
            Some(got) => {
                return Evaluation::unsatisfied(format!("response '{path}' is {got}, expected {want}"))
            }
            None => return Evaluation::unsatisfied(format!("response is missing '{path}'")),
        }
    }

    Evaluation::satisfied(format!("endpoint answered {}", response.status))
}
