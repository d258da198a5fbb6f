use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::types::PrerequisiteEvaluationError;
use crate::definition::ApiMethod;

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Rate-limited HTTP client shared by all `external_api` checks
#[derive(Debug, Clone)]
pub struct RateLimitedApiClient {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl RateLimitedApiClient {
    pub fn new(requests_per_second: u32, burst: u32) -> Result<Self, reqwest::Error> {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        let client = reqwest::Client::builder()
            .user_agent(concat!("kanban-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Issue one call. `timeout` bounds the rate-limit wait and the request together.
    pub async fn call(
        &self,
        method: ApiMethod,
        endpoint: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<ApiResponse, PrerequisiteEvaluationError> {
        let request = async {
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
                .await;

            debug!(endpoint, ?method, "Calling external prerequisite endpoint");

            let builder = match method {
                ApiMethod::Get => self.client.get(endpoint).query(&query_pairs(payload)),
                ApiMethod::Post => self.client.post(endpoint).json(payload),
            };

            let response = builder
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| transport_error(e, timeout))?;

            let status = response.status().as_u16();
            let text = response.text().await.map_err(|e| transport_error(e, timeout))?;
            let body = serde_json::from_str(&text).unwrap_or(Value::Null);

            Ok(ApiResponse { status, body })
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| PrerequisiteEvaluationError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
    }
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> PrerequisiteEvaluationError {
    if error.is_timeout() {
        PrerequisiteEvaluationError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        PrerequisiteEvaluationError::Transport(error.to_string())
    }
}

fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    match payload {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_flatten_scalars() {
        let pairs = query_pairs(&json!({"id": "p1", "n": 2, "skip": null}));
        assert_eq!(
            pairs,
            vec![("id".to_string(), "p1".to_string()), ("n".to_string(), "2".to_string())]
        );
        assert!(query_pairs(&json!("x")).is_empty());
    }
}
