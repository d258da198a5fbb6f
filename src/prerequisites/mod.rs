// Prerequisite evaluation: one strategy per kind, dispatched by a plain
// match over the closed `PrerequisiteCheck` enum. Failures inside a check
// are folded into the result, so `evaluate_all` never fails.

pub mod custom_script;
pub mod external_api;
pub mod field_check;
pub mod http;
pub mod template;
pub mod time_elapsed;
pub mod types;

pub use custom_script::{CustomScriptStrategy, FnScriptHandler, ScriptHandler, ScriptRegistry};
pub use external_api::ExternalApiStrategy;
pub use http::{ApiResponse, RateLimitedApiClient};
pub use template::TemplateError;
pub use types::{Evaluation, EvaluationReport, PrerequisiteEvaluationError, PrerequisiteResult};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::definition::{PrerequisiteCheck, PrerequisiteSpec};
use crate::observability::engine_metrics;
use crate::process::ProcessInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluatorSettings {
    /// Upper bound applied to every per-prerequisite timeout
    pub max_timeout: Duration,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            max_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrerequisiteEvaluator {
    external_api: ExternalApiStrategy,
    custom_script: CustomScriptStrategy,
    settings: EvaluatorSettings,
}

impl PrerequisiteEvaluator {
    pub fn new(
        client: RateLimitedApiClient,
        scripts: Arc<ScriptRegistry>,
        settings: EvaluatorSettings,
    ) -> Self {
        Self {
            external_api: ExternalApiStrategy::new(client),
            custom_script: CustomScriptStrategy::new(scripts),
            settings,
        }
    }

    pub async fn evaluate_all(&self, process: &ProcessInstance, specs: &[PrerequisiteSpec]) -> EvaluationReport {
        self.evaluate_all_at(process, specs, Utc::now()).await
    }

    /// Evaluate against a fixed clock. All checks run concurrently.
    pub async fn evaluate_all_at(
        &self,
        process: &ProcessInstance,
        specs: &[PrerequisiteSpec],
        now: DateTime<Utc>,
    ) -> EvaluationReport {
        let evaluations = specs.iter().enumerate().map(|(index, spec)| async move {
            let id = spec.effective_id(index);
            let outcome = self.evaluate_one(process, &spec.check, now).await;
            if let Err(e) = &outcome {
                engine_metrics().record_prerequisite_error();
                warn!(
                    process_id = %process.process_id,
                    prerequisite = %id,
                    error = %e,
                    "Prerequisite check failed, treating as not satisfied"
                );
            }
            let result = PrerequisiteResult::from_evaluation(spec.check.kind(), &spec.message, outcome);
            (id, result)
        });

        let results: BTreeMap<String, PrerequisiteResult> = join_all(evaluations).await.into_iter().collect();
        let all_satisfied = results.values().all(|r| r.satisfied);

        debug!(
            process_id = %process.process_id,
            checked = results.len(),
            all_satisfied,
            "Evaluated prerequisites"
        );

        EvaluationReport { all_satisfied, results }
    }

    async fn evaluate_one(
        &self,
        process: &ProcessInstance,
        check: &PrerequisiteCheck,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, PrerequisiteEvaluationError> {
        match check {
            PrerequisiteCheck::FieldCheck { field, operator, value } => {
                Ok(field_check::evaluate(process, field, *operator, value))
            }
            PrerequisiteCheck::ExternalApi {
                endpoint,
                method,
                payload,
                expected,
                timeout_secs,
            } => {
                self.external_api
                    .evaluate(process, endpoint, *method, payload, expected, self.timeout(*timeout_secs))
                    .await
            }
            PrerequisiteCheck::TimeElapsed {
                reference,
                min_hours,
                max_hours,
            } => Ok(time_elapsed::evaluate(process, reference, *min_hours, *max_hours, now)),
            PrerequisiteCheck::CustomScript {
                handler,
                input,
                timeout_secs,
            } => {
                self.custom_script
                    .evaluate(process, handler, input, self.timeout(*timeout_secs))
                    .await
            }
        }
    }

    fn timeout(&self, requested_secs: u64) -> Duration {
        Duration::from_secs(requested_secs).min(self.settings.max_timeout)
    }
}
