use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::template;
use super::types::{Evaluation, PrerequisiteEvaluationError};
use crate::process::ProcessInstance;

/// A pre-registered named check. Receives the rendered input record and
/// must answer with `{"satisfied": bool, "detail"?: string}`.
#[async_trait]
pub trait ScriptHandler: Send + Sync {
    async fn run(&self, input: Value) -> anyhow::Result<Value>;
}

type BoxedScriptFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;

/// Adapter so plain async closures can be registered as handlers
pub struct FnScriptHandler {
    f: Box<dyn Fn(Value) -> BoxedScriptFuture + Send + Sync>,
}

impl FnScriptHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self {
            f: Box::new(move |input| Box::pin(f(input))),
        }
    }
}

#[async_trait]
impl ScriptHandler for FnScriptHandler {
    async fn run(&self, input: Value) -> anyhow::Result<Value> {
        (self.f)(input).await
    }
}

/// Fixed table of handlers, filled at startup
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    handlers: HashMap<String, Arc<dyn ScriptHandler>>,
}

impl std::fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ScriptHandler>) {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(handler = %name, "Replacing previously registered script handler");
        }
    }

    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, Arc::new(FnScriptHandler::new(f)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScriptHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CustomScriptStrategy {
    registry: Arc<ScriptRegistry>,
}

impl CustomScriptStrategy {
    pub fn new(registry: Arc<ScriptRegistry>) -> Self {
        Self { registry }
    }

    pub async fn evaluate(
        &self,
        process: &ProcessInstance,
        handler: &str,
        input: &Value,
        timeout: Duration,
    ) -> Result<Evaluation, PrerequisiteEvaluationError> {
        let script = self
            .registry
            .get(handler)
            .ok_or_else(|| PrerequisiteEvaluationError::UnknownHandler(handler.to_string()))?;
        let input = template::render(input, process)?;

        debug!(handler, "Running custom script prerequisite");

        // Run on its own task so a panicking handler is contained and a
        // timed-out one is aborted.
        let mut task = tokio::spawn(async move { script.run(input).await });
        let joined = match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Err(PrerequisiteEvaluationError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let output = joined
            .map_err(|e| PrerequisiteEvaluationError::Handler(format!("handler task failed: {e}")))?
            .map_err(|e| PrerequisiteEvaluationError::Handler(e.to_string()))?;

        parse_output(&output)
    }
}

fn parse_output(output: &Value) -> Result<Evaluation, PrerequisiteEvaluationError> {
    let Value::Object(map) = output else {
        return Err(PrerequisiteEvaluationError::MalformedOutput(format!(
            "expected an object, got {output}"
        )));
    };

    let satisfied = map
        .get("satisfied")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            PrerequisiteEvaluationError::MalformedOutput("missing boolean 'satisfied'".into())
        })?;

    let detail = match map.get("detail") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(PrerequisiteEvaluationError::MalformedOutput(format!(
                "'detail' must be a string, got {other}"
            )))
        }
    };

    Ok(Evaluation {
        satisfied,
        detail,
        alert: None,
    })
}
