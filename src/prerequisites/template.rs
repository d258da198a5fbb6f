// Placeholder substitution for payload/input templates.
//
// Grammar: `{process_data.<path>}` or one of the fixed metadata variables
// (process_id, kanban_id, current_state, previous_state, created_at, updated_at).
// Paths are dot-separated identifiers; nothing else is interpreted.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::process::{lookup_path, ProcessInstance};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unresolved template variable '{0}'")]
    Unresolved(String),
}

/// Render every string inside `template` against the process
pub fn render(template: &Value, process: &ProcessInstance) -> Result<Value, TemplateError> {
    match template {
        Value::String(s) => render_string(s, process),
        Value::Array(items) => items
            .iter()
            .map(|item| render(item, process))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = Map::with_capacity(map.len());
            for (key, value) in map {
                rendered.insert(key.clone(), render(value, process)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

/// Render an endpoint template. Substituted values are percent-encoded so
/// they stay inside their path segment or query value; an endpoint that is
/// a single placeholder is taken verbatim as a whole URL.
pub fn render_text(template: &str, process: &ProcessInstance) -> Result<String, TemplateError> {
    if let Some(variable) = lone_placeholder(template) {
        return Ok(value_as_text(&resolve(variable, process)?));
    }
    interpolate(template, process, |text| urlencoding::encode(text).into_owned())
}

fn render_string(s: &str, process: &ProcessInstance) -> Result<Value, TemplateError> {
    // a lone placeholder keeps the JSON type of the resolved value
    if let Some(variable) = lone_placeholder(s) {
        return resolve(variable, process);
    }
    interpolate(s, process, str::to_string).map(Value::String)
}

fn lone_placeholder(s: &str) -> Option<&str> {
    let caps = PLACEHOLDER.captures(s)?;
    let whole = caps.get(0)?;
    let variable = caps.get(1)?;
    (whole.as_str().len() == s.len()).then_some(variable.as_str())
}

fn interpolate(
    s: &str,
    process: &ProcessInstance,
    escape: impl Fn(&str) -> String,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&s[last..whole.start()]);
        out.push_str(&escape(&value_as_text(&resolve(&caps[1], process)?)));
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(out)
}

fn resolve(variable: &str, process: &ProcessInstance) -> Result<Value, TemplateError> {
    if let Some(path) = variable.strip_prefix("process_data.") {
        return lookup_path(&process.process_data, path)
            .cloned()
            .ok_or_else(|| TemplateError::Unresolved(variable.to_string()));
    }

    let value = match variable {
        "process_id" => Value::String(process.process_id.clone()),
        "kanban_id" => Value::String(process.kanban_id.clone()),
        "current_state" => Value::String(process.current_state.clone()),
        "previous_state" => process
            .previous_state
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        "created_at" => Value::String(process.created_at.to_rfc3339()),
        "updated_at" => Value::String(process.updated_at.to_rfc3339()),
        _ => return Err(TemplateError::Unresolved(variable.to_string())),
    };
    Ok(value)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn process() -> ProcessInstance {
        let data = json!({"valor": 1500, "cliente": {"nome": "Ana", "cpf": "123"}});
        ProcessInstance::new("p-42", "vendas", "pedido", data.as_object().unwrap().clone())
    }

    #[test]
    fn test_lone_placeholder_keeps_type() {
        let rendered = render(&json!({"amount": "{process_data.valor}"}), &process()).unwrap();
        assert_eq!(rendered, json!({"amount": 1500}));
    }

    #[test]
    fn test_embedded_placeholders_interpolate() {
        let rendered = render(
            &json!("cliente {process_data.cliente.nome} em {current_state} ({process_id})"),
            &process(),
        )
        .unwrap();
        assert_eq!(rendered, json!("cliente Ana em pedido (p-42)"));
    }

    #[test]
    fn test_nested_structures_and_non_strings() {
        let rendered = render(
            &json!({"ids": ["{process_id}", "{kanban_id}"], "n": 3, "prev": "{previous_state}"}),
            &process(),
        )
        .unwrap();
        assert_eq!(rendered, json!({"ids": ["p-42", "vendas"], "n": 3, "prev": null}));
    }

    #[test]
    fn test_unknown_variable_is_an_error() {
        let err = render(&json!("{process_data.missing}"), &process()).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved("process_data.missing".into()));

        let err = render(&json!("x {env.HOME}"), &process()).unwrap_err();
        assert_eq!(err, TemplateError::Unresolved("env.HOME".into()));
    }

    #[test]
    fn test_render_text_for_endpoints() {
        let url = render_text("https://api.example.com/clientes/{process_data.cliente.cpf}", &process()).unwrap();
        assert_eq!(url, "https://api.example.com/clientes/123");
    }

    #[test]
    fn test_endpoint_values_are_percent_encoded() {
        let mut p = process();
        p.process_data.insert("codigo".into(), json!("../admin?x=1#frag"));
        let url = render_text("https://api.example.com/pedidos/{process_data.codigo}/status", &p).unwrap();
        assert_eq!(
            url,
            "https://api.example.com/pedidos/..%2Fadmin%3Fx%3D1%23frag/status"
        );

        p.process_data.insert("callback".into(), json!("https://hooks.example.com/a?b=c"));
        let url = render_text("{process_data.callback}", &p).unwrap();
        assert_eq!(url, "https://hooks.example.com/a?b=c");
    }

    #[test]
    fn test_plain_braces_without_identifier_are_left_alone() {
        let rendered = render(&json!("{ not a var }"), &process()).unwrap();
        assert_eq!(rendered, json!("{ not a var }"));
    }
}
