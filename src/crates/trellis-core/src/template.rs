//! `{variable}` template substitution against the execution context.

use regex::Regex;
use serde_json::{Map, Value};

/// Resolves `{variable}` placeholders in prompts and tool arguments.
///
/// Lookup supports dotted paths into nested objects (`{user.name}`).
/// String values substitute raw; other values substitute as compact JSON.
/// Unresolved placeholders are left intact so a later pass (or the agent
/// itself) can see them.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    pattern: Regex,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self {
            // Unwrap is fine: the pattern is a compile-time constant.
            pattern: Regex::new(r"\{([A-Za-z0-9_][A-Za-z0-9_.]*)\}").unwrap(),
        }
    }

    /// Substitute placeholders in `template` from `context`.
    pub fn resolve(&self, template: &str, context: &Map<String, Value>) -> String {
        self.pattern
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let path = &caps[1];
                match lookup(context, path) {
                    Some(Value::String(s)) => s.clone(),
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Resolve placeholders inside every string leaf of a JSON value.
    pub fn resolve_value(&self, value: &Value, context: &Map<String, Value>) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve(s, context)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_value(v, context)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, context)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}
