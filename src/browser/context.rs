use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Outcome of running a script inside a rendered page.
///
/// Evaluation never raises: a script error or a transport failure becomes
/// `Failed`, a `null`/`undefined` result becomes `Empty`. Callers pick the
/// typed accessor they need and get a default when the value is unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Value(Value),
    Empty,
    Failed(String),
}

impl Evaluation {
    /// Build from a raw script return value
    pub fn from_json(value: Value) -> Self {
        match unwrap_envelope(value) {
            Value::Null => Evaluation::Empty,
            value => Evaluation::Value(value),
        }
    }

    /// The only unwrap operation: the plain JSON value, envelopes removed.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Evaluation::Value(value) => match unwrap_envelope(value) {
                Value::Null => None,
                value => Some(value),
            },
            Evaluation::Empty | Evaluation::Failed(_) => None,
        }
    }

    /// JavaScript truthiness of the result; failures are falsy
    pub fn is_truthy(self) -> bool {
        match self.into_value() {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
            Some(Value::Null) | None => false,
        }
    }

    /// Non-negative integer result, `0` when absent or not numeric
    pub fn as_count(self) -> u64 {
        match self.into_value() {
            Some(Value::Number(n)) => n.as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// List of strings; non-string entries are unwrapped or skipped
    pub fn as_strings(self) -> Vec<String> {
        match self.into_value() {
            Some(Value::Array(items)) => items.into_iter()
                .filter_map(|item| match unwrap_envelope(item) {
                    Value::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Decode a structured result. Scripts may return the object itself or
    /// its `JSON.stringify` form; anything undecodable yields `None`.
    pub fn decode<T: DeserializeOwned>(self) -> Option<T> {
        match self.into_value()? {
            Value::String(text) => serde_json::from_str(&text).ok(),
            value => serde_json::from_value(value).ok(),
        }
    }
}

/// Peel the remote-object wrappers some drivers put around primitive
/// results: `{"type": .., "value": x}` and `{"result": {"value": x}}`.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            let is_remote_object = map.contains_key("value")
                && map.keys().all(|k| matches!(k.as_str(), "type" | "value" | "subtype" | "description"));
            if is_remote_object {
                return unwrap_envelope(map.remove("value").unwrap_or(Value::Null));
            }

            let wraps_result = map.len() == 1
                && map.get("result").and_then(Value::as_object).map_or(false, |r| r.contains_key("value"));
            if wraps_result {
                if let Some(Value::Object(mut inner)) = map.remove("result") {
                    return unwrap_envelope(inner.remove("value").unwrap_or(Value::Null));
                }
            }

            Value::Object(map)
        }
        other => other,
    }
}

/// One live browsing context (a tab) that can be navigated and scripted.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Load `url` in this context
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Run `script` as a function body and return its value.
    /// Scripts produce their result with a `return` statement.
    async fn evaluate(&self, script: &str) -> Evaluation;

    /// Release the context
    async fn close(&self) -> Result<()>;
}

/// Source of browsing contexts, backed by a running browser.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Open a fresh context on a blank page
    async fn open_context(&self) -> Result<Box<dyn PageContext>>;
}
