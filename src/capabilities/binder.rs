use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::sync::Arc;

use super::schema::{Arguments, Capability, FunctionSchema};
use crate::error::CapabilityError;

/// A capability ready to be called by name with raw JSON arguments.
#[async_trait]
pub trait Invocable: Send + Sync {
    fn name(&self) -> &str;

    fn wire_schema(&self) -> FunctionSchema;

    /// Parses `raw_arguments`, runs the handler and returns the output as text.
    async fn invoke(&self, raw_arguments: &str) -> Result<String, CapabilityError>;
}

pub struct BoundCapability<R> {
    capability: Capability<R>,
    receiver: Arc<R>,
}

pub fn bind<R>(capability: &Capability<R>, receiver: Arc<R>) -> BoundCapability<R> {
    BoundCapability {
        capability: capability.clone(),
        receiver,
    }
}

impl<R> BoundCapability<R> {
    pub fn capability(&self) -> &Capability<R> {
        &self.capability
    }
}

#[async_trait]
impl<R: Send + Sync + 'static> Invocable for BoundCapability<R> {
    fn name(&self) -> &str {
        self.capability.name()
    }

    fn wire_schema(&self) -> FunctionSchema {
        self.capability.to_wire_schema()
    }

    async fn invoke(&self, raw_arguments: &str) -> Result<String, CapabilityError> {
        let name = self.capability.name();
        let arguments = parse_arguments(name, raw_arguments)?;
        debug!("Invoking {} with {} argument(s)", name, arguments.len());

        let handler = self.capability.handler();
        let output = handler(self.receiver.clone(), arguments)
            .await
            .map_err(|source| CapabilityError::Execution {
                name: name.to_string(),
                source,
            })?;

        normalize_output(name, output)
    }
}

pub fn parse_arguments(name: &str, raw: &str) -> Result<Arguments, CapabilityError> {
    serde_json::from_str::<Arguments>(raw).map_err(|source| CapabilityError::ArgumentParse {
        name: name.to_string(),
        source,
    })
}

/// Text passes through, objects become canonical JSON with sorted keys.
pub fn normalize_output(name: &str, output: Value) -> Result<String, CapabilityError> {
    match output {
        Value::String(text) => Ok(text),
        Value::Object(_) => Ok(canonical_json(&output)),
        other => Err(CapabilityError::Contract {
            name: name.to_string(),
            found: json_kind(&other),
        }),
    }
}

pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| {
                    format!("{}:{}", Value::String(key.clone()), canonical_json(value))
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        scalar => scalar.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::schema::{declare, ParameterSchema, PropertySpec};
    use futures::future::BoxFuture;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Arguments>>,
    }

    fn record(receiver: Arc<Recorder>, args: Arguments) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(async move {
            receiver.calls.lock().unwrap().push(args);
            anyhow::Ok(json!({"r2": "down", "r1": {"uptime": "4 days", "model": "ISR"}}))
        })
    }

    fn fail(_: Arc<Recorder>, _: Arguments) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(async { Err::<Value, _>(anyhow::anyhow!("device r1 unreachable")) })
    }

    fn numeric(_: Arc<Recorder>, _: Arguments) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(async { anyhow::Ok(json!(42)) })
    }

    fn text(_: Arc<Recorder>, _: Arguments) -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(async { anyhow::Ok(json!("No active hosts found.")) })
    }

    fn schema() -> ParameterSchema {
        ParameterSchema::new()
            .property("hostnames", PropertySpec::array(PropertySpec::string()))
            .property("command", PropertySpec::string())
    }

    #[tokio::test]
    async fn test_invoke_passes_exact_arguments() {
        let receiver = Arc::new(Recorder::default());
        let bound = bind(&declare("execute_command", "Run", schema(), record), receiver.clone());

        bound
            .invoke(r#"{"hostnames": ["r1"], "command": "show version"}"#)
            .await
            .unwrap();

        let calls = receiver.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let mut keys: Vec<&String> = calls[0].keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["command", "hostnames"]);
        assert_eq!(calls[0]["command"], "show version");
    }

    #[tokio::test]
    async fn test_invoke_serializes_objects_with_sorted_keys() {
        let bound = bind(
            &declare("execute_command", "Run", schema(), record),
            Arc::new(Recorder::default()),
        );

        let output = bound.invoke(r#"{"hostnames": [], "command": "show"}"#).await.unwrap();
        assert_eq!(
            output,
            r#"{"r1":{"model":"ISR","uptime":"4 days"},"r2":"down"}"#
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_argument_parse_error() {
        let receiver = Arc::new(Recorder::default());
        let bound = bind(&declare("execute_command", "Run", schema(), record), receiver.clone());

        for raw in ["{\"hostnames\": [", "not json", "", "[\"r1\"]", "42"] {
            let err = bound.invoke(raw).await.unwrap_err();
            assert!(
                matches!(err, CapabilityError::ArgumentParse { .. }),
                "expected parse error for {:?}",
                raw
            );
        }
        assert!(receiver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handler_failure_is_execution_error() {
        let bound = bind(&declare("get_logs", "Logs", schema(), fail), Arc::new(Recorder::default()));

        let err = bound.invoke("{}").await.unwrap_err();
        match err {
            CapabilityError::Execution { name, source } => {
                assert_eq!(name, "get_logs");
                assert!(source.to_string().contains("unreachable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_text_non_object_output_is_contract_error() {
        let bound = bind(&declare("count", "Count", schema(), numeric), Arc::new(Recorder::default()));

        let err = bound.invoke("{}").await.unwrap_err();
        assert!(matches!(err, CapabilityError::Contract { found: "a number", .. }));
    }

    #[tokio::test]
    async fn test_text_output_passes_through() {
        let bound = bind(&declare("ping", "Ping", schema(), text), Arc::new(Recorder::default()));
        assert_eq!(bound.invoke("{}").await.unwrap(), "No active hosts found.");
    }

    #[test]
    fn test_canonical_json_escapes_keys() {
        let value = json!({"b": [1, {"z": null, "a": true}], "a\"q": "x\ny"});
        assert_eq!(
            canonical_json(&value),
            r#"{"a\"q":"x\ny","b":[1,{"a":true,"z":null}]}"#
        );
    }
}
