use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

use super::{CommandArgs, DeviceContext, DeviceType};
use crate::capabilities::{
    declare, typed_arguments, Arguments, Capability, ParameterSchema, PropertySpec, Provider,
};

/// Lines kept from the tail of a log query.
const MAX_LOG_LINES: usize = 100;

/// Syslog severity digits matched for each level, as egrep patterns.
const SEVERITY_PATTERNS: [(&str, &str); 4] = [
    ("info", ".*-(7|6|5)-.*"),
    ("notify", ".*-(5|4|3)-.*"),
    ("warning", ".*-(4|3|2)-.*"),
    ("error", ".*-(3|2|1|0)-.*"),
];

#[derive(Debug, Deserialize)]
pub struct LogArgs {
    pub hostnames: Vec<String>,
    pub severity: String,
}

pub struct CiscoNxosPlatform {
    context: DeviceContext,
}

pub fn severity_pattern(severity: &str) -> Option<&'static str> {
    SEVERITY_PATTERNS
        .iter()
        .find(|(level, _)| *level == severity)
        .map(|(_, pattern)| *pattern)
}

fn tail_lines(output: &str, count: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

impl CiscoNxosPlatform {
    pub async fn get_logs(&self, args: LogArgs) -> Result<Value> {
        let pattern = severity_pattern(&args.severity)
            .ok_or_else(|| anyhow!("Unknown severity level: {}", args.severity))?;
        let command = format!("show logging | egrep \"{}\"", pattern);

        let mut outputs = Map::new();
        for host in &args.hostnames {
            let target = self.context.target(host, DeviceType::CiscoNxos);
            let output = self.context.transport.send_command(&target, &command).await?;
            let output = if output.trim().is_empty() {
                format!(
                    "No logs found matching for severity level, {}.",
                    args.severity
                )
            } else {
                tail_lines(&output, MAX_LOG_LINES)
            };
            outputs.insert(host.clone(), Value::String(output));
        }
        Ok(Value::Object(outputs))
    }

    pub async fn execute_command(&self, args: CommandArgs) -> Result<Value> {
        let mut outputs = Map::new();
        for host in &args.hostnames {
            let target = self.context.target(host, DeviceType::CiscoNxos);
            let output = self
                .context
                .transport
                .send_command(&target, &args.command)
                .await?;
            outputs.insert(host.clone(), Value::String(output));
        }
        Ok(Value::Object(outputs))
    }
}

fn get_logs(platform: Arc<CiscoNxosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.get_logs(typed_arguments(args)?).await })
}

fn execute_command(platform: Arc<CiscoNxosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.execute_command(typed_arguments(args)?).await })
}

impl Provider for CiscoNxosPlatform {
    type Settings = DeviceContext;

    fn vendor_name() -> &'static str {
        "Cisco NXOS"
    }

    fn capabilities() -> &'static [Capability<Self>] {
        static CAPABILITIES: OnceLock<Vec<Capability<CiscoNxosPlatform>>> = OnceLock::new();
        CAPABILITIES.get_or_init(|| {
            vec![
                declare(
                    "execute_command",
                    "Execute a CLI \"show\" command on Cisco NXOS devices.",
                    ParameterSchema::new()
                        .property(
                            "hostnames",
                            PropertySpec::array(PropertySpec::string())
                                .describe("The hostnames of the devices to execute the command on."),
                        )
                        .property(
                            "command",
                            PropertySpec::string().describe("The command to execute on the device."),
                        ),
                    execute_command,
                ),
                declare(
                    "get_logs",
                    "Gather logging information from Cisco NXOS devices.",
                    ParameterSchema::new()
                        .property(
                            "hostnames",
                            PropertySpec::array(PropertySpec::string()).describe(
                                "The hostnames of the devices to gather logging information from.",
                            ),
                        )
                        .property(
                            "severity",
                            PropertySpec::string()
                                .describe("The severity of the logs to gather.")
                                .one_of(SEVERITY_PATTERNS.iter().map(|(level, _)| *level)),
                        ),
                    get_logs,
                ),
            ]
        })
    }

    fn construct(context: DeviceContext) -> Result<Self> {
        Ok(Self { context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::testing::{context, CannedTransport};

    fn platform(transport: CannedTransport) -> (CiscoNxosPlatform, Arc<CannedTransport>) {
        let transport = Arc::new(transport);
        let platform =
            CiscoNxosPlatform::construct(context("Cisco NXOS", transport.clone())).unwrap();
        (platform, transport)
    }

    #[tokio::test]
    async fn test_get_logs_sends_severity_filter() {
        let log = (0..150)
            .map(|i| format!("2024 Jan 1 %ETH-3-ERR: line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let (platform, transport) = platform(CannedTransport::default().reply(
            "n1",
            "show logging | egrep \".*-(3|2|1|0)-.*\"",
            &log,
        ));

        let output = platform
            .get_logs(LogArgs {
                hostnames: vec!["n1".to_string()],
                severity: "error".to_string(),
            })
            .await
            .unwrap();

        let text = output["n1"].as_str().unwrap();
        assert_eq!(text.lines().count(), MAX_LOG_LINES);
        assert!(text.ends_with("line 149"));
        assert!(text.starts_with("2024 Jan 1 %ETH-3-ERR: line 50"));
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_logs_reports_empty_result() {
        let (platform, _) = platform(CannedTransport::default());

        let output = platform
            .get_logs(LogArgs {
                hostnames: vec!["n1".to_string()],
                severity: "warning".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            output["n1"],
            "No logs found matching for severity level, warning."
        );
    }

    #[tokio::test]
    async fn test_get_logs_rejects_unknown_severity() {
        let (platform, transport) = platform(CannedTransport::default());

        let err = platform
            .get_logs(LogArgs {
                hostnames: vec!["r1".to_string()],
                severity: "bogus".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("bogus"));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_severity_enum_matches_patterns() {
        let schema = serde_json::to_value(CiscoNxosPlatform::capabilities()[1].to_wire_schema())
            .unwrap();
        assert_eq!(
            schema["parameters"]["properties"]["severity"]["enum"],
            serde_json::json!(["info", "notify", "warning", "error"])
        );
        assert_eq!(severity_pattern("notify"), Some(".*-(5|4|3)-.*"));
        assert_eq!(severity_pattern("debug"), None);
    }
}
