use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use std::sync::{Arc, OnceLock};

use super::{ensure_show_command, CommandArgs, DeviceContext, DeviceType, HostnamesArgs, TransportError};
use crate::capabilities::{
    declare, typed_arguments, Arguments, Capability, ParameterSchema, PropertySpec, Provider,
};

const LLDP_COMMAND: &str = "show lldp neighbors";

pub struct CiscoIosPlatform {
    context: DeviceContext,
}

impl CiscoIosPlatform {
    pub async fn execute_command(&self, args: CommandArgs) -> Result<Value> {
        ensure_show_command(&args.command)?;

        let mut outputs = Map::new();
        for host in &args.hostnames {
            let target = self.context.target(host, DeviceType::CiscoIos);
            let entry = match self.context.transport.send_command(&target, &args.command).await {
                Ok(output) => {
                    let output = if output.trim().is_empty() {
                        "No output from command.".to_string()
                    } else {
                        output
                    };
                    json!({ "command": &args.command, "output": output })
                }
                Err(e @ (TransportError::Connection { .. } | TransportError::Timeout { .. })) => {
                    json!({ "error connecting": e.to_string() })
                }
                Err(e) => return Err(e.into()),
            };
            outputs.insert(host.clone(), entry);
        }
        Ok(Value::Object(outputs))
    }

    pub async fn get_lldp_neighbors(&self, args: HostnamesArgs) -> Result<Value> {
        let mut outputs = Map::new();
        for host in &args.hostnames {
            let target = self.context.target(host, DeviceType::CiscoIos);
            let output = self
                .context
                .transport
                .send_command(&target, LLDP_COMMAND)
                .await?;
            outputs.insert(host.clone(), Value::String(output));
        }
        Ok(Value::Object(outputs))
    }
}

fn execute_command(platform: Arc<CiscoIosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.execute_command(typed_arguments(args)?).await })
}

fn get_lldp_neighbors(platform: Arc<CiscoIosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.get_lldp_neighbors(typed_arguments(args)?).await })
}

impl Provider for CiscoIosPlatform {
    type Settings = DeviceContext;

    fn vendor_name() -> &'static str {
        "Cisco IOS"
    }

    fn capabilities() -> &'static [Capability<Self>] {
        static CAPABILITIES: OnceLock<Vec<Capability<CiscoIosPlatform>>> = OnceLock::new();
        CAPABILITIES.get_or_init(|| {
            vec![
                declare(
                    "execute_command",
                    "Execute a CLI \"show\" command on Cisco IOS devices.",
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
                    "get_lldp_neighbors",
                    "Get the LLDP neighbors of Cisco IOS devices.",
                    ParameterSchema::new().property(
                        "hostnames",
                        PropertySpec::array(PropertySpec::string())
                            .describe("The hostnames of the devices to get the LLDP neighbors of."),
                    ),
                    get_lldp_neighbors,
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

    fn platform(transport: CannedTransport) -> (CiscoIosPlatform, Arc<CannedTransport>) {
        let transport = Arc::new(transport);
        let platform = CiscoIosPlatform::construct(context("Cisco IOS", transport.clone())).unwrap();
        (platform, transport)
    }

    #[tokio::test]
    async fn test_execute_command_collects_per_host_output() {
        let (platform, _) = platform(
            CannedTransport::default()
                .reply("r1", "show clock", "10:00:00 UTC")
                .unreachable("r2"),
        );

        let output = platform
            .execute_command(CommandArgs {
                hostnames: vec!["r1".to_string(), "r2".to_string(), "r3".to_string()],
                command: "show clock".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(output["r1"]["command"], "show clock");
        assert_eq!(output["r1"]["output"], "10:00:00 UTC");
        assert!(output["r2"]["error connecting"]
            .as_str()
            .unwrap()
            .contains("Connection refused"));
        assert_eq!(output["r3"]["output"], "No output from command.");
    }

    #[tokio::test]
    async fn test_execute_command_rejects_non_show() {
        let (platform, transport) = platform(CannedTransport::default());

        let result = platform
            .execute_command(CommandArgs {
                hostnames: vec!["r1".to_string()],
                command: "reload".to_string(),
            })
            .await;

        assert!(result.is_err());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lldp_neighbors_fails_on_unreachable_host() {
        let (platform, _) = platform(
            CannedTransport::default()
                .reply("r1", LLDP_COMMAND, "Device ID  Local Intf\nsw1  Gi0/1")
                .unreachable("r2"),
        );

        let ok = platform
            .get_lldp_neighbors(HostnamesArgs {
                hostnames: vec!["r1".to_string()],
            })
            .await
            .unwrap();
        assert!(ok["r1"].as_str().unwrap().contains("sw1"));

        let err = platform
            .get_lldp_neighbors(HostnamesArgs {
                hostnames: vec!["r2".to_string()],
            })
            .await;
        assert!(err.is_err());
    }

    #[test]
    fn test_capabilities_in_declaration_order() {
        let names: Vec<&str> = CiscoIosPlatform::capabilities()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["execute_command", "get_lldp_neighbors"]);
    }
}
