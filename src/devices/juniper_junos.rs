use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

use super::{ensure_show_command, CommandArgs, DeviceContext, DeviceType, HostnamesArgs};
use crate::capabilities::{
    declare, typed_arguments, Arguments, Capability, ParameterSchema, PropertySpec, Provider,
};

const LLDP_COMMAND: &str = "show lldp neighbors";

pub struct JuniperJunosPlatform {
    context: DeviceContext,
}

impl JuniperJunosPlatform {
    async fn run_on_hosts(&self, hostnames: &[String], command: &str) -> Result<Value> {
        let mut outputs = Map::new();
        for host in hostnames {
            let target = self.context.target(host, DeviceType::JuniperJunos);
            let output = self.context.transport.send_command(&target, command).await?;
            outputs.insert(host.clone(), Value::String(output));
        }
        Ok(Value::Object(outputs))
    }

    pub async fn execute_command(&self, args: CommandArgs) -> Result<Value> {
        ensure_show_command(&args.command)?;
        self.run_on_hosts(&args.hostnames, &args.command).await
    }

    pub async fn get_lldp_neighbors(&self, args: HostnamesArgs) -> Result<Value> {
        self.run_on_hosts(&args.hostnames, LLDP_COMMAND).await
    }
}

fn execute_command(platform: Arc<JuniperJunosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.execute_command(typed_arguments(args)?).await })
}

fn get_lldp_neighbors(platform: Arc<JuniperJunosPlatform>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { platform.get_lldp_neighbors(typed_arguments(args)?).await })
}

impl Provider for JuniperJunosPlatform {
    type Settings = DeviceContext;

    fn vendor_name() -> &'static str {
        "Juniper JunOS"
    }

    fn capabilities() -> &'static [Capability<Self>] {
        static CAPABILITIES: OnceLock<Vec<Capability<JuniperJunosPlatform>>> = OnceLock::new();
        CAPABILITIES.get_or_init(|| {
            vec![
                declare(
                    "execute_command",
                    "Execute a CLI \"show\" command on Juniper JunOS devices.",
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
                    "Get the LLDP neighbors of Juniper JunOS devices.",
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
