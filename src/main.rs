use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use netgpt::api;
use netgpt::capabilities::FunctionSchema;
use netgpt::devices::DeviceType;
use netgpt::plugins::PluginKind;
use netgpt::Config;

#[derive(Parser)]
#[command(name = "netgpt")]
#[command(about = "Natural-language assistant for network devices", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, help = "Configuration file (defaults to $CONFIG_FILE or config/netgpt.yml)")]
        config: Option<PathBuf>,
        #[arg(long, help = "Port to listen on, overrides the configuration")]
        port: Option<u16>,
    },
    /// Print the function schemas offered to the model
    Capabilities {
        #[arg(long, help = "Device type, e.g. \"Cisco IOS\"")]
        device_type: Option<String>,
        #[arg(long, help = "Plugin name, e.g. \"Pings\"")]
        plugin: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let path = config.unwrap_or_else(Config::default_path);
            let config = Config::load(&path)?;
            let port = port.unwrap_or(config.server.port);
            api::serve(&config, port).await?;
        }
        Commands::Capabilities {
            device_type,
            plugin,
        } => print_capabilities(device_type.as_deref(), plugin.as_deref())?,
    }

    Ok(())
}

fn print_capabilities(device_type: Option<&str>, plugin: Option<&str>) -> Result<()> {
    let mut schemas: Vec<FunctionSchema> = Vec::new();

    match device_type {
        Some(name) => match DeviceType::from_vendor_name(name) {
            Some(device_type) => schemas.extend(device_type.wire_schemas()),
            None => bail!("Device type {} not found.", name),
        },
        None if plugin.is_none() => {
            for device_type in DeviceType::all() {
                schemas.extend(device_type.wire_schemas());
            }
        }
        None => {}
    }

    match plugin {
        Some(name) => match PluginKind::from_name(name) {
            Some(kind) => schemas.extend(kind.wire_schemas()),
            None => bail!("Plugin {} not found.", name),
        },
        None if device_type.is_none() => {
            for kind in PluginKind::all() {
                schemas.extend(kind.wire_schemas());
            }
        }
        None => {}
    }

    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
