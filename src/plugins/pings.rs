use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::Ipv4Addr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;

use super::PluginContext;
use crate::capabilities::{
    declare, typed_arguments, Arguments, Capability, ParameterSchema, PropertySpec, Provider,
};
use crate::types::PluginSettings;

pub const PLUGIN_NAME: &str = "Pings";

const MAX_CONCURRENT_PINGS: usize = 128;
/// Widest network a single sweep may cover.
const MIN_PREFIX_LEN: u32 = 16;
const DEFAULT_COUNT: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Outcome of probing one address.
#[derive(Debug, Clone, PartialEq)]
pub struct PingReply {
    pub address: Ipv4Addr,
    pub packets_sent: u32,
    pub packets_received: u32,
    pub avg_rtt_ms: f64,
}

impl PingReply {
    pub fn unreachable(address: Ipv4Addr, packets_sent: u32) -> Self {
        Self {
            address,
            packets_sent,
            packets_received: 0,
            avg_rtt_ms: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.packets_received > 0
    }

    pub fn packet_loss_percent(&self) -> u32 {
        if self.packets_sent == 0 {
            return 100;
        }
        let lost = self.packets_sent.saturating_sub(self.packets_received);
        lost * 100 / self.packets_sent
    }
}

/// ICMP echo collaborator.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, address: Ipv4Addr, count: u32, timeout: Duration) -> Result<PingReply>;
}

/// Probes through the system `ping` binary.
#[derive(Debug, Clone)]
pub struct SystemPinger {
    binary: String,
}

impl Default for SystemPinger {
    fn default() -> Self {
        Self {
            binary: "ping".to_string(),
        }
    }
}

impl SystemPinger {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(&self, address: Ipv4Addr, count: u32, timeout: Duration) -> Result<PingReply> {
        let output = Command::new(&self.binary)
            .arg("-n")
            .arg("-q")
            .arg("-c")
            .arg(count.to_string())
            .arg("-W")
            .arg(timeout.as_secs().max(1).to_string())
            .arg(address.to_string())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ping_summary(address, count, &stdout))
    }
}

fn summary_patterns() -> &'static (Regex, Regex) {
    static PATTERNS: OnceLock<(Regex, Regex)> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        (
            Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
                .expect("packet count pattern must compile"),
            Regex::new(r"= [\d.]+/([\d.]+)/")
                .expect("rtt pattern must compile"),
        )
    })
}

/// Reads the statistics footer printed by iputils and BSD `ping`.
pub fn parse_ping_summary(address: Ipv4Addr, count: u32, output: &str) -> PingReply {
    let (packets, rtt) = summary_patterns();

    let (sent, received) = packets
        .captures(output)
        .and_then(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        .unwrap_or((count, 0));
    let avg_rtt_ms = rtt
        .captures(output)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0.0);

    PingReply {
        address,
        packets_sent: sent,
        packets_received: received,
        avg_rtt_ms,
    }
}

/// Every address of the network containing `address`, host bits masked off.
pub fn expand_network(address: Ipv4Addr, prefix_len: u32) -> Result<Vec<Ipv4Addr>> {
    if prefix_len > 32 {
        return Err(anyhow!("Invalid CIDR prefix length: /{}", prefix_len));
    }
    if prefix_len < MIN_PREFIX_LEN {
        return Err(anyhow!(
            "Network /{} is too large to ping, the limit is /{}.",
            prefix_len,
            MIN_PREFIX_LEN
        ));
    }

    let mask = u32::MAX.checked_shl(32 - prefix_len).unwrap_or(0);
    let network = u32::from(address) & mask;
    let broadcast = network | !mask;
    Ok((network..=broadcast).map(Ipv4Addr::from).collect())
}

#[derive(Debug, Deserialize)]
pub struct PingArgs {
    pub ip_address: String,
    #[serde(default)]
    pub cidr: Option<u32>,
}

pub struct PingsPlugin {
    count: u32,
    timeout: Duration,
    pinger: Arc<dyn Pinger>,
}

pub fn default_settings() -> PluginSettings {
    PluginSettings {
        name: PLUGIN_NAME.to_string(),
        description: "Pings a network of IP addresses.".to_string(),
        fields: [
            ("Count".to_string(), DEFAULT_COUNT.to_string()),
            ("Timeout".to_string(), DEFAULT_TIMEOUT_SECS.to_string()),
        ]
        .into_iter()
        .collect(),
        enabled: true,
    }
}

impl PingsPlugin {
    pub async fn ping(&self, args: PingArgs) -> Result<Value> {
        let address: Ipv4Addr = args
            .ip_address
            .trim()
            .parse()
            .with_context(|| format!("Invalid IPv4 address: {}", args.ip_address))?;
        let prefix_len = args.cidr.unwrap_or(32);
        let addresses = expand_network(address, prefix_len)?;

        info!(
            "Pinging {} addresses in {}/{}",
            addresses.len(),
            address,
            prefix_len
        );

        let replies: Vec<Result<PingReply>> = stream::iter(addresses)
            .map(|address| self.pinger.ping(address, self.count, self.timeout))
            .buffer_unordered(MAX_CONCURRENT_PINGS)
            .collect()
            .await;

        let mut active = Map::new();
        for reply in replies {
            let reply = reply?;
            if !reply.is_alive() {
                continue;
            }
            debug!("{} is alive ({} ms)", reply.address, reply.avg_rtt_ms);
            active.insert(
                reply.address.to_string(),
                json!({
                    "rtt_avg": reply.avg_rtt_ms,
                    "packet_loss": format!("{}%", reply.packet_loss_percent()),
                }),
            );
        }

        if active.is_empty() {
            return Ok(Value::String("No active hosts found.".to_string()));
        }
        Ok(Value::Object(active))
    }
}

fn ping(plugin: Arc<PingsPlugin>, args: Arguments) -> BoxFuture<'static, Result<Value>> {
    Box::pin(async move { plugin.ping(typed_arguments(args)?).await })
}

fn numeric_field<T: std::str::FromStr>(settings: &PluginSettings, key: &str, default: T) -> Result<T> {
    match settings.field(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} setting '{}' must be a number, got '{}'", PLUGIN_NAME, key, raw)),
        None => Ok(default),
    }
}

impl Provider for PingsPlugin {
    type Settings = PluginContext;

    fn vendor_name() -> &'static str {
        PLUGIN_NAME
    }

    fn capabilities() -> &'static [Capability<Self>] {
        static CAPABILITIES: OnceLock<Vec<Capability<PingsPlugin>>> = OnceLock::new();
        CAPABILITIES.get_or_init(|| {
            vec![declare(
                "ping",
                "Ping a network of IP addresses for active IPs",
                ParameterSchema::new()
                    .property(
                        "ip_address",
                        PropertySpec::string().describe("An IP address in the network to ping"),
                    )
                    .property(
                        "cidr",
                        PropertySpec::integer()
                            .describe("The CIDR notation of the IP network to ping")
                            .optional(),
                    ),
                ping,
            )]
        })
    }

    fn construct(context: PluginContext) -> Result<Self> {
        let count = numeric_field(&context.settings, "Count", DEFAULT_COUNT)?;
        let timeout_secs = numeric_field(&context.settings, "Timeout", DEFAULT_TIMEOUT_SECS)?;
        Ok(Self {
            count,
            timeout: Duration::from_secs(timeout_secs),
            pinger: context.services.pinger,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Answers for a fixed set of live addresses.
    #[derive(Default)]
    pub struct FakePinger {
        pub alive: HashSet<Ipv4Addr>,
        pub probed: Mutex<Vec<Ipv4Addr>>,
    }

    impl FakePinger {
        pub fn alive(addresses: &[&str]) -> Self {
            Self {
                alive: addresses.iter().filter_map(|a| a.parse().ok()).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Pinger for FakePinger {
        async fn ping(&self, address: Ipv4Addr, count: u32, _: Duration) -> Result<PingReply> {
            self.probed.lock().unwrap().push(address);
            if self.alive.contains(&address) {
                Ok(PingReply {
                    address,
                    packets_sent: count,
                    packets_received: count,
                    avg_rtt_ms: 1.5,
                })
            } else {
                Ok(PingReply::unreachable(address, count))
            }
        }
    }
}
