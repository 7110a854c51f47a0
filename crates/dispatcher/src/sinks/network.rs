//! NetworkSink - UDP fire-and-forget streaming

use contracts::{wire, ContractError, DataSink, FusedFrame, RawTrack};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
    /// Radar wire format, one target-list TLV with global ids
    Tlv,
}

impl std::str::FromStr for NetworkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            "tlv" => Ok(Self::Tlv),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Max datagram size (UDP over IPv4 caps at 65507)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = params
            .get("format")
            .map(|f| f.parse::<NetworkFormat>())
            .transpose()?
            .unwrap_or_default();

        let max_packet_size = params
            .get("max_packet_size")
            .and_then(|s| s.parse().ok())
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Re-encode a fused frame in the radar wire layout
///
/// Header frame number is the cycle (wrapping), target id is the global id,
/// covariance is zeroed.
pub fn encode_tlv(frame: &FusedFrame) -> Vec<u8> {
    let targets: Vec<RawTrack> = frame
        .tracks
        .iter()
        .map(|t| {
            RawTrack::new(
                t.global_id,
                t.position,
                t.velocity,
                t.acceleration,
                t.gating_gain,
                t.confidence,
            )
        })
        .collect();
    wire::encode_target_frame(frame.cycle as u32, &targets).to_vec()
}

/// Sink that sends frames over UDP
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(
            sink = %name,
            target = %config.addr,
            format = ?config.format,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    /// Create from params (for factory)
    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn serialize_frame(&self, frame: &FusedFrame) -> Result<Vec<u8>, String> {
        match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(frame).map_err(|e| format!("json error: {}", e))
            }
            NetworkFormat::Bincode => {
                bincode::serialize(frame).map_err(|e| format!("bincode error: {}", e))
            }
            NetworkFormat::Tlv => Ok(encode_tlv(frame)),
        }
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, frame: &FusedFrame) -> Result<Vec<u8>, ContractError> {
        let data = self
            .serialize_frame(frame)
            .map_err(|e| ContractError::sink_write(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Packet too large, skipped"
            );
            return Err(ContractError::PayloadTooLarge {
                sink_name: self.name.clone(),
                size: data.len(),
                max: self.config.max_packet_size,
            });
        }

        Ok(data)
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], cycle: u64) {
        match socket.send(data).await {
            Ok(sent) => {
                debug!(sink = %self.name, cycle, bytes = sent, "Sent");
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, frame),
        fields(sink = %self.name, cycle = frame.cycle)
    )]
    async fn write(&mut self, frame: &FusedFrame) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(frame)?;
        self.transmit(socket, &data, frame.cycle).await;
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }
}
