//! Configuration for the setu-lidar daemon
//!
//! Loaded from a TOML file. Each `[[lidar]]` table describes one sensor
//! unit: where its streams come from (`msg_source`), whether they are
//! re-published over the wire protocol, and the ports of the `[lidar.proto]`
//! section. `[daemon]` holds process-wide tuning.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// One entry per sensor unit
    #[serde(default)]
    pub lidar: Vec<LidarConfig>,
}

/// Process-wide tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Workers in the shared transport pool
    pub pool_workers: usize,
    /// Payload bytes per wire chunk
    pub chunk_size: usize,
    /// Largest serialized message a receiver will reassemble
    pub max_message_len: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pool_workers: 4,
            chunk_size: 1400,
            max_message_len: 10_000_000,
        }
    }
}

/// Configuration of one sensor unit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LidarConfig {
    /// Sensor model, registry key (e.g. "RS16")
    pub device_type: String,
    /// Instance identifier, also the frame id stamped on messages
    pub frame_id: String,
    /// Stream source: 0 unused, 1 local driver, 2 middleware,
    /// 3 wire packets, 5 wire points
    pub msg_source: u8,
    /// Re-publish the points stream over the wire protocol
    #[serde(default)]
    pub send_points_proto: bool,
    /// Re-publish the packets stream over the wire protocol
    #[serde(default)]
    pub send_packets_proto: bool,
    /// Wire protocol endpoints
    pub proto: ProtoConfig,
}

/// Wire protocol endpoints for one unit
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProtoConfig {
    pub points_send_ip: String,
    pub points_send_port: u16,
    pub points_recv_port: u16,
    /// Destination IP shared by the scan and packet streams
    pub packets_send_ip: String,
    pub scan_send_port: u16,
    pub scan_recv_port: u16,
    pub packet_send_port: u16,
    pub packet_recv_port: u16,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_defaults() {
        let daemon = DaemonConfig::default();
        assert_eq!(daemon.pool_workers, 4);
        assert_eq!(daemon.chunk_size, 1400);
        assert_eq!(daemon.max_message_len, 10_000_000);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[daemon]
pool_workers = 2

[[lidar]]
device_type = "RS16"
frame_id = "lidar_front"
msg_source = 5
send_packets_proto = true

[lidar.proto]
points_recv_port = 60021
packets_send_ip = "192.168.1.200"
scan_send_port = 60022
packet_send_port = 60023
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.daemon.pool_workers, 2);
        assert_eq!(config.daemon.chunk_size, 1400, "default survives overrides");
        assert_eq!(config.lidar.len(), 1);

        let unit = &config.lidar[0];
        assert_eq!(unit.device_type, "RS16");
        assert_eq!(unit.msg_source, 5);
        assert!(!unit.send_points_proto);
        assert!(unit.send_packets_proto);
        assert_eq!(unit.proto.points_recv_port, 60021);
        assert_eq!(unit.proto.packets_send_ip, "192.168.1.200");
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.lidar.is_empty());
        assert_eq!(config.daemon.pool_workers, 4);
    }
}
