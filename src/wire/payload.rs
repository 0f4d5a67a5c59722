//! Wire payload schemas
//!
//! Serde structs describing exactly what crosses the network. Point data is
//! flattened into a repeated `[x, y, z, intensity]` float array; raw packets
//! travel as length-checked byte vectors. Kept separate from the internal
//! message types so the wire layout can evolve without touching consumers.

use serde::{Deserialize, Serialize};

/// Wire schema for a point-cloud frame
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LidarPointsWire {
    pub timestamp: f64,
    pub seq: u32,
    pub parent_frame_id: String,
    pub frame_id: String,
    pub is_motion_correct: bool,
    pub height: u32,
    pub width: u32,
    pub is_dense: bool,
    pub is_transform: bool,
    pub lidar_model: String,
    pub points_type: String,
    /// Flattened point data: 4 floats per point, `[x, y, z, intensity]`
    pub data: Vec<f32>,
}

/// Wire schema for one raw sensor datagram
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LidarPacketWire {
    pub timestamp: f64,
    /// Raw payload bytes; always 1248 on a valid packet
    pub data: Vec<u8>,
}

/// Wire schema for a batch of raw packets
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LidarScanWire {
    pub timestamp: f64,
    pub seq: u32,
    pub data: Vec<LidarPacketWire>,
}
