//! LiDAR message types
//!
//! These are the in-process representations handed to consumer callbacks and
//! accepted by the `publish_*` seams. They carry no transport detail; the
//! wire schemas live in [`crate::wire::payload`].

/// Fixed length of one raw sensor datagram payload
pub const PACKET_LEN: usize = 1248;

/// A single measurement point with reflectivity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointXyzi {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: f32,
}

impl PointXyzi {
    /// Create a new point
    pub fn new(x: f32, y: f32, z: f32, intensity: f32) -> Self {
        Self { x, y, z, intensity }
    }
}

/// Growable point storage backing a [`PointsMessage`]
pub type PointCloud = Vec<PointXyzi>;

/// One decoded point-cloud frame
///
/// When `is_dense` is set the cloud is organized and
/// `cloud.len() == height * width`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointsMessage {
    /// Acquisition timestamp in seconds since epoch
    pub timestamp: f64,
    /// Monotonic sequence number assigned by the producer
    pub seq: u32,
    /// Reference frame the cloud is expressed in
    pub parent_frame_id: String,
    /// Identifier of the emitting sensor unit
    pub frame_id: String,
    pub is_motion_correct: bool,
    pub height: u32,
    pub width: u32,
    pub is_dense: bool,
    pub is_transform: bool,
    /// Sensor model identifier
    pub lidar_model: String,
    /// Point layout identifier
    pub points_type: String,
    pub cloud: PointCloud,
}

/// One raw sensor datagram with its capture timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct PacketMessage {
    /// Capture timestamp in seconds since epoch
    pub timestamp: f64,
    /// Raw payload, always [`PACKET_LEN`] bytes
    pub payload: Box<[u8; PACKET_LEN]>,
}

impl PacketMessage {
    /// Create a packet with a zeroed payload
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            payload: Box::new([0u8; PACKET_LEN]),
        }
    }

    /// Create a packet from a payload slice
    ///
    /// Returns `None` unless `data` is exactly [`PACKET_LEN`] bytes.
    pub fn from_slice(timestamp: f64, data: &[u8]) -> Option<Self> {
        if data.len() != PACKET_LEN {
            return None;
        }
        let mut payload = Box::new([0u8; PACKET_LEN]);
        payload.copy_from_slice(data);
        Some(Self { timestamp, payload })
    }
}

impl Default for PacketMessage {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// A batch of raw packets covering one rotation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanMessage {
    /// Timestamp of the first packet in the batch
    pub timestamp: f64,
    /// Monotonic sequence number assigned by the producer
    pub seq: u32,
    pub packets: Vec<PacketMessage>,
}
