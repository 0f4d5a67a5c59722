//! Internal message representation shared by all transports

pub mod lidar;

pub use lidar::{PacketMessage, PointCloud, PointXyzi, PointsMessage, ScanMessage, PACKET_LEN};
