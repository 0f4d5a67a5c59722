//! setu-lidar - Transport layer for LiDAR sensor data
//!
//! Multiplexes point-cloud and raw-packet streams between a local driver,
//! a middleware transport, and a custom fragmenting UDP wire protocol, and
//! fans decoded messages and error codes out to registered consumers.

pub mod config;
pub mod error;
pub mod manager;
pub mod msg;
pub mod transport;
pub mod wire;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, ErrorCode, Result};
pub use manager::SensorManager;
