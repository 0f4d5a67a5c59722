//! Error types for setu-lidar

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// setu-lidar error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket bind, send, receive)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parse error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Wire payload serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed datagram or header
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Manager or adapter used before init
    #[error("Not initialized")]
    NotInitialized,

    /// Invalid configuration value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Consumer-visible error codes delivered through registered error callbacks.
///
/// Non-fatal runtime failures (a dropped transmit, a failed socket read) are
/// reported as codes so consumers can count or alarm on them without the
/// adapters stopping. Fatal conditions never reach a callback; they surface as
/// [`Error`] from adapter construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Failed to transmit a points message
    PointsSendError,
    /// Failed to read a datagram on the points receive socket
    PointsReceiveError,
    /// Failed to transmit a scan message
    ScanSendError,
    /// Failed to read a datagram on the scan receive socket
    ScanReceiveError,
    /// Failed to transmit a packet message
    PacketSendError,
    /// Failed to read a datagram on the packet receive socket
    PacketReceiveError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::PointsSendError => "points send failed",
            ErrorCode::PointsReceiveError => "points receive failed",
            ErrorCode::ScanSendError => "scan send failed",
            ErrorCode::ScanReceiveError => "scan receive failed",
            ErrorCode::PacketSendError => "packet send failed",
            ErrorCode::PacketReceiveError => "packet receive failed",
        };
        f.write_str(s)
    }
}
