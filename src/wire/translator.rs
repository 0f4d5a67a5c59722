//! Translation between internal messages and wire payload schemas
//!
//! Pure conversion only: no I/O, no framing. The [`WireMessage`] trait is the
//! seam the transport adapter is generic over; it names the wire schema for a
//! message kind, the pure conversions in both directions, and the error codes
//! reported when transmit or receive of that kind fails.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, ErrorCode, Result};
use crate::msg::{PacketMessage, PointXyzi, PointsMessage, ScanMessage, PACKET_LEN};
use crate::wire::payload::{LidarPacketWire, LidarPointsWire, LidarScanWire};

/// A message kind that can travel over the wire protocol
pub trait WireMessage: Sized + Send + 'static {
    /// Serde schema this kind is serialized as
    type Wire: Serialize + DeserializeOwned;

    /// Short name used in thread names and logs
    const KIND: &'static str;
    /// Error code raised when a transmit of this kind fails
    const SEND_ERROR: ErrorCode;
    /// Error code raised when a socket read for this kind fails
    const RECV_ERROR: ErrorCode;

    /// Convert to the wire schema
    fn to_wire(&self) -> Self::Wire;

    /// Convert back from the wire schema
    fn from_wire(wire: Self::Wire) -> Result<Self>;
}

impl WireMessage for PointsMessage {
    type Wire = LidarPointsWire;

    const KIND: &'static str = "points";
    const SEND_ERROR: ErrorCode = ErrorCode::PointsSendError;
    const RECV_ERROR: ErrorCode = ErrorCode::PointsReceiveError;

    fn to_wire(&self) -> LidarPointsWire {
        let mut data = Vec::with_capacity(self.cloud.len() * 4);
        for p in &self.cloud {
            data.push(p.x);
            data.push(p.y);
            data.push(p.z);
            data.push(p.intensity);
        }
        LidarPointsWire {
            timestamp: self.timestamp,
            seq: self.seq,
            parent_frame_id: self.parent_frame_id.clone(),
            frame_id: self.frame_id.clone(),
            is_motion_correct: self.is_motion_correct,
            height: self.height,
            width: self.width,
            is_dense: self.is_dense,
            is_transform: self.is_transform,
            lidar_model: self.lidar_model.clone(),
            points_type: self.points_type.clone(),
            data,
        }
    }

    fn from_wire(wire: LidarPointsWire) -> Result<Self> {
        if wire.data.len() % 4 != 0 {
            return Err(Error::InvalidPacket(format!(
                "points data length {} not a multiple of 4",
                wire.data.len()
            )));
        }
        let cloud = wire
            .data
            .chunks_exact(4)
            .map(|q| PointXyzi::new(q[0], q[1], q[2], q[3]))
            .collect();
        Ok(PointsMessage {
            timestamp: wire.timestamp,
            seq: wire.seq,
            parent_frame_id: wire.parent_frame_id,
            frame_id: wire.frame_id,
            is_motion_correct: wire.is_motion_correct,
            height: wire.height,
            width: wire.width,
            is_dense: wire.is_dense,
            is_transform: wire.is_transform,
            lidar_model: wire.lidar_model,
            points_type: wire.points_type,
            cloud,
        })
    }
}

impl WireMessage for PacketMessage {
    type Wire = LidarPacketWire;

    const KIND: &'static str = "packet";
    const SEND_ERROR: ErrorCode = ErrorCode::PacketSendError;
    const RECV_ERROR: ErrorCode = ErrorCode::PacketReceiveError;

    fn to_wire(&self) -> LidarPacketWire {
        LidarPacketWire {
            timestamp: self.timestamp,
            data: self.payload.to_vec(),
        }
    }

    fn from_wire(wire: LidarPacketWire) -> Result<Self> {
        PacketMessage::from_slice(wire.timestamp, &wire.data).ok_or_else(|| {
            Error::InvalidPacket(format!(
                "packet payload length {} (expected {})",
                wire.data.len(),
                PACKET_LEN
            ))
        })
    }
}

impl WireMessage for ScanMessage {
    type Wire = LidarScanWire;

    const KIND: &'static str = "scan";
    const SEND_ERROR: ErrorCode = ErrorCode::ScanSendError;
    const RECV_ERROR: ErrorCode = ErrorCode::ScanReceiveError;

    fn to_wire(&self) -> LidarScanWire {
        LidarScanWire {
            timestamp: self.timestamp,
            seq: self.seq,
            data: self.packets.iter().map(|p| p.to_wire()).collect(),
        }
    }

    fn from_wire(wire: LidarScanWire) -> Result<Self> {
        let packets = wire
            .data
            .into_iter()
            .map(PacketMessage::from_wire)
            .collect::<Result<Vec<_>>>()?;
        Ok(ScanMessage {
            timestamp: wire.timestamp,
            seq: wire.seq,
            packets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::serializer::{Serializer, WireFormat};

    fn sample_points(n: usize) -> PointsMessage {
        let cloud = (0..n)
            .map(|i| {
                let f = i as f32;
                PointXyzi::new(f * 0.1, f * 0.2, f * 0.3, (i % 256) as f32)
            })
            .collect();
        PointsMessage {
            timestamp: 1234.5678,
            seq: 42,
            parent_frame_id: "map".into(),
            frame_id: "lidar_front".into(),
            is_motion_correct: true,
            height: 1,
            width: n as u32,
            is_dense: true,
            is_transform: false,
            lidar_model: "RS16".into(),
            points_type: "XYZI".into(),
            cloud,
        }
    }

    #[test]
    fn test_points_roundtrip_5000() {
        let msg = sample_points(5000);
        let serializer = Serializer::new(WireFormat::Postcard);
        let bytes = serializer.serialize(&msg.to_wire()).unwrap();
        let back = PointsMessage::from_wire(serializer.deserialize(&bytes).unwrap()).unwrap();

        assert_eq!(back.timestamp, msg.timestamp);
        assert_eq!(back.seq, msg.seq);
        assert_eq!(back.parent_frame_id, msg.parent_frame_id);
        assert_eq!(back.frame_id, msg.frame_id);
        assert_eq!(back.is_motion_correct, msg.is_motion_correct);
        assert_eq!(back.height, msg.height);
        assert_eq!(back.width, msg.width);
        assert_eq!(back.is_dense, msg.is_dense);
        assert_eq!(back.is_transform, msg.is_transform);
        assert_eq!(back.lidar_model, msg.lidar_model);
        assert_eq!(back.points_type, msg.points_type);
        assert_eq!(back.cloud.len(), 5000);
        for (a, b) in back.cloud.iter().zip(msg.cloud.iter()) {
            assert!((a.x - b.x).abs() < f32::EPSILON);
            assert!((a.y - b.y).abs() < f32::EPSILON);
            assert!((a.z - b.z).abs() < f32::EPSILON);
            assert!((a.intensity - b.intensity).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_points_rejects_ragged_data() {
        let wire = LidarPointsWire {
            data: vec![1.0, 2.0, 3.0],
            ..Default::default()
        };
        assert!(PointsMessage::from_wire(wire).is_err());
    }

    #[test]
    fn test_packet_rejects_short_payload() {
        let wire = LidarPacketWire {
            timestamp: 0.0,
            data: vec![0u8; 100],
        };
        assert!(PacketMessage::from_wire(wire).is_err());
    }

    #[test]
    fn test_scan_roundtrip() {
        let mut pkt = PacketMessage::new(7.0);
        pkt.payload[0] = 0xAA;
        pkt.payload[PACKET_LEN - 1] = 0x55;
        let msg = ScanMessage {
            timestamp: 7.0,
            seq: 3,
            packets: vec![pkt.clone(), pkt],
        };
        let back = ScanMessage::from_wire(msg.to_wire()).unwrap();
        assert_eq!(back, msg);
    }
}
