//! Datagram framing: fragmentation and reassembly
//!
//! A serialized payload larger than one datagram is split into chunks of
//! `chunk_size` bytes (the last chunk may be shorter). Every chunk is
//! prefixed with a fixed 16-byte [`FrameHeader`]:
//!
//! ```text
//! ┌────────────┬──────────────┬─────────────────────┬──────────────────────┐
//! │ message_id │ frame_number │ total_message_count │ total_message_length │
//! │ u32 BE     │ u32 BE       │ u32 BE              │ u32 BE               │
//! └────────────┴──────────────┴─────────────────────┴──────────────────────┘
//! ```
//!
//! - `message_id`: chunk index within the frame, `0 <= message_id < count`
//! - `frame_number`: monotonic per logical message, shared by all its chunks
//! - `total_message_count`: number of chunks in the frame
//! - `total_message_length`: serialized payload length in bytes
//!
//! Reassembly copies each chunk into a preallocated buffer at
//! `message_id * chunk_size`. A frame is complete when the just-received
//! chunk is the last one and its `frame_number` matches the frame number of
//! the immediately preceding processed chunk. There is no retransmission:
//! a frame that fails the completion rule is never delivered and raises no
//! error.

use crate::error::{Error, Result};

/// Default payload bytes per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 1400;

/// Per-chunk header, one per UDP datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Chunk index within the frame
    pub message_id: u32,
    /// Monotonic frame counter, constant across one frame's chunks
    pub frame_number: u32,
    /// Number of chunks in the frame
    pub total_message_count: u32,
    /// Serialized payload length in bytes
    pub total_message_length: u32,
}

impl FrameHeader {
    /// Encoded header length in bytes
    pub const WIRE_LEN: usize = 16;

    /// Encode to the 16-byte big-endian wire form
    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut buf = [0u8; Self::WIRE_LEN];
        buf[0..4].copy_from_slice(&self.message_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.frame_number.to_be_bytes());
        buf[8..12].copy_from_slice(&self.total_message_count.to_be_bytes());
        buf[12..16].copy_from_slice(&self.total_message_length.to_be_bytes());
        buf
    }

    /// Decode from the leading bytes of a datagram
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::WIRE_LEN {
            return Err(Error::InvalidPacket(format!(
                "datagram too short for frame header: {} bytes",
                bytes.len()
            )));
        }
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Self {
            message_id: word(0),
            frame_number: word(4),
            total_message_count: word(8),
            total_message_length: word(12),
        })
    }
}

/// Split a serialized payload into ready-to-send datagrams
///
/// Produces `ceil(payload.len() / chunk_size)` datagrams, each a header
/// followed by its payload slice. An empty payload still produces one
/// header-only datagram so every frame has a chunk 0.
pub fn split_frame(payload: &[u8], frame_number: u32, chunk_size: usize) -> Vec<Vec<u8>> {
    assert!(chunk_size > 0, "chunk_size must be non-zero");
    let count = payload.len().div_ceil(chunk_size).max(1);

    let mut datagrams = Vec::with_capacity(count);
    for i in 0..count {
        let start = i * chunk_size;
        let end = (start + chunk_size).min(payload.len());
        let header = FrameHeader {
            message_id: i as u32,
            frame_number,
            total_message_count: count as u32,
            total_message_length: payload.len() as u32,
        };
        let mut datagram = Vec::with_capacity(FrameHeader::WIRE_LEN + (end - start));
        datagram.extend_from_slice(&header.encode());
        datagram.extend_from_slice(&payload[start..end]);
        datagrams.push(datagram);
    }
    datagrams
}

/// Stateful frame reassembler
///
/// Owns one preallocated buffer sized to the largest expected message;
/// chunks are copied in at their offset, never individually allocated.
/// One reassembler serves one adapter and is only ever touched by the
/// pool task draining that adapter's inbound queue.
pub struct Reassembler {
    buffer: Vec<u8>,
    chunk_size: usize,
    /// Frame number of the previously processed chunk
    prev_frame_number: Option<u32>,
    /// Cleared until the first chunk 0 aligns us to a frame boundary
    synced: bool,
}

impl Reassembler {
    /// Create a reassembler for messages up to `max_message_len` bytes
    pub fn new(max_message_len: usize, chunk_size: usize) -> Self {
        Self {
            buffer: vec![0u8; max_message_len],
            chunk_size,
            prev_frame_number: None,
            synced: false,
        }
    }

    /// Process one received chunk
    ///
    /// Returns the completed payload when this chunk finishes a frame,
    /// otherwise `None`. Chunks with out-of-range headers are dropped and do
    /// not count as processed.
    ///
    /// The completion rule is last-chunk plus frame-number continuity with
    /// the preceding chunk. Two consequences are inherent to that rule and
    /// intentionally preserved: a single-chunk frame can never complete, and
    /// if an entire frame is lost while the frame counter wraps back to a
    /// previously seen value, stale buffer contents could be delivered.
    pub fn accept(&mut self, header: &FrameHeader, payload: &[u8]) -> Option<&[u8]> {
        if !self.synced {
            if header.message_id != 0 {
                log::trace!(
                    "discarding chunk {} of frame {} while syncing",
                    header.message_id,
                    header.frame_number
                );
                return None;
            }
            self.synced = true;
        }

        if header.message_id >= header.total_message_count {
            log::warn!(
                "chunk index {} out of range (count {})",
                header.message_id,
                header.total_message_count
            );
            return None;
        }
        let offset = header.message_id as usize * self.chunk_size;
        let total_len = header.total_message_length as usize;
        if offset + payload.len() > self.buffer.len() || total_len > self.buffer.len() {
            log::warn!(
                "chunk {} of frame {} exceeds reassembly buffer ({} bytes)",
                header.message_id,
                header.frame_number,
                self.buffer.len()
            );
            return None;
        }

        self.buffer[offset..offset + payload.len()].copy_from_slice(payload);
        let prev = self.prev_frame_number.replace(header.frame_number);

        let last_chunk = header.message_id + 1 == header.total_message_count;
        if last_chunk && prev == Some(header.frame_number) {
            Some(&self.buffer[..total_len])
        } else {
            None
        }
    }
}
