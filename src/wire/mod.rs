//! Wire protocol: payload schemas, serialization, and datagram framing
//!
//! A logical message crosses the network as a *frame*: the payload is
//! serialized ([`serializer`]), split into fixed-size chunks each prefixed
//! with a [`frame::FrameHeader`], and sent as individual UDP datagrams.
//! The receiving side reassembles chunks by offset and hands completed
//! payloads back through the [`translator`].

pub mod frame;
pub mod payload;
pub mod serializer;
pub mod translator;

pub use frame::{split_frame, FrameHeader, Reassembler, DEFAULT_CHUNK_SIZE};
pub use serializer::{Serializer, WireFormat};
pub use translator::WireMessage;
