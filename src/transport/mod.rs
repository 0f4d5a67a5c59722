//! Transport plumbing: worker pool, producer/consumer queues, and the
//! duplex UDP wire adapter built from them.

pub mod adapter;
pub mod pool;
pub mod queue;

pub use adapter::{AdapterOptions, WireAdapter};
pub use pool::ThreadPool;
pub use queue::TransportQueue;
