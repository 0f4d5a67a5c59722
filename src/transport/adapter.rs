//! Duplex UDP wire adapter
//!
//! One [`WireAdapter`] moves one message kind in one direction over the
//! fragmenting wire protocol:
//!
//! - **Transmit lane**: [`send`] enqueues on a [`TransportQueue`]; the drain
//!   task (on a pool worker) serializes the message, splits it into chunks
//!   and fires each datagram at the configured destination. A failed
//!   transmit raises the kind's send error code and moves on to the next
//!   queued message.
//! - **Receive lane**: a dedicated network thread blocks on the socket with
//!   a short read timeout, parses the chunk header and enqueues the chunk;
//!   reassembly, payload decode and the consumer decode callback all run on
//!   a pool worker, so datagram-read latency never pays for
//!   deserialization. Socket read errors raise the kind's receive error
//!   code and the loop continues.
//!
//! Construction binds the sockets eagerly; a bind failure is fatal and
//! surfaces as `Err` from the constructor. [`stop`] is idempotent and safe
//! to call before [`start`].
//!
//! [`send`]: WireAdapter::send
//! [`start`]: WireAdapter::start
//! [`stop`]: WireAdapter::stop

use crate::error::{ErrorCode, Result};
use crate::transport::pool::ThreadPool;
use crate::transport::queue::TransportQueue;
use crate::wire::frame::{split_frame, FrameHeader, Reassembler, DEFAULT_CHUNK_SIZE};
use crate::wire::serializer::{Serializer, WireFormat};
use crate::wire::translator::WireMessage;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Callback invoked with consumer-visible error codes
pub type ErrorCallback = Arc<dyn Fn(ErrorCode) + Send + Sync>;

/// Callback invoked with each decoded message
pub type DecodeCallback<M> = Arc<dyn Fn(M) + Send + Sync>;

/// Read timeout on the receive socket; bounds worst-case stop latency
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Tuning knobs shared by both lanes
#[derive(Debug, Clone, Copy)]
pub struct AdapterOptions {
    /// Payload bytes per chunk
    pub chunk_size: usize,
    /// Largest serialized message the receive lane will reassemble
    pub max_message_len: usize,
    /// Payload encoding, must match the remote end
    pub format: WireFormat,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_len: 10_000_000,
            format: WireFormat::default(),
        }
    }
}

/// One received chunk queued for reassembly
struct Chunk {
    header: FrameHeader,
    payload: Vec<u8>,
}

/// Outbound state shared between `send` callers and pool drains
struct SendLane<M: WireMessage> {
    queue: TransportQueue<M>,
    socket: UdpSocket,
    dest: SocketAddr,
    serializer: Serializer,
    chunk_size: usize,
    frame_number: AtomicU32,
    on_error: ErrorCallback,
}

impl<M: WireMessage> SendLane<M> {
    fn drain(&self) {
        self.queue.drain(|msg| {
            let payload = match self.serializer.serialize(&msg.to_wire()) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("failed to serialize {} message: {}", M::KIND, e);
                    (self.on_error)(M::SEND_ERROR);
                    return;
                }
            };
            let frame_number = self.frame_number.fetch_add(1, Ordering::Relaxed);
            for datagram in split_frame(&payload, frame_number, self.chunk_size) {
                if let Err(e) = self.socket.send_to(&datagram, self.dest) {
                    // Not fatal: report and continue with the next message
                    log::warn!("failed to send {} chunk to {}: {}", M::KIND, self.dest, e);
                    (self.on_error)(M::SEND_ERROR);
                    break;
                }
            }
        });
    }
}

/// Inbound state shared between the network thread and pool drains
struct RecvLane<M: WireMessage> {
    queue: TransportQueue<Chunk>,
    /// Exclusively written by this lane's drain; the queue's
    /// at-most-one-drain invariant keeps the lock uncontended.
    reassembler: Mutex<Reassembler>,
    serializer: Serializer,
    on_decode: DecodeCallback<M>,
}

impl<M: WireMessage> RecvLane<M> {
    fn drain(&self) {
        self.queue.drain(|chunk| {
            // Decode inside the lock (the bytes borrow the arena), invoke
            // the consumer callback outside it
            let decoded = {
                let mut reassembler = self.reassembler.lock();
                reassembler.accept(&chunk.header, &chunk.payload).map(|bytes| {
                    self.serializer
                        .deserialize::<M::Wire>(bytes)
                        .and_then(M::from_wire)
                })
            };
            match decoded {
                Some(Ok(msg)) => (self.on_decode)(msg),
                Some(Err(e)) => log::warn!("dropping undecodable {} frame: {}", M::KIND, e),
                None => {}
            }
        });
    }
}

/// Per-stream duplex engine over the UDP wire protocol
pub struct WireAdapter<M: WireMessage> {
    name: String,
    pool: Arc<ThreadPool>,
    chunk_size: usize,
    send_lane: Option<Arc<SendLane<M>>>,
    recv_lane: Option<Arc<RecvLane<M>>>,
    /// Taken by the receive thread at start
    recv_socket: Option<UdpSocket>,
    recv_addr: Option<SocketAddr>,
    on_recv_error: ErrorCallback,
    running: Arc<AtomicBool>,
    recv_thread: Option<JoinHandle<()>>,
}

impl<M: WireMessage> WireAdapter<M> {
    /// Build a transmit-only adapter targeting `dest`
    ///
    /// Binds an ephemeral local socket; a bind failure is fatal.
    pub fn transmitter(
        name: impl Into<String>,
        dest: SocketAddr,
        options: AdapterOptions,
        pool: Arc<ThreadPool>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        log::info!("{}: sending {} frames to {}", name, M::KIND, dest);

        let send_lane = Arc::new(SendLane {
            queue: TransportQueue::new(),
            socket,
            dest,
            serializer: Serializer::new(options.format),
            chunk_size: options.chunk_size,
            frame_number: AtomicU32::new(0),
            on_error: Arc::clone(&on_error),
        });

        Ok(Self {
            name,
            pool,
            chunk_size: options.chunk_size,
            send_lane: Some(send_lane),
            recv_lane: None,
            recv_socket: None,
            recv_addr: None,
            on_recv_error: on_error,
            running: Arc::new(AtomicBool::new(false)),
            recv_thread: None,
        })
    }

    /// Build a receive-only adapter bound to `port`
    ///
    /// Binds eagerly; a bind failure is fatal. Port 0 binds an ephemeral
    /// port, queryable via [`recv_addr`](Self::recv_addr).
    pub fn receiver(
        name: impl Into<String>,
        port: u16,
        options: AdapterOptions,
        pool: Arc<ThreadPool>,
        on_decode: DecodeCallback<M>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let recv_addr = socket.local_addr()?;
        log::info!("{}: receiving {} frames on {}", name, M::KIND, recv_addr);

        let recv_lane = Arc::new(RecvLane {
            queue: TransportQueue::new(),
            reassembler: Mutex::new(Reassembler::new(options.max_message_len, options.chunk_size)),
            serializer: Serializer::new(options.format),
            on_decode,
        });

        Ok(Self {
            name,
            pool,
            chunk_size: options.chunk_size,
            send_lane: None,
            recv_lane: Some(recv_lane),
            recv_socket: Some(socket),
            recv_addr: Some(recv_addr),
            on_recv_error: on_error,
            running: Arc::new(AtomicBool::new(false)),
            recv_thread: None,
        })
    }

    /// Local address of the receive socket, if this adapter receives
    pub fn recv_addr(&self) -> Option<SocketAddr> {
        self.recv_addr
    }

    /// Enqueue a message for transmission
    ///
    /// Returns immediately; serialization and transmit happen on a pool
    /// worker. A no-op on a receive-only adapter.
    pub fn send(&self, msg: M) {
        let Some(lane) = &self.send_lane else {
            log::debug!("{}: send ignored, no transmit lane", self.name);
            return;
        };
        if lane.queue.push(msg) {
            let lane = Arc::clone(lane);
            self.pool.execute(move || lane.drain());
        }
    }

    /// Spawn the network receive thread (receiver role only)
    pub fn start(&mut self) -> Result<()> {
        if self.recv_thread.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::Relaxed);

        let Some(socket) = self.recv_socket.take() else {
            return Ok(());
        };
        let Some(lane) = self.recv_lane.as_ref().map(Arc::clone) else {
            return Ok(());
        };
        let pool = Arc::clone(&self.pool);
        let running = Arc::clone(&self.running);
        let on_error = Arc::clone(&self.on_recv_error);
        let name = self.name.clone();
        let scratch_len = FrameHeader::WIRE_LEN + self.chunk_size;

        let handle = std::thread::Builder::new()
            .name(format!("{}-recv", self.name))
            .spawn(move || {
                log::debug!("{}: receive loop started", name);
                let mut scratch = vec![0u8; scratch_len];

                while running.load(Ordering::Relaxed) {
                    let len = match socket.recv_from(&mut scratch) {
                        Ok((len, _src)) => len,
                        Err(e)
                            if e.kind() == ErrorKind::WouldBlock
                                || e.kind() == ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::error!("{}: socket read error: {}", name, e);
                            (on_error)(M::RECV_ERROR);
                            continue;
                        }
                    };

                    let header = match FrameHeader::decode(&scratch[..len]) {
                        Ok(h) => h,
                        Err(e) => {
                            log::warn!("{}: {}", name, e);
                            continue;
                        }
                    };
                    let chunk = Chunk {
                        header,
                        payload: scratch[FrameHeader::WIRE_LEN..len].to_vec(),
                    };
                    if lane.queue.push(chunk) {
                        let lane = Arc::clone(&lane);
                        pool.execute(move || lane.drain());
                    }
                }
                log::debug!("{}: receive loop stopped", name);
            })?;

        self.recv_thread = Some(handle);
        Ok(())
    }

    /// Stop the receive thread and release the reassembly buffer
    ///
    /// Idempotent: a second call, or a call before [`start`](Self::start),
    /// is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.recv_thread.take() {
            handle
                .join()
                .map_err(|_| crate::error::Error::Other(format!("{}: receive thread panicked", self.name)))?;
        }
        // In-flight pool drains hold their own reference; the buffer is
        // freed once the last one finishes.
        self.recv_lane = None;
        Ok(())
    }
}

impl<M: WireMessage> Drop for WireAdapter<M> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("{}: {}", self.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{PointXyzi, PointsMessage};
    use crossbeam_channel::bounded;

    fn ignore_errors() -> ErrorCallback {
        Arc::new(|_| {})
    }

    fn small_chunks() -> AdapterOptions {
        AdapterOptions {
            chunk_size: 96,
            max_message_len: 64 * 1024,
            ..Default::default()
        }
    }

    fn ten_point_message() -> PointsMessage {
        let cloud = (0..10)
            .map(|i| PointXyzi::new(i as f32, 2.0 * i as f32, -(i as f32), i as f32))
            .collect();
        PointsMessage {
            timestamp: 99.25,
            seq: 7,
            parent_frame_id: "map".into(),
            frame_id: "lidar0".into(),
            is_motion_correct: false,
            height: 1,
            width: 10,
            is_dense: true,
            is_transform: false,
            lidar_model: "RS16".into(),
            points_type: "XYZI".into(),
            cloud,
        }
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let pool = Arc::new(ThreadPool::new(1));
        let mut adapter: WireAdapter<PointsMessage> = WireAdapter::receiver(
            "points-recv",
            0,
            AdapterOptions::default(),
            pool,
            Arc::new(|_| {}),
            ignore_errors(),
        )
        .unwrap();

        assert!(adapter.stop().is_ok());
        assert!(adapter.stop().is_ok());
    }

    #[test]
    fn test_stop_twice_after_start() {
        let pool = Arc::new(ThreadPool::new(1));
        let mut adapter: WireAdapter<PointsMessage> = WireAdapter::receiver(
            "points-recv",
            0,
            AdapterOptions::default(),
            pool,
            Arc::new(|_| {}),
            ignore_errors(),
        )
        .unwrap();

        adapter.start().unwrap();
        assert!(adapter.stop().is_ok());
        assert!(adapter.stop().is_ok());
    }

    #[test]
    fn test_end_to_end_multi_chunk_points() {
        let pool = Arc::new(ThreadPool::new(2));
        let (tx, rx) = bounded::<PointsMessage>(4);

        let mut receiver: WireAdapter<PointsMessage> = WireAdapter::receiver(
            "points-recv",
            0,
            small_chunks(),
            Arc::clone(&pool),
            Arc::new(move |msg| {
                tx.try_send(msg).ok();
            }),
            ignore_errors(),
        )
        .unwrap();
        receiver.start().unwrap();
        let dest = receiver.recv_addr().unwrap();
        let dest = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), dest.port());

        let transmitter: WireAdapter<PointsMessage> = WireAdapter::transmitter(
            "points-send",
            dest,
            small_chunks(),
            Arc::clone(&pool),
            ignore_errors(),
        )
        .unwrap();

        let msg = ten_point_message();
        // The serialized message spans several 96-byte chunks
        transmitter.send(msg.clone());

        let received = rx.recv_timeout(Duration::from_secs(2)).expect("no decode");
        assert_eq!(received.seq, msg.seq);
        assert_eq!(received.frame_id, msg.frame_id);
        assert_eq!(received.cloud.len(), 10);
        for (a, b) in received.cloud.iter().zip(msg.cloud.iter()) {
            assert!((a.x - b.x).abs() < f32::EPSILON);
            assert!((a.y - b.y).abs() < f32::EPSILON);
            assert!((a.z - b.z).abs() < f32::EPSILON);
            assert!((a.intensity - b.intensity).abs() < f32::EPSILON);
        }

        // Exactly one callback for one message
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

        receiver.stop().unwrap();
    }

    #[test]
    fn test_send_failure_raises_error_code_and_continues() {
        let pool = Arc::new(ThreadPool::new(1));
        let (err_tx, err_rx) = bounded::<ErrorCode>(8);

        // Port 0 is not a valid destination; every transmit fails
        let dest = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
        let transmitter: WireAdapter<PointsMessage> = WireAdapter::transmitter(
            "points-send",
            dest,
            AdapterOptions::default(),
            pool,
            Arc::new(move |code| {
                err_tx.try_send(code).ok();
            }),
        )
        .unwrap();

        transmitter.send(ten_point_message());
        transmitter.send(ten_point_message());

        let code = err_rx.recv_timeout(Duration::from_secs(2)).expect("no error");
        assert_eq!(code, ErrorCode::PointsSendError);
        // The second queued message is still attempted
        assert!(err_rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
