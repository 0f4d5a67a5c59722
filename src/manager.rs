//! Sensor manager: owns the adapter set and the consumer fan-out
//!
//! The manager reads per-unit configuration, decides which transport feeds
//! each stream direction, builds exactly the wire adapters required and
//! wires their decode/error callbacks into consumer-facing fan-out lists.
//!
//! # Source selection
//!
//! The active transport is an enumerated value decoded from configuration
//! by a pure function; no capability probing, no runtime type inspection.
//! Local-driver and middleware sources are external collaborators: they
//! push into the manager through the `publish_*` seams and the manager
//! builds no wire receivers for them.
//!
//! # Consumer fan-out
//!
//! Each registered consumer gets its own bounded channel and dispatch
//! thread. Delivery is a `try_send` per consumer in registration order: a
//! slow consumer fills its own channel and drops its own backlog, but can
//! never stall delivery to the others or block registration. The list
//! locks are held only while registering and while iterating for delivery,
//! never while a consumer callback runs.

use crate::config::{Config, LidarConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::msg::{PacketMessage, PointsMessage, ScanMessage};
use crate::transport::adapter::{AdapterOptions, ErrorCallback, WireAdapter};
use crate::transport::pool::ThreadPool;
use crate::wire::translator::WireMessage;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Which transport supplies or consumes a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Stream disabled
    Unused,
    /// Local driver SDK feeds the stream (external collaborator)
    LocalDriver,
    /// Middleware pub/sub transport feeds the stream (external collaborator)
    Middleware,
    /// Wire protocol carries raw packet scans
    WirePackets,
    /// Wire protocol carries decoded point clouds
    WirePoints,
}

impl MessageSource {
    /// Decode the configuration integer
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Unused),
            1 => Ok(Self::LocalDriver),
            2 => Ok(Self::Middleware),
            3 => Ok(Self::WirePackets),
            5 => Ok(Self::WirePoints),
            other => Err(Error::InvalidParameter(format!(
                "unknown msg_source {}",
                other
            ))),
        }
    }
}

/// Adapters one configured unit needs, as a pure function of its config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitPlan {
    pub recv_points: bool,
    pub recv_packets: bool,
    pub send_points: bool,
    pub send_packets: bool,
}

/// Decide which adapters a unit needs
///
/// Send and receive directions are decided independently, as are the
/// points and packets streams. A unit that receives a stream over the wire
/// never retransmits the same stream (it would echo its own input).
pub fn plan_unit(cfg: &LidarConfig) -> Result<UnitPlan> {
    let source = MessageSource::from_code(cfg.msg_source)?;
    let recv_points = source == MessageSource::WirePoints;
    let recv_packets = source == MessageSource::WirePackets;
    Ok(UnitPlan {
        recv_points,
        recv_packets,
        send_points: cfg.send_points_proto && !recv_points,
        send_packets: cfg.send_packets_proto && !recv_packets,
    })
}

/// Bounded backlog per registered consumer
const DISPATCH_CAPACITY: usize = 64;

/// One registered consumer: a bounded channel and its dispatch thread
struct Dispatcher<T: Send + 'static> {
    tx: Sender<T>,
    /// Detached; exits when `tx` is dropped
    _handle: JoinHandle<()>,
}

impl<T: Send + 'static> Dispatcher<T> {
    fn spawn(name: String, callback: impl Fn(T) + Send + 'static) -> Self {
        let (tx, rx) = bounded::<T>(DISPATCH_CAPACITY);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                while let Ok(item) = rx.recv() {
                    callback(item);
                }
            })
            .expect("failed to spawn consumer dispatch thread");
        Self { tx, _handle: handle }
    }

    fn deliver(&self, item: T) {
        // Full channel means a lagging consumer; drop its backlog, not ours
        if self.tx.try_send(item).is_err() {
            log::trace!("consumer channel full, message dropped");
        }
    }
}

/// Consumer-facing delivery lists, one lock per list
#[derive(Default)]
struct FanOut {
    points: Mutex<Vec<Dispatcher<PointsMessage>>>,
    scans: Mutex<Vec<Dispatcher<ScanMessage>>>,
    packets: Mutex<Vec<Dispatcher<PacketMessage>>>,
    errors: Mutex<Vec<Dispatcher<ErrorCode>>>,
}

impl FanOut {
    fn deliver_points(&self, msg: PointsMessage) {
        for consumer in self.points.lock().iter() {
            consumer.deliver(msg.clone());
        }
    }

    fn deliver_scan(&self, msg: ScanMessage) {
        for consumer in self.scans.lock().iter() {
            consumer.deliver(msg.clone());
        }
    }

    fn deliver_packet(&self, msg: PacketMessage) {
        for consumer in self.packets.lock().iter() {
            consumer.deliver(msg.clone());
        }
    }

    fn deliver_error(&self, code: ErrorCode) {
        for consumer in self.errors.lock().iter() {
            consumer.deliver(code);
        }
    }
}

/// Adapter set built for one configured sensor unit
struct LidarUnit {
    device_type: String,
    frame_id: String,
    points_rx: Option<WireAdapter<PointsMessage>>,
    scan_rx: Option<WireAdapter<ScanMessage>>,
    packet_rx: Option<WireAdapter<PacketMessage>>,
    points_tx: Option<WireAdapter<PointsMessage>>,
    scan_tx: Option<WireAdapter<ScanMessage>>,
    packet_tx: Option<WireAdapter<PacketMessage>>,
}

impl LidarUnit {
    fn adapters_mut(&mut self) -> impl Iterator<Item = &mut dyn Lifecycle> + '_ {
        // Receivers first so a unit never transmits before it can receive
        [
            self.points_rx.as_mut().map(|a| a as &mut dyn Lifecycle),
            self.scan_rx.as_mut().map(|a| a as &mut dyn Lifecycle),
            self.packet_rx.as_mut().map(|a| a as &mut dyn Lifecycle),
            self.points_tx.as_mut().map(|a| a as &mut dyn Lifecycle),
            self.scan_tx.as_mut().map(|a| a as &mut dyn Lifecycle),
            self.packet_tx.as_mut().map(|a| a as &mut dyn Lifecycle),
        ]
        .into_iter()
        .flatten()
    }
}

/// Start/stop seam shared by all adapter instantiations
trait Lifecycle {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
}

impl<M: WireMessage> Lifecycle for WireAdapter<M> {
    fn start(&mut self) -> Result<()> {
        WireAdapter::start(self)
    }
    fn stop(&mut self) -> Result<()> {
        WireAdapter::stop(self)
    }
}

/// Orchestrator owning every adapter and the consumer fan-out
pub struct SensorManager {
    pool: Option<Arc<ThreadPool>>,
    fan_out: Arc<FanOut>,
    units: Vec<LidarUnit>,
    initialized: bool,
}

impl SensorManager {
    /// Create an empty manager; call [`init`](Self::init) before use
    pub fn new() -> Self {
        Self {
            pool: None,
            fan_out: Arc::new(FanOut::default()),
            units: Vec::new(),
            initialized: false,
        }
    }

    /// Register a consumer for decoded point clouds
    pub fn register_points_callback(&self, callback: impl Fn(PointsMessage) + Send + 'static) {
        let mut list = self.fan_out.points.lock();
        let name = format!("points-consumer-{}", list.len());
        list.push(Dispatcher::spawn(name, callback));
    }

    /// Register a consumer for decoded scans
    pub fn register_scan_callback(&self, callback: impl Fn(ScanMessage) + Send + 'static) {
        let mut list = self.fan_out.scans.lock();
        let name = format!("scan-consumer-{}", list.len());
        list.push(Dispatcher::spawn(name, callback));
    }

    /// Register a consumer for decoded packets
    pub fn register_packet_callback(&self, callback: impl Fn(PacketMessage) + Send + 'static) {
        let mut list = self.fan_out.packets.lock();
        let name = format!("packet-consumer-{}", list.len());
        list.push(Dispatcher::spawn(name, callback));
    }

    /// Register a consumer for error codes
    pub fn register_error_callback(&self, callback: impl Fn(ErrorCode) + Send + 'static) {
        let mut list = self.fan_out.errors.lock();
        let name = format!("error-consumer-{}", list.len());
        list.push(Dispatcher::spawn(name, callback));
    }

    /// Build the adapter set for every configured unit
    ///
    /// Fatal on bind failure or invalid configuration; calling twice is an
    /// error.
    pub fn init(&mut self, config: &Config) -> Result<()> {
        if self.initialized {
            return Err(Error::Other("manager already initialized".into()));
        }
        let pool = Arc::new(ThreadPool::new(config.daemon.pool_workers));
        let options = AdapterOptions {
            chunk_size: config.daemon.chunk_size,
            max_message_len: config.daemon.max_message_len,
            ..Default::default()
        };

        for cfg in &config.lidar {
            let unit = self.build_unit(cfg, &pool, options)?;
            self.units.push(unit);
        }

        self.pool = Some(pool);
        self.initialized = true;
        log::info!("manager initialized with {} unit(s)", self.units.len());
        Ok(())
    }

    fn build_unit(
        &self,
        cfg: &LidarConfig,
        pool: &Arc<ThreadPool>,
        options: AdapterOptions,
    ) -> Result<LidarUnit> {
        let plan = plan_unit(cfg)?;
        log::info!(
            "unit {}/{}: source={} plan={:?}",
            cfg.device_type,
            cfg.frame_id,
            cfg.msg_source,
            plan
        );

        let fan_out = Arc::clone(&self.fan_out);
        let on_error: ErrorCallback = Arc::new(move |code| fan_out.deliver_error(code));

        let mut unit = LidarUnit {
            device_type: cfg.device_type.clone(),
            frame_id: cfg.frame_id.clone(),
            points_rx: None,
            scan_rx: None,
            packet_rx: None,
            points_tx: None,
            scan_tx: None,
            packet_tx: None,
        };
        let tag = |stream: &str| format!("{}/{}/{}", cfg.device_type, cfg.frame_id, stream);

        if plan.recv_points {
            let fan_out = Arc::clone(&self.fan_out);
            unit.points_rx = Some(WireAdapter::receiver(
                tag("points"),
                cfg.proto.points_recv_port,
                options,
                Arc::clone(pool),
                Arc::new(move |msg| fan_out.deliver_points(msg)),
                Arc::clone(&on_error),
            )?);
        }
        if plan.recv_packets {
            let fan_out = Arc::clone(&self.fan_out);
            unit.scan_rx = Some(WireAdapter::receiver(
                tag("scan"),
                cfg.proto.scan_recv_port,
                options,
                Arc::clone(pool),
                Arc::new(move |msg| fan_out.deliver_scan(msg)),
                Arc::clone(&on_error),
            )?);
            let fan_out = Arc::clone(&self.fan_out);
            unit.packet_rx = Some(WireAdapter::receiver(
                tag("packet"),
                cfg.proto.packet_recv_port,
                options,
                Arc::clone(pool),
                Arc::new(move |msg| fan_out.deliver_packet(msg)),
                Arc::clone(&on_error),
            )?);
        }
        if plan.send_points {
            let dest = parse_addr(&cfg.proto.points_send_ip, cfg.proto.points_send_port)?;
            unit.points_tx = Some(WireAdapter::transmitter(
                tag("points"),
                dest,
                options,
                Arc::clone(pool),
                Arc::clone(&on_error),
            )?);
        }
        if plan.send_packets {
            let scan_dest = parse_addr(&cfg.proto.packets_send_ip, cfg.proto.scan_send_port)?;
            unit.scan_tx = Some(WireAdapter::transmitter(
                tag("scan"),
                scan_dest,
                options,
                Arc::clone(pool),
                Arc::clone(&on_error),
            )?);
            let packet_dest = parse_addr(&cfg.proto.packets_send_ip, cfg.proto.packet_send_port)?;
            unit.packet_tx = Some(WireAdapter::transmitter(
                tag("packet"),
                packet_dest,
                options,
                Arc::clone(pool),
                Arc::clone(&on_error),
            )?);
        }
        Ok(unit)
    }

    /// Start every constructed adapter, receivers before transmitters
    pub fn start(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        for unit in &mut self.units {
            for adapter in unit.adapters_mut() {
                adapter.start()?;
            }
        }
        log::info!("manager started");
        Ok(())
    }

    /// Stop every constructed adapter
    ///
    /// Safe to call repeatedly and safe on adapters that never started.
    pub fn stop(&mut self) -> Result<()> {
        for unit in &mut self.units {
            for adapter in unit.adapters_mut() {
                adapter.stop()?;
            }
        }
        log::info!("manager stopped");
        Ok(())
    }

    /// Forward a locally produced point cloud to every points transmitter
    ///
    /// This is the seam a local driver SDK or middleware bridge calls.
    pub fn publish_points(&self, msg: &PointsMessage) {
        for unit in &self.units {
            if let Some(tx) = &unit.points_tx {
                tx.send(msg.clone());
            }
        }
    }

    /// Forward a locally produced scan to every scan transmitter
    pub fn publish_scan(&self, msg: &ScanMessage) {
        for unit in &self.units {
            if let Some(tx) = &unit.scan_tx {
                tx.send(msg.clone());
            }
        }
    }

    /// Forward a locally produced packet to every packet transmitter
    pub fn publish_packet(&self, msg: &PacketMessage) {
        for unit in &self.units {
            if let Some(tx) = &unit.packet_tx {
                tx.send(msg.clone());
            }
        }
    }

    /// Look up a unit's receive address for a stream, if it has one
    ///
    /// Mostly useful with ephemeral ports in tests and diagnostics.
    pub fn points_recv_addr(&self, device_type: &str, frame_id: &str) -> Option<SocketAddr> {
        self.units
            .iter()
            .find(|u| u.device_type == device_type && u.frame_id == frame_id)
            .and_then(|u| u.points_rx.as_ref())
            .and_then(|a| a.recv_addr())
    }
}

impl Default for SensorManager {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_addr(ip: &str, port: u16) -> Result<SocketAddr> {
    let ip = ip
        .parse()
        .map_err(|_| Error::InvalidParameter(format!("bad send ip {:?}", ip)))?;
    Ok(SocketAddr::new(ip, port))
}
