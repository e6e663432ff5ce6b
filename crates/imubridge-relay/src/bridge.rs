use std::fmt;
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use imubridge_frame::{ChannelId, FrameConfig, FrameError, FrameReader, ARM_SEQUENCE};
use imubridge_transport::{
    RelayListener, SensorStream, SerialDevice, SerialSettings, TransportError,
};
use tracing::{debug, error, info, warn};

use crate::acceptor::{AcceptorConfig, RelayAcceptor};
use crate::dispatch::RelayDispatcher;
use crate::error::{RelayError, Result};
use crate::relay::{RelayServer, RelayStats};
use crate::synchronizer::{FrameSynchronizer, SlotPolicy, SyncStats};

type BridgeSynchronizer = FrameSynchronizer<RelayDispatcher>;

const WRITER_POLL: Duration = Duration::from_millis(50);

/// Bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Sensor frame layout shared by both channels.
    pub frame: FrameConfig,
    /// Address the relay listens on.
    pub relay_addr: SocketAddr,
    /// How the synchronizer treats a channel that runs ahead.
    pub slot_policy: SlotPolicy,
    /// Write [`ARM_SEQUENCE`] to each sensor right after opening it.
    pub arm: bool,
    /// Write timeout for the relay client. `None` blocks forever.
    pub write_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            relay_addr: SocketAddr::from(([0, 0, 0, 0], RelayListener::DEFAULT_PORT)),
            slot_policy: SlotPolicy::default(),
            arm: true,
            write_timeout: Some(AcceptorConfig::DEFAULT_WRITE_TIMEOUT),
        }
    }
}

/// Where a channel's bytes come from.
pub enum ChannelSource {
    /// A serial device, opened with the given settings.
    Serial {
        path: String,
        settings: SerialSettings,
    },
    /// A captured byte dump replayed from a file.
    File(PathBuf),
    /// An already-open stream.
    Stream(SensorStream),
}

impl ChannelSource {
    /// A serial device with default settings (115200 8N1).
    pub fn serial(path: impl Into<String>) -> Self {
        ChannelSource::Serial {
            path: path.into(),
            settings: SerialSettings::default(),
        }
    }

    fn open(self) -> imubridge_transport::Result<SensorStream> {
        match self {
            ChannelSource::Serial { path, settings } => {
                SerialDevice::open_with_settings(&path, &settings)
            }
            ChannelSource::File(path) => {
                let file = File::open(&path).map_err(TransportError::Io)?;
                Ok(SensorStream::from_reader(path.display().to_string(), file))
            }
            ChannelSource::Stream(stream) => Ok(stream),
        }
    }
}

impl fmt::Display for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSource::Serial { path, .. } => f.write_str(path),
            ChannelSource::File(path) => write!(f, "{}", path.display()),
            ChannelSource::Stream(stream) => f.write_str(stream.label()),
        }
    }
}

/// Stops a running [`Bridge`] from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    synchronizer: Arc<BridgeSynchronizer>,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            info!("bridge shutdown requested");
        }
        self.synchronizer.close();
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The running bridge: two channel threads feeding one synchronizer, a writer
/// thread forwarding combined frames to the relay, and an acceptor thread
/// serving the relay client.
///
/// A channel whose source cannot be opened is reported and left idle; the
/// bridge keeps running but never emits a combined frame. Once every opened
/// source has reached end of stream the bridge shuts itself down.
pub struct Bridge {
    relay: Arc<RelayServer>,
    synchronizer: Arc<BridgeSynchronizer>,
    shutdown: ShutdownHandle,
    local_addr: SocketAddr,
    degraded: Vec<ChannelId>,
    threads: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Open both channels, bind the relay and start every worker.
    ///
    /// Only an invalid frame layout, a failed relay bind or a failed thread
    /// spawn is fatal.
    pub fn start(config: BridgeConfig, sources: [ChannelSource; 2]) -> Result<Self> {
        config.frame.validate()?;

        let flag = Arc::new(AtomicBool::new(false));
        let relay = Arc::new(RelayServer::new());
        let (dispatcher, writer) = RelayDispatcher::new(Arc::clone(&relay));
        let synchronizer = Arc::new(FrameSynchronizer::with_policy(
            dispatcher,
            config.slot_policy,
        ));
        let shutdown = ShutdownHandle {
            flag: Arc::clone(&flag),
            synchronizer: Arc::clone(&synchronizer),
        };

        let acceptor = RelayAcceptor::bind(
            AcceptorConfig {
                write_timeout: config.write_timeout,
                ..AcceptorConfig::new(config.relay_addr)
            },
            Arc::clone(&flag),
        )?;
        let local_addr = acceptor.local_addr();

        let mut bridge = Self {
            relay: Arc::clone(&relay),
            synchronizer,
            shutdown,
            local_addr,
            degraded: Vec::new(),
            threads: Vec::new(),
        };

        let mut readers = Vec::with_capacity(ChannelId::ALL.len());
        for (channel, source) in ChannelId::ALL.into_iter().zip(sources) {
            match open_channel(channel, source, &config) {
                Some(reader) => readers.push((channel, reader)),
                None => bridge.degraded.push(channel),
            }
        }

        let writer_flag = Arc::clone(&flag);
        bridge.spawn("imubridge-writer".to_string(), move || {
            writer.run(&writer_flag, WRITER_POLL)
        })?;

        let live = Arc::new(AtomicUsize::new(readers.len()));
        for (channel, reader) in readers {
            let synchronizer = Arc::clone(&bridge.synchronizer);
            let shutdown = bridge.shutdown.clone();
            let live = Arc::clone(&live);
            bridge.spawn(format!("imubridge-{channel}"), move || {
                run_channel(channel, reader, &synchronizer, &shutdown, &live)
            })?;
        }

        bridge.spawn("imubridge-relay".to_string(), move || acceptor.run(relay))?;
        info!(addr = %local_addr, degraded = bridge.degraded.len(), "bridge started");
        Ok(bridge)
    }

    /// The relay's resolved listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The relay owning the client connection.
    pub fn relay(&self) -> &Arc<RelayServer> {
        &self.relay
    }

    /// Relay counters.
    pub fn relay_stats(&self) -> RelayStats {
        self.relay.stats()
    }

    /// Synchronizer counters.
    pub fn sync_stats(&self) -> SyncStats {
        self.synchronizer.stats()
    }

    /// Channels that failed to open and will never produce frames.
    pub fn degraded_channels(&self) -> &[ChannelId] {
        &self.degraded
    }

    /// A handle that can stop the bridge from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Request shutdown and wait for every worker.
    pub fn shutdown(self) {
        self.shutdown.trigger();
        self.join();
    }

    /// Wait for every worker. Returns once shutdown has been triggered,
    /// either through a [`ShutdownHandle`] or by every opened source ending.
    pub fn join(mut self) {
        for handle in std::mem::take(&mut self.threads) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(thread = %name, "bridge thread panicked");
            }
        }
        debug!("bridge stopped");
    }

    fn spawn<F>(&mut self, name: String, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| RelayError::Spawn { name, source })?;
        self.threads.push(handle);
        Ok(())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.shutdown.trigger();
        }
    }
}

fn open_channel(
    channel: ChannelId,
    source: ChannelSource,
    config: &BridgeConfig,
) -> Option<FrameReader<SensorStream>> {
    let description = source.to_string();
    let mut stream = match source.open() {
        Ok(stream) => stream,
        Err(err) => {
            error!(%channel, source = %description, error = %err, "failed to open sensor stream, channel disabled");
            return None;
        }
    };

    if config.arm {
        if let Err(err) = stream.arm(&ARM_SEQUENCE) {
            warn!(%channel, source = %description, error = %err, "failed to arm sensor");
        }
    }

    match FrameReader::for_sensor(stream, channel, config.frame.clone()) {
        Ok(reader) => Some(reader),
        Err(err) => {
            error!(%channel, source = %description, error = %err, "failed to configure sensor stream, channel disabled");
            None
        }
    }
}

fn run_channel(
    channel: ChannelId,
    mut reader: FrameReader<SensorStream>,
    synchronizer: &BridgeSynchronizer,
    shutdown: &ShutdownHandle,
    live: &AtomicUsize,
) {
    let mut announced = false;
    while !shutdown.is_triggered() {
        match reader.read_frame() {
            Ok(frame) => {
                if !announced {
                    info!(%channel, source = reader.get_ref().label(), "first frame received");
                    announced = true;
                }
                synchronizer.on_frame(frame);
            }
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                info!(%channel, "sensor stream ended");
                if live.fetch_sub(1, Ordering::SeqCst) == 1 {
                    info!("every sensor stream ended, stopping bridge");
                    shutdown.trigger();
                }
                break;
            }
            Err(err) => {
                error!(%channel, error = %err, "sensor read failed, channel stopped");
                break;
            }
        }
    }
    let stats = reader.detector().stats();
    debug!(
        %channel,
        frames = stats.frames,
        skipped_bytes = stats.skipped_bytes,
        trailer_mismatches = stats.trailer_mismatches,
        "channel reader stopped"
    );
}
