use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use imubridge_frame::{ChannelId, ARM_SEQUENCE, DEFAULT_HEADER, DEFAULT_TRAILER};
use imubridge_relay::{Bridge, BridgeConfig, ChannelSource, ConnectionState, RelayClient};
use imubridge_transport::SensorStream;

/// Sensor stand-in: bytes pushed through a channel, idle reads time out like a serial line.
struct Feed {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

impl Read for Feed {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv_timeout(Duration::from_millis(20)) {
                Ok(bytes) => self.pending = bytes,
                Err(RecvTimeoutError::Timeout) => return Err(ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

#[derive(Clone, Default)]
struct CommandLog(Arc<Mutex<Vec<u8>>>);

impl Write for CommandLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("command log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct Sensor {
    tx: Sender<Vec<u8>>,
    commands: CommandLog,
}

impl Sensor {
    fn new(label: &str) -> (Self, ChannelSource) {
        let (tx, rx) = mpsc::channel();
        let commands = CommandLog::default();
        let stream = SensorStream::from_parts(
            label,
            Feed {
                rx,
                pending: Vec::new(),
            },
            commands.clone(),
        );
        (Self { tx, commands }, ChannelSource::Stream(stream))
    }

    fn emit(&self, payload: &[u8]) {
        let mut wire = vec![DEFAULT_HEADER];
        wire.extend_from_slice(payload);
        wire.push(DEFAULT_TRAILER);
        self.tx.send(wire).expect("channel thread should be alive");
    }
}

fn loopback_config() -> BridgeConfig {
    BridgeConfig {
        relay_addr: "127.0.0.1:0".parse().expect("valid address"),
        ..BridgeConfig::default()
    }
}

fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

fn connect_retry(bridge: &Bridge) -> RelayClient {
    for _ in 0..500 {
        if let Ok(client) = RelayClient::connect(bridge.local_addr()) {
            return client;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("relay never accepted a client");
}

/// Emit one frame per channel and wait for the synchronizer to pair them.
fn emit_pair(bridge: &Bridge, imu0: &Sensor, imu1: &Sensor, a: u8, b: u8) {
    let before = bridge.sync_stats().emitted;
    imu0.emit(&[a; 20]);
    imu1.emit(&[b; 20]);
    eventually("pairing", || bridge.sync_stats().emitted > before);
}

#[test]
fn client_receives_channel_zero_then_channel_one() {
    let (imu0, src0) = Sensor::new("imu0-test");
    let (imu1, src1) = Sensor::new("imu1-test");
    let bridge = Bridge::start(loopback_config(), [src0, src1]).expect("bridge should start");

    let mut client = connect_retry(&bridge);
    eventually("client attach", || {
        bridge.relay().state() == ConnectionState::Connected
    });

    // Channel 1 reports first; the wire order is still channel 0 then channel 1.
    let before = bridge.sync_stats().emitted;
    imu1.emit(&[0xFF; 20]);
    thread::sleep(Duration::from_millis(30));
    imu0.emit(&[0x00; 20]);
    eventually("pairing", || bridge.sync_stats().emitted > before);

    let frame = client.recv().expect("combined frame");
    let mut expected = vec![0x00; 20];
    expected.extend(vec![0xFF; 20]);
    assert_eq!(frame.as_bytes(), expected.as_slice());

    assert_eq!(*imu0.commands.0.lock().unwrap(), ARM_SEQUENCE.to_vec());
    assert_eq!(*imu1.commands.0.lock().unwrap(), ARM_SEQUENCE.to_vec());

    bridge.shutdown();
}

#[test]
fn pairs_without_client_are_dropped() {
    let (imu0, src0) = Sensor::new("imu0-test");
    let (imu1, src1) = Sensor::new("imu1-test");
    let bridge = Bridge::start(loopback_config(), [src0, src1]).expect("bridge should start");

    emit_pair(&bridge, &imu0, &imu1, 1, 2);
    eventually("drop accounting", || bridge.relay_stats().dropped == 1);

    let mut client = connect_retry(&bridge);
    eventually("client attach", || {
        bridge.relay().state() == ConnectionState::Connected
    });
    emit_pair(&bridge, &imu0, &imu1, 3, 4);

    let frame = client.recv().expect("combined frame");
    assert_eq!(frame.part(ChannelId::Zero), &[3u8; 20]);
    assert_eq!(frame.part(ChannelId::One), &[4u8; 20]);

    bridge.shutdown();
}

#[test]
fn lost_client_is_replaced_without_replay() {
    let (imu0, src0) = Sensor::new("imu0-test");
    let (imu1, src1) = Sensor::new("imu1-test");
    let bridge = Bridge::start(loopback_config(), [src0, src1]).expect("bridge should start");

    let mut first = connect_retry(&bridge);
    eventually("first attach", || {
        bridge.relay().state() == ConnectionState::Connected
    });
    emit_pair(&bridge, &imu0, &imu1, 10, 11);
    assert_eq!(first.recv().expect("first frame").as_bytes()[0], 10);
    drop(first);

    // Writes to a closed socket fail within a few sends.
    let mut fill = 20u8;
    while bridge.relay().state() == ConnectionState::Connected {
        emit_pair(&bridge, &imu0, &imu1, fill, fill);
        fill = fill.wrapping_add(1);
        assert!(fill < 200, "relay never noticed the lost client");
    }
    assert_eq!(bridge.relay_stats().send_failures, 1);

    // Produced while nobody is attached: dropped, never replayed. Once it is
    // counted, every frame queued before it has been handled too.
    let dropped = bridge.relay_stats().dropped;
    emit_pair(&bridge, &imu0, &imu1, 0xEE, 0xEE);
    eventually("drop accounting", || bridge.relay_stats().dropped > dropped);

    let mut second = connect_retry(&bridge);
    eventually("second attach", || {
        bridge.relay().state() == ConnectionState::Connected
    });
    emit_pair(&bridge, &imu0, &imu1, 0x42, 0x43);

    let frame = second.recv().expect("frame after reconnect");
    assert_eq!(frame.part(ChannelId::Zero), &[0x42; 20]);
    assert_eq!(frame.part(ChannelId::One), &[0x43; 20]);
    assert_eq!(bridge.relay_stats().clients, 2);

    bridge.shutdown();
}

#[test]
fn unopenable_channel_leaves_bridge_degraded() {
    let (_imu1, src1) = Sensor::new("imu1-test");
    let missing = ChannelSource::serial("/dev/imubridge-test-missing-device");
    let bridge = Bridge::start(loopback_config(), [missing, src1]).expect("bridge should start");

    assert_eq!(bridge.degraded_channels(), &[ChannelId::Zero]);

    let _client = connect_retry(&bridge);
    eventually("client attach", || {
        bridge.relay().state() == ConnectionState::Connected
    });
    assert_eq!(bridge.sync_stats().emitted, 0);

    bridge.shutdown();
}

#[test]
fn replayed_files_are_paired_in_order() {
    let dir = std::env::temp_dir().join(format!("imubridge-replay-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");

    let capture = |fill: u8| {
        let mut bytes = b"noise".to_vec();
        for i in 0..3u8 {
            bytes.push(DEFAULT_HEADER);
            bytes.extend([fill + i; 20]);
            bytes.push(DEFAULT_TRAILER);
        }
        bytes
    };
    let path0 = dir.join("imu0.bin");
    let path1 = dir.join("imu1.bin");
    std::fs::write(&path0, capture(0x10)).expect("write capture");
    std::fs::write(&path1, capture(0x20)).expect("write capture");

    let config = BridgeConfig {
        arm: false,
        ..loopback_config()
    };
    let bridge = Bridge::start(
        config,
        [ChannelSource::File(path0), ChannelSource::File(path1)],
    )
    .expect("bridge should start");

    // Both captures reaching end of stream stops the bridge on its own.
    let handle = bridge.shutdown_handle();
    eventually("replay to finish", || handle.is_triggered());
    let stats = bridge.sync_stats();
    assert_eq!(stats.recorded, [3, 3]);
    assert!(stats.emitted >= 1);
    assert!(stats.emitted <= 3);

    bridge.join();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn one_ended_source_keeps_bridge_running() {
    let dir = std::env::temp_dir().join(format!("imubridge-partial-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path0 = dir.join("imu0.bin");
    let mut capture = vec![DEFAULT_HEADER];
    capture.extend([0x30; 20]);
    capture.push(DEFAULT_TRAILER);
    std::fs::write(&path0, capture).expect("write capture");

    let (imu1, src1) = Sensor::new("imu1-test");
    let config = BridgeConfig {
        arm: false,
        ..loopback_config()
    };
    let bridge = Bridge::start(config, [ChannelSource::File(path0), src1])
        .expect("bridge should start");

    eventually("capture to be read", || bridge.sync_stats().recorded[0] == 1);
    imu1.emit(&[0x31; 20]);
    eventually("pairing", || bridge.sync_stats().emitted == 1);
    assert!(!bridge.shutdown_handle().is_triggered());

    bridge.shutdown();
    let _ = std::fs::remove_dir_all(&dir);
}
