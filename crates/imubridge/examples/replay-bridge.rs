//! Runs a bridge over two synthetic sensor streams and reads the combined
//! frames back through the relay, all in one process.
//!
//! Run with:
//!   cargo run --example replay-bridge

use std::io::{ErrorKind, Read};
use std::thread;
use std::time::{Duration, Instant};

use imubridge::frame::{DEFAULT_HEADER, DEFAULT_TRAILER};
use imubridge::relay::{Bridge, BridgeConfig, ChannelSource, ConnectionState, RelayClient};
use imubridge::transport::SensorStream;

/// Emits one noisy frame per tick, then idles like a quiet serial line.
struct Ticker {
    fill: u8,
    left: u32,
    next: Instant,
    pending: Vec<u8>,
}

impl Read for Ticker {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending.is_empty() {
            if self.left == 0 {
                return Ok(0);
            }
            let now = Instant::now();
            if now < self.next {
                thread::sleep((self.next - now).min(Duration::from_millis(50)));
                return Err(ErrorKind::TimedOut.into());
            }
            self.next = now + Duration::from_millis(20);
            self.left -= 1;
            self.pending.extend_from_slice(b"\x00\x13");
            self.pending.push(DEFAULT_HEADER);
            self.pending.extend([self.fill; 20]);
            self.pending.push(DEFAULT_TRAILER);
            self.fill = self.fill.wrapping_add(1);
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

fn ticker(label: &str, fill: u8) -> ChannelSource {
    ChannelSource::Stream(SensorStream::from_reader(
        label,
        Ticker {
            fill,
            left: 200,
            next: Instant::now() + Duration::from_millis(200),
            pending: Vec::new(),
        },
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BridgeConfig {
        relay_addr: "127.0.0.1:0".parse()?,
        ..BridgeConfig::default()
    };
    let bridge = Bridge::start(config, [ticker("imu0", 0x00), ticker("imu1", 0x80)])?;
    eprintln!("Bridge listening on {}", bridge.local_addr());

    let mut client = RelayClient::connect(bridge.local_addr())?;
    while bridge.relay().state() != ConnectionState::Connected {
        thread::sleep(Duration::from_millis(5));
    }

    for _ in 0..10 {
        let frame = client.recv()?;
        println!("{:02x?}", &frame.as_bytes()[..4]);
    }

    let stats = bridge.sync_stats();
    eprintln!(
        "recorded={:?} emitted={} overwritten={}",
        stats.recorded, stats.emitted, stats.overwritten
    );
    bridge.shutdown();
    Ok(())
}
