//! Minimal relay consumer: connects to a running bridge and prints each
//! combined frame as two hex rows.
//!
//! Run with:
//!   cargo run --example relay-tap -- 127.0.0.1:19028
//!
//! Start a bridge first, e.g. from captured dumps:
//!   cargo run --features cli -- serve --replay --channel0 imu0.bin --channel1 imu1.bin

use imubridge::frame::ChannelId;
use imubridge::relay::{RelayClient, RelayError};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:19028".to_string());

    let mut client = RelayClient::connect(addr.as_str())?;
    eprintln!("Connected to {}", client.peer_addr());

    loop {
        match client.recv() {
            Ok(frame) => {
                for channel in ChannelId::ALL {
                    let row: Vec<String> = frame
                        .part(channel)
                        .iter()
                        .map(|b| format!("{b:02x}"))
                        .collect();
                    println!("{channel}: {}", row.join(" "));
                }
            }
            Err(RelayError::Disconnected(peer)) => {
                eprintln!("Relay {peer} closed the connection");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
