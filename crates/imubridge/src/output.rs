use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use imubridge_frame::{ChannelId, CombinedFrame};
use imubridge_transport::PortDescription;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CombinedOutput<'a> {
    index: u64,
    size: usize,
    imu0: String,
    imu1: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_combined(frame: &CombinedFrame, index: u64, peer: &str, format: OutputFormat) {
    let imu0 = hex(frame.part(ChannelId::Zero));
    let imu1 = hex(frame.part(ChannelId::One));

    match format {
        OutputFormat::Json => {
            let out = CombinedOutput {
                index,
                size: frame.len(),
                imu0,
                imu1,
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "CHANNEL", "PAYLOAD"])
                .add_row(vec![index.to_string(), ChannelId::Zero.to_string(), imu0])
                .add_row(vec![index.to_string(), ChannelId::One.to_string(), imu1]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("#{index} size={} imu0={imu0} imu1={imu1}", frame.len());
        }
        OutputFormat::Raw => print_raw(frame.as_bytes()),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    usb_id: Option<String>,
    product: Option<&'a str>,
}

pub fn print_ports(ports: &[PortDescription], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports
        .iter()
        .map(|port| PortOutput {
            name: &port.name,
            kind: port.kind,
            usb_id: port.usb_id.map(|(vid, pid)| format!("{vid:04x}:{pid:04x}")),
            product: port.product.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "USB ID", "PRODUCT"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.kind.to_string(),
                    row.usb_id.clone().unwrap_or_else(|| "-".to_string()),
                    row.product.unwrap_or("-").to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "{} ({}) {}",
                    row.name,
                    row.kind,
                    row.usb_id.as_deref().unwrap_or("")
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
