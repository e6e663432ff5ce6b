use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use imubridge_relay::SlotPolicy;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod ports;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bridge until interrupted.
    Serve(ServeArgs),
    /// Connect to a running bridge and print combined frames.
    Listen(ListenArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum SlotPolicyArg {
    /// A newer frame replaces an unpaired one.
    #[default]
    Overwrite,
    /// A channel that runs ahead waits for its partner.
    Lockstep,
}

impl From<SlotPolicyArg> for SlotPolicy {
    fn from(arg: SlotPolicyArg) -> Self {
        match arg {
            SlotPolicyArg::Overwrite => SlotPolicy::Overwrite,
            SlotPolicyArg::Lockstep => SlotPolicy::Lockstep,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// First sensor (serial device, or capture file with --replay).
    #[arg(long, env = "IMUBRIDGE_CHANNEL0", default_value = "/dev/ttyUSB0")]
    pub channel0: String,
    /// Second sensor (serial device, or capture file with --replay).
    #[arg(long, env = "IMUBRIDGE_CHANNEL1", default_value = "/dev/ttyUSB1")]
    pub channel1: String,
    /// Serial baud rate.
    #[arg(long, env = "IMUBRIDGE_BAUD", default_value_t = 115_200)]
    pub baud: u32,
    /// Relay listen address.
    #[arg(long, env = "IMUBRIDGE_BIND", default_value = "0.0.0.0:19028")]
    pub bind: SocketAddr,
    /// Treat channel paths as captured byte dumps instead of serial devices.
    /// The bridge exits once both captures have been read.
    #[arg(long)]
    pub replay: bool,
    /// Skip the sensor arming commands.
    #[arg(long)]
    pub no_arm: bool,
    /// Pairing behavior when one channel runs ahead.
    #[arg(long, value_enum, default_value = "overwrite")]
    pub slot_policy: SlotPolicyArg,
    /// Payload bytes between header and trailer.
    #[arg(long, default_value_t = imubridge_frame::DEFAULT_PAYLOAD_LEN)]
    pub payload_len: usize,
    /// Relay client write timeout (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub write_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Relay address to connect to.
    #[arg(default_value = "127.0.0.1:19028")]
    pub addr: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<u64>,
    /// Payload bytes per channel.
    #[arg(long, default_value_t = imubridge_frame::DEFAULT_PAYLOAD_LEN)]
    pub payload_len: usize,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {
    /// Only list USB serial adapters.
    #[arg(long)]
    pub usb: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
