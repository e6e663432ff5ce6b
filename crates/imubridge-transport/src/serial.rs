use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use tracing::info;

use crate::error::{Result, TransportError};
use crate::traits::SensorStream;

/// Line settings for a sensor serial device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Baud rate. Default: 115200.
    pub baud_rate: u32,
    /// How long a read waits for bytes before reporting `TimedOut`.
    pub read_timeout: Duration,
}

impl SerialSettings {
    /// Default baud rate of the 6DoF sensor boards.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// Default read timeout. Bounds how quickly a channel notices shutdown.
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: Self::DEFAULT_BAUD_RATE,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Serial device transport.
///
/// Opens 8N1 lines without flow control and hands back a [`SensorStream`].
pub struct SerialDevice;

impl SerialDevice {
    /// Open a serial device with default settings.
    pub fn open(path: &str) -> Result<SensorStream> {
        Self::open_with_settings(path, &SerialSettings::default())
    }

    /// Open a serial device with explicit settings.
    pub fn open_with_settings(path: &str, settings: &SerialSettings) -> Result<SensorStream> {
        let port = serialport::new(path, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;

        info!(path, baud_rate = settings.baud_rate, "opened serial device");
        Ok(SensorStream::from_serial(path, port))
    }
}

/// A serial device visible on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    /// Device path or name (e.g. `/dev/ttyUSB0`, `COM7`).
    pub name: String,
    /// Bus kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// USB vendor/product, when known.
    pub usb_id: Option<(u16, u16)>,
    /// Product string reported by the device, when known.
    pub product: Option<String>,
}

/// Enumerate serial devices.
pub fn available_ports() -> Result<Vec<PortDescription>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, usb_id, product) = match port.port_type {
                SerialPortType::UsbPort(usb) => ("usb", Some((usb.vid, usb.pid)), usb.product),
                SerialPortType::PciPort => ("pci", None, None),
                SerialPortType::BluetoothPort => ("bluetooth", None, None),
                SerialPortType::Unknown => ("unknown", None, None),
            };
            PortDescription {
                name: port.port_name,
                kind,
                usb_id,
                product,
            }
        })
        .collect())
}
