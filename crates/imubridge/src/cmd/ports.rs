use imubridge_transport::available_ports;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut ports =
        available_ports().map_err(|err| transport_error("port enumeration failed", err))?;
    if args.usb {
        ports.retain(|port| port.usb_id.is_some());
    }
    ports.sort_by(|a, b| a.name.cmp(&b.name));

    print_ports(&ports, format);
    Ok(SUCCESS)
}
