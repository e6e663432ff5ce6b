use std::path::PathBuf;
use std::sync::Arc;

use imubridge_frame::FrameConfig;
use imubridge_relay::{Bridge, BridgeConfig, ChannelSource};
use imubridge_transport::SerialSettings;
use tracing::{info, warn};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{relay_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = BridgeConfig {
        frame: FrameConfig {
            payload_len: args.payload_len,
            ..FrameConfig::default()
        },
        relay_addr: args.bind,
        slot_policy: args.slot_policy.into(),
        arm: !args.no_arm,
        write_timeout: Some(parse_duration(&args.write_timeout)?),
    };
    let sources = [
        channel_source(&args, &args.channel0),
        channel_source(&args, &args.channel1),
    ];

    let bridge =
        Bridge::start(config, sources).map_err(|err| relay_error("bridge start failed", err))?;
    for channel in bridge.degraded_channels() {
        warn!(%channel, "running without this channel; no combined frames will be produced");
    }

    let handle = bridge.shutdown_handle();
    ctrlc::set_handler(move || handle.trigger()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })?;

    let relay = Arc::clone(bridge.relay());
    bridge.join();

    let stats = relay.stats();
    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        clients = stats.clients,
        "bridge exited"
    );
    Ok(SUCCESS)
}

fn channel_source(args: &ServeArgs, path: &str) -> ChannelSource {
    if args.replay {
        ChannelSource::File(PathBuf::from(path))
    } else {
        ChannelSource::Serial {
            path: path.to_string(),
            settings: SerialSettings {
                baud_rate: args.baud,
                ..SerialSettings::default()
            },
        }
    }
}
