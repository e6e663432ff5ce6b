use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use imubridge_frame::CHANNEL_COUNT;
use imubridge_relay::{RelayClient, RelayError};

use crate::cmd::ListenArgs;
use crate::exit::{relay_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_combined, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client =
        RelayClient::connect_with_len(args.addr.as_str(), args.payload_len * CHANNEL_COUNT)
            .map_err(|err| relay_error("connect failed", err))?;
    client
        .set_read_timeout(Some(POLL_INTERVAL))
        .map_err(|err| relay_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let peer = client.peer_addr().to_string();
    while running.load(Ordering::SeqCst) {
        let frame = match client.recv() {
            Ok(frame) => frame,
            Err(err) if err.is_timeout() => continue,
            Err(RelayError::Disconnected(_)) => {
                return match args.count {
                    Some(count) if client.frames_received() < count => Err(CliError::new(
                        FAILURE,
                        format!(
                            "relay closed after {} of {count} frames",
                            client.frames_received()
                        ),
                    )),
                    _ => Ok(SUCCESS),
                };
            }
            Err(err) => return Err(relay_error("receive failed", err)),
        };

        print_combined(&frame, client.frames_received(), &peer, format);

        if let Some(count) = args.count {
            if client.frames_received() >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
