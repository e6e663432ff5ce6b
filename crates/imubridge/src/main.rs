mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "imubridge", version, about = "Dual IMU serial-to-TCP bridge")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "IMUBRIDGE_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_with_defaults() {
        let cli = Cli::try_parse_from(["imubridge", "serve"]).expect("serve should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.bind.port(), 19028);
        assert_eq!(args.baud, 115_200);
        assert!(!args.replay);
    }

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "imubridge",
            "serve",
            "--channel0",
            "/dev/ttyACM0",
            "--channel1",
            "/dev/ttyACM1",
            "--bind",
            "127.0.0.1:4000",
            "--slot-policy",
            "lockstep",
            "--no-arm",
        ])
        .expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.channel0, "/dev/ttyACM0");
        assert_eq!(args.bind.port(), 4000);
        assert!(args.no_arm);
    }

    #[test]
    fn rejects_invalid_bind_address() {
        let err = Cli::try_parse_from(["imubridge", "serve", "--bind", "not-an-address"])
            .expect_err("bad address should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_listen_with_count() {
        let cli = Cli::try_parse_from(["imubridge", "listen", "127.0.0.1:19028", "--count", "3"])
            .expect("listen args should parse");
        assert!(matches!(cli.command, Command::Listen(_)));
    }
}
