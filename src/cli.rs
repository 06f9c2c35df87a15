use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::apps::AppKind;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "HTTP:   rouille 3 (sync)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// REST remote control for Raspberry Pi circuit components
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: pi-remote.log in the data dir)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the REST server for an app
    Serve {
        /// App to serve
        #[arg(short = 'a', long = "app", value_enum)]
        app: AppKind,

        /// Interface to bind (default from settings: 0.0.0.0)
        #[arg(long = "host", value_name = "HOST")]
        host: Option<String>,

        /// Port to bind (default from settings: 5000)
        #[arg(short = 'p', long = "port", value_name = "PORT")]
        port: Option<u16>,

        /// Also serve generated fragments from this directory
        #[arg(long = "ui-dir", value_name = "DIR")]
        ui_dir: Option<PathBuf>,

        /// Run the app's blackout handler after this many ms without a heartbeat
        #[arg(long = "blackout-ms", value_name = "MS")]
        blackout_ms: Option<u64>,
    },

    /// Write control fragments for an app
    Generate {
        #[arg(short = 'a', long = "app", value_enum)]
        app: AppKind,

        /// Host the fragments call (default from settings: localhost)
        #[arg(long = "rest-host", value_name = "HOST")]
        rest_host: Option<String>,

        #[arg(long = "rest-port", value_name = "PORT")]
        rest_port: Option<u16>,

        /// Output directory (created if missing)
        #[arg(short = 'd', long = "dir-path", value_name = "DIR")]
        dir_path: PathBuf,
    },

    /// Poll a server's heartbeat endpoint and report latency
    Heartbeat {
        #[arg(long = "rest-host", value_name = "HOST")]
        rest_host: Option<String>,

        #[arg(long = "rest-port", value_name = "PORT")]
        rest_port: Option<u16>,

        /// Delay between probes, after success and failure alike
        #[arg(long = "interval-ms", value_name = "MS")]
        interval_ms: Option<u64>,

        /// Give up after this many consecutive failures (default: never)
        #[arg(long = "max-failures", value_name = "N")]
        max_failures: Option<u32>,
    },

    /// List the built-in apps and their components
    Apps,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let args = Args::parse_from([
            "pi-remote", "-vv", "generate", "--app", "dc-motor", "--rest-host", "pi.local", "--dir-path", "out",
        ]);
        assert_eq!(args.verbosity, 2);
        match args.command {
            Command::Generate { app, rest_host, rest_port, dir_path } => {
                assert_eq!(app, AppKind::DcMotor);
                assert_eq!(rest_host.as_deref(), Some("pi.local"));
                assert_eq!(rest_port, None);
                assert_eq!(dir_path, PathBuf::from("out"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_flag_without_file() {
        let args = Args::parse_from(["pi-remote", "apps", "--log"]);
        assert_eq!(args.log_file, Some(None));
    }
}
