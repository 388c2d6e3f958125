//! Command-line surface (spec.md §6): `run` starts the daemon, `check`
//! executes one plugin-style check and exits with its Nagios code, `reload`
//! signals a running daemon. Mirrors the teacher's `clap::Parser` derive
//! style (`source/motya/src/config/cli.rs`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::agent::Agent;
use crate::error::Result;

const BUILD_REVISION: &str = match option_env!("SENTINEL_BUILD_REVISION") {
    Some(rev) => rev,
    None => "unknown",
};

#[derive(Parser, Debug)]
#[command(name = "sentineld", disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print build version and revision, then exit.
    #[arg(short = 'V', long = "version", global = true)]
    pub version: bool,

    /// Path to the agent's INI configuration file.
    #[arg(long, default_value = "/etc/sentineld/sentineld.ini", global = true)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent as a foreground daemon.
    Run,
    /// Run one check and print its plugin-format result.
    Check {
        name: String,
        args: Vec<String>,
    },
    /// Send SIGHUP to a running daemon, identified by pidfile.
    Reload {
        #[arg(long, default_value = "/var/run/sentineld.pid")]
        pidfile: PathBuf,
    },
}

pub fn version_string() -> String {
    format!("sentineld {} ({BUILD_REVISION})", env!("CARGO_PKG_VERSION"))
}

/// Parses argv and runs the selected subcommand, returning the process exit
/// code (plugin codes 0-3 for `check`, 0/1 for `run`/`reload`).
pub fn run(argv: Vec<String>) -> i32 {
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            return if e.use_stderr() { 1 } else { 0 };
        }
    };

    if cli.version {
        println!("{}", version_string());
        return 0;
    }

    match cli.command {
        Command::Run => match run_daemon(&cli.config) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("sentineld: {e}");
                1
            }
        },
        Command::Check { name, args } => run_check(&cli.config, &name, &args),
        Command::Reload { pidfile } => match reload(&pidfile) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("sentineld: {e}");
                1
            }
        },
    }
}

fn run_daemon(config: &PathBuf) -> Result<()> {
    let agent = Agent::new(config.clone())?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(agent.run())
}

fn run_check(config: &PathBuf, name: &str, args: &[String]) -> i32 {
    let agent = match Agent::new(config.clone()) {
        Ok(agent) => agent,
        Err(e) => {
            println!("UNKNOWN - failed to load configuration: {e}");
            return 3;
        }
    };
    match agent.run_check(name, args) {
        Ok(result) => {
            println!("{}", result.build_plugin_output());
            result.state.as_exit_code()
        }
        Err(e) => {
            println!("UNKNOWN - {e}");
            3
        }
    }
}

fn reload(pidfile: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(pidfile)?;
    let pid: i32 = raw
        .trim()
        .parse()
        .map_err(|_| crate::error::AgentError::InvalidConfig(format!("pidfile {} does not contain a PID", pidfile.display())))?;
    signal::kill(Pid::from_raw(pid), Signal::SIGHUP)
        .map_err(|e| crate::error::AgentError::InvalidConfig(format!("failed to signal pid {pid}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_includes_crate_version() {
        assert!(version_string().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn parses_check_subcommand_with_trailing_args() {
        let cli = Cli::try_parse_from(["sentineld", "check", "check_ntp_offset", "source=chronyc"]).unwrap();
        match cli.command {
            Command::Check { name, args } => {
                assert_eq!(name, "check_ntp_offset");
                assert_eq!(args, vec!["source=chronyc".to_string()]);
            }
            other => panic!("expected Check, got {other:?}"),
        }
    }
}
