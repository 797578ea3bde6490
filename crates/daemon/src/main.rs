// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hqd: the hq daemon.
//!
//! Verbs: `start` (daemonize), `run` (foreground supervisor), `stop`,
//! `status`. The supervisor forks this same binary with `--worker` to run
//! the kernel; the flag is internal and not part of the CLI surface.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use hq_core::Config;
use hq_daemon::{supervisor, worker};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    verb: Verb,
    config_path: Option<PathBuf>,
}

enum Verb {
    Start,
    Run,
    Stop,
    Status,
    Worker,
    Version,
    Help,
}

fn parse_args() -> Result<Args, String> {
    let mut verb = None;
    let mut config_path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "start" => verb = Some(Verb::Start),
            "run" => verb = Some(Verb::Run),
            "stop" => verb = Some(Verb::Stop),
            "status" => verb = Some(Verb::Status),
            "--worker" => verb = Some(Verb::Worker),
            "--version" | "-V" | "-v" => verb = Some(Verb::Version),
            "--help" | "-h" | "help" => verb = Some(Verb::Help),
            "--config" | "-c" => {
                let value = args.next().ok_or("--config requires a path")?;
                config_path = Some(PathBuf::from(value));
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(Args { verb: verb.unwrap_or(Verb::Help), config_path })
}

fn print_help() {
    println!("hqd {}", env!("CARGO_PKG_VERSION"));
    println!("hq daemon - supervises the agent-orchestration worker");
    println!();
    println!("USAGE:");
    println!("    hqd <start|run|stop|status> [--config <path>]");
    println!();
    println!("COMMANDS:");
    println!("    start     Start the daemon in the background");
    println!("    run       Run the supervisor in the foreground");
    println!("    stop      Stop a running daemon");
    println!("    status    Show daemon status");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <path>    Config file (TOML)");
    println!("    -h, --help             Print help");
    println!("    -V, --version          Print version");
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, String> {
    match path {
        Some(path) => Config::load(path).map_err(|e| e.to_string()),
        None => Config::parse("").map_err(|e| e.to_string()),
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Usage: hqd <start|run|stop|status> [--config <path>]");
            return ExitCode::from(1);
        }
    };

    match args.verb {
        Verb::Version => {
            println!("hqd {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Verb::Help => {
            print_help();
            ExitCode::SUCCESS
        }
        verb => {
            let config = match load_config(args.config_path.as_ref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("hqd: invalid config: {e}");
                    return ExitCode::from(1);
                }
            };
            run_verb(verb, config, args.config_path)
        }
    }
}

fn run_verb(verb: Verb, config: Config, config_path: Option<PathBuf>) -> ExitCode {
    match verb {
        // start daemonizes without an async runtime of its own
        Verb::Start => ExitCode::from(supervisor::start(&config, config_path.as_deref()) as u8),
        Verb::Stop => ExitCode::from(supervisor::stop(&config) as u8),
        verb => {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("hqd: failed to start runtime: {e}");
                    return ExitCode::from(1);
                }
            };
            let code = runtime.block_on(async {
                match verb {
                    Verb::Run => {
                        // The supervisor logs to the same file as the worker
                        let _log_guard = match hq_daemon::logger::init(&config) {
                            Ok(guard) => Some(guard),
                            Err(e) => {
                                eprintln!("hqd: failed to open log: {e}");
                                return 1;
                            }
                        };
                        supervisor::supervise(config, config_path).await
                    }
                    Verb::Status => supervisor::status(&config).await,
                    Verb::Worker => match worker::run(config).await {
                        Ok(()) => 0,
                        Err(e) => {
                            eprintln!("hqd worker: {e}");
                            1
                        }
                    },
                    _ => 1,
                }
            });
            ExitCode::from(code as u8)
        }
    }
}
