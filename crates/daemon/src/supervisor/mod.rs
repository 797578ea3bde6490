// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor: the parent process of the worker kernel.
//!
//! `start` daemonizes (detached re-exec of `hqd run`), `run` supervises in
//! the foreground: fork the worker, watch it, restart crashes through the
//! circuit breaker, forward termination and reload signals. The PID file,
//! socket file, and log file are owned here; the PID file is removed after
//! the child has confirmably exited (not guaranteed on SIGKILL of the
//! supervisor itself).

mod policy;

pub use policy::{BreakerState, RestartDecision, RestartPolicy};

use hq_core::Config;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// Grace period before escalating SIGTERM to SIGKILL.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to write pid file {0}: {1}")]
    PidFile(PathBuf, #[source] std::io::Error),
    #[error("failed to open log file {0}: {1}")]
    LogFile(PathBuf, #[source] std::io::Error),
    #[error("failed to fork worker: {0}")]
    Fork(#[source] std::io::Error),
    #[error("could not determine current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to install signal handler: {0}")]
    Signals(#[source] std::io::Error),
}

fn read_pid(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn pid_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

fn worker_args(config_path: Option<&Path>) -> Vec<String> {
    let mut args = vec!["--worker".to_string()];
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args
}

/// Foreground supervision loop (`hqd run`). Returns the process exit code.
pub async fn supervise(mut config: Config, config_path: Option<PathBuf>) -> i32 {
    match supervise_inner(&mut config, config_path.as_deref()).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "supervisor failed");
            eprintln!("hqd: {e}");
            1
        }
    }
}

async fn supervise_inner(
    config: &mut Config,
    config_path: Option<&Path>,
) -> Result<(), SupervisorError> {
    let pid_file = config.pid_file();
    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SupervisorError::PidFile(pid_file.clone(), e))?;
    }
    std::fs::write(&pid_file, format!("{}\n", std::process::id()))
        .map_err(|e| SupervisorError::PidFile(pid_file.clone(), e))?;

    let exe = std::env::current_exe().map_err(SupervisorError::CurrentExe)?;
    let mut policy = RestartPolicy::new(&config.supervisor);

    let mut sigterm = signal(SignalKind::terminate()).map_err(SupervisorError::Signals)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(SupervisorError::Signals)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(SupervisorError::Signals)?;

    info!(pid = std::process::id(), "supervisor running");

    'supervise: loop {
        // Fork the worker with std streams routed to the log file
        let log = open_log(config)?;
        let log_err = log.try_clone().map_err(|e| SupervisorError::LogFile(config.log_file(), e))?;
        let mut child = tokio::process::Command::new(&exe)
            .args(worker_args(config_path))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(SupervisorError::Fork)?;
        let child_pid = child.id().map(|id| Pid::from_raw(id as i32));
        info!(worker_pid = ?child.id(), "worker started");

        enum Wake {
            Exited(std::io::Result<std::process::ExitStatus>),
            Terminate,
            Reload,
        }

        loop {
            let wake = tokio::select! {
                status = child.wait() => Wake::Exited(status),
                _ = sigterm.recv() => Wake::Terminate,
                _ = sigint.recv() => Wake::Terminate,
                _ = sighup.recv() => Wake::Reload,
            };

            match wake {
                Wake::Exited(Err(e)) => {
                    warn!(error = %e, "worker wait failed");
                    break 'supervise;
                }
                Wake::Exited(Ok(status)) if status.success() => {
                    info!("worker exited cleanly, supervisor stopping");
                    break 'supervise;
                }
                Wake::Exited(Ok(status)) => {
                    warn!(status = %status, "worker crashed");
                    match policy.record_exit(Instant::now()) {
                        RestartDecision::Restart => {
                            info!("restarting worker");
                            continue 'supervise;
                        }
                        RestartDecision::Open(backoff) => {
                            warn!(backoff_secs = backoff.as_secs(), "circuit breaker open");
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {
                                    info!("circuit breaker reset, resuming restarts");
                                    continue 'supervise;
                                }
                                _ = sigterm.recv() => break 'supervise,
                                _ = sigint.recv() => break 'supervise,
                            }
                        }
                    }
                }
                Wake::Terminate => {
                    info!("supervisor received termination signal, stopping worker");
                    stop_child(&mut child, child_pid).await;
                    break 'supervise;
                }
                Wake::Reload => {
                    info!("supervisor received SIGHUP, reloading config");
                    reload_config(config, config_path, &mut policy);
                    if let Some(pid) = child_pid {
                        let _ = kill(pid, Signal::SIGHUP);
                    }
                }
            }
        }
    }

    if pid_file.exists() {
        if let Err(e) = std::fs::remove_file(&pid_file) {
            warn!(error = %e, "failed to remove pid file");
        }
    }
    info!("supervisor stopped");
    Ok(())
}

fn open_log(config: &Config) -> Result<std::fs::File, SupervisorError> {
    let path = config.log_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SupervisorError::LogFile(path.clone(), e))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| SupervisorError::LogFile(path, e))
}

/// Re-read the config file and rebuild the restart policy from it.
fn reload_config(config: &mut Config, config_path: Option<&Path>, policy: &mut RestartPolicy) {
    let Some(path) = config_path else {
        return;
    };
    match Config::load(path) {
        Ok(fresh) => {
            *policy = RestartPolicy::new(&fresh.supervisor);
            *config = fresh;
            info!("config reloaded");
        }
        Err(e) => warn!(error = %e, "config reload failed, keeping previous config"),
    }
}

/// SIGTERM the worker; SIGKILL it if it has not exited within the grace
/// period.
async fn stop_child(child: &mut tokio::process::Child, pid: Option<Pid>) {
    if let Some(pid) = pid {
        let _ = kill(pid, Signal::SIGTERM);
    }
    match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            warn!("worker did not stop in time, escalating to SIGKILL");
            let _ = child.kill().await;
        }
    }
}

/// `hqd start`: daemonize by re-exec'ing `hqd run` detached, then wait for
/// the supervisor to come up.
pub fn start(config: &Config, config_path: Option<&Path>) -> i32 {
    if let Some(pid) = read_pid(&config.pid_file()) {
        if pid_alive(pid) {
            eprintln!("hqd already running (pid {pid})");
            return 1;
        }
    }

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            eprintln!("hqd: could not determine executable: {e}");
            return 1;
        }
    };

    let mut command = std::process::Command::new(exe);
    command.arg("run");
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    // Detach from the controlling terminal's process group
    std::os::unix::process::CommandExt::process_group(&mut command, 0);

    if let Err(e) = command.spawn() {
        eprintln!("hqd: failed to start daemon: {e}");
        return 1;
    }

    // Wait for the supervisor to write its pid file
    let pid_file = config.pid_file();
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(100));
        if let Some(pid) = read_pid(&pid_file) {
            if pid_alive(pid) {
                println!("hqd started (pid {pid})");
                return 0;
            }
        }
    }
    eprintln!("hqd: daemon did not start within 5s, check {}", config.log_file().display());
    1
}

/// `hqd stop`: SIGTERM the supervisor, escalate after the grace period.
pub fn stop(config: &Config) -> i32 {
    let pid_file = config.pid_file();
    let Some(pid) = read_pid(&pid_file) else {
        eprintln!("hqd not running");
        return 1;
    };
    if !pid_alive(pid) {
        // Stale pid file from an unclean shutdown
        let _ = std::fs::remove_file(&pid_file);
        eprintln!("hqd not running (removed stale pid file)");
        return 1;
    }

    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        eprintln!("hqd: failed to signal pid {pid}: {e}");
        return 1;
    }

    let deadline = Instant::now() + STOP_GRACE;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            println!("hqd stopped");
            return 0;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    warn!(pid, "graceful stop timed out, sending SIGKILL");
    let _ = kill(Pid::from_raw(pid), Signal::SIGKILL);
    if pid_file.exists() {
        let _ = std::fs::remove_file(&pid_file);
    }
    println!("hqd killed");
    0
}

/// `hqd status`: probe the supervisor PID and the worker's health endpoint.
pub async fn status(config: &Config) -> i32 {
    let Some(pid) = read_pid(&config.pid_file()) else {
        println!("hqd: not running");
        return 1;
    };
    if !pid_alive(pid) {
        println!("hqd: not running (stale pid file)");
        return 1;
    }

    match query_health(&config.socket_path()).await {
        Some(health) => {
            let status = health.get("status").and_then(Value::as_str).unwrap_or("unknown");
            let uptime = health.get("uptimeSecs").and_then(Value::as_u64).unwrap_or(0);
            println!("hqd: running (pid {pid})");
            println!("  health: {status}");
            println!("  uptime: {uptime}s");
            0
        }
        None => {
            println!("hqd: supervisor running (pid {pid}), worker not answering");
            1
        }
    }
}

/// One-shot `daemon.health` request over the Unix socket.
async fn query_health(socket_path: &Path) -> Option<Value> {
    let mut stream = tokio::net::UnixStream::connect(socket_path).await.ok()?;
    let request = b"{\"jsonrpc\":\"2.0\",\"id\":0,\"method\":\"daemon.health\"}\n";
    stream.write_all(request).await.ok()?;

    let (read_half, _) = stream.split();
    let mut lines = BufReader::new(read_half).lines();
    let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
        .await
        .ok()?
        .ok()??;
    let response: Value = serde_json::from_str(&line).ok()?;
    response.get("result").cloned()
}
