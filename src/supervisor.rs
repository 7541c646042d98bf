// Backend process supervision
//
// One backend process group runs per strategy. `acquire` starts it and waits
// until it accepts connections; `release` stops every process in the group
// and reaps the direct child. The handle also kills the group on drop so a
// panicking sweep cannot leak it.

use log::{debug, info, warn};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::config::BackendConfig;
use crate::error::{BenchError, Result};

const GROUP_POLL: Duration = Duration::from_millis(20);
// Upper bound for SIGKILLed processes to disappear
const KILL_SETTLE: Duration = Duration::from_secs(2);

/// A running backend for one strategy
#[derive(Debug)]
pub struct BackendHandle {
    strategy: String,
    child: Child,
    /// Process group of the backend; cleared once the group is gone
    pgid: Option<i32>,
}

impl BackendHandle {
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// OS process id, `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Process group the backend and everything it spawned belong to
    pub fn process_group(&self) -> Option<i32> {
        self.pgid
    }
}

// kill_on_drop only reaches the direct child; take the whole group down too
impl Drop for BackendHandle {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

/// Starts and stops backend processes according to `BackendConfig`
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    config: BackendConfig,
}

impl ProcessSupervisor {
    pub fn new(config: BackendConfig) -> Self {
        ProcessSupervisor { config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Launches the backend configured for `strategy` and waits for it to be reachable
    pub async fn acquire(&self, strategy: &str) -> Result<BackendHandle> {
        let args = self.config.args_for(strategy);
        info!(
            "Starting backend for strategy '{}': {} {}",
            strategy,
            self.config.program,
            args.join(" ")
        );

        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Own process group so `cargo run` and the server it spawns stop together
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| BenchError::BackendStart {
            strategy: strategy.to_string(),
            reason: e.to_string(),
        })?;

        // With process_group(0) the group id is the child's pid
        let pgid = if cfg!(unix) {
            child.id().map(|pid| pid as i32)
        } else {
            None
        };

        let mut handle = BackendHandle {
            strategy: strategy.to_string(),
            child,
            pgid,
        };

        if let Err(e) = self.wait_until_ready(&mut handle).await {
            // Never hand back an error while anything in the group is still running
            if let Err(stop_err) = self.release(handle).await {
                warn!("{}", stop_err);
            }
            return Err(e);
        }

        info!("Backend for strategy '{}' is ready at {}", strategy, self.config.url);
        Ok(handle)
    }

    /// Terminates the backend's process group and waits until all of it has exited.
    ///
    /// The group is signalled even when the direct child is already gone, since
    /// servers spawned by it may still hold the backend port.
    pub async fn release(&self, mut handle: BackendHandle) -> Result<()> {
        let strategy = handle.strategy.clone();
        let stop_error = |reason: String| BenchError::BackendStop {
            strategy: strategy.clone(),
            reason,
        };

        let pgid = handle.pgid;
        let deadline = Instant::now() + self.config.shutdown_grace();

        let exited = handle.child.try_wait().map_err(|e| stop_error(e.to_string()))?;
        if let Some(status) = exited {
            debug!("Backend for strategy '{}' had already exited ({})", strategy, status);
        }

        match pgid {
            Some(pgid) => terminate_group(pgid),
            None if exited.is_none() => {
                // No group to signal; stop the child directly
                handle.child.start_kill().map_err(|e| stop_error(e.to_string()))?;
            }
            None => {}
        }

        let mut child_done = exited.is_some();
        if !child_done {
            let grace = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(grace, handle.child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Backend for strategy '{}' stopped ({})", strategy, status);
                    child_done = true;
                }
                Ok(Err(e)) => return Err(stop_error(e.to_string())),
                Err(_) => {}
            }
        }

        let mut group_done = match pgid {
            Some(pgid) => wait_for_group(pgid, deadline).await,
            None => true,
        };

        if !child_done || !group_done {
            warn!(
                "Backend for strategy '{}' ignored SIGTERM for {}ms, killing it",
                strategy, self.config.shutdown_grace_ms
            );
            if let Some(pgid) = pgid {
                kill_group(pgid);
            }
            // Reap the direct child first so it does not linger in the group as a zombie
            if !child_done {
                handle.child.kill().await.map_err(|e| stop_error(e.to_string()))?;
            }
            if let Some(pgid) = pgid {
                group_done = wait_for_group(pgid, Instant::now() + KILL_SETTLE).await;
            }
        }

        if !group_done {
            return Err(stop_error(format!(
                "process group {} still alive after SIGKILL",
                pgid.unwrap_or_default()
            )));
        }

        handle.pgid = None;
        Ok(())
    }

    async fn wait_until_ready(&self, handle: &mut BackendHandle) -> Result<()> {
        tokio::time::sleep(self.config.warmup()).await;
        self.check_alive(handle)?;

        let timeout = match self.config.readiness_timeout() {
            Some(timeout) => timeout,
            None => return Ok(()),
        };

        let address = probe_address(&self.config.url);
        let started = Instant::now();

        loop {
            let attempt = tokio::time::timeout(self.config.readiness_poll(), TcpStream::connect(&address)).await;
            match attempt {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) => debug!("Backend not ready at {}: {}", address, e),
                Err(_) => debug!("Readiness probe to {} timed out", address),
            }

            self.check_alive(handle)?;

            if started.elapsed() >= timeout {
                return Err(BenchError::BackendNotReady {
                    strategy: handle.strategy.clone(),
                    url: self.config.url.clone(),
                    waited_ms: (self.config.warmup() + started.elapsed()).as_millis() as u64,
                });
            }

            tokio::time::sleep(self.config.readiness_poll()).await;
        }
    }

    fn check_alive(&self, handle: &mut BackendHandle) -> Result<()> {
        let strategy = handle.strategy.clone();
        let start_error = |reason: String| BenchError::BackendStart { strategy, reason };

        match handle.child.try_wait() {
            Ok(Some(status)) => Err(start_error(format!("exited during startup ({})", status))),
            Ok(None) => Ok(()),
            Err(e) => Err(start_error(e.to_string())),
        }
    }
}

// Polls until no process is left in the group or the deadline passes
async fn wait_for_group(pgid: i32, deadline: Instant) -> bool {
    loop {
        if !group_alive(pgid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(GROUP_POLL).await;
    }
}

/// `host:port` to probe for a backend URL such as `http://localhost:8000/`
pub fn probe_address(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };

    let authority = rest.split('/').next().unwrap_or(rest);
    let authority = authority.rsplit('@').next().unwrap_or(authority);

    let has_port = match authority.rfind(':') {
        // Bracketed IPv6 literal without a port, e.g. [::1]
        Some(idx) => !authority[idx..].contains(']'),
        None => false,
    };

    if has_port {
        authority.to_string()
    } else {
        let port = if scheme.eq_ignore_ascii_case("https") { 443 } else { 80 };
        format!("{}:{}", authority, port)
    }
}

/// True while any process in the group is still running.
///
/// Orphans that exited but were not reaped yet still accept signal 0; they
/// hold no sockets and are not counted.
#[cfg(unix)]
pub fn group_alive(pgid: i32) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if killpg(Pid::from_raw(pgid), None).is_err() {
        return false;
    }

    match running_members(pgid) {
        Some(count) => count > 0,
        None => true,
    }
}

#[cfg(target_os = "linux")]
fn running_members(pgid: i32) -> Option<usize> {
    let entries = std::fs::read_dir("/proc").ok()?;
    let count = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
        .filter(|stat| is_running_in_group(stat, pgid))
        .count();
    Some(count)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn running_members(_pgid: i32) -> Option<usize> {
    None
}

// `/proc/<pid>/stat` reads "pid (comm) state ppid pgrp ..."; comm may itself
// contain spaces and parentheses
#[cfg(target_os = "linux")]
fn is_running_in_group(stat: &str, pgid: i32) -> bool {
    let rest = match stat.rfind(')') {
        Some(idx) => &stat[idx + 1..],
        None => return false,
    };

    let mut fields = rest.split_whitespace();
    let state = fields.next();
    let _ppid = fields.next();
    let pgrp = fields.next().and_then(|f| f.parse::<i32>().ok());

    pgrp == Some(pgid) && state != Some("Z")
}

#[cfg(not(unix))]
pub fn group_alive(_pgid: i32) -> bool {
    false
}

#[cfg(unix)]
fn terminate_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGTERM) {
        debug!("SIGTERM to process group {} failed: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn terminate_group(_pgid: i32) {}

#[cfg(unix)]
fn kill_group(pgid: i32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pgid: i32) {}
