//! Client process and lockfile discovery
//!
//! The client offers no OS-level hook, so the agent polls for its process
//! on a fixed interval and then hunts for the lockfile that carries the
//! control-plane port and shared secret. The lockfile path is not
//! guaranteed; candidates are tried in priority order and the first hit
//! wins.

use crate::error::{Result, SyncError};
use crate::models::ConnectionInfo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tracing::{debug, info, warn};

/// Configuration for client discovery
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Process name to poll for
    pub process_name: String,
    /// Install-relative lockfile path used for the drive-root scan
    pub lockfile_relative: PathBuf,
    /// Bounded retries for lockfile reads while the writer holds its lock
    pub read_retries: u32,
    /// Backoff between read retries
    pub read_backoff: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            process_name: "LeagueClientUx".to_string(),
            lockfile_relative: PathBuf::from("Riot Games/League of Legends/lockfile"),
            read_retries: 3,
            read_backoff: Duration::from_millis(150),
        }
    }
}

/// Outcome of one discovery poll, with redundant transitions suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// The port or secret actually changed since the last poll.
    Connected(ConnectionInfo),
    /// The client process disappeared.
    Disconnected,
    /// Nothing changed, or the client is still starting up.
    Unchanged,
}

/// Result of one discovery probe, before transition suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientProbe {
    /// The lockfile resolved to usable credentials.
    Connected(ConnectionInfo),
    /// The process is alive but no candidate lockfile parsed yet; the
    /// writer populates the file non-atomically during startup.
    NotReady,
    /// No client process is running.
    ProcessGone,
}

/// Polls for the client process and resolves its control-plane credentials.
pub struct ClientDiscovery {
    config: DiscoveryConfig,
    system: System,
    current: Option<ConnectionInfo>,
}

impl ClientDiscovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            system: System::new_with_specifics(
                RefreshKind::new().with_processes(ProcessRefreshKind::new()),
            ),
            current: None,
        }
    }

    /// One discovery attempt. "Not ready" and "process gone" are distinct
    /// non-error outcomes, always retried by the polling loop.
    pub async fn try_connect(&mut self) -> Result<ClientProbe> {
        self.system.refresh_processes();

        let Some(process) = self.find_process() else {
            return Ok(ClientProbe::ProcessGone);
        };

        let candidates = self.lockfile_candidates(process.0, process.1);
        for path in candidates {
            match self.read_lockfile(&path).await? {
                Some(info) => {
                    debug!(path = %path.display(), port = info.port, "lockfile resolved");
                    return Ok(ClientProbe::Connected(info));
                }
                None => continue,
            }
        }

        Ok(ClientProbe::NotReady)
    }

    /// Poll wrapper that owns the connected/disconnected state machine.
    pub async fn poll(&mut self) -> DiscoveryEvent {
        let probe = match self.try_connect().await {
            Ok(probe) => probe,
            Err(err) => {
                // Discovery failure is never fatal; keep the current state
                // and try again on the next tick.
                warn!(error = %err, "discovery attempt failed");
                return DiscoveryEvent::Unchanged;
            }
        };
        transition(&mut self.current, probe)
    }

    pub fn connection(&self) -> Option<&ConnectionInfo> {
        self.current.as_ref()
    }

    fn find_process(&self) -> Option<(Vec<String>, Option<PathBuf>)> {
        for process in self.system.processes().values() {
            if process
                .name()
                .trim_end_matches(".exe")
                .eq_ignore_ascii_case(&self.config.process_name)
            {
                return Some((
                    process.cmd().to_vec(),
                    process.exe().map(|p| p.to_path_buf()),
                ));
            }
        }
        None
    }

    /// Candidate lockfile paths, in priority order: command-line install
    /// directory, executable directory, then a scan of fixed-drive roots.
    fn lockfile_candidates(&self, cmd: Vec<String>, exe: Option<PathBuf>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        for arg in &cmd {
            if let Some(dir) = arg.strip_prefix("--install-directory=") {
                candidates.push(Path::new(dir.trim_matches('"')).join("lockfile"));
            }
        }

        if let Some(exe) = exe {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("lockfile"));
            }
        }

        for root in fixed_drive_roots() {
            candidates.push(root.join(&self.config.lockfile_relative));
        }

        candidates
    }

    /// Shared-access read with bounded retries; the writer may briefly hold
    /// an exclusive lock.
    async fn read_lockfile(&self, path: &Path) -> Result<Option<ConnectionInfo>> {
        if !path.is_file() {
            return Ok(None);
        }
        let mut last_err = None;
        for attempt in 0..=self.config.read_retries {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => return parse_lockfile(&content),
                Err(err) => {
                    debug!(path = %path.display(), attempt, error = %err, "lockfile read contended");
                    last_err = Some(err);
                    tokio::time::sleep(self.config.read_backoff).await;
                }
            }
        }
        Err(SyncError::transient(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}

/// Connected/disconnected state machine. Disconnected fires only when the
/// process is gone; an unparseable lockfile while the process lives holds
/// the current state.
fn transition(current: &mut Option<ConnectionInfo>, probe: ClientProbe) -> DiscoveryEvent {
    match probe {
        ClientProbe::Connected(info) => {
            if current.as_ref() == Some(&info) {
                DiscoveryEvent::Unchanged
            } else {
                info!(port = info.port, scheme = %info.scheme, "client connected");
                *current = Some(info.clone());
                DiscoveryEvent::Connected(info)
            }
        }
        ClientProbe::NotReady => DiscoveryEvent::Unchanged,
        ClientProbe::ProcessGone => {
            if current.take().is_some() {
                info!("client process lost");
                DiscoveryEvent::Disconnected
            } else {
                DiscoveryEvent::Unchanged
            }
        }
    }
}

/// Parses the colon-delimited lockfile (`name:pid:port:password:scheme`).
///
/// A field count other than five means the writer has not finished
/// populating the file; that is "not yet ready", never an error.
pub fn parse_lockfile(content: &str) -> Result<Option<ConnectionInfo>> {
    let parts: Vec<&str> = content.trim().split(':').collect();
    if parts.len() != 5 {
        return Ok(None);
    }
    let port: u16 = match parts[2].parse() {
        Ok(p) => p,
        Err(_) => return Ok(None),
    };
    if parts[3].is_empty() {
        return Ok(None);
    }
    Ok(Some(ConnectionInfo {
        port,
        secret: parts[3].to_string(),
        scheme: parts[4].trim().to_string(),
    }))
}

#[cfg(windows)]
fn fixed_drive_roots() -> Vec<PathBuf> {
    (b'C'..=b'Z')
        .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
        .filter(|root| root.is_dir())
        .collect()
}

#[cfg(not(windows))]
fn fixed_drive_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}
