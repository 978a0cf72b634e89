//! Managed Tor proxy
//!
//! Launches a daemonized `tor` bound to the configured SOCKS and control
//! ports, and optionally runs a watchdog that sends SIGHUP at a fixed interval
//! to rotate circuits. The HTTP client routes through [`TorProxyManager::proxy_url`].

use crate::config::TorConfig;
use crate::{PantopodError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const PID_FILE_NAME: &str = "tor.pid";

struct Watchdog {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the lifecycle of one Tor process
pub struct TorProxyManager {
    config: TorConfig,
    watchdog: Mutex<Option<Watchdog>>,
}

impl TorProxyManager {
    pub fn new(config: TorConfig) -> Self {
        Self {
            config,
            watchdog: Mutex::new(None),
        }
    }

    /// Data directory of the process bound to the configured SOCKS port
    pub fn data_dir(&self) -> PathBuf {
        Path::new(&self.config.root_dir).join(format!("tor_{}", self.config.socks_port))
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir().join(PID_FILE_NAME)
    }

    /// SOCKS proxy URL with remote DNS resolution
    pub fn proxy_url(&self) -> String {
        format!("socks5h://localhost:{}", self.config.socks_port)
    }

    /// Starts Tor, interrupting a stale process left from an earlier run
    pub async fn start(&self) -> Result<()> {
        let mut watchdog = self.watchdog.lock().await;
        self.launch(&mut watchdog).await
    }

    /// Stops the watchdog and interrupts the Tor process
    pub async fn stop(&self) {
        let mut watchdog = self.watchdog.lock().await;
        self.shutdown(&mut watchdog).await;
    }

    /// Restarts Tor with a fresh process
    pub async fn reset(&self) -> Result<()> {
        let mut watchdog = self.watchdog.lock().await;
        self.shutdown(&mut watchdog).await;
        self.launch(&mut watchdog).await
    }

    async fn launch(&self, watchdog: &mut Option<Watchdog>) -> Result<()> {
        let data_dir = self.data_dir();
        let pid_file = self.pid_file();

        if pid_file.exists() {
            tracing::info!("Stopping existing process {}", pid_file.display());
            if let Err(e) = signal_process(&pid_file, "INT").await {
                tracing::error!("Could not stop {}: {}", pid_file.display(), e);
            }
        }

        tracing::info!("Creating {}", data_dir.display());
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut command = Command::new(&self.config.executable);
        command
            .args(["--RunAsDaemon", "1"])
            .args(["--CookieAuthentication", "0"])
            .args(["--HashedControlPassword", ""])
            .arg("--ControlPort")
            .arg(self.config.control_port.to_string())
            .arg("--PidFile")
            .arg(&pid_file)
            .arg("--SocksPort")
            .arg(self.config.socks_port.to_string())
            .arg("--DataDirectory")
            .arg(&data_dir);

        tracing::info!("Executing {:?}", command);
        let status = command.status().await?;
        if !status.success() {
            return Err(PantopodError::Process(format!(
                "{} exited with {}",
                self.config.executable, status
            )));
        }
        tracing::info!("Tor listening on {}", self.proxy_url());

        if let Some(delay) = self.config.watchdog_delay() {
            let cancel = CancellationToken::new();
            let task = spawn_watchdog(pid_file, delay, cancel.clone());
            *watchdog = Some(Watchdog { cancel, task });
        }
        Ok(())
    }

    async fn shutdown(&self, watchdog: &mut Option<Watchdog>) {
        if let Some(running) = watchdog.take() {
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                tracing::warn!("Watchdog ended abnormally: {}", e);
            }
        }

        let pid_file = self.pid_file();
        if pid_file.exists() {
            if let Err(e) = signal_process(&pid_file, "INT").await {
                tracing::error!("Could not stop {}: {}", pid_file.display(), e);
            }
        }
    }
}

/// Sends SIGHUP every `delay` while the pid file exists
fn spawn_watchdog(pid_file: PathBuf, delay: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if !pid_file.exists() {
                tracing::debug!("{} is gone, watchdog exiting", pid_file.display());
                break;
            }
            if let Err(e) = signal_process(&pid_file, "HUP").await {
                tracing::warn!("Could not send SIGHUP to {}: {}", pid_file.display(), e);
            }
        }
    })
}

/// Sends `signal` to the process whose id is stored in `pid_file`
async fn signal_process(pid_file: &Path, signal: &str) -> Result<()> {
    let contents = tokio::fs::read_to_string(pid_file).await?;
    let pid = read_pid(&contents)
        .ok_or_else(|| PantopodError::Process(format!("bad pid file {}", pid_file.display())))?;

    let pid = pid.to_string();
    tracing::info!("Executing kill -s {} {}", signal, pid);
    let status = Command::new("kill")
        .args(["-s", signal, pid.as_str()])
        .status()
        .await?;
    if !status.success() {
        return Err(PantopodError::Process(format!(
            "kill -s {} {} exited with {}",
            signal, pid, status
        )));
    }
    Ok(())
}

fn read_pid(contents: &str) -> Option<u32> {
    contents.trim().parse().ok().filter(|pid| *pid > 0)
}
