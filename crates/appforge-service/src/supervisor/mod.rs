//! Dev-server process supervision.
//!
//! One lifecycle per workspace: verify the project marker, install
//! dependencies when absent, lease a port, spawn the dev command in its own
//! process group, capture both output streams into the log bus, and reap on
//! exit or stop. Per-workspace transitions are serialized by an async lock,
//! so overlapping starts join the same spawn.

pub mod ports;

use crate::config::Config;
use crate::error::ApiError;
use crate::logbus::LogBus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{watch, Mutex as TokioMutex};

pub use ports::{PortAllocator, PortError};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("workspace not initialized (missing {marker})")]
    NotInitialized { marker: String },

    #[error("dependency install failed with exit code {code}")]
    InstallFailed { code: i32 },

    #[error("dependency install timed out after {secs}s")]
    InstallTimeout { secs: u64 },

    #[error("failed to spawn dev command: {0}")]
    SpawnFailed(String),

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error("supervisor error: {0}")]
    Internal(String),
}

impl From<SupervisorError> for ApiError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::NotInitialized { .. } => ApiError::Validation(e.to_string()),
            SupervisorError::Ports(_) => ApiError::Exhausted(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub marker_file: String,
    pub deps_dir: String,
    pub install_command: String,
    pub dev_command: String,
    pub install_timeout: Duration,
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    pub fn from_service_config(config: &Config) -> Self {
        Self {
            marker_file: "package.json".to_string(),
            deps_dir: "node_modules".to_string(),
            install_command: config.install_command.clone(),
            dev_command: config.dev_command.clone(),
            install_timeout: Duration::from_secs(config.install_timeout_secs),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// The transient record binding a workspace to its running dev server.
#[derive(Clone)]
pub struct Lease {
    pub port: u16,
    pub started_at: i64,
    pid: Option<u32>,
    done: watch::Receiver<bool>,
}

pub struct ProcessSupervisor {
    config: SupervisorConfig,
    ports: Arc<PortAllocator>,
    bus: Arc<LogBus>,
    leases: Arc<Mutex<HashMap<i64, Lease>>>,
    locks: Mutex<HashMap<i64, Arc<TokioMutex<()>>>>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig, ports: PortAllocator, bus: Arc<LogBus>) -> Self {
        Self {
            config,
            ports: Arc::new(ports),
            bus,
            leases: Arc::new(Mutex::new(HashMap::new())),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The current lease for a workspace, if its dev server is running.
    pub fn status(&self, app_id: i64) -> Option<Lease> {
        self.leases.lock().get(&app_id).cloned()
    }

    pub fn running_apps(&self) -> Vec<i64> {
        self.leases.lock().keys().copied().collect()
    }

    fn transition_lock(&self, app_id: i64) -> Arc<TokioMutex<()>> {
        self.locks
            .lock()
            .entry(app_id)
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// Bring a workspace's dev server up and return its port. Joining an
    /// already-running workspace returns the existing port without spawning.
    pub async fn start(&self, app_id: i64, root: &Path) -> Result<u16, SupervisorError> {
        let lock = self.transition_lock(app_id);
        let _transition = lock.lock().await;

        if let Some(lease) = self.status(app_id) {
            return Ok(lease.port);
        }

        if !root.join(&self.config.marker_file).exists() {
            return Err(SupervisorError::NotInitialized {
                marker: self.config.marker_file.clone(),
            });
        }

        if !root.join(&self.config.deps_dir).exists() {
            self.install_dependencies(app_id, root).await?;
        }

        let port = self.ports.acquire()?;
        match self.spawn_dev_server(app_id, root, port).await {
            Ok(()) => {
                tracing::info!(app_id, port, "dev server running");
                Ok(port)
            }
            Err(e) => {
                self.ports.release(port);
                Err(e)
            }
        }
    }

    /// Stop a workspace's dev server. Returns `false` when nothing runs.
    /// Graceful first; the process group is killed after the grace period.
    pub async fn stop(&self, app_id: i64) -> Result<bool, SupervisorError> {
        let lock = self.transition_lock(app_id);
        let _transition = lock.lock().await;

        let Some(lease) = self.status(app_id) else {
            return Ok(false);
        };

        self.bus.publish(app_id, "Stopping dev server", false);
        let mut done = lease.done.clone();
        if !*done.borrow_and_update() {
            signal_group(lease.pid, false);
            if tokio::time::timeout(self.config.stop_grace, done.changed())
                .await
                .is_err()
            {
                tracing::warn!(app_id, "dev server ignored SIGTERM, killing");
                signal_group(lease.pid, true);
                let _ = tokio::time::timeout(self.config.stop_grace, done.changed()).await;
            }
        }
        Ok(true)
    }

    /// Stop every running workspace; used on service shutdown.
    pub async fn stop_all(&self) {
        for app_id in self.running_apps() {
            if let Err(e) = self.stop(app_id).await {
                tracing::error!(app_id, error = %e, "failed to stop dev server");
            }
        }
    }

    async fn install_dependencies(&self, app_id: i64, root: &Path) -> Result<(), SupervisorError> {
        let command = self.config.install_command.clone();
        self.bus
            .publish(app_id, format!("Installing dependencies ({command})"), false);

        let (program, args) = split_command(&command)?;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(format!("{command}: {e}")))?;

        if let Some(stdout) = child.stdout.take() {
            pipe_lines(self.bus.clone(), app_id, stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            pipe_lines(self.bus.clone(), app_id, stderr, true);
        }

        let timeout = self.config.install_timeout;
        match tokio::time::timeout(timeout, child.wait()).await {
            Err(_) => {
                let _ = child.start_kill();
                self.bus
                    .publish(app_id, "Dependency install timed out", true);
                Err(SupervisorError::InstallTimeout {
                    secs: timeout.as_secs(),
                })
            }
            Ok(Err(e)) => Err(SupervisorError::Internal(format!("install wait: {e}"))),
            Ok(Ok(status)) if status.success() => {
                self.bus.publish(app_id, "Dependencies installed", false);
                Ok(())
            }
            Ok(Ok(status)) => {
                let code = status.code().unwrap_or(-1);
                self.bus.publish(
                    app_id,
                    format!("Dependency install failed (exit {code})"),
                    true,
                );
                Err(SupervisorError::InstallFailed { code })
            }
        }
    }

    async fn spawn_dev_server(
        &self,
        app_id: i64,
        root: &Path,
        port: u16,
    ) -> Result<(), SupervisorError> {
        let command = self.config.dev_command.clone();
        let (program, args) = split_command(&command)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--")
            .arg("--port")
            .arg(port.to_string())
            .env("PORT", port.to_string())
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(format!("{command}: {e}")))?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            pipe_lines(self.bus.clone(), app_id, stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            pipe_lines(self.bus.clone(), app_id, stderr, true);
        }

        let (done_tx, done_rx) = watch::channel(false);
        let lease = Lease {
            port,
            started_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            pid,
            done: done_rx,
        };
        self.leases.lock().insert(app_id, lease);
        self.bus.publish(
            app_id,
            format!("Dev server starting on port {port}"),
            false,
        );

        let bus = self.bus.clone();
        let leases = self.leases.clone();
        let ports = self.ports.clone();
        tokio::spawn(async move {
            let message = match child.wait().await {
                Ok(status) => {
                    let detail = status
                        .code()
                        .map(|c| format!("exit code {c}"))
                        .unwrap_or_else(|| "signal".to_string());
                    (format!("Dev server exited ({detail})"), !status.success())
                }
                Err(e) => (format!("Dev server wait failed: {e}"), true),
            };
            leases.lock().remove(&app_id);
            ports.release(port);
            bus.publish(app_id, message.0, message.1);
            bus.gc(app_id);
            let _ = done_tx.send(true);
        });

        Ok(())
    }
}

fn pipe_lines<R>(bus: Arc<LogBus>, app_id: i64, reader: R, is_error: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            bus.publish(app_id, line, is_error);
        }
    });
}

fn split_command(command: &str) -> Result<(String, Vec<String>), SupervisorError> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| SupervisorError::SpawnFailed("empty command".to_string()))?;
    Ok((program, parts.collect()))
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        tracing::debug!(pid, %signal, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _force: bool) {
    tracing::warn!("process group signalling is not supported on this platform");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config() -> SupervisorConfig {
        SupervisorConfig {
            marker_file: "package.json".to_string(),
            deps_dir: "node_modules".to_string(),
            install_command: "true".to_string(),
            dev_command: "sh dev.sh".to_string(),
            install_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(3),
        }
    }

    fn supervisor(pool: u16) -> (ProcessSupervisor, Arc<LogBus>) {
        let bus = Arc::new(LogBus::new());
        let sup = ProcessSupervisor::new(
            test_config(),
            PortAllocator::new(9500, pool),
            bus.clone(),
        );
        (sup, bus)
    }

    fn workspace(script: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir(tmp.path().join("node_modules")).unwrap();
        std::fs::write(tmp.path().join("dev.sh"), script).unwrap();
        tmp
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn start_requires_project_marker() {
        let (sup, _) = supervisor(2);
        let tmp = TempDir::new().unwrap();

        let err = sup.start(3, tmp.path()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotInitialized { .. }));
        assert!(sup.status(3).is_none());
    }

    #[tokio::test]
    async fn start_runs_logs_and_stop_releases_the_port() {
        let (sup, bus) = supervisor(2);
        let tmp = workspace("echo booted\nsleep 30\n");
        let mut sub = bus.subscribe(3);

        let port = sup.start(3, tmp.path()).await.unwrap();
        assert_eq!(port, 9500);
        assert_eq!(sup.status(3).unwrap().port, port);

        // The child's stdout reaches subscribers through the bus.
        loop {
            let event = sub.recv().await.unwrap();
            if event.message == "booted" {
                break;
            }
        }

        assert!(sup.stop(3).await.unwrap());
        wait_until(|| sup.status(3).is_none()).await;
        // Property: after stop, the port is available again.
        wait_until(|| sup.ports.available() == 2).await;
    }

    #[tokio::test]
    async fn stop_on_idle_workspace_is_a_noop() {
        let (sup, _) = supervisor(2);
        assert!(!sup.stop(42).await.unwrap());
    }

    #[tokio::test]
    async fn child_exit_clears_the_lease() {
        let (sup, _) = supervisor(2);
        let tmp = workspace("echo done\n");

        sup.start(3, tmp.path()).await.unwrap();
        wait_until(|| sup.status(3).is_none()).await;
        wait_until(|| sup.ports.available() == 2).await;
    }

    #[tokio::test]
    async fn concurrent_starts_share_one_spawn() {
        let (sup, _) = supervisor(2);
        let sup = Arc::new(sup);
        let tmp = workspace("sleep 30\n");

        let a = tokio::spawn({
            let sup = sup.clone();
            let root = tmp.path().to_path_buf();
            async move { sup.start(3, &root).await.unwrap() }
        });
        let b = tokio::spawn({
            let sup = sup.clone();
            let root = tmp.path().to_path_buf();
            async move { sup.start(3, &root).await.unwrap() }
        });

        let (port_a, port_b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(port_a, port_b);
        assert_eq!(sup.ports.available(), 1);

        sup.stop(3).await.unwrap();
    }

    #[tokio::test]
    async fn failing_install_fails_the_start() {
        let bus = Arc::new(LogBus::new());
        let mut config = test_config();
        config.install_command = "false".to_string();
        let sup = ProcessSupervisor::new(config, PortAllocator::new(9600, 2), bus);

        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("package.json"), "{}").unwrap();

        let err = sup.start(3, tmp.path()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::InstallFailed { .. }));
        assert!(sup.status(3).is_none());
        assert_eq!(sup.ports.available(), 2);
    }

    #[tokio::test]
    async fn exhausted_pool_rejects_new_workspaces() {
        let (sup, _) = supervisor(2);
        let w1 = workspace("sleep 30\n");
        let w2 = workspace("sleep 30\n");
        let w3 = workspace("sleep 30\n");

        let p1 = sup.start(1, w1.path()).await.unwrap();
        sup.start(2, w2.path()).await.unwrap();

        let err = sup.start(3, w3.path()).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Ports(PortError::Exhausted { .. })));

        // Freeing one workspace lets the next claim its port.
        sup.stop(1).await.unwrap();
        wait_until(|| sup.ports.available() == 1).await;
        let p3 = sup.start(3, w3.path()).await.unwrap();
        assert_eq!(p3, p1);

        sup.stop_all().await;
    }
}
