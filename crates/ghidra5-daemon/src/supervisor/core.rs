use chrono::{DateTime, Utc};
use ghidra5_types::{
    SupervisorState, SupervisorStatus, SvcError, SvcResult, WorkerProcessStatus, SERVICE_DISPLAY_NAME,
    SERVICE_NAME,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::launcher::WorkerLauncher;
use super::monitor::HealthMonitor;
use super::policy::RestartPolicy;
use super::shutdown::ShutdownSignal;
use super::types::{MonitorEvent, RestartDecision, RestartState, WorkerHandle};
use crate::config::SvcConfig;

const MONITOR_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// State observable from outside the control loop. Written only by the
/// supervisor; everyone else reads.
struct Shared {
    state: Mutex<SupervisorState>,
    restart: Mutex<(u32, Option<DateTime<Utc>>)>,
}

/// How the event loop ended.
enum LoopOutcome {
    /// `stop()` was requested, or the event channel closed.
    StopRequested,
    /// The worker exited with auto-restart disabled; treated as a normal
    /// shutdown request.
    WorkerFinished,
    /// The restart policy denied a further attempt.
    BudgetExhausted,
}

/// Outcome of one restart cycle.
enum RestartOutcome {
    Resumed,
    StopRequested,
    BudgetExhausted,
}

/// Top-level lifecycle state machine.
///
/// Owns the worker handle and the stop signal, runs the control loop, and
/// coordinates the health monitor task. The monitor feeds it events over
/// a channel; all state transitions happen here, on this task.
pub struct Supervisor {
    config: Arc<SvcConfig>,
    launcher: WorkerLauncher,
    policy: RestartPolicy,
    restart_state: RestartState,
    shared: Arc<Shared>,
    worker_slot: Arc<Mutex<Option<WorkerHandle>>>,
    current_pid: Option<u32>,
    shutdown_tx: watch::Sender<bool>,
    shutdown: ShutdownSignal,
    events_tx: mpsc::Sender<MonitorEvent>,
    events_rx: mpsc::Receiver<MonitorEvent>,
    monitor_task: Option<JoinHandle<()>>,
}

/// Cheap clone handed to signal handlers and status queries while the
/// supervisor runs its control loop.
#[derive(Clone)]
pub struct SupervisorHandle {
    shutdown_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
    worker_slot: Arc<Mutex<Option<WorkerHandle>>>,
}

impl Supervisor {
    pub fn new(config: SvcConfig) -> Self {
        let config = Arc::new(config);
        let (shutdown_tx, shutdown) = ShutdownSignal::new();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            launcher: WorkerLauncher::new(config.clone()),
            policy: RestartPolicy::from_config(&config.service),
            restart_state: RestartState::default(),
            shared: Arc::new(Shared {
                state: Mutex::new(SupervisorState::Stopped),
                restart: Mutex::new((0, None)),
            }),
            worker_slot: Arc::new(Mutex::new(None)),
            current_pid: None,
            shutdown_tx,
            shutdown,
            events_tx,
            events_rx,
            monitor_task: None,
            config,
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            shutdown_tx: self.shutdown_tx.clone(),
            shared: self.shared.clone(),
            worker_slot: self.worker_slot.clone(),
        }
    }

    /// Full service lifecycle: launch the worker, supervise it until a
    /// stop request or a fatal condition, then shut everything down.
    pub async fn run(&mut self) -> SvcResult<()> {
        if let Err(e) = self.start() {
            error!("Failed to start server: {}", e);
            self.set_state(SupervisorState::Stopped);
            return Err(e);
        }

        let outcome = self.event_loop().await;
        match outcome {
            LoopOutcome::StopRequested | LoopOutcome::WorkerFinished => {
                self.stop_internal().await;
                Ok(())
            }
            LoopOutcome::BudgetExhausted => {
                self.finish_failed().await;
                Err(SvcError::RestartBudget(
                    self.policy.max_restarts(),
                    self.config.service.restart_window_secs,
                ))
            }
        }
    }

    fn start(&mut self) -> SvcResult<()> {
        self.set_state(SupervisorState::Starting);

        let handle = self.launcher.launch()?;
        self.current_pid = Some(handle.pid());
        *self.worker_slot.lock() = Some(handle);
        self.set_state(SupervisorState::Running);

        if self.config.service.enable_monitoring {
            let monitor = HealthMonitor::new(
                self.worker_slot.clone(),
                self.events_tx.clone(),
                self.shutdown.clone(),
                self.config.service.health_check_interval(),
                self.config.server.max_memory_mb,
            );
            self.monitor_task = Some(tokio::spawn(monitor.run()));
        }

        Ok(())
    }

    async fn event_loop(&mut self) -> LoopOutcome {
        loop {
            tokio::select! {
                _ = self.shutdown.signaled() => return LoopOutcome::StopRequested,
                event = self.events_rx.recv() => match event {
                    None => return LoopOutcome::StopRequested,
                    Some(MonitorEvent::ResourceWarning { pid, warning }) => {
                        warn!("Worker {}: {}", pid, warning);
                    }
                    Some(MonitorEvent::WorkerExited { pid, exit_code }) => {
                        if self.current_pid != Some(pid) {
                            debug!("Ignoring exit event for stale worker {}", pid);
                            continue;
                        }
                        error!("Server process terminated with exit code: {}", exit_code);

                        if !self.config.service.auto_restart {
                            info!("Auto-restart disabled, stopping service");
                            return LoopOutcome::WorkerFinished;
                        }

                        match self.restart_worker().await {
                            RestartOutcome::Resumed => {}
                            RestartOutcome::StopRequested => return LoopOutcome::StopRequested,
                            RestartOutcome::BudgetExhausted => return LoopOutcome::BudgetExhausted,
                        }
                    }
                },
            }
        }
    }

    /// One `Restarting` episode: consult the policy, wait out the backoff
    /// delay (cancellable), dispose of the stale handle and relaunch. A
    /// failed relaunch goes back to the policy; a stop request wins every
    /// race in here and no launch happens after it.
    async fn restart_worker(&mut self) -> RestartOutcome {
        self.set_state(SupervisorState::Restarting);

        // Drain the slot now so the monitor idles during the backoff wait.
        let mut stale = self.worker_slot.lock().take();
        self.current_pid = None;

        loop {
            if self.shutdown.is_signaled() {
                return RestartOutcome::StopRequested;
            }

            match self.policy.decide(&mut self.restart_state, Instant::now()) {
                RestartDecision::Deny => {
                    error!(
                        "Maximum restarts ({}) exceeded in {}s window. Stopping service.",
                        self.policy.max_restarts(),
                        self.config.service.restart_window_secs
                    );
                    self.set_state(SupervisorState::Failed);
                    return RestartOutcome::BudgetExhausted;
                }
                RestartDecision::Allow(delay) => {
                    info!(
                        "Restarting server in {}s (attempt {})",
                        delay.as_secs(),
                        self.restart_state.count
                    );

                    if !self.shutdown.sleep(delay).await {
                        return RestartOutcome::StopRequested;
                    }

                    if let Some(mut handle) = stale.take() {
                        let _ = handle.kill().await;
                    }

                    if self.shutdown.is_signaled() {
                        return RestartOutcome::StopRequested;
                    }

                    match self.launcher.launch() {
                        Ok(handle) => {
                            self.current_pid = Some(handle.pid());
                            *self.worker_slot.lock() = Some(handle);
                            *self.shared.restart.lock() =
                                (self.restart_state.count, Some(Utc::now()));
                            self.set_state(SupervisorState::Running);
                            info!(
                                "Server restarted successfully (attempt {})",
                                self.restart_state.count
                            );
                            return RestartOutcome::Resumed;
                        }
                        Err(e) => {
                            // Mid-run launch failure feeds back into the
                            // policy like any other crash.
                            error!("Failed to restart server: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Graceful teardown: terminate signal, bounded wait, forced kill on
    /// timeout. No-op when already stopped.
    async fn stop_internal(&mut self) {
        if *self.shared.state.lock() == SupervisorState::Stopped {
            return;
        }
        self.set_state(SupervisorState::Stopping);

        // Wake the monitor and any other waiter.
        let _ = self.shutdown_tx.send(true);

        let handle = self.worker_slot.lock().take();
        self.current_pid = None;
        if let Some(mut handle) = handle {
            self.terminate_worker(&mut handle).await;
        }

        self.join_monitor().await;
        self.set_state(SupervisorState::Stopped);
    }

    async fn terminate_worker(&self, handle: &mut WorkerHandle) {
        // Worker may already be gone (clean-exit shutdown path).
        if let Ok(Some(code)) = handle.try_wait() {
            debug!("Worker already exited with code {}", code);
            return;
        }

        info!("Attempting graceful server shutdown");
        let timeout = self.config.service.shutdown_timeout();

        if handle.terminate() {
            match tokio::time::timeout(timeout, handle.wait()).await {
                Ok(Ok(code)) => info!("Server shut down gracefully (exit code {})", code),
                Ok(Err(e)) => warn!("Error waiting for server exit: {}", e),
                Err(_) => {
                    warn!("Server did not shut down gracefully, forcing termination");
                    let _ = handle.kill().await;
                }
            }
        } else {
            let _ = handle.kill().await;
        }
    }

    /// Terminal failure path: the worker is already dead and relaunching
    /// is off the table, so only the monitor is left to collect.
    async fn finish_failed(&mut self) {
        let _ = self.shutdown_tx.send(true);
        drop(self.worker_slot.lock().take());
        self.current_pid = None;
        self.join_monitor().await;
    }

    async fn join_monitor(&mut self) {
        if let Some(task) = self.monitor_task.take() {
            match tokio::time::timeout(MONITOR_JOIN_TIMEOUT, task).await {
                Ok(_) => {}
                Err(_) => warn!("Monitor did not stop in time"),
            }
        }
    }

    fn set_state(&self, new: SupervisorState) {
        let mut state = self.shared.state.lock();
        if *state == new {
            return;
        }
        info!("State transition: {} -> {}", *state, new);
        *state = new;
    }
}

impl SupervisorHandle {
    /// Request shutdown. Wakes any pending wait (restart delay, monitor
    /// sleep) promptly; repeated calls are no-ops.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn state(&self) -> SupervisorState {
        *self.shared.state.lock()
    }

    /// Point-in-time snapshot for external monitoring tooling. Worker
    /// metrics are sampled on demand, not stored. `cpu_percent` comes
    /// from a single fresh sample and reads 0 until a second sample
    /// exists; callers wanting an accurate figure should compare two
    /// snapshots.
    pub fn status(&self) -> SupervisorStatus {
        let state = *self.shared.state.lock();
        let (restart_count, last_restart) = *self.shared.restart.lock();

        let worker_meta = self
            .worker_slot
            .lock()
            .as_ref()
            .map(|h| (h.pid(), h.launched_at()));

        let worker = worker_meta.map(|(pid, started_at)| {
            let mut system = System::new();
            let (memory_mb, cpu_percent) = if system.refresh_process(Pid::from_u32(pid)) {
                system
                    .process(Pid::from_u32(pid))
                    .map(|p| (p.memory() as f64 / (1024.0 * 1024.0), p.cpu_usage()))
                    .unwrap_or((0.0, 0.0))
            } else {
                (0.0, 0.0)
            };
            WorkerProcessStatus {
                pid,
                memory_mb,
                cpu_percent,
                started_at,
            }
        });

        SupervisorStatus {
            service_name: SERVICE_NAME.to_string(),
            display_name: SERVICE_DISPLAY_NAME.to_string(),
            state,
            restart_count,
            last_restart,
            worker,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn test_config(script: &str, dir: &tempfile::TempDir) -> SvcConfig {
        let path = dir.path().join("worker.sh");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{}", script).unwrap();

        let mut config = SvcConfig::default();
        config.paths.worker_script = path;
        config.paths.interpreter = Some(PathBuf::from("/bin/sh"));
        config.paths.project_dir = dir.path().join("projects");
        config.service.health_check_interval_secs = 1;
        config.service.shutdown_timeout_secs = 2;
        config
    }

    #[tokio::test]
    async fn clean_exit_without_autorestart_stops_service() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("exit 0", &dir);
        config.service.auto_restart = false;

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();

        tokio::time::timeout(Duration::from_secs(15), supervisor.run())
            .await
            .expect("run should end on its own")
            .unwrap();

        assert_eq!(handle.state(), SupervisorState::Stopped);
        // The policy engine was never consulted.
        assert_eq!(handle.status().restart_count, 0);
    }

    #[tokio::test]
    async fn crash_storm_exhausts_restart_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("exit 1", &dir);
        config.service.restart_delay_secs = 1;
        config.service.max_restarts = 2;

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();

        let err = tokio::time::timeout(Duration::from_secs(60), supervisor.run())
            .await
            .expect("budget should be exhausted well within a minute")
            .unwrap_err();

        assert!(matches!(err, SvcError::RestartBudget(2, _)));
        assert_eq!(handle.state(), SupervisorState::Failed);
        assert!(handle.status().restart_count >= 2);
    }

    #[tokio::test]
    async fn stop_cancels_pending_restart_delay() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("exit 1", &dir);
        // Long enough that only cancellation can finish the test in time.
        config.service.restart_delay_secs = 300;

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();
        let task = tokio::spawn(async move { supervisor.run().await });

        // Let the monitor notice the crash and the backoff wait begin.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let stop_at = std::time::Instant::now();
        handle.stop();

        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("stop must cancel the 300s delay")
            .unwrap()
            .unwrap();

        assert!(stop_at.elapsed() < Duration::from_secs(10));
        assert_eq!(handle.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn stubborn_worker_is_force_killed_within_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("trap '' TERM\nsleep 30", &dir);
        config.service.shutdown_timeout_secs = 1;

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();
        let task = tokio::spawn(async move { supervisor.run().await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.state(), SupervisorState::Running);

        let stop_at = std::time::Instant::now();
        handle.stop();

        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("forced kill must bound the shutdown")
            .unwrap()
            .unwrap();

        // shutdown_timeout + epsilon, nowhere near the worker's 30s sleep.
        assert!(stop_at.elapsed() < Duration::from_secs(6));
        assert_eq!(handle.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent_once_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("exit 0", &dir);
        config.service.auto_restart = false;

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();
        tokio::time::timeout(Duration::from_secs(15), supervisor.run())
            .await
            .unwrap()
            .unwrap();

        handle.stop();
        handle.stop();
        assert_eq!(handle.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn status_reports_running_worker() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config("sleep 30", &dir);

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();
        let task = tokio::spawn(async move { supervisor.run().await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        let status = handle.status();
        assert_eq!(status.state, SupervisorState::Running);
        assert_eq!(status.restart_count, 0);
        let worker = status.worker.expect("worker metrics should be present");
        assert!(worker.pid > 0);

        handle.stop();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(handle.status().worker.is_none());
    }

    #[tokio::test]
    async fn initial_launch_failure_returns_to_stopped() {
        let mut config = SvcConfig::default();
        config.paths.worker_script = PathBuf::from("/nonexistent/worker.py");

        let mut supervisor = Supervisor::new(config);
        let handle = supervisor.handle();

        let err = supervisor.run().await.unwrap_err();
        assert!(matches!(err, SvcError::Launch(_)));
        assert_eq!(handle.state(), SupervisorState::Stopped);
    }
}
