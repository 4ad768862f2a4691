use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use super::types::{
    MonitorEvent, ResourceWarning, WorkerHandle, CPU_WARN_THRESHOLD, MONITOR_ERROR_COOLDOWN_SECS,
};

/// Outcome of one liveness inspection of the shared worker slot.
enum Probe {
    Idle,
    Exited { pid: u32, exit_code: i32 },
    Running(u32),
    ProbeError(std::io::Error),
}

/// Background liveness and resource observer.
///
/// Runs on its own schedule, independent of the supervisor loop. It only
/// reads the shared worker slot and reports through the event channel;
/// state transitions happen exclusively on the supervisor side. Nothing
/// in here may take the daemon down: sampling failures are logged and the
/// loop continues after a short cooldown.
pub struct HealthMonitor {
    worker_slot: Arc<Mutex<Option<WorkerHandle>>>,
    events: mpsc::Sender<MonitorEvent>,
    shutdown: ShutdownSignal,
    interval: Duration,
    memory_limit_mb: u64,
    system: System,
    /// Worker pid whose exit has already been reported; suppresses
    /// duplicate events until the supervisor installs a fresh handle.
    reported_exit: Option<u32>,
}

impl HealthMonitor {
    pub fn new(
        worker_slot: Arc<Mutex<Option<WorkerHandle>>>,
        events: mpsc::Sender<MonitorEvent>,
        shutdown: ShutdownSignal,
        interval: Duration,
        memory_limit_mb: u64,
    ) -> Self {
        Self {
            worker_slot,
            events,
            shutdown,
            interval,
            memory_limit_mb,
            system: System::new(),
            reported_exit: None,
        }
    }

    pub async fn run(mut self) {
        info!("Server monitoring started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.signaled() => break,
                _ = ticker.tick() => {}
            }

            match self.probe() {
                Probe::Idle => {}
                Probe::Exited { pid, exit_code } => {
                    if self.reported_exit != Some(pid) {
                        self.reported_exit = Some(pid);
                        let event = MonitorEvent::WorkerExited { pid, exit_code };
                        if self.events.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Probe::Running(pid) => {
                    self.reported_exit = None;
                    if let Some(warning) = self.sample_resources(pid) {
                        let event = MonitorEvent::ResourceWarning { pid, warning };
                        if self.events.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Probe::ProbeError(e) => {
                    // Transient: the process can vanish between the
                    // liveness check and the metrics call.
                    warn!("Error in server monitoring: {}", e);
                    if !self
                        .shutdown
                        .sleep(Duration::from_secs(MONITOR_ERROR_COOLDOWN_SECS))
                        .await
                    {
                        break;
                    }
                }
            }
        }

        info!("Server monitoring stopped");
    }

    fn probe(&self) -> Probe {
        let mut slot = self.worker_slot.lock();
        match slot.as_mut() {
            None => Probe::Idle,
            Some(handle) => {
                let pid = handle.pid();
                match handle.try_wait() {
                    Ok(Some(exit_code)) => Probe::Exited { pid, exit_code },
                    Ok(None) => Probe::Running(pid),
                    Err(e) => Probe::ProbeError(e),
                }
            }
        }
    }

    /// Memory/CPU sample of a live worker. Returns at most one warning per
    /// tick; a vanished process is not an error here, the next liveness
    /// probe will catch it.
    fn sample_resources(&mut self, pid: u32) -> Option<ResourceWarning> {
        if !self.system.refresh_process(Pid::from_u32(pid)) {
            debug!("Worker process {} vanished before metrics sample", pid);
            return None;
        }
        let process = self.system.process(Pid::from_u32(pid))?;

        let used_mb = process.memory() as f64 / (1024.0 * 1024.0);
        if used_mb > self.memory_limit_mb as f64 {
            return Some(ResourceWarning::MemoryCeiling {
                used_mb,
                limit_mb: self.memory_limit_mb,
            });
        }

        let cpu = process.cpu_usage();
        if cpu > CPU_WARN_THRESHOLD {
            return Some(ResourceWarning::HighCpu { percent: cpu });
        }

        None
    }
}
