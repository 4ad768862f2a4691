use chrono::{DateTime, Utc};
use ghidra5_types::{SvcResult, SERVICE_NAME};
use serde::Serialize;
use std::path::Path;
use sysinfo::{Pid, System};

use super::commands::OutputFormat;
use super::run::pid_file_path;

#[derive(Serialize)]
struct DaemonStatus {
    service: &'static str,
    running: bool,
    pid: Option<u32>,
    memory_mb: Option<f64>,
    cpu_percent: Option<f32>,
    checked_at: DateTime<Utc>,
}

/// Best-effort external status probe: reads the pid file written by
/// `run` and samples the process if it is still alive.
pub fn show_status(data_dir: &Path, format: OutputFormat) -> SvcResult<()> {
    let pid_path = pid_file_path(data_dir);

    let pid = std::fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());

    let mut status = DaemonStatus {
        service: SERVICE_NAME,
        running: false,
        pid,
        memory_mb: None,
        cpu_percent: None,
        checked_at: Utc::now(),
    };

    if let Some(pid) = pid {
        let mut system = System::new();
        if system.refresh_process(Pid::from_u32(pid)) {
            // CPU usage is a delta between two samples; one refresh alone
            // always reads 0.
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            system.refresh_process(Pid::from_u32(pid));
            if let Some(process) = system.process(Pid::from_u32(pid)) {
                status.running = true;
                status.memory_mb = Some(process.memory() as f64 / (1024.0 * 1024.0));
                status.cpu_percent = Some(process.cpu_usage());
            }
        }
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .map_err(|e| ghidra5_types::SvcError::Internal(e.to_string()))?
            );
        }
        OutputFormat::Text => {
            if status.running {
                println!("{}: running (pid {})", SERVICE_NAME, status.pid.unwrap_or(0));
                if let Some(mem) = status.memory_mb {
                    println!("  memory: {:.1} MB", mem);
                }
            } else {
                println!("{}: stopped", SERVICE_NAME);
            }
        }
    }

    Ok(())
}
