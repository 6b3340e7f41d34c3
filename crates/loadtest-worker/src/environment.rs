//! Runtime environment reporting for workers.
//!
//! Logged once at worker startup and sampled again with every status line,
//! so a run that slows down because the worker host is starved shows up in
//! the logs next to the store's numbers.

use crate::metrics::{EnvironmentInfo, ResourceUsage};
use tracing::info;

/// Log and capture runtime environment information.
pub fn log_runtime_environment() -> EnvironmentInfo {
    info!("=== Runtime Environment ===");

    let cpu_cores = num_cpus::get();
    info!("CPU cores visible: {}", cpu_cores);

    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    let memory_mb = sys.total_memory() / 1024 / 1024;
    let available_memory_mb = sys.available_memory() / 1024 / 1024;
    info!("Total memory: {} MB", memory_mb);
    info!("Available memory: {} MB", available_memory_mb);

    let hostname = current_hostname();
    info!("Hostname: {}", hostname);
    info!("===========================");

    EnvironmentInfo {
        cpu_cores,
        memory_mb,
        available_memory_mb,
        hostname,
    }
}

/// Current memory usage of the host.
pub fn resource_usage() -> ResourceUsage {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    ResourceUsage {
        used_memory_mb: sys.used_memory() / 1024 / 1024,
        available_memory_mb: sys.available_memory() / 1024 / 1024,
    }
}

pub fn current_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
