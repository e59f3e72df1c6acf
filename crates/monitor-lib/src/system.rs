//! Resource usage of the monitoring worker process

use crate::health::ComponentStatus;
use crate::models::SystemHealthSnapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use sysinfo::{Pid, System};

/// Share of system memory above which the worker reports itself degraded
const MEMORY_DEGRADED_PCT: f64 = 75.0;
const MEMORY_UNHEALTHY_PCT: f64 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessUsage {
    pub cpu_usage_pct: f64,
    pub memory_bytes: u64,
    /// Process resident memory as a share of total system memory
    pub memory_usage_pct: f64,
}

impl ProcessUsage {
    pub fn status(&self) -> ComponentStatus {
        if self.memory_usage_pct >= MEMORY_UNHEALTHY_PCT {
            ComponentStatus::Unhealthy
        } else if self.memory_usage_pct >= MEMORY_DEGRADED_PCT {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Samples CPU and memory of the current process.
///
/// CPU usage is measured between consecutive samples, so the first sample
/// reports 0.
pub struct ProcessProbe {
    system: Mutex<System>,
    pid: Pid,
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe {
    pub fn new() -> Self {
        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_process(pid);
        Self {
            system: Mutex::new(system),
            pid,
        }
    }

    pub fn sample(&self) -> ProcessUsage {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_memory();
        system.refresh_process(self.pid);

        let (cpu_usage_pct, memory_bytes) = system
            .process(self.pid)
            .map(|p| (p.cpu_usage() as f64, p.memory()))
            .unwrap_or((0.0, 0));

        let total = system.total_memory();
        let memory_usage_pct = if total > 0 {
            memory_bytes as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        ProcessUsage {
            cpu_usage_pct,
            memory_bytes,
            memory_usage_pct,
        }
    }

    /// Health snapshot of the worker, ready to persist
    pub fn snapshot(&self, component: &str) -> SystemHealthSnapshot {
        let usage = self.sample();
        SystemHealthSnapshot {
            timestamp: Utc::now(),
            component: component.to_string(),
            status: usage.status(),
            cpu_usage_pct: usage.cpu_usage_pct,
            memory_usage_pct: usage.memory_usage_pct,
            memory_bytes: usage.memory_bytes,
        }
    }
}
