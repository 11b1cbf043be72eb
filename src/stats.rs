//! Read-only process and admission statistics for `/api/system/stats`.

use std::time::Instant;

use serde::Serialize;

use crate::governor::AdmissionGovernor;
use crate::llm::BackendHandle;

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub uptime_secs: u64,
    pub pid: u32,
    pub cpu_count: usize,
    pub memory_rss_kb: Option<u64>,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub reclaim_count: u64,
    pub backend: &'static str,
}

impl SystemStats {
    pub fn collect(started: Instant, governor: &AdmissionGovernor, backend: &BackendHandle) -> Self {
        Self {
            uptime_secs: started.elapsed().as_secs(),
            pid: std::process::id(),
            cpu_count: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            memory_rss_kb: memory_rss_kb(),
            in_flight: governor.in_flight(),
            max_concurrent: governor.max_concurrent(),
            reclaim_count: governor.reclaim_count(),
            backend: backend.status(),
        }
    }
}

/// Resident set size from `/proc/self/status`.
#[cfg(target_os = "linux")]
fn memory_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
fn memory_rss_kb() -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}
