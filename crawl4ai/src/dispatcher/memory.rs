//! Memory-adaptive admission control (§4.4), grounded on
//! `spider::utils::detect_system`'s atomic-state + background-sampler
//! pattern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::sleep;

/// Samples process/system memory on an interval and flips a shared flag
/// once usage crosses `memory_threshold_percent`. The dispatcher checks
/// `is_over_threshold()` before admitting a new task; it never kills
/// already-running tasks.
pub struct MemoryMonitor {
    over_threshold: Arc<AtomicBool>,
    threshold_percent: f32,
    check_interval: Duration,
    started: OnceCell<()>,
}

impl MemoryMonitor {
    pub fn new(threshold_percent: f32, check_interval: Duration) -> Self {
        Self {
            over_threshold: Arc::new(AtomicBool::new(false)),
            threshold_percent,
            check_interval,
            started: OnceCell::new(),
        }
    }

    /// A monitor that never throttles, for dispatchers that don't set
    /// `memory_threshold_percent`.
    pub fn disabled() -> Self {
        Self::new(100.0, Duration::from_secs(3600))
    }

    pub fn is_over_threshold(&self) -> bool {
        self.over_threshold.load(Ordering::Relaxed)
    }

    /// Spawn the background sampler exactly once per instance.
    pub async fn ensure_started(&self) {
        let flag = self.over_threshold.clone();
        let threshold = self.threshold_percent;
        let interval = self.check_interval;
        self.started
            .get_or_init(|| async move {
                if sysinfo::IS_SUPPORTED_SYSTEM {
                    tokio::spawn(sample_loop(flag, threshold, interval));
                }
            })
            .await;
    }
}

async fn sample_loop(flag: Arc<AtomicBool>, threshold_percent: f32, interval: Duration) {
    let mut sys = sysinfo::System::new();
    loop {
        sys.refresh_memory();
        let used_percent = if sys.total_memory() == 0 {
            0.0
        } else {
            (sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0) as f32
        };
        flag.store(used_percent >= threshold_percent, Ordering::Relaxed);
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_monitor_never_reports_over_threshold() {
        let monitor = MemoryMonitor::disabled();
        assert!(!monitor.is_over_threshold());
    }
}
