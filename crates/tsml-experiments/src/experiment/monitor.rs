//! Wall-clock, memory and hardware-speed measurements for a unit of work.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sysinfo::System;

const BENCHMARK_ARRAYS: usize = 1000;
const BENCHMARK_ARRAY_LEN: usize = 10_000;

/// Resident set size of this process in bytes.
pub fn current_rss() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid).map(|p| p.memory())
}

pub fn host_name() -> String {
    System::host_name().unwrap_or_else(|| "unknown".to_string())
}

/// `Generated by tsml on <local time>. Host: <name>` for results files.
pub fn experiment_description() -> String {
    format!(
        "Generated by tsml on {}. Host: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        host_name()
    )
}

/// Time to sort a fixed set of seeded random arrays; lets results from
/// different machines be put on a common scale.
pub fn benchmark_time() -> Duration {
    let mut rng = StdRng::seed_from_u64(0);
    let start = Instant::now();
    for _ in 0..BENCHMARK_ARRAYS {
        let mut values: Vec<i64> = (0..BENCHMARK_ARRAY_LEN).map(|_| rng.gen()).collect();
        values.sort_unstable();
    }
    let elapsed = start.elapsed();
    log::debug!("Benchmark took {:?}", elapsed);
    elapsed
}

/// Samples the process resident set size on a background thread and keeps
/// the peak. Sample explicitly around the work being measured with
/// [`sample_now`](Self::sample_now) so short builds still register.
#[derive(Debug)]
pub struct MemoryWatcher {
    peak: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MemoryWatcher {
    pub fn start(interval: Duration) -> Self {
        let peak = Arc::new(AtomicU64::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let peak = Arc::clone(&peak);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("memory-watcher".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        if let Some(rss) = current_rss() {
                            peak.fetch_max(rss, Ordering::Relaxed);
                        }
                        thread::sleep(interval);
                    }
                })
                .map_err(|e| log::warn!("Memory sampling thread unavailable: {}", e))
                .ok()
        };
        Self { peak, stop, handle }
    }

    pub fn sample_now(&self) {
        if let Some(rss) = current_rss() {
            self.peak.fetch_max(rss, Ordering::Relaxed);
        }
    }

    /// Stop sampling and return the peak, if any sample succeeded.
    pub fn finish(mut self) -> Option<u64> {
        self.shutdown();
        Some(self.peak.load(Ordering::Relaxed)).filter(|&p| p > 0)
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MemoryWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
