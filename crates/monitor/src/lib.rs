//! Resource monitoring around render operations
//!
//! Captures before/after resource snapshots for each monitored render,
//! analyzes the delta for abnormal growth, and reports handle leaks. The
//! monitor is advisory only: it never blocks or aborts the operation it
//! observes, it only annotates results for observability consumers.

pub mod snapshot;

pub use snapshot::{
    HandleLeakReport, MemoryDelta, MemorySnapshot, ABNORMAL_GROWTH_BYTES, HANDLE_LEAK_THRESHOLD,
};

use std::time::SystemTime;

/// Source of raw process counters
///
/// Abstracting the probe keeps delta analysis pure and lets tests feed
/// scripted counter values through the full monitor.
pub trait ResourceProbe: Send + Sync {
    /// Read current counters: (working set, private, managed, handle count)
    fn read_counters(&self) -> (u64, u64, u64, u64);
}

/// Probe backed by the operating system's process counters
///
/// On Linux this reads `/proc/self/statm` and counts `/proc/self/fd`
/// entries. On other platforms, or when the reads fail, every counter is
/// zero; snapshots are advisory so a dead probe must not fail a render.
#[derive(Debug, Default)]
pub struct OsResourceProbe;

impl OsResourceProbe {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "linux")]
    fn read_os_counters() -> (u64, u64, u64, u64) {
        const PAGE_SIZE: u64 = 4096;

        let (working_set, private, managed) = std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| {
                let fields: Vec<u64> = statm
                    .split_whitespace()
                    .filter_map(|f| f.parse().ok())
                    .collect();
                // statm fields: size resident shared text lib data dt
                let resident = *fields.get(1)? * PAGE_SIZE;
                let data = *fields.get(5)? * PAGE_SIZE;
                Some((resident, data, data))
            })
            .unwrap_or((0, 0, 0));

        let handle_count = std::fs::read_dir("/proc/self/fd")
            .map(|entries| entries.count() as u64)
            .unwrap_or(0);

        (working_set, private, managed, handle_count)
    }

    #[cfg(not(target_os = "linux"))]
    fn read_os_counters() -> (u64, u64, u64, u64) {
        (0, 0, 0, 0)
    }
}

impl ResourceProbe for OsResourceProbe {
    fn read_counters(&self) -> (u64, u64, u64, u64) {
        Self::read_os_counters()
    }
}

/// Advisory resource monitor
///
/// Wraps a probe and produces labelled snapshots, deltas and leak reports.
/// One monitor is shared per document session.
pub struct ResourceMonitor {
    probe: Box<dyn ResourceProbe>,
}

impl ResourceMonitor {
    /// Monitor backed by the OS probe
    pub fn new() -> Self {
        Self {
            probe: Box::new(OsResourceProbe::new()),
        }
    }

    /// Monitor backed by a custom probe (tests, other platforms)
    pub fn with_probe(probe: Box<dyn ResourceProbe>) -> Self {
        Self { probe }
    }

    /// Capture a labelled point-in-time snapshot
    pub fn capture_snapshot(&self, label: impl Into<String>) -> MemorySnapshot {
        let (working_set, private, managed, handles) = self.probe.read_counters();
        MemorySnapshot::new(label, working_set, private, managed, handles)
    }

    /// Compute the delta between two snapshots (pure)
    pub fn delta(&self, before: MemorySnapshot, after: MemorySnapshot) -> MemoryDelta {
        MemoryDelta::between(before, after)
    }

    /// Report handle leaks if the live handle count crosses the threshold
    ///
    /// Returns an empty vec while the count is below the threshold.
    pub fn detect_handle_leaks(&self) -> Vec<HandleLeakReport> {
        let (_, _, _, handle_count) = self.probe.read_counters();
        if handle_count <= HANDLE_LEAK_THRESHOLD {
            return Vec::new();
        }

        log::warn!(
            "handle count {handle_count} exceeds leak threshold {HANDLE_LEAK_THRESHOLD}"
        );
        vec![HandleLeakReport {
            handle_count,
            threshold: HANDLE_LEAK_THRESHOLD,
            timestamp: SystemTime::now(),
        }]
    }

    /// Open a monitored scope around an operation
    pub fn scope(&self, label: impl Into<String>) -> MonitorScope<'_> {
        let label = label.into();
        let before = self.capture_snapshot(format!("{label}/before"));
        MonitorScope {
            monitor: self,
            label,
            before,
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Before/after bracket around one monitored operation
///
/// Captures the Before snapshot on creation; `finish()` captures the After
/// snapshot and yields the delta. The scope is finished on every exit path
/// of the monitored operation, success or failure.
pub struct MonitorScope<'a> {
    monitor: &'a ResourceMonitor,
    label: String,
    before: MemorySnapshot,
}

impl MonitorScope<'_> {
    /// Close the scope and compute the delta
    pub fn finish(self) -> MemoryDelta {
        let after = self.monitor.capture_snapshot(format!("{}/after", self.label));
        let delta = MemoryDelta::between(self.before, after);
        if delta.is_abnormal() {
            log::warn!(
                "abnormal memory growth in {}: working-set {:+} managed {:+}",
                self.label,
                delta.working_set_delta(),
                delta.managed_delta()
            );
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    /// Probe returning scripted counter values
    struct ScriptedProbe {
        managed: Arc<AtomicU64>,
        handles: Arc<AtomicU64>,
    }

    fn scripted_monitor() -> (ResourceMonitor, Arc<AtomicU64>, Arc<AtomicU64>) {
        let managed = Arc::new(AtomicU64::new(0));
        let handles = Arc::new(AtomicU64::new(0));
        let probe = ScriptedProbe {
            managed: managed.clone(),
            handles: handles.clone(),
        };
        (
            ResourceMonitor::with_probe(Box::new(probe)),
            managed,
            handles,
        )
    }

    impl ResourceProbe for ScriptedProbe {
        fn read_counters(&self) -> (u64, u64, u64, u64) {
            let managed = self.managed.load(Ordering::SeqCst);
            (managed, managed, managed, self.handles.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn test_capture_snapshot_labels_and_counters() {
        let (monitor, managed, handles) = scripted_monitor();
        managed.store(42, Ordering::SeqCst);
        handles.store(7, Ordering::SeqCst);

        let snap = monitor.capture_snapshot("render/before");
        assert_eq!(snap.label, "render/before");
        assert_eq!(snap.managed_bytes, 42);
        assert_eq!(snap.handle_count, 7);
    }

    #[test]
    fn test_scope_yields_delta() {
        let (monitor, managed, _) = scripted_monitor();

        managed.store(50_000_000, Ordering::SeqCst);
        let scope = monitor.scope("render-page-1");
        managed.store(200_000_000, Ordering::SeqCst);
        let delta = scope.finish();

        assert_eq!(delta.managed_delta(), 150_000_000);
        assert!(delta.is_abnormal());
        assert_eq!(delta.before.label, "render-page-1/before");
        assert_eq!(delta.after.label, "render-page-1/after");
    }

    #[test]
    fn test_no_leak_report_below_threshold() {
        let (monitor, _, handles) = scripted_monitor();
        handles.store(HANDLE_LEAK_THRESHOLD, Ordering::SeqCst);
        assert!(monitor.detect_handle_leaks().is_empty());
    }

    #[test]
    fn test_leak_report_above_threshold() {
        let (monitor, _, handles) = scripted_monitor();
        handles.store(HANDLE_LEAK_THRESHOLD + 5, Ordering::SeqCst);

        let reports = monitor.detect_handle_leaks();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].handle_count, HANDLE_LEAK_THRESHOLD + 5);
        assert_eq!(reports[0].threshold, HANDLE_LEAK_THRESHOLD);
    }

    #[test]
    fn test_os_probe_never_panics() {
        let monitor = ResourceMonitor::new();
        let snap = monitor.capture_snapshot("smoke");
        // Counters are best-effort; on Linux the working set is nonzero.
        #[cfg(target_os = "linux")]
        assert!(snap.working_set_bytes > 0);
        let _ = snap;
    }
}
