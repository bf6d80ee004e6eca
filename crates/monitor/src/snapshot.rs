//! Resource snapshots and delta analysis
//!
//! Point-in-time memory/handle measurements taken before and after a
//! monitored operation, with pure delta analysis over a pair of snapshots.
//! All numbers are advisory; a probe that cannot read the OS counters
//! reports zeros rather than failing the operation being monitored.

use std::time::SystemTime;

/// Delta above which growth across one operation is flagged as abnormal
pub const ABNORMAL_GROWTH_BYTES: i64 = 100 * 1024 * 1024;

/// Live handle count above which a leak report is emitted
pub const HANDLE_LEAK_THRESHOLD: u64 = 10_000;

/// Point-in-time process resource measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Caller-supplied label identifying what this snapshot brackets
    pub label: String,

    /// Resident set size in bytes
    pub working_set_bytes: u64,

    /// Private (data segment) bytes
    pub private_bytes: u64,

    /// Heap bytes attributed to the runtime allocator
    pub managed_bytes: u64,

    /// Open handle (file descriptor) count
    pub handle_count: u64,

    /// When the snapshot was taken
    pub timestamp: SystemTime,
}

impl MemorySnapshot {
    /// Build a snapshot from raw counter values
    pub fn new(
        label: impl Into<String>,
        working_set_bytes: u64,
        private_bytes: u64,
        managed_bytes: u64,
        handle_count: u64,
    ) -> Self {
        Self {
            label: label.into(),
            working_set_bytes,
            private_bytes,
            managed_bytes,
            handle_count,
            timestamp: SystemTime::now(),
        }
    }
}

/// Difference between two snapshots bracketing one operation
#[derive(Debug, Clone)]
pub struct MemoryDelta {
    pub before: MemorySnapshot,
    pub after: MemorySnapshot,
}

impl MemoryDelta {
    /// Compute the delta between two snapshots (pure)
    pub fn between(before: MemorySnapshot, after: MemorySnapshot) -> Self {
        Self { before, after }
    }

    /// Working-set growth in bytes (negative when memory was released)
    pub fn working_set_delta(&self) -> i64 {
        self.after.working_set_bytes as i64 - self.before.working_set_bytes as i64
    }

    /// Private-bytes growth in bytes
    pub fn private_delta(&self) -> i64 {
        self.after.private_bytes as i64 - self.before.private_bytes as i64
    }

    /// Managed-heap growth in bytes
    pub fn managed_delta(&self) -> i64 {
        self.after.managed_bytes as i64 - self.before.managed_bytes as i64
    }

    /// Whether any counter grew past the abnormal-growth threshold
    pub fn is_abnormal(&self) -> bool {
        self.working_set_delta() > ABNORMAL_GROWTH_BYTES
            || self.private_delta() > ABNORMAL_GROWTH_BYTES
            || self.managed_delta() > ABNORMAL_GROWTH_BYTES
    }
}

/// Diagnostic emitted when the live handle count crosses the leak threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleLeakReport {
    /// Handle count observed when the report was generated
    pub handle_count: u64,

    /// The threshold that was exceeded
    pub threshold: u64,

    /// When the report was generated
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(managed: u64) -> MemorySnapshot {
        MemorySnapshot::new("test", 0, 0, managed, 0)
    }

    #[test]
    fn test_managed_delta_and_abnormal_flag() {
        let delta = MemoryDelta::between(snapshot(50_000_000), snapshot(200_000_000));
        assert_eq!(delta.managed_delta(), 150_000_000);
        assert!(delta.is_abnormal());
    }

    #[test]
    fn test_small_delta_on_large_base_is_normal() {
        // 10 MB of growth on a 100 MB base is unremarkable.
        let delta = MemoryDelta::between(snapshot(100_000_000), snapshot(110_000_000));
        assert_eq!(delta.managed_delta(), 10_000_000);
        assert!(!delta.is_abnormal());
    }

    #[test]
    fn test_shrinking_memory_is_not_abnormal() {
        let delta = MemoryDelta::between(snapshot(200_000_000), snapshot(50_000_000));
        assert_eq!(delta.managed_delta(), -150_000_000);
        assert!(!delta.is_abnormal());
    }

    #[test]
    fn test_working_set_growth_also_flags() {
        let before = MemorySnapshot::new("before", 10_000_000, 0, 0, 0);
        let after = MemorySnapshot::new("after", 200_000_000, 0, 0, 0);
        let delta = MemoryDelta::between(before, after);
        assert!(delta.is_abnormal());
        assert_eq!(delta.working_set_delta(), 190_000_000);
    }

    #[test]
    fn test_exact_threshold_is_not_abnormal() {
        let delta = MemoryDelta::between(
            snapshot(0),
            snapshot(ABNORMAL_GROWTH_BYTES as u64),
        );
        assert!(!delta.is_abnormal());

        let over = MemoryDelta::between(
            snapshot(0),
            snapshot(ABNORMAL_GROWTH_BYTES as u64 + 1),
        );
        assert!(over.is_abnormal());
    }
}
