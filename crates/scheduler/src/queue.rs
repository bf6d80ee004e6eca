//! Preview work queue
//!
//! FIFO queue of pending preview loads with viewport reprioritization.
//! Jobs submitted together keep their order; a later visible-range call can
//! promote queued-but-unstarted jobs ahead of a stale viewport's leftovers.
//! Jobs that have already been popped (in flight) are never touched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One queued preview load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewJob {
    /// Page to render a preview for (1-based)
    pub page_number: u16,
}

/// Thread-safe FIFO queue with promotion
///
/// The queue holds at most one job per page; re-submitting a queued page is
/// a no-op. Popped jobs leave the queue entirely, so promotion and removal
/// only ever affect work that has not started.
pub struct PreviewQueue {
    jobs: Mutex<VecDeque<PreviewJob>>,
}

impl PreviewQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Append jobs for the given pages in order, skipping duplicates
    ///
    /// Returns the number of jobs actually enqueued.
    pub fn submit(&self, pages: impl IntoIterator<Item = u16>) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let mut enqueued = 0;

        for page_number in pages {
            if jobs.iter().any(|job| job.page_number == page_number) {
                continue;
            }
            jobs.push_back(PreviewJob { page_number });
            enqueued += 1;
        }

        enqueued
    }

    /// Move queued jobs for the given pages to the front of the queue
    ///
    /// The promoted jobs take the order of `pages`; everything else keeps
    /// its relative order behind them. Pages with no queued job are
    /// ignored. Returns the number of jobs promoted.
    pub fn promote(&self, pages: impl IntoIterator<Item = u16>) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let mut promoted = Vec::new();

        for page_number in pages {
            if let Some(pos) = jobs.iter().position(|job| job.page_number == page_number) {
                promoted.push(jobs.remove(pos).unwrap());
            }
        }

        let count = promoted.len();
        for job in promoted.into_iter().rev() {
            jobs.push_front(job);
        }

        count
    }

    /// Pop the next job in queue order
    pub fn next_job(&self) -> Option<PreviewJob> {
        self.jobs.lock().unwrap().pop_front()
    }

    /// Pop the next job and mark it in flight under the queue lock
    ///
    /// The counter is incremented before the lock is released, so a job is
    /// always visible either in the queue or in the in-flight count; an
    /// observer can never read both as empty while work remains.
    pub fn next_job_counted(&self, in_flight: &AtomicUsize) -> Option<PreviewJob> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.pop_front();
        if job.is_some() {
            in_flight.fetch_add(1, Ordering::AcqRel);
        }
        job
    }

    /// Remove queued jobs matching a predicate
    ///
    /// Returns the number of jobs removed.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&PreviewJob) -> bool,
    {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|job| !predicate(job));
        before - jobs.len()
    }

    /// Clear the queue, returning the number of jobs dropped
    pub fn drain(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap();
        let dropped = jobs.len();
        jobs.clear();
        dropped
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }

    /// Snapshot of queued page numbers in queue order
    pub fn queued_pages(&self) -> Vec<u16> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.page_number)
            .collect()
    }
}

impl Default for PreviewQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_preserves_fifo_order() {
        let queue = PreviewQueue::new();
        queue.submit([3, 1, 2]);

        assert_eq!(queue.queued_pages(), vec![3, 1, 2]);
        assert_eq!(queue.next_job().unwrap().page_number, 3);
        assert_eq!(queue.next_job().unwrap().page_number, 1);
        assert_eq!(queue.next_job().unwrap().page_number, 2);
        assert!(queue.next_job().is_none());
    }

    #[test]
    fn test_submit_skips_duplicates() {
        let queue = PreviewQueue::new();
        assert_eq!(queue.submit([1, 2, 3]), 3);
        assert_eq!(queue.submit([2, 3, 4]), 1);
        assert_eq!(queue.queued_pages(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_popped_page_can_be_resubmitted() {
        let queue = PreviewQueue::new();
        queue.submit([1]);
        queue.next_job().unwrap();

        assert_eq!(queue.submit([1]), 1);
    }

    #[test]
    fn test_promote_moves_new_viewport_ahead_of_stale_work() {
        let queue = PreviewQueue::new();
        queue.submit(1..=30);

        let promoted = queue.promote(25..=30);
        assert_eq!(promoted, 6);

        let order = queue.queued_pages();
        assert_eq!(&order[..6], &[25, 26, 27, 28, 29, 30]);
        assert_eq!(&order[6..10], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_promote_ignores_unqueued_pages() {
        let queue = PreviewQueue::new();
        queue.submit([1, 2]);

        assert_eq!(queue.promote([2, 99]), 1);
        assert_eq!(queue.queued_pages(), vec![2, 1]);
    }

    #[test]
    fn test_remove_if() {
        let queue = PreviewQueue::new();
        queue.submit(1..=10);

        let removed = queue.remove_if(|job| job.page_number >= 5);
        assert_eq!(removed, 6);
        assert_eq!(queue.queued_pages(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_counted_pop_marks_in_flight() {
        let queue = PreviewQueue::new();
        let in_flight = AtomicUsize::new(0);
        queue.submit([1]);

        let job = queue.next_job_counted(&in_flight).unwrap();
        assert_eq!(job.page_number, 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);

        // An empty pop leaves the counter alone.
        assert!(queue.next_job_counted(&in_flight).is_none());
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drain() {
        let queue = PreviewQueue::new();
        queue.submit(1..=5);

        assert_eq!(queue.drain(), 5);
        assert!(queue.is_empty());
        assert_eq!(queue.drain(), 0);
    }
}
