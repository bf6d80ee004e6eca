//! Thumbnail cache with bounded-concurrency fill scheduling
//!
//! Per-document cache of low-resolution page previews for the scrollable
//! sidebar. Entries move `Pending → Loading → {Loaded, Failed}` and back
//! to `Pending` on invalidation; fills go through the preview scheduler so
//! the decode path never sees more than the concurrency ceiling. The cache
//! exclusively owns its entries' image handles.

use crate::coordinator::RenderingCoordinator;
use crate::events::{EntryStateChanged, PageMutation, ThumbnailSubscriber};
use folioview_render::PageImage;
use folioview_scheduler::{
    CancellationToken, PreviewExecutor, PreviewJob, PreviewPool, PreviewPoolConfig, PreviewQueue,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Pages scheduled immediately when a document is loaded
pub const INITIAL_VISIBLE_WINDOW: u16 = 20;

/// Lifecycle state of one thumbnail entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailState {
    /// Created but not scheduled, or reset by invalidation
    Pending,

    /// A worker is rendering the preview
    Loading,

    /// Preview rendered; the entry owns the image handle
    Loaded,

    /// The load failed; shown as an explicit placeholder, never retried
    /// silently
    Failed,
}

/// Snapshot of one entry for UI binding
///
/// A completed-state copy taken under the cache lock; the image is shared
/// behind `Arc` so the UI can draw it without holding cache internals.
#[derive(Debug, Clone)]
pub struct ThumbnailEntry {
    pub page_number: u16,
    pub state: ThumbnailState,
    pub image: Option<Arc<PageImage>>,
    pub last_access: SystemTime,
}

/// Internal per-page cell, only ever mutated under the cache lock
struct EntryCell {
    state: ThumbnailState,
    image: Option<Arc<PageImage>>,
    last_access: SystemTime,
    /// Bumped on every invalidation; a load commits only if the
    /// generation it started under still matches.
    generation: u64,
}

impl EntryCell {
    fn pending() -> Self {
        Self {
            state: ThumbnailState::Pending,
            image: None,
            last_access: SystemTime::now(),
            generation: 0,
        }
    }

    fn snapshot(&self, page_number: u16) -> ThumbnailEntry {
        ThumbnailEntry {
            page_number,
            state: self.state,
            image: self.image.clone(),
            last_access: self.last_access,
        }
    }
}

/// Per-document thumbnail cache
///
/// Entry transitions happen only under the cache lock, from scheduler
/// workers and invalidation events; readers get cloned snapshots. Closing
/// the cache synchronously drains the scheduler and releases every owned
/// image handle.
pub struct ThumbnailCache {
    entries: Arc<Mutex<HashMap<u16, EntryCell>>>,
    subscribers: Arc<Mutex<Vec<ThumbnailSubscriber>>>,
    queue: Arc<PreviewQueue>,
    pool: Option<PreviewPool>,
    token: CancellationToken,
    total_pages: u16,
}

impl ThumbnailCache {
    /// Create a cache for the document served by `coordinator`
    pub fn new(coordinator: Arc<RenderingCoordinator>, config: PreviewPoolConfig) -> Self {
        let entries: Arc<Mutex<HashMap<u16, EntryCell>>> = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Arc<Mutex<Vec<ThumbnailSubscriber>>> = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(PreviewQueue::new());
        let total_pages = coordinator.total_pages();

        let executor = Self::make_executor(coordinator, entries.clone(), subscribers.clone());
        let pool = PreviewPool::new(queue.clone(), executor, config);
        let token = pool.token();

        Self {
            entries,
            subscribers,
            queue,
            pool: Some(pool),
            token,
            total_pages,
        }
    }

    fn make_executor(
        coordinator: Arc<RenderingCoordinator>,
        entries: Arc<Mutex<HashMap<u16, EntryCell>>>,
        subscribers: Arc<Mutex<Vec<ThumbnailSubscriber>>>,
    ) -> PreviewExecutor {
        Arc::new(move |job: &PreviewJob, token: &CancellationToken| {
            let page_number = job.page_number;

            // Claim the entry. Anything not Pending was loaded, failed or
            // invalidated since the job was queued; skip it.
            let generation = {
                let mut entries = entries.lock().unwrap();
                match entries.get_mut(&page_number) {
                    Some(cell) if cell.state == ThumbnailState::Pending => {
                        cell.state = ThumbnailState::Loading;
                        cell.generation
                    }
                    _ => return,
                }
            };
            notify(&subscribers, page_number, ThumbnailState::Loading);

            let outcome = coordinator.thumbnail_render(page_number);

            let committed_state = {
                let mut entries = entries.lock().unwrap();
                let Some(cell) = entries.get_mut(&page_number) else {
                    return;
                };
                // Invalidated while rendering: the result is stale, drop it.
                if cell.generation != generation || cell.state != ThumbnailState::Loading {
                    return;
                }

                // A cancelled load never commits; the entry stays Pending
                // for retry.
                if token.is_cancelled() {
                    cell.state = ThumbnailState::Pending;
                    ThumbnailState::Pending
                } else {
                    match outcome.result {
                        Ok(image) => {
                            cell.image = Some(Arc::new(image));
                            cell.state = ThumbnailState::Loaded;
                        }
                        Err(error) => {
                            log::warn!("thumbnail load failed for page {page_number}: {error}");
                            cell.state = ThumbnailState::Failed;
                        }
                    }
                    cell.last_access = SystemTime::now();
                    cell.state
                }
            };
            notify(&subscribers, page_number, committed_state);
        })
    }

    /// Create one Pending entry per page and schedule the initial window
    pub fn load_all(&self) {
        {
            let mut entries = self.entries.lock().unwrap();
            entries.clear();
            for page_number in 1..=self.total_pages {
                entries.insert(page_number, EntryCell::pending());
            }
        }

        let window_end = self.total_pages.min(INITIAL_VISIBLE_WINDOW);
        if window_end >= 1 {
            self.schedule_pending(1, window_end);
        }
        log::debug!(
            "thumbnail cache primed: {} entries, first {window_end} scheduled",
            self.total_pages
        );
    }

    /// Schedule the visible range and return snapshots for it
    ///
    /// The range is 1-based and inclusive, clamped to the document. Loaded
    /// entries are cache hits and are never re-rendered unless invalidated;
    /// Pending entries are queued and promoted ahead of any stale viewport's
    /// leftovers.
    pub fn load_visible(&self, start_page: u16, end_page: u16) -> Vec<ThumbnailEntry> {
        let start = start_page.max(1);
        let end = end_page.min(self.total_pages);
        if start > end {
            return Vec::new();
        }

        self.schedule_pending(start, end);

        let mut entries = self.entries.lock().unwrap();
        (start..=end)
            .filter_map(|page_number| {
                entries.get_mut(&page_number).map(|cell| {
                    if cell.state == ThumbnailState::Loaded {
                        cell.last_access = SystemTime::now();
                    }
                    cell.snapshot(page_number)
                })
            })
            .collect()
    }

    fn schedule_pending(&self, start_page: u16, end_page: u16) {
        let pending: Vec<u16> = {
            let entries = self.entries.lock().unwrap();
            (start_page..=end_page)
                .filter(|page| {
                    entries
                        .get(page)
                        .is_some_and(|cell| cell.state == ThumbnailState::Pending)
                })
                .collect()
        };

        if pending.is_empty() {
            return;
        }

        self.queue.submit(pending.iter().copied());
        // The newest viewport wins over queued-but-unstarted stale work.
        self.queue.promote(pending.iter().copied());
    }

    /// Snapshot of one entry for UI binding
    pub fn entry(&self, page_number: u16) -> Option<ThumbnailEntry> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&page_number)
            .map(|cell| cell.snapshot(page_number))
    }

    /// Navigation-gating predicate: true while any entry is Loading
    pub fn is_any_loading(&self) -> bool {
        let entries = self.entries.lock().unwrap();
        entries
            .values()
            .any(|cell| cell.state == ThumbnailState::Loading)
    }

    /// Number of entries currently Loaded
    pub fn loaded_count(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries
            .values()
            .filter(|cell| cell.state == ThumbnailState::Loaded)
            .count()
    }

    /// Subscribe to entry-state-changed events
    pub fn subscribe(&self, subscriber: ThumbnailSubscriber) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    /// Session cancellation token governing in-flight loads
    pub fn session_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Invalidate entries affected by a page mutation
    ///
    /// Rotate and Insert reset exactly the listed pages. Delete and
    /// Reorder shift every later index, so the whole tail from the lowest
    /// affected page is reset. Reset entries release their image handle,
    /// drop their queued jobs and must be re-requested to refill.
    pub fn invalidate(&self, mutation: &PageMutation) {
        let Some(min_affected) = mutation.min_affected() else {
            return;
        };

        let affected: Vec<u16> = {
            let mut entries = self.entries.lock().unwrap();
            let mut affected = Vec::new();

            for (&page_number, cell) in entries.iter_mut() {
                let hit = if mutation.invalidates_tail() {
                    page_number >= min_affected
                } else {
                    mutation.affected_pages.contains(&page_number)
                };
                if !hit {
                    continue;
                }

                cell.state = ThumbnailState::Pending;
                cell.image = None;
                cell.generation += 1;
                affected.push(page_number);
            }
            affected
        };

        if affected.is_empty() {
            return;
        }

        self.queue
            .remove_if(|job| affected.contains(&job.page_number));

        log::debug!(
            "{:?} mutation invalidated {} thumbnail entries",
            mutation.kind,
            affected.len()
        );
        for page_number in affected {
            notify(&self.subscribers, page_number, ThumbnailState::Pending);
        }
    }

    /// Synchronously release everything owned by this cache
    ///
    /// Cancels in-flight loads, drops queued work, joins the worker pool
    /// and releases every image handle. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.drain_and_join();
        }
        self.entries.lock().unwrap().clear();
        self.subscribers.lock().unwrap().clear();
    }

    /// Total pages this cache was created for
    pub fn total_pages(&self) -> u16 {
        self.total_pages
    }

    #[doc(hidden)]
    pub fn wait_idle(&self) {
        if let Some(pool) = &self.pool {
            pool.wait_idle();
        }
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        self.close();
    }
}

fn notify(
    subscribers: &Arc<Mutex<Vec<ThumbnailSubscriber>>>,
    page_number: u16,
    state: ThumbnailState,
) {
    let subscribers = subscribers.lock().unwrap().clone();
    let event = EntryStateChanged { page_number, state };
    for subscriber in subscribers {
        subscriber(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ObservabilityContext;
    use crate::events::MutationKind;
    use folioview_monitor::ResourceMonitor;
    use folioview_render::{
        DecodeError, PageDecoder, PageStream, RasterPageDecoder, StrategyChain,
    };
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Decoder wrapper that counts decode calls and can slow them down
    struct CountingDecoder {
        inner: RasterPageDecoder,
        calls: AtomicUsize,
        max_concurrent: AtomicUsize,
        current: AtomicUsize,
        delay: Duration,
    }

    impl CountingDecoder {
        fn new(pages: u16) -> Self {
            Self {
                inner: RasterPageDecoder::new(pages).with_page_size(0.25, 0.25),
                calls: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                current: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PageDecoder for CountingDecoder {
        fn decode_page(&self, page_index: u16, dpi: f64) -> Result<PageStream, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);

            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }

            let result = self.inner.decode_page(page_index, dpi);
            self.current.fetch_sub(1, Ordering::SeqCst);
            result
        }

        fn page_count(&self) -> u16 {
            self.inner.page_count()
        }
    }

    fn cache_with_decoder(
        decoder: Arc<dyn PageDecoder>,
        workers: usize,
    ) -> ThumbnailCache {
        let coordinator = Arc::new(RenderingCoordinator::new(
            PathBuf::from("test.pdf"),
            decoder,
            StrategyChain::default_chain(),
            ResourceMonitor::new(),
            Arc::new(ObservabilityContext::new("test.pdf")),
        ));
        ThumbnailCache::new(
            coordinator,
            PreviewPoolConfig::new(workers).with_poll_interval(Duration::from_millis(1)),
        )
    }

    #[test]
    fn test_load_all_creates_pending_entries_and_schedules_window() {
        let decoder = Arc::new(CountingDecoder::new(50));
        let cache = cache_with_decoder(decoder.clone(), 2);

        cache.load_all();
        cache.wait_idle();

        // All 50 entries exist; only the initial window was rendered.
        assert_eq!(cache.total_pages(), 50);
        assert_eq!(decoder.calls(), INITIAL_VISIBLE_WINDOW as usize);
        assert_eq!(cache.entry(1).unwrap().state, ThumbnailState::Loaded);
        assert_eq!(cache.entry(21).unwrap().state, ThumbnailState::Pending);
        assert_eq!(cache.entry(50).unwrap().state, ThumbnailState::Pending);
    }

    #[test]
    fn test_loaded_entries_are_cache_hits() {
        let decoder = Arc::new(CountingDecoder::new(12));
        let cache = cache_with_decoder(decoder.clone(), 2);
        cache.load_all();

        cache.load_visible(1, 10);
        cache.wait_idle();
        let first_round = decoder.calls();

        // Re-requesting the same range triggers zero additional decodes.
        let entries = cache.load_visible(1, 10);
        cache.wait_idle();

        assert_eq!(decoder.calls(), first_round);
        assert!(entries
            .iter()
            .all(|entry| entry.state == ThumbnailState::Loaded && entry.image.is_some()));
    }

    #[test]
    fn test_concurrency_ceiling_respected() {
        let decoder =
            Arc::new(CountingDecoder::new(50).with_delay(Duration::from_millis(3)));
        let cache = cache_with_decoder(decoder.clone(), 4);
        cache.load_all();

        cache.load_visible(1, 50);
        cache.wait_idle();

        assert_eq!(decoder.calls(), 50);
        assert!(
            decoder.max_concurrent.load(Ordering::SeqCst) <= 4,
            "decode concurrency exceeded the ceiling"
        );
    }

    #[test]
    fn test_invalidation_resets_tail_and_releases_handles() {
        let decoder = Arc::new(CountingDecoder::new(10));
        let cache = cache_with_decoder(decoder.clone(), 2);
        cache.load_all();
        cache.load_visible(1, 10);
        cache.wait_idle();
        assert_eq!(cache.loaded_count(), 10);

        cache.invalidate(&PageMutation::new(MutationKind::Delete, vec![3]));

        // Page 3 and everything after it reset; earlier pages survive.
        assert_eq!(cache.entry(2).unwrap().state, ThumbnailState::Loaded);
        for page in 3..=10 {
            let entry = cache.entry(page).unwrap();
            assert_eq!(entry.state, ThumbnailState::Pending, "page {page}");
            assert!(entry.image.is_none(), "page {page} kept its handle");
        }

        // A re-request refills the invalidated page.
        let calls_before = decoder.calls();
        cache.load_visible(3, 3);
        cache.wait_idle();
        assert_eq!(decoder.calls(), calls_before + 1);
        assert_eq!(cache.entry(3).unwrap().state, ThumbnailState::Loaded);
    }

    #[test]
    fn test_rotate_invalidates_only_listed_pages() {
        let decoder = Arc::new(CountingDecoder::new(6));
        let cache = cache_with_decoder(decoder, 2);
        cache.load_all();
        cache.load_visible(1, 6);
        cache.wait_idle();

        cache.invalidate(&PageMutation::new(MutationKind::Rotate, vec![2, 4]));

        assert_eq!(cache.entry(1).unwrap().state, ThumbnailState::Loaded);
        assert_eq!(cache.entry(2).unwrap().state, ThumbnailState::Pending);
        assert_eq!(cache.entry(3).unwrap().state, ThumbnailState::Loaded);
        assert_eq!(cache.entry(4).unwrap().state, ThumbnailState::Pending);
        assert_eq!(cache.entry(5).unwrap().state, ThumbnailState::Loaded);
    }

    #[test]
    fn test_is_any_loading_gates_navigation() {
        let decoder =
            Arc::new(CountingDecoder::new(4).with_delay(Duration::from_millis(40)));
        let cache = cache_with_decoder(decoder, 2);
        cache.load_all();

        // Loads are in flight: navigation must be gated.
        thread::sleep(Duration::from_millis(10));
        assert!(cache.is_any_loading());

        cache.wait_idle();
        assert!(!cache.is_any_loading());
        assert_eq!(cache.loaded_count(), 4);
    }

    #[test]
    fn test_cancelled_load_leaves_entry_pending() {
        let decoder =
            Arc::new(CountingDecoder::new(1).with_delay(Duration::from_millis(50)));
        let cache = cache_with_decoder(decoder, 1);
        cache.load_all();

        // Wait for the load to start, then cancel the session.
        thread::sleep(Duration::from_millis(15));
        assert!(cache.is_any_loading());
        cache.session_token().cancel();

        cache.wait_idle();

        let entry = cache.entry(1).unwrap();
        assert_eq!(entry.state, ThumbnailState::Pending);
        assert!(entry.image.is_none());
    }

    #[test]
    fn test_failed_entry_is_distinct_and_not_retried() {
        /// Decoder that always fails
        struct BrokenDecoder;

        impl PageDecoder for BrokenDecoder {
            fn decode_page(&self, _page: u16, _dpi: f64) -> Result<PageStream, DecodeError> {
                Err(DecodeError::Engine("broken".to_string()))
            }

            fn page_count(&self) -> u16 {
                2
            }
        }

        let cache = cache_with_decoder(Arc::new(BrokenDecoder), 1);
        cache.load_all();
        cache.wait_idle();

        assert_eq!(cache.entry(1).unwrap().state, ThumbnailState::Failed);

        // A plain re-request does not silently retry a Failed entry.
        cache.load_visible(1, 2);
        cache.wait_idle();
        assert_eq!(cache.entry(1).unwrap().state, ThumbnailState::Failed);
    }

    #[test]
    fn test_state_change_events_reach_subscribers() {
        let decoder = Arc::new(CountingDecoder::new(2));
        let cache = cache_with_decoder(decoder, 1);

        let seen: Arc<Mutex<Vec<EntryStateChanged>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        cache.subscribe(Arc::new(move |event| {
            seen_clone.lock().unwrap().push(event);
        }));

        cache.load_all();
        cache.wait_idle();

        let events = seen.lock().unwrap();
        let page_one: Vec<ThumbnailState> = events
            .iter()
            .filter(|e| e.page_number == 1)
            .map(|e| e.state)
            .collect();
        assert_eq!(
            page_one,
            vec![ThumbnailState::Loading, ThumbnailState::Loaded]
        );
    }

    #[test]
    fn test_close_releases_everything() {
        let decoder =
            Arc::new(CountingDecoder::new(30).with_delay(Duration::from_millis(5)));
        let mut cache = cache_with_decoder(decoder.clone(), 2);
        cache.load_all();

        cache.close();

        assert!(cache.session_token().is_cancelled());
        assert!(cache.entry(1).is_none());
        assert!(!cache.is_any_loading());
        // Close is idempotent.
        cache.close();
    }

    #[test]
    fn test_load_visible_clamps_range() {
        let decoder = Arc::new(CountingDecoder::new(5));
        let cache = cache_with_decoder(decoder, 2);
        cache.load_all();

        let entries = cache.load_visible(0, 100);
        assert_eq!(entries.len(), 5);

        let empty = cache.load_visible(10, 20);
        assert!(empty.is_empty());
    }
}
