//! Cache-facing events
//!
//! Page-mutation notifications flow in from the page-operations
//! collaborator and drive thumbnail invalidation; entry-state-changed
//! events flow out to subscribers (the navigation layer) so nothing
//! outside the cache ever holds a reference into its internals.

use crate::thumbnails::ThumbnailState;
use std::sync::Arc;

/// Kind of page mutation applied to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Rotate,
    Delete,
    Reorder,
    Insert,
}

/// Notification that pages of the open document were mutated
///
/// Page numbers are 1-based. For `Delete` and `Reorder` the indices of
/// every page at or after the mutation point shift, so invalidation covers
/// the whole tail, not just the listed pages.
#[derive(Debug, Clone)]
pub struct PageMutation {
    pub kind: MutationKind,
    pub affected_pages: Vec<u16>,
}

impl PageMutation {
    pub fn new(kind: MutationKind, affected_pages: Vec<u16>) -> Self {
        Self {
            kind,
            affected_pages,
        }
    }

    /// Lowest affected page number, if any
    pub fn min_affected(&self) -> Option<u16> {
        self.affected_pages.iter().copied().min()
    }

    /// Whether every page at or after the mutation point is stale
    pub fn invalidates_tail(&self) -> bool {
        matches!(self.kind, MutationKind::Delete | MutationKind::Reorder)
    }
}

/// Emitted whenever a thumbnail entry changes state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStateChanged {
    pub page_number: u16,
    pub state: ThumbnailState,
}

/// Subscriber callback for entry-state-changed events
///
/// Called with the cache's entry lock released; subscribers may query the
/// cache but must not assume the state still holds by the time they run.
pub type ThumbnailSubscriber = Arc<dyn Fn(EntryStateChanged) + Send + Sync>;
