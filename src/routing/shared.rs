//! Atomically swappable rule table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::routing::router::Router;

/// The live rule table, shared by every request task.
///
/// Readers get a complete snapshot; a reload replaces the whole table in one
/// store, so no request ever sees a half-updated table.
#[derive(Debug)]
pub struct SharedRouter {
    current: ArcSwap<Router>,
}

impl SharedRouter {
    pub fn new(router: Router) -> Self {
        Self {
            current: ArcSwap::from_pointee(router),
        }
    }

    /// Snapshot of the table at this instant.
    pub fn load(&self) -> Arc<Router> {
        self.current.load_full()
    }

    /// Install a new table, returning the one it replaced.
    pub fn replace(&self, router: Router) -> Arc<Router> {
        self.current.swap(Arc::new(router))
    }
}
