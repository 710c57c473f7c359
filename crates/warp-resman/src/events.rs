//! Cache events for monitoring
//!
//! A cache built with [`ResourceCache::with_event_handler`] reports every
//! registry transition to a [`CacheEventHandler`]. Handlers run on the
//! thread that caused the transition, after the registry lock has been
//! released.
//!
//! [`ResourceCache::with_event_handler`]: crate::ResourceCache::with_event_handler

use crate::payload::ContentHash;
use crate::resource::ResourceId;

/// Registry transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// No live entry matched; a new resource was registered
    Created {
        /// Content hash of the payload
        hash: ContentHash,
        /// The new resource
        id: ResourceId,
    },

    /// A live entry matched and was shared with the caller
    Shared {
        /// Content hash of the payload
        hash: ContentHash,
        /// The shared resource
        id: ResourceId,
        /// Owning references after sharing
        ref_count: usize,
    },

    /// Entries whose resource was already tearing down were dropped
    StalePruned {
        /// Bucket the entries were found in
        hash: ContentHash,
        /// Number of entries removed
        count: usize,
    },

    /// The last owning reference was released
    Released {
        /// Content hash of the payload
        hash: ContentHash,
        /// The released resource
        id: ResourceId,
        /// Whether the handle had been materialized and will be destroyed
        had_handle: bool,
    },
}

/// Trait for cache event handlers
pub trait CacheEventHandler: Send + Sync {
    /// Handle a cache event
    fn on_event(&self, cache: &str, event: CacheEvent);
}

/// Event handler that forwards everything to `tracing`
pub struct LoggingEventHandler;

impl CacheEventHandler for LoggingEventHandler {
    fn on_event(&self, cache: &str, event: CacheEvent) {
        match event {
            CacheEvent::Created { hash, id } => {
                tracing::info!("[{}] created {} for {}", cache, id, hash);
            }
            CacheEvent::Shared { hash, id, ref_count } => {
                tracing::debug!("[{}] shared {} for {} ({} refs)", cache, id, hash, ref_count);
            }
            CacheEvent::StalePruned { hash, count } => {
                tracing::debug!("[{}] pruned {} stale entries for {}", cache, count, hash);
            }
            CacheEvent::Released { hash, id, had_handle } => {
                tracing::info!(
                    "[{}] released {} for {} (handle destroyed: {})",
                    cache,
                    id,
                    hash,
                    had_handle
                );
            }
        }
    }
}
