//! Content-addressed resource cache
//!
//! The registry maps content hashes to buckets of non-owning slots. Callers
//! own resources through [`ResourceRef`]; when the last reference goes away
//! the release hook takes the registry lock, removes the slot for that exact
//! instance, and only then lets the resource (and its handle) be destroyed.
//!
//! A slot whose resource has started tearing down but has not yet been
//! removed is *stale*. `assign` prunes stale slots in the same critical
//! section in which it looks up and inserts, so it never hands out a dead
//! reference.

use crate::config::CacheConfig;
use crate::events::{CacheEvent, CacheEventHandler};
use crate::payload::{self, ContentHash, DisplayPayload, Payload};
use crate::resource::{Resource, ResourceId};
use crate::sync::Mutex;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Non-owning pointer to one registered resource
struct Slot<P: Payload> {
    id: ResourceId,
    entry: Weak<Entry<P>>,
}

struct Registry<P: Payload> {
    buckets: HashMap<ContentHash, Vec<Slot<P>>>,
    /// Stale slots removed by `assign`/`lookup` whose release hook has not run yet
    pruned: HashSet<ResourceId>,
}

/// Allocation shared by all owning references to one resource
struct Entry<P: Payload> {
    key: ContentHash,
    resource: Resource<P>,
    cache: Arc<CacheInner<P>>,
}

impl<P: Payload> Drop for Entry<P> {
    fn drop(&mut self) {
        // Runs before `resource` is dropped, so the slot is gone by the
        // time the destroy hook fires.
        self.cache.release(self.key, &self.resource);
    }
}

#[derive(Default)]
struct Counters {
    assigns: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_pruned: AtomicU64,
    releases: AtomicU64,
}

struct CacheInner<P: Payload> {
    config: CacheConfig,
    registry: Mutex<Registry<P>>,
    next_id: AtomicU64,
    counters: Counters,
    events: Option<Arc<dyn CacheEventHandler>>,
}

/// Cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Registry slots whose resource is still alive
    pub live_entries: usize,
    /// Successful `assign` calls
    pub assigns: u64,
    /// Assigns that shared an existing resource
    pub hits: u64,
    /// Assigns that created a new resource
    pub misses: u64,
    /// Stale slots removed during lookup
    pub stale_pruned: u64,
    /// Resources whose last reference was released
    pub releases: u64,
}

impl CacheStats {
    /// Fraction of assigns served from an existing resource
    pub fn hit_ratio(&self) -> f64 {
        if self.assigns == 0 {
            0.0
        } else {
            self.hits as f64 / self.assigns as f64
        }
    }
}

/// Scan one bucket under the registry lock.
///
/// Dead slots are removed and recorded in `pruned`. Live slots are upgraded
/// to compare content; upgraded references that don't match go to
/// `deferred` and must be dropped only after the lock is released, since
/// dropping the last one re-enters the lock through the release hook.
fn find_live<P: Payload>(
    bucket: &mut Vec<Slot<P>>,
    pruned: &mut HashSet<ResourceId>,
    payload: &P,
    deferred: &mut Vec<Arc<Entry<P>>>,
) -> (Option<Arc<Entry<P>>>, usize) {
    let mut found = None;
    let mut stale = 0;

    bucket.retain(|slot| match slot.entry.upgrade() {
        Some(entry) => {
            if found.is_none() && entry.resource.data().equals(payload) {
                found = Some(entry);
            } else {
                deferred.push(entry);
            }
            true
        }
        None => {
            pruned.insert(slot.id);
            stale += 1;
            false
        }
    });

    (found, stale)
}

impl<P: Payload> CacheInner<P> {
    fn next_resource_id(&self) -> ResourceId {
        ResourceId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(handler) = &self.events {
            handler.on_event(&self.config.name, event);
        }
    }

    fn note_pruned(&self, hash: ContentHash, count: usize) {
        if count == 0 {
            return;
        }
        self.counters
            .stale_pruned
            .fetch_add(count as u64, Ordering::Relaxed);
        tracing::debug!(
            cache = %self.config.name,
            %hash,
            count,
            "removed stale entries left by a concurrent release"
        );
        self.emit(CacheEvent::StalePruned { hash, count });
    }

    /// Release hook, run when the last `ResourceRef` to a resource drops
    fn release(&self, key: ContentHash, resource: &Resource<P>) {
        let id = resource.id();

        let mut registry = self.registry.lock();
        let (removed, emptied) = match registry.buckets.get_mut(&key) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|slot| slot.id != id);
                (bucket.len() != before, bucket.is_empty())
            }
            None => (false, false),
        };
        if emptied {
            registry.buckets.remove(&key);
        }
        let was_pruned = !removed && registry.pruned.remove(&id);
        drop(registry);

        self.counters.releases.fetch_add(1, Ordering::Relaxed);

        if removed {
            tracing::debug!(
                cache = %self.config.name,
                resource = %id,
                payload = %DisplayPayload(resource.data()),
                thread = ?std::thread::current().id(),
                "released, entry erased"
            );
        } else if was_pruned {
            tracing::debug!(
                cache = %self.config.name,
                resource = %id,
                thread = ?std::thread::current().id(),
                "released, entry already pruned by a concurrent lookup"
            );
        } else {
            tracing::error!(
                cache = %self.config.name,
                resource = %id,
                hash = %key,
                "released resource has no registry entry"
            );
            debug_assert!(false, "released resource {id} has no registry entry");
        }

        self.emit(CacheEvent::Released {
            hash: key,
            id,
            had_handle: resource.has_handle(),
        });
    }
}

/// Owning reference to a cached resource
///
/// Cloning shares ownership. When the last clone is dropped the resource
/// leaves the registry and its handle, if materialized, is destroyed.
pub struct ResourceRef<P: Payload> {
    entry: Arc<Entry<P>>,
}

impl<P: Payload> ResourceRef<P> {
    /// Number of owning references to this resource
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.entry)
    }

    /// Whether two references point at the same resource instance
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.entry, &other.entry)
    }
}

impl<P: Payload> Clone for ResourceRef<P> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
        }
    }
}

impl<P: Payload> Deref for ResourceRef<P> {
    type Target = Resource<P>;

    fn deref(&self) -> &Resource<P> {
        &self.entry.resource
    }
}

impl<P: Payload> fmt::Debug for ResourceRef<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("resource", &self.entry.resource)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Content-addressed deduplication cache
///
/// Cheap to clone; clones share the same registry. Resources keep the
/// registry alive, so a cache may be dropped while references are still
/// outstanding.
pub struct ResourceCache<P: Payload> {
    inner: Arc<CacheInner<P>>,
}

impl<P: Payload> Clone for ResourceCache<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Payload> fmt::Debug for ResourceCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("config", &self.inner.config)
            .field("entries", &self.len())
            .finish()
    }
}

impl<P: Payload> ResourceCache<P> {
    /// Create a cache with the given configuration
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self::from_parts(CacheConfig::default(), None)
    }

    /// Create a cache that reports registry transitions to `handler`
    pub fn with_event_handler(
        config: CacheConfig,
        handler: Arc<dyn CacheEventHandler>,
    ) -> Result<Self> {
        Self::build(config, Some(handler))
    }

    fn build(config: CacheConfig, events: Option<Arc<dyn CacheEventHandler>>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, events))
    }

    fn from_parts(config: CacheConfig, events: Option<Arc<dyn CacheEventHandler>>) -> Self {
        let registry = Registry {
            buckets: HashMap::with_capacity(config.initial_capacity),
            pruned: HashSet::new(),
        };
        Self {
            inner: Arc::new(CacheInner {
                config,
                registry: Mutex::new(registry),
                next_id: AtomicU64::new(1),
                counters: Counters::default(),
                events,
            }),
        }
    }

    /// Get the shared resource for `payload`'s content, creating it if needed
    ///
    /// The hash hook runs before the registry lock is taken; if it fails
    /// the registry is not touched. Equality runs under the lock. The
    /// payload is consumed either way: on a hit it is dropped and the
    /// existing resource is returned.
    pub fn assign(&self, payload: P) -> Result<ResourceRef<P>> {
        let inner = &self.inner;
        let hash = payload::checked_hash(&payload)?;

        let mut deferred = Vec::new();
        let mut registry = inner.registry.lock();
        let Registry { buckets, pruned } = &mut *registry;
        let bucket = buckets.entry(hash).or_default();
        let (found, stale) = find_live(bucket, pruned, &payload, &mut deferred);

        let (entry, created) = match found {
            Some(entry) => (entry, false),
            None => {
                let id = inner.next_resource_id();
                let entry = Arc::new(Entry {
                    key: hash,
                    resource: Resource::with_hash(id, payload, hash),
                    cache: Arc::clone(inner),
                });
                bucket.push(Slot {
                    id,
                    entry: Arc::downgrade(&entry),
                });
                (entry, true)
            }
        };
        drop(registry);
        drop(deferred);

        inner.counters.assigns.fetch_add(1, Ordering::Relaxed);
        inner.note_pruned(hash, stale);

        let resource = ResourceRef { entry };
        let id = resource.id();
        if created {
            inner.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                cache = %inner.config.name,
                %hash,
                resource = %id,
                payload = %DisplayPayload(resource.data()),
                "not found, inserted"
            );
            inner.emit(CacheEvent::Created { hash, id });
        } else {
            inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            let ref_count = resource.ref_count();
            tracing::debug!(
                cache = %inner.config.name,
                %hash,
                resource = %id,
                payload = %DisplayPayload(resource.data()),
                ref_count,
                "found, shared"
            );
            inner.emit(CacheEvent::Shared {
                hash,
                id,
                ref_count,
            });
        }

        Ok(resource)
    }

    /// Find the live resource equal to `payload` without creating one
    pub fn lookup(&self, payload: &P) -> Result<Option<ResourceRef<P>>> {
        let inner = &self.inner;
        let hash = payload::checked_hash(payload)?;

        let mut deferred = Vec::new();
        let mut registry = inner.registry.lock();
        let Registry { buckets, pruned } = &mut *registry;
        let (found, stale, emptied) = match buckets.get_mut(&hash) {
            Some(bucket) => {
                let (found, stale) = find_live(bucket, pruned, payload, &mut deferred);
                (found, stale, bucket.is_empty())
            }
            None => (None, 0, false),
        };
        if emptied {
            buckets.remove(&hash);
        }
        drop(registry);
        drop(deferred);

        inner.note_pruned(hash, stale);
        Ok(found.map(|entry| ResourceRef { entry }))
    }

    /// Number of registry slots, including ones whose release is in flight
    pub fn len(&self) -> usize {
        self.inner
            .registry
            .lock()
            .buckets
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Whether the registry has no slots
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Snapshot of cache statistics
    pub fn stats(&self) -> CacheStats {
        let live_entries = self
            .inner
            .registry
            .lock()
            .buckets
            .values()
            .flatten()
            .filter(|slot| slot.entry.strong_count() > 0)
            .count();

        let counters = &self.inner.counters;
        CacheStats {
            live_entries,
            assigns: counters.assigns.load(Ordering::Relaxed),
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            stale_pruned: counters.stale_pruned.load(Ordering::Relaxed),
            releases: counters.releases.load(Ordering::Relaxed),
        }
    }
}
