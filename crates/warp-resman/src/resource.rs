//! Cache-owned wrapper around one payload instance
//!
//! A `Resource` pairs a payload with two single-assignment cells: the
//! content hash and the external handle. Both are filled on first use and
//! never change afterwards. Concurrent first readers block on the cell,
//! so each hook runs at most once per successful initialization.

use crate::payload::{self, ContentHash, DisplayPayload, Payload};
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use std::fmt;

/// Identifier of one resource instance, unique within its cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// A deduplicated payload plus its lazily materialized hash and handle
pub struct Resource<P: Payload> {
    id: ResourceId,
    payload: P,
    hash: OnceCell<ContentHash>,
    handle: OnceCell<P::Handle>,
}

impl<P: Payload> Resource<P> {
    /// Wrap a payload; neither hash nor handle is computed yet
    pub(crate) fn new(id: ResourceId, payload: P) -> Self {
        Self {
            id,
            payload,
            hash: OnceCell::new(),
            handle: OnceCell::new(),
        }
    }

    /// Wrap a payload whose hash the cache already computed for lookup
    pub(crate) fn with_hash(id: ResourceId, payload: P, hash: ContentHash) -> Self {
        let resource = Self::new(id, payload);
        // Fresh cell, cannot already be set
        let _ = resource.hash.set(hash);
        resource
    }

    /// Instance identifier
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Read access to the owned payload
    pub fn data(&self) -> &P {
        &self.payload
    }

    /// The external handle, created on first call
    ///
    /// A failed creation is not cached: the error is returned and the next
    /// call asks the payload again.
    pub fn handle(&self) -> Result<P::Handle> {
        self.handle
            .get_or_try_init(|| -> Result<P::Handle> {
                let handle = self.payload.create_handle().map_err(Error::HandleCreation)?;
                tracing::trace!(
                    resource = %self.id,
                    payload = %DisplayPayload(&self.payload),
                    ?handle,
                    "handle materialized"
                );
                Ok(handle)
            })
            .copied()
    }

    /// The content hash, computed on first call
    pub fn content_hash(&self) -> Result<ContentHash> {
        self.hash
            .get_or_try_init(|| payload::checked_hash(&self.payload))
            .copied()
    }

    /// Whether `handle()` has succeeded at least once
    pub fn has_handle(&self) -> bool {
        self.handle.get().is_some()
    }
}

impl<P: Payload> fmt::Debug for Resource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("payload", &DisplayPayload(&self.payload).to_string())
            .field("hash", &self.hash.get())
            .field("handle", &self.handle.get())
            .finish()
    }
}

impl<P: Payload> Drop for Resource<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::trace!(resource = %self.id, ?handle, "destroying handle");
            self.payload.destroy_handle(handle);
        }
    }
}
