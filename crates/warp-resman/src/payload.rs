//! Payload capability contract
//!
//! The cache never inspects payload content itself. Everything it needs,
//! equality, hashing, and the lifecycle of the external handle, is
//! supplied by the payload type through the [`Payload`] trait.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Error raised by a payload hook, propagated to the caller unmodified
pub type PayloadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Content hash of a payload
///
/// Zero is reserved as [`ContentHash::UNSET`] and is never a valid hash.
/// Collisions between distinct payloads are fine: the cache disambiguates
/// them with [`Payload::equals`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(u64);

impl ContentHash {
    /// The reserved "unset" value
    pub const UNSET: Self = Self(0);

    /// Wrap a raw hash value
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Hash any `Hash` value with the standard hasher
    ///
    /// A raw result of zero is folded to one so the output is never
    /// [`ContentHash::UNSET`].
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish().max(1))
    }

    /// Raw hash value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved unset value
    pub const fn is_unset(self) -> bool {
        self.0 == Self::UNSET.0
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Capabilities a value must provide to be deduplicated by the cache
///
/// # Contract
///
/// - `equals` is an equivalence relation over payload content.
/// - `content_hash` is deterministic and consistent with `equals`: equal
///   payloads hash equally. It must never return [`ContentHash::UNSET`].
/// - `create_handle` materializes the external resource. It may fail;
///   the cache calls it at most once per successful materialization.
/// - `destroy_handle` releases a handle previously returned by
///   `create_handle` on the same payload. It must not fail; any error is
///   the implementor's to log or swallow.
pub trait Payload: Send + Sync + 'static {
    /// External handle produced by `create_handle`
    type Handle: Copy + Eq + fmt::Debug + Send + Sync;

    /// Structural equality over payload content
    fn equals(&self, other: &Self) -> bool;

    /// Deterministic content hash
    fn content_hash(&self) -> std::result::Result<ContentHash, PayloadError>;

    /// Materialize the external handle for this payload
    fn create_handle(&self) -> std::result::Result<Self::Handle, PayloadError>;

    /// Release a handle created by `create_handle`
    fn destroy_handle(&self, handle: Self::Handle);

    /// Human-readable rendering used in log output
    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<opaque payload>")
    }
}

/// `Display` adapter over [`Payload::fmt_display`]
pub struct DisplayPayload<'a, P: Payload>(
    /// Payload to render
    pub &'a P,
);

impl<P: Payload> fmt::Display for DisplayPayload<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt_display(f)
    }
}

/// Run the hash hook and reject the reserved sentinel
pub(crate) fn checked_hash<P: Payload>(payload: &P) -> Result<ContentHash> {
    let hash = payload.content_hash().map_err(Error::HashComputation)?;
    if hash.is_unset() {
        return Err(Error::ReservedHash);
    }
    Ok(hash)
}
