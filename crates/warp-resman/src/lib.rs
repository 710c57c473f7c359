//! Content-Addressed Resource Deduplication
//!
//! This crate hands out shared, reference-counted resources keyed by the
//! *content* of a payload. Asking for a payload equal to one that is
//! already alive returns the existing instance; the instance is torn down,
//! and its external handle destroyed, when the last owner lets go.
//!
//! # Key Properties
//!
//! - **Content identity**: equal payloads map to the same resource
//! - **Alive while referenced**: no capacity bound, no eviction policy
//! - **Lazy materialization**: hash and handle are computed at most once
//! - **Race-free teardown**: a lookup racing with the final release never
//!   observes a dead resource
//!
//! # Components
//!
//! - **Payload**: capability trait the cached value implements
//! - **Resource**: payload plus its lazily created hash and handle
//! - **ResourceCache**: registry, `assign`, and the release hook
//! - **CacheEventHandler**: optional monitoring hook
//!
//! # Usage
//!
//! ```rust,ignore
//! use warp_resman::{CacheConfig, ResourceCache};
//!
//! let cache = ResourceCache::new(CacheConfig::new().with_name("textures"))?;
//!
//! let a = cache.assign(Texture::load("brick.png")?)?;
//! let b = cache.assign(Texture::load("brick.png")?)?;
//! assert!(ResourceRef::ptr_eq(&a, &b));
//!
//! // Created on first use, destroyed when both `a` and `b` are dropped
//! let gpu_handle = a.handle()?;
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
pub mod events;
mod payload;
mod resource;
mod sync;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, ResourceCache, ResourceRef};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use events::{CacheEvent, CacheEventHandler, LoggingEventHandler};
pub use payload::{ContentHash, DisplayPayload, Payload, PayloadError};
pub use resource::{Resource, ResourceId};
