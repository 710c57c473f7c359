//! Shared payload fixture for integration tests

#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use warp_resman::{ContentHash, Payload, PayloadError};

/// Counts every hook invocation across all samplers sharing it
#[derive(Debug, Default)]
pub struct Device {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    next_handle: AtomicU64,
}

impl Device {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn live_handles(&self) -> usize {
        self.created() - self.destroyed()
    }
}

/// A texture-sampler description, deduplicated by its settings
#[derive(Debug, Clone)]
pub struct Sampler {
    pub filter: u8,
    pub wrap: u8,
    pub device: Arc<Device>,
}

impl Sampler {
    pub fn new(device: &Arc<Device>, filter: u8, wrap: u8) -> Self {
        Self {
            filter,
            wrap,
            device: device.clone(),
        }
    }
}

impl Payload for Sampler {
    type Handle = u64;

    fn equals(&self, other: &Self) -> bool {
        self.filter == other.filter && self.wrap == other.wrap
    }

    fn content_hash(&self) -> Result<ContentHash, PayloadError> {
        Ok(ContentHash::of(&(self.filter, self.wrap)))
    }

    fn create_handle(&self) -> Result<u64, PayloadError> {
        self.device.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.device.next_handle.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn destroy_handle(&self, _handle: u64) {
        self.device.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sampler(filter={}, wrap={})", self.filter, self.wrap)
    }
}

/// Install a test-friendly subscriber; honours RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
