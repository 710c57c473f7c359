//! Payload fixture shared by the unit tests

use crate::payload::{ContentHash, Payload, PayloadError};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Hook call counters, shared between all blobs built from the same set
#[derive(Debug, Default)]
pub(crate) struct Hooks {
    pub hash_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub destroyed: Mutex<Vec<u32>>,
    next_handle: AtomicU32,
}

impl Hooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU32::new(1),
            ..Default::default()
        })
    }

    pub fn hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct Blob {
    bytes: Vec<u8>,
    fixed_hash: Option<u64>,
    fail_hash: bool,
    handle_failures: AtomicUsize,
    hooks: Arc<Hooks>,
}

impl Blob {
    pub fn new(bytes: &[u8]) -> Self {
        Self::with_hooks(bytes, Hooks::new())
    }

    pub fn with_hooks(bytes: &[u8], hooks: Arc<Hooks>) -> Self {
        Self {
            bytes: bytes.to_vec(),
            fixed_hash: None,
            fail_hash: false,
            handle_failures: AtomicUsize::new(0),
            hooks,
        }
    }

    pub fn with_fixed_hash(mut self, hash: u64) -> Self {
        self.fixed_hash = Some(hash);
        self
    }

    pub fn failing_hash(mut self) -> Self {
        self.fail_hash = true;
        self
    }

    pub fn failing_handle(self, times: usize) -> Self {
        self.handle_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }
}

impl Payload for Blob {
    type Handle = u32;

    fn equals(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }

    fn content_hash(&self) -> Result<ContentHash, PayloadError> {
        self.hooks.hash_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_hash {
            return Err("hash hook failed".into());
        }
        Ok(match self.fixed_hash {
            Some(raw) => ContentHash::new(raw),
            None => ContentHash::of(&self.bytes),
        })
    }

    fn create_handle(&self) -> Result<u32, PayloadError> {
        self.hooks.create_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.handle_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.handle_failures.store(pending - 1, Ordering::SeqCst);
            return Err("handle hook failed".into());
        }
        Ok(self.hooks.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn destroy_handle(&self, handle: u32) {
        self.hooks.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.hooks.destroyed.lock().unwrap().push(handle);
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", String::from_utf8_lossy(&self.bytes))
    }
}
