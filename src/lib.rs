//! Breadcrumb Ring Buffer - a bounded, append-mostly event log backed by a
//! circular file buffer.
//!
//! # Overview
//!
//! The crate maintains a capacity-bounded log of opaque records
//! ("breadcrumbs") in a single backing file: once the limit is reached, the
//! oldest record is evicted to make room for the newest. Two controllers are
//! provided:
//!
//! 1. `RingFileBuffer`: a logical ring over a growing file, overwriting the
//!    oldest slot in place once full
//! 2. `FixedRingBuffer`: a fixed-size region with head/tail pointers, where
//!    records wrap around the physical end of the file
//!
//! Record boundaries are tracked by one of three interchangeable strategies
//! (length-prefixed headers, an in-memory index, or delimiter scanning),
//! selected once at construction.
//!
//! # Key Features
//!
//! - Capacity-bounded insertion with oldest-first eviction
//! - Wraparound writes split across the physical end of the file
//! - Boundary recovery from an existing file, tolerant of corrupt tails
//! - Batch writes with independent per-record failure
//! - Explicit, caller-driven flushing with an optional timer task
//!
//! # Usage
//!
//! The library is typically used by:
//! 1. Initializing the global store (or constructing one directly)
//! 2. Recording breadcrumbs from application code
//! 3. Optionally starting the flush task for periodic durability
//! 4. Reading records back for upload or crash reporting
//!
//! See `demos/basic_usage.rs` for a complete walkthrough.

#![deny(missing_docs)]

pub mod boundary;
pub mod ring;

pub use boundary::{BoundaryDetectionMode, BoundaryDetector, EntityBoundary, RingBufferConfig};
pub use ring::buffer::RingFileBuffer;
pub use ring::fixed::FixedRingBuffer;
pub use ring::{FileWriter, Result, RingError};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Global store instance; the stores themselves are single-writer, so all
/// access goes through this mutex
static GLOBAL_STORE: OnceCell<Arc<Mutex<RingFileBuffer>>> = OnceCell::new();

/// Flush task control flag
static FLUSH_TASK_RUNNING: AtomicBool = AtomicBool::new(false);

/// Initialize the global breadcrumb store at the given path
///
/// The first successful call wins; later calls return the existing instance.
/// Configuration errors (a zero entity limit) are fatal and surface here.
pub fn init_store<P: AsRef<Path>>(
    path: P,
    config: RingBufferConfig,
) -> Result<Arc<Mutex<RingFileBuffer>>> {
    if let Some(store) = GLOBAL_STORE.get() {
        return Ok(store.clone());
    }

    let store = Arc::new(Mutex::new(RingFileBuffer::create(path, config)?));
    Ok(GLOBAL_STORE.get_or_init(|| store).clone())
}

/// Get the global store, if it has been initialized
pub fn store() -> Option<Arc<Mutex<RingFileBuffer>>> {
    GLOBAL_STORE.get().cloned()
}

/// Record one breadcrumb in the global store
///
/// Returns true iff the record was durably written; false when the store is
/// uninitialized, closed, or the write failed.
pub fn record(payload: &[u8]) -> bool {
    match store() {
        Some(store) => store.lock().add_entity(payload),
        None => false,
    }
}

/// Record a batch of breadcrumbs in the global store
///
/// Each record succeeds or fails independently; the returned boundaries
/// match the subsequence of inputs that succeeded.
pub fn record_all(payloads: &[&[u8]]) -> Vec<EntityBoundary> {
    match store() {
        Some(store) => store.lock().add_entities(payloads),
        None => Vec::new(),
    }
}

/// Configuration for the flush task
pub struct FlushTaskConfig {
    /// Interval between flush operations in milliseconds
    pub interval_ms: u64,
}

impl Default for FlushTaskConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Start the periodic flush task for the global store
///
/// The store never flushes on its own; durability beyond the synchronous
/// writes is driven either by explicit `flush()` calls or by this task,
/// which the caller starts and stops explicitly.
///
/// # Returns
///
/// A join handle for the flush task thread
pub fn start_flush_task(config: FlushTaskConfig) -> thread::JoinHandle<()> {
    FLUSH_TASK_RUNNING.store(true, Ordering::SeqCst);

    thread::Builder::new()
        .name("breadcrumb-flush".to_string())
        .spawn(move || {
            while FLUSH_TASK_RUNNING.load(Ordering::SeqCst) {
                if let Some(store) = store() {
                    let mut guard = store.lock();
                    if !guard.is_closed() {
                        if let Err(e) = guard.flush() {
                            log::warn!("periodic flush failed: {}", e);
                        }
                    }
                }

                thread::sleep(Duration::from_millis(config.interval_ms));
            }
        })
        .expect("Failed to spawn flush task thread")
}

/// Stop the flush task after its current iteration
pub fn stop_flush_task() {
    FLUSH_TASK_RUNNING.store(false, Ordering::SeqCst);
}

/// Re-exported data types used in the API
pub mod types {
    pub use crate::boundary::{BoundaryDetectionMode, EntityBoundary, RingBufferConfig};
}
