//! Basic usage example for the breadcrumb ring buffer
//!
//! This example demonstrates:
//! 1. Initializing the global breadcrumb store
//! 2. Recording breadcrumbs one at a time and in batches
//! 3. Running the periodic flush task
//! 4. Reading the surviving records back, oldest first
//! 5. Using the fixed-capacity variant directly for wraparound writes
//!
//! The example records more breadcrumbs than the store can hold so the
//! oldest ones get evicted, then reads back what survived. It uses a
//! temporary file which is cleaned up at the end.

use breadcrumb_ring_buffer::{
    init_store, record, record_all, start_flush_task, stop_flush_task, BoundaryDetectionMode,
    FileWriter, FixedRingBuffer, FlushTaskConfig, RingBufferConfig,
};

use std::thread;
use std::time::Duration;

fn main() {
    env_logger::init();

    let path = std::env::temp_dir().join("breadcrumb_example.dat");
    println!("Using breadcrumb store at: {:?}", path);

    // Keep at most 50 breadcrumbs, framed with length-prefixed headers
    let config = RingBufferConfig::new(50, BoundaryDetectionMode::HeaderBased);
    let store = init_store(&path, config).expect("failed to initialize store");

    // Periodic durability on top of the synchronous writes
    let flush_task = start_flush_task(FlushTaskConfig { interval_ms: 500 });

    // Record well past the limit so eviction kicks in
    for i in 0..120 {
        let crumb = format!("{{\"event\":\"tap\",\"seq\":{}}}", i);
        record(crumb.as_bytes());

        if i % 40 == 0 {
            thread::sleep(Duration::from_millis(20));
        }
    }

    // Batches report which records made it, in input order
    let batch: Vec<&[u8]> = vec![b"screen:home", b"screen:settings", b"screen:detail"];
    let added = record_all(&batch);
    println!("Batch accepted {} of {} records", added.len(), batch.len());

    stop_flush_task();
    flush_task.join().unwrap();

    {
        let mut guard = store.lock();
        let live = guard.read_entities().expect("read back failed");
        println!(
            "Store holds {} records after {} total writes",
            live.len(),
            guard.total_writes_count()
        );
        if let Some(oldest) = live.first() {
            println!("Oldest surviving record: {}", String::from_utf8_lossy(oldest));
        }
        guard.close();
    }

    // The fixed-capacity variant preallocates its region and wraps records
    // around the physical end of the file
    let fixed_path = std::env::temp_dir().join("breadcrumb_fixed_example.dat");
    let fixed_config = RingBufferConfig::new(20, BoundaryDetectionMode::Scanning);
    let mut fixed = FixedRingBuffer::create(&fixed_path, fixed_config, 32)
        .expect("failed to create fixed store");
    println!("Fixed region size: {} bytes", fixed.file_size());

    for i in 0..200 {
        fixed.add_entity(format!("wraparound crumb {}", i).as_bytes());
    }

    let live = fixed.read_entities().expect("fixed read back failed");
    println!(
        "Fixed store holds {} records; head at {}, tail at {}",
        live.len(),
        fixed.head_position(),
        fixed.tail_position()
    );
    fixed.close();

    // Cleanup - delete the temporary files
    std::fs::remove_file(&path).ok();
    std::fs::remove_file(&fixed_path).ok();
    println!("Example completed successfully");
}
