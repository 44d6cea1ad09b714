//! RT-safe deferred deallocation for track buffers
//!
//! Loading a track into a deck hands the audio thread a
//! `basedrop::Shared<Track>`. When a new track replaces it, the old pointer
//! is dropped *on the audio thread* - with a plain `Arc` that could free
//! minutes of decoded PCM inside the callback and blow the deadline. With
//! `Shared`, dropping only enqueues the pointer; a background thread does
//! the actual free.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Collection interval; memory reclamation is not latency-sensitive
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // The Collector is !Sync, so it lives on its own thread and we keep
    // only a cloneable Handle
    thread::Builder::new()
        .name("tandem-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("send GC handle");

            log::info!("track GC thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("spawn tandem-gc thread");

    rx.recv().expect("receive GC handle")
}

/// Handle for creating `Shared<T>` allocations
///
/// Lazily starts the collector thread on first use; the handle is cheap to
/// clone.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_allocation_roundtrip() {
        let value = Shared::new(&gc_handle(), vec![1.0f32; 1024]);
        let clone = Shared::clone(&value);
        assert_eq!(clone.len(), 1024);
        drop(value);
        drop(clone); // deferred free, must not panic
    }
}
