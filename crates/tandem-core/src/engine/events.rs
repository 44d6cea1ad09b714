//! Engine-to-control notifications
//!
//! The reverse direction of the command queue: a second SPSC ring carries
//! playback notifications from the audio thread back to the control
//! context. Pushes are non-blocking; if the ring is full the event is
//! dropped, which is acceptable because position reports are periodic and
//! the next one supersedes a lost one.

/// Notifications emitted by the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    /// Playhead position report, throttled to roughly 100 ms of played audio
    Position { deck: usize, seconds: f64 },
    /// The deck reached the end of its track; fires exactly once per
    /// completion
    TrackEnded { deck: usize },
}

/// Capacity of the event queue
///
/// Sized for several seconds of position reports even if the control
/// context stalls.
pub const EVENT_QUEUE_CAPACITY: usize = 256;

/// Create a new event channel (producer/consumer pair)
///
/// The producer belongs to the audio thread, the consumer to the control
/// context.
pub fn event_channel() -> (rtrb::Producer<EngineEvent>, rtrb::Consumer<EngineEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_channel_roundtrip() {
        let (mut tx, mut rx) = event_channel();
        tx.push(EngineEvent::TrackEnded { deck: 1 }).unwrap();
        assert_eq!(rx.pop().unwrap(), EngineEvent::TrackEnded { deck: 1 });
        assert!(rx.pop().is_err());
    }
}
