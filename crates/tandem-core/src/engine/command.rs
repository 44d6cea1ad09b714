//! Lock-free command queue for real-time engine control
//!
//! The control context (UI) never touches engine state directly: it pushes
//! commands into a bounded SPSC ring buffer, and the audio thread drains the
//! ring at the start of every callback. Both sides are wait-free, so the
//! audio thread can never be blocked by a slow or busy UI.
//!
//! Commands are applied in FIFO order, each in full before the next. A
//! command's effect is visible from the callback that drains it onward,
//! never retroactively, and never partially. There is no cancellation:
//! later state supersedes earlier state once drained.

use basedrop::Shared;

use crate::track::Track;

/// Commands sent from the control context to the audio thread
///
/// Each variant is an atomic operation on the engine. Deck-addressed
/// variants ignore out-of-range deck indices. The loaded track rides as a
/// pointer-sized [`Shared`] so the enum stays small enough to move through
/// the ring buffer cheaply (see the size test below) and so dropping a
/// replaced track on the audio thread never frees memory there.
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Track management
    // ─────────────────────────────────────────────────────────────
    /// Load a decoded track onto a deck, replacing any current one
    LoadTrack { deck: usize, track: Shared<Track> },

    // ─────────────────────────────────────────────────────────────
    // Playback control
    // ─────────────────────────────────────────────────────────────
    /// Start playback; with a position, start from there (seconds),
    /// otherwise resume from the stored position
    Play { deck: usize, position: Option<f64> },
    /// Pause, keeping the playhead position
    Pause { deck: usize },
    /// Stop and reset the playhead to the start
    Stop { deck: usize },
    /// Move the playhead (seconds); valid in any state, does not change
    /// play/pause
    Seek { deck: usize, position: f64 },

    // ─────────────────────────────────────────────────────────────
    // Deck parameters
    // ─────────────────────────────────────────────────────────────
    /// Playback-rate ratio (0.5-2.0); raises pitch with speed
    SetTempo { deck: usize, ratio: f64 },
    /// Linear gain (0.0-2.0)
    SetGain { deck: usize, gain: f64 },
    /// Stereo pan (-1.0 left to 1.0 right)
    SetPan { deck: usize, pan: f64 },

    // ─────────────────────────────────────────────────────────────
    // Mixer control
    // ─────────────────────────────────────────────────────────────
    /// Channel EQ low band (0.0 = kill, 0.5 = flat, 1.0 = boost)
    SetEqLow { deck: usize, value: f32 },
    /// Channel EQ mid band (0.0 = kill, 0.5 = flat, 1.0 = boost)
    SetEqMid { deck: usize, value: f32 },
    /// Channel EQ high band (0.0 = kill, 0.5 = flat, 1.0 = boost)
    SetEqHigh { deck: usize, value: f32 },
    /// Crossfader position (-1.0 = deck A, 0.0 = center, 1.0 = deck B)
    SetCrossfader { position: f32 },
    /// Master output volume (0.0-1.0)
    SetMasterVolume { volume: f32 },
}

/// Capacity of the command queue
///
/// A UI burst (loading a track while sweeping EQ and tempo) stays well under
/// this; the ring costs a few KB.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// The producer belongs to the control context, the consumer to the audio
/// thread.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
