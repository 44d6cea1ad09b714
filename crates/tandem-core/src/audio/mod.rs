//! Audio backend for Tandem
//!
//! Starts the cpal output stream and wires it to the engine. The design is
//! lock-free end to end:
//!
//! - **Control context**: pushes [`EngineCommand`]s through the
//!   [`CommandSender`] (never blocks) and drains [`EngineEvent`]s.
//! - **Audio thread**: owns the [`AudioEngine`] exclusively; every callback
//!   drains pending commands, renders one block, and copies it to the
//!   device buffer.
//! - **Atomics**: deck position/state are mirrored into [`DeckAtomics`]
//!   for lock-free UI reads; underruns are counted, never thrown.
//!
//! ```ignore
//! let result = audio::start_audio_system(&AudioConfig::default())?;
//! result.command_sender.send(EngineCommand::Play { deck: 0, position: None });
//! let position = result.deck_atomics[0].position_samples();
//! ```

mod cpal_backend;
mod error;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::engine::{DeckAtomics, EngineCommand, EngineEvent};
use crate::types::NUM_DECKS;

pub use cpal_backend::{get_available_output_devices, AudioHandle};
pub use error::{AudioError, AudioResult};

/// Default sample rate requested from the device
pub const DEFAULT_SAMPLE_RATE: u32 = crate::types::SAMPLE_RATE;

/// Default output buffer size in frames (~5.3 ms at 48 kHz)
pub const DEFAULT_BUFFER_SIZE: u32 = 256;

/// Requested output buffer sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferSize {
    /// Let the backend pick a safe default
    #[default]
    Default,
    /// Request a specific frame count (clamped to sane bounds)
    Fixed(u32),
}

/// Audio system configuration
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// Output device by name; None selects the default device
    pub device_name: Option<String>,
    /// Preferred sample rate; None requests [`DEFAULT_SAMPLE_RATE`]
    pub sample_rate: Option<u32>,
    /// Output buffer sizing
    pub buffer_size: BufferSize,
}

/// Command sender for the control context
///
/// Wraps the lock-free producer side of the command ring. Pushes are
/// wait-free; a full ring returns the command instead of blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Send a command to the audio engine (non-blocking)
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(command).map_err(|e| match e {
            rtrb::PushError::Full(command) => command,
        })
    }
}

/// Everything the control context needs after startup
pub struct AudioSystemResult {
    /// Keeps the stream alive; drop to stop audio
    pub handle: AudioHandle,
    /// Lock-free command sender
    pub command_sender: CommandSender,
    /// Consumer side of the engine notification ring
    pub events: rtrb::Consumer<EngineEvent>,
    /// Lock-free deck state for UI reads
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    /// Stream error count; incremented by the backend, never thrown
    pub underruns: Arc<AtomicU64>,
    /// Negotiated sample rate
    pub sample_rate: u32,
    /// Negotiated buffer size in frames
    pub buffer_size: u32,
}

/// Start the audio system with the given configuration
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    cpal_backend::start_audio_system(config)
}
