//! Real-time playback engine
//!
//! Components of the audio-thread half of Tandem:
//! - Deck: single-track player with tempo, gain, and pan
//! - Mixer: per-channel EQ, crossfader, master volume
//! - Command/event rings: lock-free channels between the control context
//!   and the audio thread
//! - AudioEngine: ties everything together for the backend callback
//! - gc: deferred deallocation so the audio thread never frees buffers

pub mod command;
pub mod deck;
pub mod engine;
pub mod events;
pub mod gc;
pub mod mixer;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use deck::{Deck, DeckAtomics, MAX_TEMPO_RATIO, MIN_TEMPO_RATIO};
pub use engine::{AudioEngine, MAX_BUFFER_SIZE};
pub use events::{event_channel, EngineEvent, EVENT_QUEUE_CAPACITY};
pub use mixer::{ChannelStrip, Mixer};
