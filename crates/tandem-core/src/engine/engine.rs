//! Main audio engine - two decks, mixer, and command plumbing
//!
//! The engine is owned exclusively by the audio thread. Every callback
//! first drains the command queue, then renders each deck into its
//! pre-allocated buffer and mixes them down to the master bus. Nothing on
//! this path allocates, locks, or performs I/O.

use std::sync::Arc;

use crate::types::{StereoBuffer, NUM_DECKS};

use super::command::EngineCommand;
use super::deck::{Deck, DeckAtomics};
use super::events::EngineEvent;
use super::mixer::Mixer;

/// Maximum buffer size to pre-allocate for real-time safety
///
/// Covers common host buffer sizes (64-4096 frames); pre-allocating to this
/// size eliminates allocations in the audio callback.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// The main audio engine
pub struct AudioEngine {
    decks: [Deck; NUM_DECKS],
    mixer: Mixer,
    /// Pre-allocated per-deck render buffers
    deck_buffers: [StereoBuffer; NUM_DECKS],
    /// Notification ring back to the control context
    events: rtrb::Producer<EngineEvent>,
    sample_rate: u32,
}

impl AudioEngine {
    /// Create an engine rendering at `sample_rate`
    pub fn new(sample_rate: u32, events: rtrb::Producer<EngineEvent>) -> Self {
        Self {
            decks: std::array::from_fn(|i| Deck::new(i, sample_rate)),
            mixer: Mixer::new(sample_rate),
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            events,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn deck(&self, id: usize) -> Option<&Deck> {
        self.decks.get(id)
    }

    /// Lock-free atomics for all decks
    ///
    /// Cloned once at startup so the UI can read position/state without
    /// ever touching the engine.
    pub fn deck_atomics(&self) -> [Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|i| self.decks[i].atomics())
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Drain and apply all pending commands, FIFO, non-blocking
    ///
    /// Called at the top of every callback, before any samples are
    /// rendered, so a command's effect is never split across a block.
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(command) = rx.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::LoadTrack { deck, track } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.load_track(track);
                }
            }
            EngineCommand::Play { deck, position } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.play(position);
                }
            }
            EngineCommand::Pause { deck } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.pause();
                }
            }
            EngineCommand::Stop { deck } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.stop();
                }
            }
            EngineCommand::Seek { deck, position } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.seek(position);
                }
            }
            EngineCommand::SetTempo { deck, ratio } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.set_tempo(ratio);
                }
            }
            EngineCommand::SetGain { deck, gain } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.set_gain(gain);
                }
            }
            EngineCommand::SetPan { deck, pan } => {
                if let Some(d) = self.decks.get_mut(deck) {
                    d.set_pan(pan);
                }
            }
            EngineCommand::SetEqLow { deck, value } => {
                if let Some(channel) = self.mixer.channel_mut(deck) {
                    channel.set_eq_low(value);
                }
            }
            EngineCommand::SetEqMid { deck, value } => {
                if let Some(channel) = self.mixer.channel_mut(deck) {
                    channel.set_eq_mid(value);
                }
            }
            EngineCommand::SetEqHigh { deck, value } => {
                if let Some(channel) = self.mixer.channel_mut(deck) {
                    channel.set_eq_high(value);
                }
            }
            EngineCommand::SetCrossfader { position } => {
                self.mixer.set_crossfader(position);
            }
            EngineCommand::SetMasterVolume { volume } => {
                self.mixer.set_master_volume(volume);
            }
        }
    }

    /// Render one block of master output
    pub fn process(&mut self, master_out: &mut StereoBuffer) {
        let frames = master_out.len();

        // Adjust working lengths within pre-allocated capacity (no allocation)
        for buffer in &mut self.deck_buffers {
            buffer.set_len_from_capacity(frames);
        }

        for (deck, buffer) in self.decks.iter_mut().zip(self.deck_buffers.iter_mut()) {
            deck.process(buffer, &mut self.events);
        }

        self.mixer.process(&mut self.deck_buffers, master_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use crate::engine::events::event_channel;
    use crate::engine::gc::gc_handle;
    use crate::track::Track;
    use basedrop::Shared;

    fn engine() -> (AudioEngine, rtrb::Consumer<EngineEvent>) {
        let (events_tx, events_rx) = event_channel();
        (AudioEngine::new(48000, events_tx), events_rx)
    }

    #[test]
    fn test_commands_apply_in_fifo_order() {
        let (mut engine, _events) = engine();
        let (mut tx, mut rx) = command_channel();

        // A later SetTempo supersedes an earlier one within the same drain;
        // no intermediate value can leak into rendered output
        tx.push(EngineCommand::SetTempo { deck: 0, ratio: 1.2 }).unwrap();
        tx.push(EngineCommand::SetGain { deck: 0, gain: 0.5 }).unwrap();
        tx.push(EngineCommand::SetTempo { deck: 0, ratio: 0.9 }).unwrap();

        engine.process_commands(&mut rx);

        let deck = engine.deck(0).unwrap();
        assert_eq!(deck.tempo_ratio(), 0.9);
        assert_eq!(deck.gain(), 0.5);
    }

    #[test]
    fn test_process_with_no_tracks_renders_silence() {
        let (mut engine, _events) = engine();
        let mut master = StereoBuffer::silence(256);

        engine.process(&mut master);

        assert_eq!(master.len(), 256);
        assert_eq!(master.peak(), 0.0);
    }

    #[test]
    fn test_load_play_and_mix_through_crossfader() {
        let (mut engine, mut events) = engine();
        let (mut tx, mut rx) = command_channel();

        let track = Track::from_mono(vec![0.5; 48000], 48000);
        tx.push(EngineCommand::LoadTrack {
            deck: 0,
            track: Shared::new(&gc_handle(), track),
        })
        .unwrap();
        tx.push(EngineCommand::SetCrossfader { position: -1.0 }).unwrap();
        tx.push(EngineCommand::Play { deck: 0, position: None }).unwrap();

        engine.process_commands(&mut rx);

        let mut master = StereoBuffer::silence(256);
        engine.process(&mut master);

        // Deck A fully in: constant 0.5 passes through flat EQ unchanged
        assert!((master[100].left - 0.5).abs() < 1e-6);

        // Position atomics advanced for lock-free UI reads
        let atomics = engine.deck_atomics();
        assert_eq!(atomics[0].position_samples(), 256);
        assert!(atomics[0].is_playing());
        assert!(events.pop().is_err(), "no report after a single 256-frame block");
    }

    #[test]
    fn test_out_of_range_deck_is_ignored() {
        let (mut engine, _events) = engine();
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::SetTempo { deck: 7, ratio: 1.5 }).unwrap();
        engine.process_commands(&mut rx);

        assert_eq!(engine.deck(0).unwrap().tempo_ratio(), 1.0);
        assert_eq!(engine.deck(1).unwrap().tempo_ratio(), 1.0);
    }
}
