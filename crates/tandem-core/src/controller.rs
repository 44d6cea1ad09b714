//! Control surface for the deck engine
//!
//! The UI-facing side of the command/event rings. A [`DeckController`]
//! turns method calls into [`EngineCommand`]s (non-blocking, fire and
//! forget) and dispatches engine notifications to registered subscribers.
//! Everything here runs in the control context; nothing blocks on the
//! audio thread or waits for acknowledgments.

use basedrop::Shared;

use crate::audio::CommandSender;
use crate::engine::gc::gc_handle;
use crate::engine::{EngineCommand, EngineEvent};
use crate::track::Track;

/// Tempo slider range in percent
pub const TEMPO_PERCENT_RANGE: f64 = 50.0;

type PositionCallback = Box<dyn Fn(usize, f64) + Send>;
type EndedCallback = Box<dyn Fn(usize) + Send>;

/// UI-facing control surface over the engine's command/event rings
pub struct DeckController {
    commands: CommandSender,
    events: rtrb::Consumer<EngineEvent>,
    gc: basedrop::Handle,
    position_listeners: Vec<PositionCallback>,
    ended_listeners: Vec<EndedCallback>,
}

impl DeckController {
    /// Wrap the control-side endpoints returned by audio startup
    pub fn new(commands: CommandSender, events: rtrb::Consumer<EngineEvent>) -> Self {
        Self {
            commands,
            events,
            gc: gc_handle(),
            position_listeners: Vec::new(),
            ended_listeners: Vec::new(),
        }
    }

    fn send(&mut self, command: EngineCommand) {
        // The ring is sized for bursts; a full queue means the engine is
        // gone or the UI is flooding it. Dropping is the non-blocking
        // contract - later state supersedes lost state anyway.
        if self.commands.send(command).is_err() {
            log::warn!("command queue full, dropping command");
        }
    }

    /// Load a decoded track onto a deck
    ///
    /// The track is wrapped in a GC-backed shared pointer so the audio
    /// thread can drop a replaced track without freeing it there.
    pub fn load_track(&mut self, deck: usize, track: Track) {
        let track = Shared::new(&self.gc, track);
        self.send(EngineCommand::LoadTrack { deck, track });
    }

    /// Start playback, optionally from a position in seconds
    pub fn play(&mut self, deck: usize, position: Option<f64>) {
        self.send(EngineCommand::Play { deck, position });
    }

    pub fn pause(&mut self, deck: usize) {
        self.send(EngineCommand::Pause { deck });
    }

    pub fn stop(&mut self, deck: usize) {
        self.send(EngineCommand::Stop { deck });
    }

    pub fn seek(&mut self, deck: usize, position_seconds: f64) {
        self.send(EngineCommand::Seek { deck, position: position_seconds });
    }

    /// Tempo as a slider percentage in [-50, +50]
    ///
    /// Maps to the engine's playback-rate ratio as `1 + percent/100`.
    pub fn set_tempo_percent(&mut self, deck: usize, percent: f64) {
        let percent = percent.clamp(-TEMPO_PERCENT_RANGE, TEMPO_PERCENT_RANGE);
        let ratio = 1.0 + percent / 100.0;
        self.send(EngineCommand::SetTempo { deck, ratio });
    }

    pub fn set_gain(&mut self, deck: usize, gain: f64) {
        self.send(EngineCommand::SetGain { deck, gain });
    }

    pub fn set_pan(&mut self, deck: usize, pan: f64) {
        self.send(EngineCommand::SetPan { deck, pan });
    }

    pub fn set_eq_low(&mut self, deck: usize, value: f32) {
        self.send(EngineCommand::SetEqLow { deck, value });
    }

    pub fn set_eq_mid(&mut self, deck: usize, value: f32) {
        self.send(EngineCommand::SetEqMid { deck, value });
    }

    pub fn set_eq_high(&mut self, deck: usize, value: f32) {
        self.send(EngineCommand::SetEqHigh { deck, value });
    }

    pub fn set_crossfader(&mut self, position: f32) {
        self.send(EngineCommand::SetCrossfader { position });
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.send(EngineCommand::SetMasterVolume { volume });
    }

    /// Subscribe to throttled playhead reports (deck index, seconds)
    pub fn on_position(&mut self, callback: impl Fn(usize, f64) + Send + 'static) {
        self.position_listeners.push(Box::new(callback));
    }

    /// Subscribe to end-of-track notifications
    pub fn on_ended(&mut self, callback: impl Fn(usize) + Send + 'static) {
        self.ended_listeners.push(Box::new(callback));
    }

    /// Drain pending engine events and invoke subscriptions
    ///
    /// Call from the control context's periodic tick.
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events.pop() {
            match event {
                EngineEvent::Position { deck, seconds } => {
                    for listener in &self.position_listeners {
                        listener(deck, seconds);
                    }
                }
                EngineEvent::TrackEnded { deck } => {
                    for listener in &self.ended_listeners {
                        listener(deck);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{command_channel, event_channel, AudioEngine, EngineCommand};
    use crate::types::StereoBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn controller_with_engine() -> (DeckController, AudioEngine, rtrb::Consumer<EngineCommand>) {
        let (command_tx, command_rx) = command_channel();
        let (engine_events_tx, engine_events_rx) = event_channel();
        let engine = AudioEngine::new(48000, engine_events_tx);
        let controller = DeckController::new(
            CommandSender { producer: command_tx },
            engine_events_rx,
        );
        (controller, engine, command_rx)
    }

    #[test]
    fn test_tempo_percent_maps_to_ratio() {
        let (mut controller, mut engine, mut command_rx) = controller_with_engine();

        controller.set_tempo_percent(0, 20.0);
        engine.process_commands(&mut command_rx);
        assert!((engine.deck(0).unwrap().tempo_ratio() - 1.2).abs() < 1e-9);

        // Out-of-range slider values clamp before mapping
        controller.set_tempo_percent(0, -80.0);
        engine.process_commands(&mut command_rx);
        assert!((engine.deck(0).unwrap().tempo_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_end_to_end_playback_notifications() {
        let (mut controller, mut engine, mut command_rx) = controller_with_engine();

        let ended = Arc::new(AtomicUsize::new(0));
        let ended_count = Arc::clone(&ended);
        controller.on_ended(move |_deck| {
            ended_count.fetch_add(1, Ordering::SeqCst);
        });

        controller.load_track(0, Track::from_mono(vec![0.5; 100], 48000));
        controller.play(0, None);
        engine.process_commands(&mut command_rx);

        // One 256-frame block runs the 100-sample track to completion
        let mut master = StereoBuffer::silence(256);
        engine.process(&mut master);

        controller.poll_events();
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }
}
