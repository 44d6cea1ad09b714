//! Deck - single-track player with tempo, gain, and pan
//!
//! A deck owns its playback state exclusively on the audio thread; the
//! control context only proposes changes through the command queue. The
//! render loop is a variable-rate linear-interpolation resample: raising
//! the tempo ratio raises pitch with speed. A pitch-preserving stretch is
//! intentionally not part of this path.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::track::Track;
use crate::types::{PlayState, StereoBuffer, StereoSample};

use super::events::EngineEvent;

/// Seconds of played audio between position reports (~10 Hz)
const POSITION_REPORT_INTERVAL_SECS: f64 = 0.1;

/// Tempo ratio bounds
pub const MIN_TEMPO_RATIO: f64 = 0.5;
pub const MAX_TEMPO_RATIO: f64 = 2.0;

/// Lock-free playback state for UI reads
///
/// The audio thread stores into these after every state change; the UI
/// reads them without touching the engine. `Ordering::Relaxed` is enough -
/// only visibility matters, not cross-field ordering.
pub struct DeckAtomics {
    /// Playhead position in track samples (floor of the fractional cursor)
    pub position: AtomicU64,
    /// Playback state: 0=Stopped, 1=Playing, 2=Paused
    pub state: AtomicU8,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(0),
        }
    }

    #[inline]
    pub fn position_samples(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        match self.state.load(Ordering::Relaxed) {
            1 => PlayState::Playing,
            2 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::Relaxed) == 1
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Pan gains for the simplified constant-angle law
///
/// `angle = pan * π/4`, left scaled by cos, right by sin; center bypasses
/// the law at unity. This is not constant-power panning (that would sweep
/// the pair through π/2) - it reproduces the gain staging the mixer
/// expects, so it must not be "corrected" here.
#[inline]
fn pan_gains(pan: f64) -> (f32, f32) {
    if pan == 0.0 {
        return (1.0, 1.0);
    }
    let angle = pan * std::f64::consts::FRAC_PI_4;
    (angle.cos() as f32, angle.sin() as f32)
}

/// A single deck in the player
pub struct Deck {
    /// Deck index (0 = A, 1 = B)
    id: usize,
    /// Currently loaded track (None if empty)
    track: Option<Shared<Track>>,
    /// Fractional read cursor in track samples
    position: f64,
    state: PlayState,
    /// Playback-rate ratio, 1.0 = original tempo
    tempo_ratio: f64,
    /// Linear gain, 1.0 = unity
    gain: f64,
    /// Stereo pan, 0.0 = center
    pan: f64,
    /// Output frames rendered since the last position report
    frames_since_report: usize,
    /// Report interval in output frames at the engine rate
    report_interval: usize,
    /// Lock-free state for UI reads
    atomics: Arc<DeckAtomics>,
}

impl Deck {
    /// Create an empty deck; `sample_rate` is the engine's output rate
    pub fn new(id: usize, sample_rate: u32) -> Self {
        Self {
            id,
            track: None,
            position: 0.0,
            state: PlayState::Stopped,
            tempo_ratio: 1.0,
            gain: 1.0,
            pan: 0.0,
            frames_since_report: 0,
            report_interval: (sample_rate as f64 * POSITION_REPORT_INTERVAL_SECS) as usize,
            atomics: Arc::new(DeckAtomics::new()),
        }
    }

    /// Lock-free atomic state for UI reads
    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_state_atomic(&self) {
        let value = match self.state {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
            PlayState::Paused => 2,
        };
        self.atomics.state.store(value, Ordering::Relaxed);
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics.position.store(self.position as u64, Ordering::Relaxed);
    }

    /// Load a track, replacing any current one
    ///
    /// The previous `Shared<Track>` is dropped here on the audio thread;
    /// basedrop defers the actual free to the GC thread.
    pub fn load_track(&mut self, track: Shared<Track>) {
        self.track = Some(track);
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.frames_since_report = 0;
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Fractional read cursor in track samples
    pub fn position_samples(&self) -> f64 {
        self.position
    }

    /// Playhead position in seconds of track time
    pub fn position_seconds(&self) -> f64 {
        match &self.track {
            Some(track) => self.position / track.sample_rate() as f64,
            None => 0.0,
        }
    }

    pub fn tempo_ratio(&self) -> f64 {
        self.tempo_ratio
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn pan(&self) -> f64 {
        self.pan
    }

    // --- Transport ---

    /// Start playback, optionally from a position in seconds
    pub fn play(&mut self, position: Option<f64>) {
        let Some(track) = &self.track else { return };
        if let Some(seconds) = position {
            self.position = (seconds.max(0.0) * track.sample_rate() as f64).floor();
        }
        self.state = PlayState::Playing;
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    /// Pause, keeping the playhead position
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            self.sync_state_atomic();
        }
    }

    /// Stop and reset the playhead to the start
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.position = 0.0;
        self.sync_position_atomic();
        self.sync_state_atomic();
    }

    /// Move the playhead (seconds); valid in any state, play/pause unchanged
    pub fn seek(&mut self, seconds: f64) {
        let Some(track) = &self.track else { return };
        self.position = (seconds.max(0.0) * track.sample_rate() as f64).floor();
        self.sync_position_atomic();
    }

    // --- Parameters ---

    pub fn set_tempo(&mut self, ratio: f64) {
        self.tempo_ratio = ratio.clamp(MIN_TEMPO_RATIO, MAX_TEMPO_RATIO);
    }

    pub fn set_gain(&mut self, gain: f64) {
        self.gain = gain.clamp(0.0, 2.0);
    }

    pub fn set_pan(&mut self, pan: f64) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    // --- Audio processing ---

    /// Render one block of audio into `output`
    ///
    /// Called from the audio thread. Reads the track at the fractional
    /// cursor with linear interpolation, applies gain and pan, advances the
    /// cursor by `output.len() * tempo_ratio`, and pushes throttled
    /// position reports into `events`. Reaching the last sample mid-block
    /// fills the remainder with silence, pushes exactly one
    /// [`EngineEvent::TrackEnded`], and transitions to Stopped.
    pub fn process(
        &mut self,
        output: &mut StereoBuffer,
        events: &mut rtrb::Producer<EngineEvent>,
    ) {
        let Some(track) = &self.track else {
            output.fill_silence();
            return;
        };
        if self.state != PlayState::Playing {
            output.fill_silence();
            return;
        }

        let left = track.left();
        let right = track.right();
        let len = track.len_samples();
        let gain = self.gain as f32;
        let (pan_left, pan_right) = pan_gains(self.pan);

        let frames = output.len();
        let mut ended = false;

        for (i, out) in output.as_mut_slice().iter_mut().enumerate() {
            let read_pos = self.position + i as f64 * self.tempo_ratio;
            let idx = read_pos as usize;

            if ended || idx + 1 >= len {
                *out = StereoSample::silence();
                ended = true;
                continue;
            }

            let frac = (read_pos - idx as f64) as f32;
            let l = left[idx] + (left[idx + 1] - left[idx]) * frac;
            let r = right[idx] + (right[idx + 1] - right[idx]) * frac;
            *out = StereoSample::new(l * gain * pan_left, r * gain * pan_right);
        }

        if ended {
            // Ring full means the notification is lost; the control context
            // still observes Stopped through the atomics
            let _ = events.push(EngineEvent::TrackEnded { deck: self.id });
            self.state = PlayState::Stopped;
            self.position = 0.0;
            self.frames_since_report = 0;
            self.sync_position_atomic();
            self.sync_state_atomic();
            return;
        }

        self.position += frames as f64 * self.tempo_ratio;
        self.sync_position_atomic();

        self.frames_since_report += frames;
        if self.frames_since_report >= self.report_interval {
            self.frames_since_report = 0;
            let _ = events.push(EngineEvent::Position {
                deck: self.id,
                seconds: self.position / track.sample_rate() as f64,
            });
        }
    }
}
