//! Tandem Analysis - offline tempo, key, and beat grid analysis
//!
//! Everything in this crate runs outside the real-time context: analysis
//! may take seconds, allocates freely, and parallelizes over rayon. It is
//! safe to analyze one track while another is playing - analysis only ever
//! touches its own [`Track`] clone, never live engine state.

pub mod beatgrid;
pub mod flux;
pub mod key;
pub mod tempo;

use serde::{Deserialize, Serialize};
use tandem_core::config::AnalysisConfig;
use tandem_core::music::MusicalKey;
use tandem_core::track::Track;

pub use beatgrid::generate_beat_grid;
pub use flux::OnsetDetector;
pub use key::detect_key;
pub use tempo::{consensus_bpm, estimate_bpm, normalize_octave, BpmCandidate, DEFAULT_BPM};

/// Result of analyzing one track
///
/// Produced once per track and immutable afterwards. Degenerate inputs map
/// to the documented fallback values (120 BPM, A minor, empty grid), never
/// to errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Estimated tempo in BPM
    pub bpm: f64,
    /// Estimated musical key
    pub key: MusicalKey,
    /// Beat timestamps in seconds, strictly increasing; may be empty
    pub beat_grid: Vec<f64>,
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            key: key::default_key(),
            beat_grid: Vec::new(),
        }
    }
}

/// Run full analysis on a track
///
/// Mixes the channels down to mono, estimates the key from the opening
/// seconds, then - for tracks long enough to carry a rhythm - estimates
/// tempo across sections and anchors a fixed beat grid.
pub fn analyze_track(track: &Track, config: &AnalysisConfig) -> AnalysisResult {
    let samples = track.mixed_mono();
    let sample_rate = track.sample_rate();
    log::info!(
        "analyzing {} samples ({:.1}s at {}Hz)",
        samples.len(),
        track.duration_seconds(),
        sample_rate
    );

    let key = key::detect_key(&samples, sample_rate);

    if track.duration_seconds() < tempo::MIN_TRACK_SECS {
        log::info!("track too short for tempo analysis, using defaults");
        return AnalysisResult {
            bpm: DEFAULT_BPM,
            key,
            beat_grid: Vec::new(),
        };
    }

    let bpm = tempo::estimate_bpm(&samples, sample_rate, &config.bpm);
    let beat_grid = beatgrid::generate_beat_grid(&samples, sample_rate, bpm);

    log::info!(
        "analysis complete: {:.1} BPM, key {}, {} beats in grid",
        bpm,
        key,
        beat_grid.len()
    );

    AnalysisResult { bpm, key, beat_grid }
}
