//! Tempo estimation
//!
//! Several short sections of the track are analyzed independently: each
//! yields onset-periodicity candidates via autocorrelation, the candidates
//! are folded into one octave band to resolve half/double-time confusion,
//! and a pairwise-similarity vote picks the winner. There is no mutable
//! "best so far" state anywhere - candidate list in, consensus out.

use std::ops::Range;

use rayon::prelude::*;
use tandem_core::config::BpmConfig;

use crate::flux::OnsetDetector;

/// Fallback tempo when a track is too short or yields no candidates
pub const DEFAULT_BPM: f64 = 120.0;

/// Tracks shorter than this get the fallback tempo outright
pub(crate) const MIN_TRACK_SECS: f64 = 2.0;

/// Length of each analyzed section
const SECTION_SECS: f64 = 10.0;

/// Sections shorter than this are skipped
const MIN_SECTION_SECS: f64 = 5.0;

/// Octave band candidates are folded into
const OCTAVE_BAND_LOW: f64 = 80.0;
const OCTAVE_BAND_HIGH: f64 = 160.0;

/// Candidates closer than this reinforce each other in the consensus vote
const SIMILARITY_TOLERANCE_BPM: f64 = 3.0;

/// Autocorrelation peaks below this multiple of the range mean are noise
const PEAK_MEAN_RATIO: f32 = 1.2;

/// One tempo hypothesis from one section
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BpmCandidate {
    pub bpm: f64,
    /// Autocorrelation peak value, genre-boosted
    pub score: f32,
}

/// Estimate the tempo of a full track
///
/// Sections run in parallel; the result is rounded to one decimal place
/// and always falls inside the folded octave band (or is the fallback).
pub fn estimate_bpm(samples: &[f32], sample_rate: u32, config: &BpmConfig) -> f64 {
    if (samples.len() as f64) < MIN_TRACK_SECS * sample_rate as f64 {
        return DEFAULT_BPM;
    }

    let detector = OnsetDetector::new();
    let sections = section_ranges(samples.len(), sample_rate);
    log::debug!("tempo estimation over {} sections", sections.len());

    let mut candidates: Vec<BpmCandidate> = sections
        .par_iter()
        .flat_map_iter(|range| {
            section_candidates(&samples[range.clone()], sample_rate, config, &detector)
        })
        .collect();

    for candidate in &mut candidates {
        candidate.bpm = normalize_octave(candidate.bpm);
    }

    consensus_bpm(&candidates).unwrap_or(DEFAULT_BPM)
}

/// Up to five ten-second sections: start, 25%, 50%, 75%, and near the end
fn section_ranges(len: usize, sample_rate: u32) -> Vec<Range<usize>> {
    let section_len = (SECTION_SECS * sample_rate as f64) as usize;
    let min_len = (MIN_SECTION_SECS * sample_rate as f64) as usize;

    let starts = [
        0,
        len / 4,
        len / 2,
        len * 3 / 4,
        len.saturating_sub(section_len),
    ];

    let mut ranges: Vec<Range<usize>> = Vec::with_capacity(starts.len());
    for &start in &starts {
        let end = (start + section_len).min(len);
        let range = start..end;
        if end - start >= min_len && !ranges.contains(&range) {
            ranges.push(range);
        }
    }
    ranges
}

/// Extract tempo candidates from one section
///
/// All local autocorrelation maxima in the configured tempo window become
/// candidates, not just the global peak - the consensus stage sorts out
/// which periodicity the sections agree on.
fn section_candidates(
    section: &[f32],
    sample_rate: u32,
    config: &BpmConfig,
    detector: &OnsetDetector,
) -> Vec<BpmCandidate> {
    let envelope = detector.onset_envelope(section, sample_rate);
    if envelope.is_empty() {
        return Vec::new();
    }

    let envelope_rate = OnsetDetector::envelope_rate(sample_rate);
    let min_lag = ((60.0 / config.max_tempo) * envelope_rate).round() as usize;
    let max_lag = (((60.0 / config.min_tempo) * envelope_rate).round() as usize)
        .min(envelope.len().saturating_sub(1));
    if min_lag == 0 || min_lag >= max_lag {
        return Vec::new();
    }

    let acf = autocorrelation(&envelope, min_lag, max_lag);
    let mean = acf.iter().sum::<f32>() / acf.len() as f32;
    if mean <= 0.0 {
        // Flat envelope (silence): nothing periodic here
        return Vec::new();
    }

    let mut candidates = Vec::new();
    for i in 1..acf.len() - 1 {
        let is_peak = acf[i] > acf[i - 1] && acf[i] >= acf[i + 1];
        if !is_peak || acf[i] < PEAK_MEAN_RATIO * mean {
            continue;
        }
        let lag = min_lag + i;
        let bpm = envelope_rate * 60.0 / lag as f64;
        candidates.push(BpmCandidate {
            bpm,
            score: acf[i] * genre_preference(bpm),
        });
    }
    candidates
}

/// Lag-normalized autocorrelation over `[min_lag, max_lag]`
fn autocorrelation(x: &[f32], min_lag: usize, max_lag: usize) -> Vec<f32> {
    (min_lag..=max_lag)
        .map(|lag| {
            let n = x.len() - lag;
            let sum: f32 = x[..n].iter().zip(&x[lag..]).map(|(a, b)| a * b).sum();
            sum / n as f32
        })
        .collect()
}

/// Score boost for musically common tempo ranges
fn genre_preference(bpm: f64) -> f32 {
    if (115.0..=135.0).contains(&bpm) {
        1.3
    } else if (155.0..=185.0).contains(&bpm) {
        1.2
    } else if (85.0..=105.0).contains(&bpm) {
        1.15
    } else {
        1.0
    }
}

/// Fold a BPM value into the 80-160 octave band
///
/// Repeated doubling/halving resolves half-time/double-time confusion; a
/// value already in band passes through unchanged.
pub fn normalize_octave(bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return bpm;
    }
    let mut bpm = bpm;
    while bpm < OCTAVE_BAND_LOW {
        bpm *= 2.0;
    }
    while bpm > OCTAVE_BAND_HIGH {
        bpm /= 2.0;
    }
    bpm
}

/// Pick the winning candidate by pairwise similarity
///
/// Every candidate accumulates support from every other candidate inside
/// the tolerance window, weighted by the other's score with linear falloff
/// over distance. Highest total wins, rounded to one decimal place.
pub fn consensus_bpm(candidates: &[BpmCandidate]) -> Option<f64> {
    let mut best: Option<(f64, f64)> = None; // (total support, bpm)

    for candidate in candidates {
        let total: f64 = candidates
            .iter()
            .map(|other| {
                let distance = (candidate.bpm - other.bpm).abs();
                if distance >= SIMILARITY_TOLERANCE_BPM {
                    0.0
                } else {
                    other.score as f64 * (1.0 - distance / SIMILARITY_TOLERANCE_BPM)
                }
            })
            .sum();

        let better = match best {
            Some((best_total, _)) => total > best_total,
            None => true,
        };
        if better {
            best = Some((total, candidate.bpm));
        }
    }

    best.map(|(_, bpm)| (bpm * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_candidates(bpms: &[f64]) -> Vec<BpmCandidate> {
        bpms.iter().map(|&bpm| BpmCandidate { bpm, score: 1.0 }).collect()
    }

    #[test]
    fn test_octave_normalization() {
        // In-band values are untouched
        assert_eq!(normalize_octave(80.0), 80.0);
        assert_eq!(normalize_octave(128.0), 128.0);
        assert_eq!(normalize_octave(160.0), 160.0);

        // Half-time and double-time fold back in
        assert_eq!(normalize_octave(65.0), 130.0);
        assert_eq!(normalize_octave(260.0), 130.0);
        assert_eq!(normalize_octave(40.0), 160.0);
    }

    #[test]
    fn test_consensus_picks_reinforced_candidate() {
        let candidates = unit_candidates(&[125.0, 128.0, 128.0, 127.0, 128.0]);
        let bpm = consensus_bpm(&candidates).unwrap();
        assert!((bpm - 128.0).abs() < 0.1);
    }

    #[test]
    fn test_consensus_rounds_to_one_decimal() {
        let candidates = unit_candidates(&[127.34]);
        assert_eq!(consensus_bpm(&candidates), Some(127.3));
    }

    #[test]
    fn test_consensus_empty_is_none() {
        assert_eq!(consensus_bpm(&[]), None);
    }

    #[test]
    fn test_genre_preference_curve() {
        assert_eq!(genre_preference(128.0), 1.3);
        assert_eq!(genre_preference(170.0), 1.2);
        assert_eq!(genre_preference(95.0), 1.15);
        assert_eq!(genre_preference(70.0), 1.0);
    }

    #[test]
    fn test_short_track_falls_back_to_default() {
        let config = BpmConfig::default();
        let samples = vec![0.5; 32000]; // one second
        assert_eq!(estimate_bpm(&samples, 32000, &config), DEFAULT_BPM);
    }

    #[test]
    fn test_silent_track_falls_back_to_default() {
        let config = BpmConfig::default();
        let samples = vec![0.0; 32000 * 8];
        assert_eq!(estimate_bpm(&samples, 32000, &config), DEFAULT_BPM);
    }

    #[test]
    fn test_click_track_estimates_near_120() {
        let sample_rate = 32000u32;
        let seconds = 16;
        let mut samples = vec![0.0f32; sample_rate as usize * seconds];

        // Clicks every half second = 120 BPM
        let samples_per_beat = sample_rate as usize / 2;
        let mut start = 0;
        while start < samples.len() {
            let end = (start + 400).min(samples.len());
            for s in samples[start..end].iter_mut() {
                *s = 0.9;
            }
            start += samples_per_beat;
        }

        let bpm = estimate_bpm(&samples, sample_rate, &BpmConfig::default());
        assert!(
            (bpm - 120.0).abs() < 5.0,
            "click track at 120 BPM estimated as {}",
            bpm
        );
    }

    #[test]
    fn test_section_layout() {
        // 60s track at 32kHz: all five sections are distinct and full length
        let sections = section_ranges(32000 * 60, 32000);
        assert_eq!(sections.len(), 5);
        assert!(sections.iter().all(|r| r.len() == 320000));

        // 12s track: the 75% section is too short and gets skipped
        let sections = section_ranges(32000 * 12, 32000);
        assert!(sections.len() < 5);
        assert!(sections.iter().all(|r| r.len() >= 160000));

        // Degenerate track: no usable sections
        assert!(section_ranges(100, 32000).is_empty());
    }
}
