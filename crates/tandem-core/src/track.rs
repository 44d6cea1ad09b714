//! Decoded track storage
//!
//! A [`Track`] holds the full decoded PCM of one loaded audio file. It is
//! immutable after construction, which is what makes it safe to share
//! read-only between the control context (waveform display, analysis) and
//! the audio thread (playback) without any synchronization.

use std::sync::Arc;

/// Immutable decoded PCM for one track
///
/// Channels are stored planar. For mono sources the right channel aliases
/// the left channel's allocation, so a mono track costs one buffer.
///
/// Invariant: `left.len() == right.len() == floor(duration_seconds * sample_rate)`.
#[derive(Debug, Clone)]
pub struct Track {
    samples_left: Arc<Vec<f32>>,
    samples_right: Arc<Vec<f32>>,
    sample_rate: u32,
    duration_seconds: f64,
}

impl Track {
    /// Build a stereo track from separate channel buffers
    ///
    /// Panics if the channels have different lengths or `sample_rate` is 0.
    pub fn from_stereo(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        assert_eq!(left.len(), right.len(), "channel lengths must match");
        assert!(sample_rate > 0, "sample rate must be nonzero");
        let duration_seconds = left.len() as f64 / sample_rate as f64;
        Self {
            samples_left: Arc::new(left),
            samples_right: Arc::new(right),
            sample_rate,
            duration_seconds,
        }
    }

    /// Build a mono track; the right channel aliases the left
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be nonzero");
        let duration_seconds = samples.len() as f64 / sample_rate as f64;
        let left = Arc::new(samples);
        Self {
            samples_right: Arc::clone(&left),
            samples_left: left,
            sample_rate,
            duration_seconds,
        }
    }

    /// Number of sample frames
    #[inline]
    pub fn len_samples(&self) -> usize {
        self.samples_left.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples_left.is_empty()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    #[inline]
    pub fn left(&self) -> &[f32] {
        &self.samples_left
    }

    #[inline]
    pub fn right(&self) -> &[f32] {
        &self.samples_right
    }

    /// True when both channels share one allocation (mono source)
    pub fn is_mono(&self) -> bool {
        Arc::ptr_eq(&self.samples_left, &self.samples_right)
    }

    /// Channel-averaged mono copy of the whole track
    ///
    /// Control-context helper for the analysis path and waveform rendering;
    /// allocates and must not be called from the audio thread.
    pub fn mixed_mono(&self) -> Vec<f32> {
        if self.is_mono() {
            return self.samples_left.as_ref().clone();
        }
        self.samples_left
            .iter()
            .zip(self.samples_right.iter())
            .map(|(&l, &r)| (l + r) * 0.5)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_aliases_left_channel() {
        let track = Track::from_mono(vec![0.1, 0.2, 0.3], 48000);
        assert!(track.is_mono());
        assert_eq!(track.left(), track.right());
        assert_eq!(track.len_samples(), 3);
    }

    #[test]
    fn test_length_duration_invariant() {
        let track = Track::from_mono(vec![0.0; 24000], 48000);
        assert_eq!(track.duration_seconds(), 0.5);
        assert_eq!(
            (track.duration_seconds() * track.sample_rate() as f64).floor() as usize,
            track.len_samples()
        );
    }

    #[test]
    fn test_mixed_mono_averages_channels() {
        let track = Track::from_stereo(vec![1.0, 0.0], vec![0.0, 1.0], 48000);
        assert!(!track.is_mono());
        assert_eq!(track.mixed_mono(), vec![0.5, 0.5]);
    }

    #[test]
    #[should_panic(expected = "channel lengths must match")]
    fn test_mismatched_channels_panic() {
        Track::from_stereo(vec![0.0; 3], vec![0.0; 4], 48000);
    }
}
