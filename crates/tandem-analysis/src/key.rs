//! Musical key estimation
//!
//! Builds a 12-bin chroma energy profile from the opening seconds of a
//! track and reads the key off it: the strongest pitch class is the root,
//! and the energy a minor third above decides major versus minor. Tracks
//! with no usable signal get the documented fallback of A minor - a value,
//! not an error.

use realfft::RealFftPlanner;
use tandem_core::music::{Mode, MusicalKey, PitchClass};

/// Seconds of audio considered for key detection
const CHROMA_WINDOW_SECS: u32 = 3;

/// FFT length; the analysis window is at most this many samples
const CHROMA_FFT_SIZE: usize = 4096;

/// Number of linear sub-bands read from the spectrum
const CHROMA_SUBBANDS: usize = 128;

/// Frequencies outside this range carry no key information here
const MIN_FREQ_HZ: f32 = 80.0;
const MAX_FREQ_HZ: f32 = 4000.0;

/// Root must beat the minor-third bin by this ratio to count as minor
const MINOR_THIRD_RATIO: f32 = 1.2;

/// Fallback key for empty or silent input
pub fn default_key() -> MusicalKey {
    MusicalKey::new(PitchClass::A, Mode::Minor)
}

/// Estimate the musical key from mono samples
pub fn detect_key(samples: &[f32], sample_rate: u32) -> MusicalKey {
    let take = samples
        .len()
        .min((sample_rate * CHROMA_WINDOW_SECS) as usize);

    let Some(chroma) = chroma_vector(&samples[..take], sample_rate) else {
        return default_key();
    };

    let root = chroma
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(index, _)| index)
        .unwrap_or(PitchClass::A.index());

    let third = chroma[(root + 3) % 12];
    let mode = if chroma[root] > MINOR_THIRD_RATIO * third {
        Mode::Minor
    } else {
        Mode::Major
    };

    MusicalKey::new(PitchClass::from_index(root), mode)
}

/// 12-bin chroma energy profile, normalized by the maximum bin
///
/// A Hann window covers up to [`CHROMA_FFT_SIZE`] samples (zero-padded
/// FFT); the first [`CHROMA_SUBBANDS`] spectrum bins - center frequency
/// `bin * sample_rate / CHROMA_FFT_SIZE` - are mapped onto pitch classes
/// via `round(12 * log2(f / 440) + 69) mod 12`. Returns None when the
/// input is too short or carries no energy in the mapped range.
pub fn chroma_vector(samples: &[f32], sample_rate: u32) -> Option<[f32; 12]> {
    let n = samples.len().min(CHROMA_FFT_SIZE);
    if n < 2 {
        return None;
    }

    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(CHROMA_FFT_SIZE);
    let mut input = fft.make_input_vec();
    let denominator = (n - 1) as f32;
    for (i, (dst, &s)) in input.iter_mut().zip(samples).enumerate().take(n) {
        let window = 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denominator).cos();
        *dst = s * window;
    }

    let mut spectrum = fft.make_output_vec();
    fft.process(&mut input, &mut spectrum)
        .expect("FFT buffer sizes match the plan");

    let mut chroma = [0.0f32; 12];
    for bin in 1..=CHROMA_SUBBANDS {
        let freq = bin as f32 * sample_rate as f32 / CHROMA_FFT_SIZE as f32;
        if !(MIN_FREQ_HZ..=MAX_FREQ_HZ).contains(&freq) {
            continue;
        }
        let midi_note = 12.0 * (freq / 440.0).log2() + 69.0;
        let class = (midi_note.round() as i32).rem_euclid(12) as usize;
        chroma[class] += spectrum[bin].norm();
    }

    let max = chroma.iter().cloned().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return None;
    }
    for value in &mut chroma {
        *value /= max;
    }
    Some(chroma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, amplitude: f32, sample_rate: u32, seconds: u32) -> Vec<f32> {
        (0..sample_rate * seconds)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin()
                    * amplitude
            })
            .collect()
    }

    fn mix(a: &[f32], b: &[f32]) -> Vec<f32> {
        a.iter().zip(b).map(|(&x, &y)| x + y).collect()
    }

    #[test]
    fn test_silence_defaults_to_a_minor() {
        let key = detect_key(&vec![0.0; 48000], 48000);
        assert_eq!(key, default_key());
        assert_eq!(key.to_string(), "Am");
    }

    #[test]
    fn test_empty_input_defaults_to_a_minor() {
        assert_eq!(detect_key(&[], 48000), default_key());
    }

    #[test]
    fn test_pure_440_maps_to_a() {
        // A bare root with nothing a minor third up classifies as minor
        let samples = tone(440.0, 1.0, 44100, 1);
        let key = detect_key(&samples, 44100);
        assert_eq!(key.root, PitchClass::A);
        assert_eq!(key.mode, Mode::Minor);
    }

    #[test]
    fn test_minor_third_flips_mode() {
        let a = tone(440.0, 1.0, 44100, 1);

        // Weak C above A: root dominates, reads as minor
        let weak_third = mix(&a, &tone(523.25, 0.5, 44100, 1));
        let key = detect_key(&weak_third, 44100);
        assert_eq!(key.root, PitchClass::A);
        assert_eq!(key.mode, Mode::Minor);

        // C nearly as strong as A: the ratio test tips to major
        let strong_third = mix(&a, &tone(523.25, 0.9, 44100, 1));
        let key = detect_key(&strong_third, 44100);
        assert_eq!(key.root, PitchClass::A);
        assert_eq!(key.mode, Mode::Major);
    }

    #[test]
    fn test_chroma_is_normalized() {
        let samples = tone(261.63, 0.8, 44100, 1); // C4
        let chroma = chroma_vector(&samples, 44100).unwrap();

        let max = chroma.iter().cloned().fold(0.0f32, f32::max);
        assert_eq!(max, 1.0);
        assert_eq!(chroma[PitchClass::C.index()], 1.0);
    }
}
