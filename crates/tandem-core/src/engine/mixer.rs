//! Mixer - combines deck outputs with EQ, crossfade, and master volume
//!
//! Each deck feeds a channel strip with a 3-band EQ (kill/flat/boost
//! knobs), then the crossfader blends the two strips into the master bus.

use crate::types::{StereoBuffer, StereoSample, NUM_DECKS};

/// Biquad filter state for EQ bands
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    fn process(&mut self, input_l: f32, input_r: f32, coeffs: &BiquadCoeffs) -> (f32, f32) {
        let out_l = coeffs.b0 * input_l + coeffs.b1 * self.x1_l + coeffs.b2 * self.x2_l
            - coeffs.a1 * self.y1_l - coeffs.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = coeffs.b0 * input_r + coeffs.b1 * self.x1_r + coeffs.b2 * self.x2_r
            - coeffs.a1 * self.y1_r - coeffs.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad filter coefficients
#[derive(Debug, Clone)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    /// Low shelf at `freq`, boost/cut by `gain_db`
    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    /// Peaking EQ at `freq` with quality factor `q`
    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    /// High shelf at `freq`, boost/cut by `gain_db`
    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / 0.9 - 1.0) + 2.0).sqrt();

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha;
        Self {
            b0: (a * ((a + 1.0) + (a - 1.0) * cos_w0 + 2.0 * a.sqrt() * alpha)) / a0,
            b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0)) / a0,
            b2: (a * ((a + 1.0) + (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha)) / a0,
            a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_w0)) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - 2.0 * a.sqrt() * alpha) / a0,
        }
    }

    /// Unity gain, no filtering
    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }
}

/// EQ band centers
const EQ_LOW_FREQ: f32 = 100.0; // Low shelf at 100 Hz
const EQ_MID_FREQ: f32 = 1000.0; // Mid peak at 1 kHz
const EQ_HIGH_FREQ: f32 = 10000.0; // High shelf at 10 kHz
const EQ_MID_Q: f32 = 0.7;

/// Channel strip for a single deck (3-band EQ)
#[derive(Debug, Clone)]
pub struct ChannelStrip {
    /// EQ knob values (0.0 = kill, 0.5 = flat, 1.0 = boost)
    eq_low: f32,
    eq_mid: f32,
    eq_high: f32,

    sample_rate: f32,

    eq_low_state: BiquadState,
    eq_mid_state: BiquadState,
    eq_high_state: BiquadState,

    // Cached coefficients, recalculated when a knob moves
    eq_low_coeffs: BiquadCoeffs,
    eq_mid_coeffs: BiquadCoeffs,
    eq_high_coeffs: BiquadCoeffs,
    eq_dirty: bool,
}

impl ChannelStrip {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            eq_low: 0.5,
            eq_mid: 0.5,
            eq_high: 0.5,
            sample_rate: sample_rate as f32,
            eq_low_state: BiquadState::default(),
            eq_mid_state: BiquadState::default(),
            eq_high_state: BiquadState::default(),
            eq_low_coeffs: BiquadCoeffs::passthrough(),
            eq_mid_coeffs: BiquadCoeffs::passthrough(),
            eq_high_coeffs: BiquadCoeffs::passthrough(),
            eq_dirty: true,
        }
    }

    pub fn set_eq_low(&mut self, value: f32) {
        self.eq_low = value.clamp(0.0, 1.0);
        self.eq_dirty = true;
    }

    pub fn set_eq_mid(&mut self, value: f32) {
        self.eq_mid = value.clamp(0.0, 1.0);
        self.eq_dirty = true;
    }

    pub fn set_eq_high(&mut self, value: f32) {
        self.eq_high = value.clamp(0.0, 1.0);
        self.eq_dirty = true;
    }

    /// Knob position (0-1) to dB gain: 0.0 = kill, 0.5 = 0 dB, 1.0 = +6 dB
    fn eq_to_db(value: f32) -> f32 {
        if value < 0.01 {
            -60.0 // Near-kill
        } else if value < 0.5 {
            let t = (value - 0.01) / 0.49;
            -60.0 * (1.0 - t)
        } else {
            (value - 0.5) * 12.0
        }
    }

    fn update_eq_coeffs(&mut self) {
        if !self.eq_dirty {
            return;
        }

        let low_db = Self::eq_to_db(self.eq_low);
        let mid_db = Self::eq_to_db(self.eq_mid);
        let high_db = Self::eq_to_db(self.eq_high);

        // Flat bands collapse to passthrough so an untouched strip costs
        // almost nothing
        self.eq_low_coeffs = if low_db.abs() > 0.1 {
            BiquadCoeffs::low_shelf(EQ_LOW_FREQ, low_db, self.sample_rate)
        } else {
            BiquadCoeffs::passthrough()
        };

        self.eq_mid_coeffs = if mid_db.abs() > 0.1 {
            BiquadCoeffs::peaking(EQ_MID_FREQ, mid_db, EQ_MID_Q, self.sample_rate)
        } else {
            BiquadCoeffs::passthrough()
        };

        self.eq_high_coeffs = if high_db.abs() > 0.1 {
            BiquadCoeffs::high_shelf(EQ_HIGH_FREQ, high_db, self.sample_rate)
        } else {
            BiquadCoeffs::passthrough()
        };

        self.eq_dirty = false;
    }

    /// Run the deck buffer through the 3-band EQ in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        self.update_eq_coeffs();

        for sample in buffer.iter_mut() {
            let (mut left, mut right) = (sample.left, sample.right);
            (left, right) = self.eq_low_state.process(left, right, &self.eq_low_coeffs);
            (left, right) = self.eq_mid_state.process(left, right, &self.eq_mid_coeffs);
            (left, right) = self.eq_high_state.process(left, right, &self.eq_high_coeffs);
            *sample = StereoSample::new(left, right);
        }
    }

    pub fn reset(&mut self) {
        self.eq_low_state.reset();
        self.eq_mid_state.reset();
        self.eq_high_state.reset();
    }
}

/// Mixer combining both deck outputs
pub struct Mixer {
    channels: [ChannelStrip; NUM_DECKS],
    /// Crossfader position (-1.0 = deck A, 0.0 = center, 1.0 = deck B)
    crossfader: f32,
    /// Master output volume (0.0 to 1.0)
    master_volume: f32,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            channels: std::array::from_fn(|_| ChannelStrip::new(sample_rate)),
            crossfader: 0.0,
            master_volume: 1.0,
        }
    }

    pub fn channel_mut(&mut self, deck: usize) -> Option<&mut ChannelStrip> {
        self.channels.get_mut(deck)
    }

    pub fn set_crossfader(&mut self, position: f32) {
        self.crossfader = position.clamp(-1.0, 1.0);
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Per-deck crossfade gains
    ///
    /// Quadratic approximation of a constant-power fade: with
    /// `t = (position + 1)/2`, deck A gets `1 - t²` and deck B gets `t²`.
    /// Center is 0.75/0.25, not equal power; this reproduces the observed
    /// curve the rest of the gain staging is tuned against.
    pub fn crossfade_gains(&self) -> (f32, f32) {
        let t = (self.crossfader + 1.0) * 0.5;
        (1.0 - t * t, t * t)
    }

    /// EQ both deck buffers, blend them through the crossfader, and write
    /// the master bus
    pub fn process(
        &mut self,
        deck_buffers: &mut [StereoBuffer; NUM_DECKS],
        master_out: &mut StereoBuffer,
    ) {
        master_out.fill_silence();

        for (channel, buffer) in self.channels.iter_mut().zip(deck_buffers.iter_mut()) {
            channel.process(buffer);
        }

        let (gain_a, gain_b) = self.crossfade_gains();
        master_out.add_scaled(&deck_buffers[0], gain_a);
        master_out.add_scaled(&deck_buffers[1], gain_b);

        master_out.scale(self.master_volume);
    }

    /// Reset all channel strip filter states
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossfader_end_stops() {
        let mut mixer = Mixer::new(48000);

        mixer.set_crossfader(-1.0);
        assert_eq!(mixer.crossfade_gains(), (1.0, 0.0));

        mixer.set_crossfader(1.0);
        assert_eq!(mixer.crossfade_gains(), (0.0, 1.0));

        // Center of the observed quadratic curve is 0.75/0.25
        mixer.set_crossfader(0.0);
        let (a, b) = mixer.crossfade_gains();
        assert!((a - 0.75).abs() < 1e-6);
        assert!((b - 0.25).abs() < 1e-6);

        mixer.set_crossfader(5.0);
        assert_eq!(mixer.crossfader(), 1.0);
    }

    #[test]
    fn test_eq_knob_taper() {
        assert_eq!(ChannelStrip::eq_to_db(0.5), 0.0);
        assert_eq!(ChannelStrip::eq_to_db(1.0), 6.0);
        assert_eq!(ChannelStrip::eq_to_db(0.0), -60.0);
        assert!(ChannelStrip::eq_to_db(0.25) < -20.0);
    }

    #[test]
    fn test_flat_strip_is_passthrough() {
        let mut strip = ChannelStrip::new(48000);
        let mut buffer = StereoBuffer::from_channels(&[0.1, -0.2, 0.3], &[0.4, 0.5, -0.6]);
        let original = buffer.clone();

        strip.process(&mut buffer);

        for (a, b) in buffer.iter().zip(original.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_mix_at_full_a() {
        let mut mixer = Mixer::new(48000);
        mixer.set_crossfader(-1.0);

        let mut buffers = [
            StereoBuffer::from_channels(&[1.0; 8], &[1.0; 8]),
            StereoBuffer::from_channels(&[-1.0; 8], &[-1.0; 8]),
        ];
        let mut master = StereoBuffer::silence(8);

        mixer.process(&mut buffers, &mut master);

        // Deck B is fully faded out
        for sample in master.iter() {
            assert_eq!(sample.left, 1.0);
            assert_eq!(sample.right, 1.0);
        }
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut mixer = Mixer::new(48000);
        mixer.set_crossfader(-1.0);
        mixer.set_master_volume(0.5);

        let mut buffers = [
            StereoBuffer::from_channels(&[0.8; 4], &[0.8; 4]),
            StereoBuffer::silence(4),
        ];
        let mut master = StereoBuffer::silence(4);

        mixer.process(&mut buffers, &mut master);
        assert!((master[0].left - 0.4).abs() < 1e-6);
    }
}
