//! CPAL output stream implementation
//!
//! One output stream owns the [`AudioEngine`] through its callback state.
//! The mutex around that state is uncontended - only the stream callback
//! locks it - so the audio thread never actually waits; it exists to make
//! the state `Send` into cpal's callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use crate::engine::{command_channel, event_channel, AudioEngine, MAX_BUFFER_SIZE};
use crate::types::StereoBuffer;

use super::error::{AudioError, AudioResult};
use super::{AudioConfig, AudioSystemResult, BufferSize, CommandSender, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};

/// Handle to the active audio stream
///
/// Keeps the stream alive. Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// State owned by the stream callback
struct CallbackState {
    engine: AudioEngine,
    command_rx: rtrb::Consumer<crate::engine::EngineCommand>,
    /// Pre-allocated render buffer
    master_buffer: StereoBuffer,
}

impl CallbackState {
    /// Drain commands, then render one block (real-time safe)
    fn process(&mut self, frames: usize) {
        self.master_buffer.set_len_from_capacity(frames.min(MAX_BUFFER_SIZE));
        self.engine.process_commands(&mut self.command_rx);
        self.engine.process(&mut self.master_buffer);
    }
}

/// Start the audio system: pick a device, negotiate a config, build and
/// play the output stream
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let host = cpal::default_host();

    let device = match &config.device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?
            .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound(name.clone()))?,
        None => host.default_output_device().ok_or(AudioError::NoDefaultDevice)?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("using audio device: {}", device_name);

    let (supported_config, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    );

    let (command_tx, command_rx) = command_channel();
    let (events_tx, events_rx) = event_channel();

    let engine = AudioEngine::new(sample_rate, events_tx);
    let deck_atomics = engine.deck_atomics();

    let state = Arc::new(Mutex::new(CallbackState {
        engine,
        command_rx,
        master_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
    }));

    let underruns = Arc::new(AtomicU64::new(0));
    let stream = build_output_stream(&device, &stream_config, state, Arc::clone(&underruns))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        },
        command_sender: CommandSender { producer: command_tx },
        events: events_rx,
        deck_atomics,
        underruns,
        sample_rate,
        buffer_size,
    })
}

/// Pick the best output configuration: f32, stereo, at the requested rate
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(AudioError::ConfigError(
            "no supported output configurations".to_string(),
        ));
    }

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);

    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(|c| target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0)
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("no suitable output configuration".to_string()))?;

    let rate = if target_rate >= best.min_sample_rate().0 && target_rate <= best.max_sample_rate().0 {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "device doesn't support {}Hz, falling back to {}Hz",
            target_rate,
            fallback.0
        );
        fallback
    };

    let stream_config = best.clone().with_sample_rate(rate);

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(64, MAX_BUFFER_SIZE as u32),
    };

    Ok((stream_config, buffer_size))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    state: Arc<Mutex<CallbackState>>,
    underruns: Arc<AtomicU64>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut state = state.lock().unwrap();
                let frames = data.len() / channels;

                state.process(frames);

                let samples = state.master_buffer.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < samples.len() {
                        let sample = samples[i];
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                // A host-side contract violation is not recoverable here:
                // count it and keep going, never unwind in the callback path
                underruns.fetch_add(1, Ordering::Relaxed);
                log::error!("audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}

/// Names of available output devices for a UI dropdown
///
/// Returns an empty list when the host has no usable devices instead of
/// failing; startup reports the real error.
pub fn get_available_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            log::warn!("could not enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_enumeration_does_not_fail() {
        // Headless machines legitimately report zero devices
        let devices = get_available_output_devices();
        println!("found {} audio devices", devices.len());
    }
}
