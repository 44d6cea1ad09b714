//! Audio file decoding
//!
//! Turns raw file bytes into a [`Track`] using symphonia. The container is
//! probed, the first decodable audio track is selected, and every packet is
//! decoded into planar f32. Mono sources come back as an aliased-channel
//! [`Track`]; multi-channel sources keep their first two channels.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::track::Track;

/// Errors from decoding a track
///
/// A failed load leaves the engine in its prior state; the caller is
/// responsible for user-visible messaging.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized or unsupported container format")]
    UnrecognizedFormat,

    #[error("no decodable audio track in stream")]
    NoAudioTrack,

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("stream is malformed: {0}")]
    Malformed(String),

    #[error("stream contains no audio frames")]
    EmptyStream,
}

/// Decode a complete audio file from memory
pub fn decode(bytes: &[u8]) -> Result<Track, DecodeError> {
    let source = Box::new(Cursor::new(bytes.to_vec()));
    let stream = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|_| DecodeError::UnrecognizedFormat)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedCodec(e.to_string()))?;

    let mut sample_rate: Option<u32> = track.codec_params.sample_rate;
    let mut channels: Option<usize> = None;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is recoverable; skip it and keep decoding
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let ch = *channels.get_or_insert_with(|| spec.channels.count());

        let needs_realloc = sample_buf
            .as_ref()
            .map(|b| b.capacity() < decoded.capacity() * ch)
            .unwrap_or(true);
        if needs_realloc {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let buf = sample_buf.as_mut().expect("sample buffer just created");
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks_exact(ch) {
            left.push(frame[0]);
            if ch > 1 {
                right.push(frame[1]);
            }
        }
    }

    if left.is_empty() {
        return Err(DecodeError::EmptyStream);
    }
    let sample_rate = sample_rate.ok_or(DecodeError::EmptyStream)?;

    let track = match channels {
        Some(1) => Track::from_mono(left, sample_rate),
        _ => Track::from_stereo(left, right, sample_rate),
    };

    log::info!(
        "decoded {} frames at {}Hz ({:.1}s, {})",
        track.len_samples(),
        track.sample_rate(),
        track.duration_seconds(),
        if track.is_mono() { "mono" } else { "stereo" },
    );

    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal PCM16 mono WAV for decoder tests
    fn make_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);

        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");

        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for &s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }

        bytes
    }

    #[test]
    fn test_decode_pcm_wav() {
        let samples: Vec<i16> = (0..4800).map(|i| ((i % 100) * 300) as i16).collect();
        let bytes = make_wav(&samples, 48000);

        let track = decode(&bytes).expect("valid wav should decode");
        assert_eq!(track.len_samples(), 4800);
        assert_eq!(track.sample_rate(), 48000);
        assert!(track.is_mono());

        // PCM16 scales by 1/32768
        let expected = samples[150] as f32 / 32768.0;
        assert!((track.left()[150] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_decode_garbage_is_unrecognized() {
        let err = decode(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedFormat));
    }

    #[test]
    fn test_decode_empty_input() {
        assert!(decode(&[]).is_err());
    }
}
