//! Clip playback through the system output device via cpal.

use super::AudioSink;
use crate::config::AudioConfig;
use crate::error::{CoachError, Result};
use crate::synthesis::AudioClip;
use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Decoded interleaved samples ready for an output stream.
struct DecodedClip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// Audio playback to system speakers via cpal.
///
/// Each clip gets its own short-lived output stream; the device is resolved
/// per play so a device that disappears mid-session fails one rendition,
/// not the whole sink.
pub struct CpalSink {
    config: AudioConfig,
}

impl CpalSink {
    /// Create a sink for the configured output device.
    #[must_use]
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, clip: AudioClip, cancel: CancellationToken) -> Result<()> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let decoded = decode_clip(&clip)?;
            play_blocking(&config, &decoded, &cancel)
        })
        .await
        .map_err(|e| CoachError::Playback(format!("playback task failed: {e}")))?
    }
}

/// Decode a compressed clip into interleaved f32 samples.
fn decode_clip(clip: &AudioClip) -> Result<DecodedClip> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let cursor = std::io::Cursor::new(clip.data.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.mime_type(&clip.media_type);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| CoachError::Audio(format!("unrecognized audio container: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| CoachError::Audio("no audio track in clip".to_owned()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(24_000);
    let mut channels = 1u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| CoachError::Audio(format!("unsupported codec: {e}")))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(CoachError::Audio(format!("decode error: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            // Skip corrupt packets; the rest of the clip still plays.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(CoachError::Audio(format!("decode error: {e}"))),
        }
    }

    if samples.is_empty() {
        return Err(CoachError::Audio("clip decoded to no samples".to_owned()));
    }

    Ok(DecodedClip {
        samples,
        sample_rate,
        channels: channels.max(1),
    })
}

/// Play decoded samples, blocking until the buffer drains or `cancel`
/// fires. The stream is dropped on every exit path.
fn play_blocking(
    config: &AudioConfig,
    clip: &DecodedClip,
    cancel: &CancellationToken,
) -> Result<()> {
    let host = cpal::default_host();

    let device = if let Some(ref name) = config.output_device {
        host.output_devices()
            .map_err(|e| CoachError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| CoachError::Audio(format!("output device '{name}' not found")))?
    } else {
        host.default_output_device()
            .ok_or_else(|| CoachError::Audio("no default output device".to_owned()))?
    };

    let device_name = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("playing clip on output device: {device_name}");

    let stream_config = StreamConfig {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer = Arc::new(Mutex::new(RenderBuffer {
        samples: clip.samples.clone(),
        position: 0,
        finished: false,
    }));
    let buffer_clone = Arc::clone(&buffer);

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let mut buf = match buffer_clone.lock() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                for sample in data.iter_mut() {
                    if buf.position < buf.samples.len() {
                        *sample = buf.samples[buf.position];
                        buf.position += 1;
                    } else {
                        *sample = 0.0;
                        buf.finished = true;
                    }
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| CoachError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| CoachError::Audio(format!("failed to start output stream: {e}")))?;

    // Poll until the buffer drains or the rendition is canceled.
    loop {
        std::thread::sleep(Duration::from_millis(10));
        if cancel.is_cancelled() {
            break;
        }
        let buf = buffer
            .lock()
            .map_err(|e| CoachError::Audio(format!("render buffer lock poisoned: {e}")))?;
        if buf.finished {
            break;
        }
    }

    drop(stream);
    Ok(())
}

/// Internal buffer for tracking render progress.
struct RenderBuffer {
    samples: Vec<f32>,
    position: usize,
    finished: bool,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bytes::Bytes;

    /// Minimal mono PCM16 WAV with `samples` sine-ish content.
    fn wav_bytes(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_wav_clip() {
        let pcm: Vec<i16> = (0..1600).map(|i| ((i % 100) * 300 - 15000) as i16).collect();
        let clip = AudioClip {
            data: Bytes::from(wav_bytes(16_000, &pcm)),
            media_type: "audio/wav".to_owned(),
        };

        let decoded = decode_clip(&clip).unwrap();
        assert_eq!(decoded.sample_rate, 16_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), pcm.len());
    }

    #[test]
    fn garbage_bytes_are_an_audio_error() {
        let clip = AudioClip {
            data: Bytes::from_static(b"definitely not audio"),
            media_type: "audio/mpeg".to_owned(),
        };
        assert!(matches!(decode_clip(&clip), Err(CoachError::Audio(_))));
    }
}
