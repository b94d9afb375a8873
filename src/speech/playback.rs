//! Speaker playback
//!
//! Plays decoded speech audio on the default output device. Playback is
//! interruptible: the speech output driver hands in a cancel flag that is
//! polled while audio drains.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Playback sample rate (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Poll interval while waiting for playback to drain
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(50);

/// Plays audio to the default output device
pub struct AudioPlayback {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device or suitable config exists.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable playback config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "speaker opened"
        );

        Ok(Self { device, config })
    }

    /// Play MP3 audio, blocking until it drains or `cancel` is raised
    ///
    /// Returns true when playback ran to completion, false when canceled.
    ///
    /// # Errors
    ///
    /// Returns error if decoding fails or the output stream cannot be built.
    pub fn play_mp3(&self, mp3_data: &[u8], cancel: &Arc<AtomicBool>) -> Result<bool> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples(&samples, cancel)
    }

    /// Play raw f32 samples, blocking until they drain or `cancel` is raised
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started.
    pub fn play_samples(&self, samples: &[f32], cancel: &Arc<AtomicBool>) -> Result<bool> {
        if samples.is_empty() {
            return Ok(true);
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let channels = self.config.channels as usize;
        let source: Arc<Vec<f32>> = Arc::new(samples.to_vec());
        let position = Arc::new(AtomicUsize::new(0));

        let cb_source = Arc::clone(&source);
        let cb_position = Arc::clone(&position);

        let stream = device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = cb_position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = cb_source.get(pos).copied().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                        if pos < cb_source.len() {
                            pos += 1;
                        }
                    }
                    cb_position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "playback stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Drain with a hard cap slightly past the nominal duration.
        let duration_ms = (source.len() as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline =
            std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

        let completed = loop {
            if cancel.load(Ordering::Relaxed) {
                break false;
            }
            if position.load(Ordering::Relaxed) >= source.len() {
                break true;
            }
            if std::time::Instant::now() > deadline {
                break true;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        drop(stream);
        tracing::debug!(samples = source.len(), completed, "playback finished");

        Ok(completed)
    }
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
