//! Utterance endpointing
//!
//! Segments a single utterance out of the capture stream using RMS energy:
//! speech starts when energy crosses the threshold and ends after a trailing
//! silence window, provided enough speech accumulated first.

/// Minimum audio energy to count a chunk as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length before a segment can complete (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends an utterance (0.5s at 16kHz)
const SILENCE_SAMPLES: usize = 8000;

/// Endpointer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for speech to start
    Quiet,
    /// Accumulating an utterance
    Speech,
}

/// Accumulates one utterance from successive audio chunks
pub struct UtteranceEndpointer {
    phase: Phase,
    buffer: Vec<f32>,
    silence_run: usize,
}

impl Default for UtteranceEndpointer {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceEndpointer {
    /// Create an endpointer waiting for speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: Phase::Quiet,
            buffer: Vec::new(),
            silence_run: 0,
        }
    }

    /// Feed a chunk of samples; returns true once the utterance is complete
    pub fn feed(&mut self, samples: &[f32]) -> bool {
        let is_speech = rms_energy(samples) > ENERGY_THRESHOLD;

        match self.phase {
            Phase::Quiet => {
                if is_speech {
                    self.phase = Phase::Speech;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_run = 0;
                }
            }
            Phase::Speech => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_run = 0;
                } else {
                    self.silence_run += samples.len();
                }

                if self.silence_run > SILENCE_SAMPLES && self.buffer.len() > MIN_SPEECH_SAMPLES {
                    return true;
                }

                // Too much silence without enough speech: arm again.
                if self.silence_run > SILENCE_SAMPLES * 2 {
                    self.reset();
                }
            }
        }

        false
    }

    /// Whether any speech has been detected yet
    #[must_use]
    pub fn has_speech(&self) -> bool {
        self.phase == Phase::Speech
    }

    /// Take the accumulated utterance samples, clearing the buffer
    pub fn take_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.buffer)
    }

    /// Discard any accumulated audio and wait for speech again
    pub fn reset(&mut self) {
        self.phase = Phase::Quiet;
        self.buffer.clear();
        self.silence_run = 0;
    }
}

/// RMS energy of a chunk of samples
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_square.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(duration_samples: usize, amplitude: f32) -> Vec<f32> {
        (0..duration_samples)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / 16000.0;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(duration_samples: usize) -> Vec<f32> {
        vec![0.0; duration_samples]
    }

    #[test]
    fn energy_of_silence_is_low() {
        assert!(rms_energy(&silence(1600)) < 0.001);
        assert!(rms_energy(&tone(1600, 0.5)) > 0.3);
        assert!((rms_energy(&[]) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn silence_alone_never_completes() {
        let mut ep = UtteranceEndpointer::new();
        for _ in 0..20 {
            assert!(!ep.feed(&silence(1600)));
        }
        assert!(!ep.has_speech());
    }

    #[test]
    fn speech_then_silence_completes() {
        let mut ep = UtteranceEndpointer::new();

        // 0.5s of speech
        assert!(!ep.feed(&tone(8000, 0.3)));
        assert!(ep.has_speech());

        // 0.6s of silence ends it
        let complete = ep.feed(&silence(9600));
        assert!(complete);

        let samples = ep.take_samples();
        assert_eq!(samples.len(), 8000 + 9600);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut ep = UtteranceEndpointer::new();

        // 0.1s of speech is under the minimum
        ep.feed(&tone(1600, 0.3));

        // A long silence resets instead of completing
        assert!(!ep.feed(&silence(SILENCE_SAMPLES * 2 + 1600)));
        assert!(!ep.has_speech());
    }

    #[test]
    fn reset_clears_buffer() {
        let mut ep = UtteranceEndpointer::new();
        ep.feed(&tone(8000, 0.3));
        ep.reset();

        assert!(!ep.has_speech());
        assert!(ep.take_samples().is_empty());
    }
}
