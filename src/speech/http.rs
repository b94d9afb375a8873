//! HTTP speech adapters
//!
//! Concrete ports backed by an OpenAI-shaped speech API: synthesis via
//! `/audio/speech` played on the local speaker, recognition via microphone
//! capture and `/audio/transcriptions`. Audio I/O runs on worker threads so
//! the controller's event loop never blocks; the blocking HTTP client stays
//! on those threads too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::playback::AudioPlayback;
use super::voice::{SynthesisVoice, VoiceProfile, select_preferred_voice};
use super::{
    InputEvent, InputEventReceiver, InputEventSender, OutputEvent, OutputEventReceiver,
    OutputEventSender, SpeechInputPort, SpeechOutputPort,
};
use crate::{Error, Result};

/// Calibrated speech rate (pitch rides at the provider default)
const SPEECH_RATE: f32 = 1.02;

/// Voice used until the catalog arrives
const DEFAULT_VOICE: &str = "alloy";

/// Interval between capture buffer polls
const CAPTURE_POLL: Duration = Duration::from_millis(100);

/// Hard cap on one single-shot listen
const MAX_LISTEN: Duration = Duration::from_secs(12);

/// HTTP timeout for speech API calls
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for the speech API adapters
#[derive(Debug, Clone)]
pub struct SpeechApiConfig {
    /// API base URL (e.g. `https://api.openai.com/v1`)
    pub api_base: String,

    /// Bearer token for the speech API
    pub api_key: String,

    /// TTS model identifier
    pub tts_model: String,

    /// STT model identifier
    pub stt_model: String,

    /// Recognition / voice-preference language (BCP 47)
    pub language: String,
}

/// Response from the transcription endpoint
#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Response from the voice catalog endpoint
#[derive(Deserialize)]
struct VoiceCatalogResponse {
    voices: Vec<SynthesisVoice>,
}

/// Speech output over the HTTP speech API and the local speaker
pub struct HttpSpeechOutput {
    api: SpeechApiConfig,
    events: OutputEventSender,
    voice: Arc<Mutex<Option<VoiceProfile>>>,
    speaking: Arc<AtomicBool>,
    cancel_flag: Arc<AtomicBool>,
}

impl HttpSpeechOutput {
    /// Create the adapter and its event channel
    ///
    /// Probes the output device up front so callers can fall back to the
    /// no-op adapter when the host has no playback capability. The voice
    /// catalog is fetched in the background; when it arrives the preferred
    /// voice is re-resolved and [`OutputEvent::VoiceChanged`] is emitted.
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available or the API key is
    /// empty.
    pub fn with_receiver(api: SpeechApiConfig) -> Result<(Self, OutputEventReceiver)> {
        if api.api_key.is_empty() {
            return Err(Error::Config("speech API key required for TTS".to_string()));
        }
        AudioPlayback::new()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let voice = Arc::new(Mutex::new(None));

        spawn_catalog_fetch(api.clone(), Arc::clone(&voice), tx.clone());

        Ok((
            Self {
                api,
                events: tx,
                voice,
                speaking: Arc::new(AtomicBool::new(false)),
                cancel_flag: Arc::new(AtomicBool::new(false)),
            },
            rx,
        ))
    }
}

impl SpeechOutputPort for HttpSpeechOutput {
    fn speak(&mut self, text: &str) -> bool {
        // Silence whatever is in flight, then hand the new utterance its own
        // cancel flag.
        self.cancel();
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flag = Arc::clone(&cancel);
        self.speaking.store(true, Ordering::SeqCst);

        let api = self.api.clone();
        let voice_id = self
            .voice
            .lock()
            .ok()
            .and_then(|v| v.as_ref().map(|p| p.id.clone()))
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());
        let speaking = Arc::clone(&self.speaking);
        let events = self.events.clone();
        let text = text.to_string();

        std::thread::spawn(move || {
            let outcome = synthesize_and_play(&api, &voice_id, &text, &cancel);
            speaking.store(false, Ordering::SeqCst);

            match outcome {
                Ok(true) => {
                    let _ = events.send(OutputEvent::Finished);
                }
                Ok(false) => {
                    tracing::debug!("utterance canceled");
                }
                Err(e) => {
                    // Synthesis failures degrade to silence; the turn still
                    // completes so the state machine moves on.
                    tracing::warn!(error = %e, "speech synthesis failed");
                    if !cancel.load(Ordering::SeqCst) {
                        let _ = events.send(OutputEvent::Finished);
                    }
                }
            }
        });

        true
    }

    fn cancel(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn voice(&self) -> Option<VoiceProfile> {
        self.voice.lock().ok().and_then(|v| v.clone())
    }
}

/// Fetch the voice catalog and re-resolve the preferred voice
fn spawn_catalog_fetch(
    api: SpeechApiConfig,
    voice: Arc<Mutex<Option<VoiceProfile>>>,
    events: OutputEventSender,
) {
    std::thread::spawn(move || match fetch_voice_catalog(&api) {
        Ok(catalog) => {
            if let Some(profile) = select_preferred_voice(&catalog, &api.language) {
                tracing::info!(voice = %profile.name, language = %profile.language, "voice selected");
                if let Ok(mut slot) = voice.lock() {
                    *slot = Some(profile.clone());
                }
                let _ = events.send(OutputEvent::VoiceChanged(profile));
            } else {
                tracing::debug!(voices = catalog.len(), "no preferred voice in catalog");
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "voice catalog unavailable, using provider default");
        }
    });
}

/// GET the provider's voice list
fn fetch_voice_catalog(api: &SpeechApiConfig) -> Result<Vec<SynthesisVoice>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(API_TIMEOUT)
        .build()?;

    let response = client
        .get(format!("{}/audio/voices", api.api_base))
        .bearer_auth(&api.api_key)
        .send()?;

    if !response.status().is_success() {
        return Err(Error::Tts(format!(
            "voice catalog error {}",
            response.status()
        )));
    }

    let catalog: VoiceCatalogResponse = response.json()?;
    Ok(catalog.voices)
}

/// Synthesize one utterance and play it; returns false when canceled
fn synthesize_and_play(
    api: &SpeechApiConfig,
    voice_id: &str,
    text: &str,
    cancel: &Arc<AtomicBool>,
) -> Result<bool> {
    #[derive(serde::Serialize)]
    struct SpeechRequest<'a> {
        model: &'a str,
        input: &'a str,
        voice: &'a str,
        speed: f32,
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(API_TIMEOUT)
        .build()?;

    let response = client
        .post(format!("{}/audio/speech", api.api_base))
        .bearer_auth(&api.api_key)
        .json(&SpeechRequest {
            model: &api.tts_model,
            input: text,
            voice: voice_id,
            speed: SPEECH_RATE,
        })
        .send()?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(Error::Tts(format!("TTS error {status}: {body}")));
    }

    let audio = response.bytes()?;

    if cancel.load(Ordering::SeqCst) {
        return Ok(false);
    }

    let playback = AudioPlayback::new()?;
    playback.play_mp3(&audio, cancel)
}

/// Speech input over microphone capture and the HTTP transcription API
pub struct HttpSpeechInput {
    api: SpeechApiConfig,
    events: InputEventSender,
    listening: Arc<AtomicBool>,
    stop_flag: Arc<Mutex<Arc<AtomicBool>>>,
}

impl HttpSpeechInput {
    /// Create the adapter and its event channel
    ///
    /// Probes the input device up front so callers can fall back to the
    /// no-op adapter when the host has no capture capability.
    ///
    /// # Errors
    ///
    /// Returns error if no input device is available or the API key is
    /// empty.
    pub fn with_receiver(api: SpeechApiConfig) -> Result<(Self, InputEventReceiver)> {
        if api.api_key.is_empty() {
            return Err(Error::Config("speech API key required for STT".to_string()));
        }
        AudioCapture::new()?;

        let (tx, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                api,
                events: tx,
                listening: Arc::new(AtomicBool::new(false)),
                stop_flag: Arc::new(Mutex::new(Arc::new(AtomicBool::new(false)))),
            },
            rx,
        ))
    }
}

impl SpeechInputPort for HttpSpeechInput {
    fn start_listening(&mut self) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        if let Ok(mut slot) = self.stop_flag.lock() {
            *slot = Arc::clone(&stop);
        }

        let api = self.api.clone();
        let listening = Arc::clone(&self.listening);
        let events = self.events.clone();

        std::thread::spawn(move || {
            match capture_utterance(&stop) {
                Ok(Some(samples)) => match transcribe(&api, &samples) {
                    Ok(text) => {
                        tracing::info!(transcript = %text, "utterance recognized");
                        let _ = events.send(InputEvent::Utterance(text));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transcription failed");
                    }
                },
                Ok(None) => {
                    tracing::debug!("listen ended without speech");
                }
                Err(e) => {
                    // Platform failures are swallowed; the mic indicator
                    // simply reverts.
                    tracing::debug!(error = %e, "capture failed");
                }
            }

            listening.store(false, Ordering::SeqCst);
            let _ = events.send(InputEvent::Ended);
        });
    }

    fn stop_listening(&mut self) {
        if let Ok(slot) = self.stop_flag.lock() {
            slot.store(true, Ordering::SeqCst);
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Capture one endpointed utterance; `None` on cancel or timeout-with-silence
fn capture_utterance(stop: &Arc<AtomicBool>) -> Result<Option<Vec<f32>>> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let mut endpointer = super::endpoint::UtteranceEndpointer::new();
    let deadline = std::time::Instant::now() + MAX_LISTEN;

    let samples = loop {
        std::thread::sleep(CAPTURE_POLL);

        if stop.load(Ordering::SeqCst) {
            break None;
        }

        let chunk = capture.drain();
        if endpointer.feed(&chunk) {
            break Some(endpointer.take_samples());
        }

        if std::time::Instant::now() > deadline {
            // Best effort: hand over whatever speech accumulated.
            break endpointer
                .has_speech()
                .then(|| endpointer.take_samples());
        }
    };

    capture.stop();
    Ok(samples)
}

/// Transcribe captured samples via the multipart transcription endpoint
fn transcribe(api: &SpeechApiConfig, samples: &[f32]) -> Result<String> {
    let wav = samples_to_wav(samples, SAMPLE_RATE)?;

    let client = reqwest::blocking::Client::builder()
        .timeout(API_TIMEOUT)
        .build()?;

    let form = reqwest::blocking::multipart::Form::new()
        .part(
            "file",
            reqwest::blocking::multipart::Part::bytes(wav)
                .file_name("utterance.wav")
                .mime_str("audio/wav")
                .map_err(|e| Error::Stt(e.to_string()))?,
        )
        .text("model", api.stt_model.clone())
        .text("language", primary_subtag(&api.language));

    let response = client
        .post(format!("{}/audio/transcriptions", api.api_base))
        .bearer_auth(&api.api_key)
        .multipart(form)
        .send()?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().unwrap_or_default();
        return Err(Error::Stt(format!("STT error {status}: {body}")));
    }

    let result: TranscriptionResponse = response.json()?;
    Ok(result.text)
}

/// Primary subtag of a BCP 47 tag ("en-GB" → "en")
fn primary_subtag(language: &str) -> String {
    language
        .split(['-', '_'])
        .next()
        .unwrap_or(language)
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_subtag_strips_region() {
        assert_eq!(primary_subtag("en-GB"), "en");
        assert_eq!(primary_subtag("cy_GB"), "cy");
        assert_eq!(primary_subtag("en"), "en");
    }
}
