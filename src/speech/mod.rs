//! Speech capability ports
//!
//! The controller never touches a platform speech stack directly; it talks to
//! two injected ports. Each port gets one persistent event channel,
//! established at construction and held for the controller's lifetime.

mod capture;
mod endpoint;
mod http;
mod noop;
mod playback;
mod voice;

use tokio::sync::mpsc;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use endpoint::UtteranceEndpointer;
pub use http::{HttpSpeechInput, HttpSpeechOutput, SpeechApiConfig};
pub use noop::{NoopSpeechInput, NoopSpeechOutput};
pub use playback::AudioPlayback;
pub use voice::{SynthesisVoice, VoiceProfile, select_preferred_voice};

/// Events emitted by a speech output driver
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// Synthesis of the current utterance completed (not raised on cancel)
    Finished,
    /// The voice catalog arrived or changed and a new voice was selected
    VoiceChanged(VoiceProfile),
}

/// Events emitted by a speech input driver
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// One recognized utterance (raw transcript, untrimmed)
    Utterance(String),
    /// The single-shot listen ended (after an utterance, on cancel, or on
    /// failure)
    Ended,
}

/// Sender half of a port's event channel
pub type OutputEventSender = mpsc::UnboundedSender<OutputEvent>;
/// Receiver half of a port's event channel
pub type OutputEventReceiver = mpsc::UnboundedReceiver<OutputEvent>;
/// Sender half of a port's event channel
pub type InputEventSender = mpsc::UnboundedSender<InputEvent>;
/// Receiver half of a port's event channel
pub type InputEventReceiver = mpsc::UnboundedReceiver<InputEvent>;

/// Text-to-speech capability
///
/// All operations are non-blocking: `speak` begins synthesis and completion
/// arrives as [`OutputEvent::Finished`] on the port's event channel.
pub trait SpeechOutputPort: Send {
    /// Begin synthesizing `text`, cancelling any utterance in flight
    ///
    /// Returns false when no synthesis capability exists; the caller treats
    /// the utterance as completed immediately.
    fn speak(&mut self, text: &str) -> bool;

    /// Stop any in-progress utterance and reset the speaking flag
    ///
    /// No-op when nothing is speaking.
    fn cancel(&mut self);

    /// Whether an utterance is currently being synthesized or played
    fn is_speaking(&self) -> bool;

    /// The currently selected voice, if any
    fn voice(&self) -> Option<VoiceProfile>;
}

/// Speech-to-text capability
///
/// Listening is single-shot: one recognized utterance per start, delivered as
/// [`InputEvent::Utterance`] followed by [`InputEvent::Ended`].
pub trait SpeechInputPort: Send {
    /// Arm the microphone for one utterance
    ///
    /// No-op while already listening or when no recognition capability
    /// exists. Platform failures are swallowed; the driver reverts to
    /// not-listening and emits [`InputEvent::Ended`].
    fn start_listening(&mut self);

    /// Cancel a pending listen
    fn stop_listening(&mut self);

    /// Whether the microphone is currently armed
    fn is_listening(&self) -> bool;
}
