//! No-op speech adapters
//!
//! Used when the hosting environment has no synthesis or recognition
//! capability: the agent silently degrades to text-only operation.

use tokio::sync::mpsc;

use super::{
    InputEventReceiver, InputEventSender, OutputEventReceiver, OutputEventSender,
    SpeechInputPort, SpeechOutputPort, VoiceProfile,
};

/// Speech output port that does nothing
pub struct NoopSpeechOutput {
    // Held so the controller's receiver never observes a closed channel.
    _events: OutputEventSender,
}

impl NoopSpeechOutput {
    /// Create the adapter and its (silent) event channel
    #[must_use]
    pub fn with_receiver() -> (Self, OutputEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { _events: tx }, rx)
    }
}

impl SpeechOutputPort for NoopSpeechOutput {
    fn speak(&mut self, _text: &str) -> bool {
        false
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }

    fn voice(&self) -> Option<VoiceProfile> {
        None
    }
}

/// Speech input port that does nothing
pub struct NoopSpeechInput {
    _events: InputEventSender,
}

impl NoopSpeechInput {
    /// Create the adapter and its (silent) event channel
    #[must_use]
    pub fn with_receiver() -> (Self, InputEventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { _events: tx }, rx)
    }
}

impl SpeechInputPort for NoopSpeechInput {
    fn start_listening(&mut self) {}

    fn stop_listening(&mut self) {}

    fn is_listening(&self) -> bool {
        false
    }
}
