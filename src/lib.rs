//! Orion - conversational voice-agent front-end
//!
//! This library binds microphone input, text-to-speech output, a wake-word
//! gate, a local command interpreter, and a remote language-model fallback
//! into one interactive loop:
//! - Speech capability ports with platform and no-op adapters
//! - Command routing (wake-word trigger, local commands, remote queries)
//! - Append-only conversation log
//! - The interaction controller state machine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Rendering layer                      │
//! │   typed text  │  mic button  │  transcript view     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ commands / events
//! ┌────────────────────▼────────────────────────────────┐
//! │             Interaction Controller                   │
//! │   state machine  │  router  │  conversation log     │
//! └───────┬──────────────┬───────────────┬──────────────┘
//!         │              │               │
//! ┌───────▼──────┐ ┌─────▼───────┐ ┌─────▼──────────────┐
//! │ SpeechInput  │ │ SpeechOutput│ │ CompletionService  │
//! │ (mic + STT)  │ │ (TTS + out) │ │ (remote LLM relay) │
//! └──────────────┘ └─────────────┘ └────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod remote;
pub mod router;
pub mod speech;

pub use config::AgentConfig;
pub use controller::{
    ControllerCommand, ControllerEvent, ControllerHandle, InteractionController, InteractionState,
};
pub use conversation::{ConversationLog, Role, Turn};
pub use error::{Error, Result};
pub use remote::{CompletionService, HttpCompletionService};
pub use router::{Classification, ClassifyContext, CommandAction, CommandRouter};
pub use speech::{
    HttpSpeechInput, HttpSpeechOutput, InputEvent, NoopSpeechInput, NoopSpeechOutput, OutputEvent,
    SpeechApiConfig, SpeechInputPort, SpeechOutputPort, SynthesisVoice, VoiceProfile,
    select_preferred_voice,
};
