//! Interaction controller
//!
//! The state machine that arbitrates between listening, speaking, and idle.
//! All transitions happen on the controller's event loop in reaction to
//! rendering commands, speech driver events, and resolved remote calls; the
//! conversation log has exactly one writer.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::AgentConfig;
use crate::conversation::{ConversationLog, Role, Turn};
use crate::remote::CompletionService;
use crate::router::{Classification, ClassifyContext, CommandAction, CommandRouter};
use crate::speech::{
    InputEvent, InputEventReceiver, OutputEvent, OutputEventReceiver, SpeechInputPort,
    SpeechOutputPort, VoiceProfile,
};

/// Assistant turn appended on a wake-word trigger
const WAKE_ACK_TURN: &str = "Listening…";

/// Acknowledgment spoken on a wake-word trigger
const WAKE_ACK_SPOKEN: &str = "I'm listening.";

/// Assistant turn appended when a remote call fails; never spoken
const REMOTE_FALLBACK: &str = "Network error. Using local brain only.";

/// Reply when no remote endpoint is configured
const NO_ENDPOINT_REPLY: &str = "Noted. I will handle it.";

/// Spoken by the standby toggle
const STANDBY_REPLY: &str = "On standby.";

/// Last-assistant-turn marker that suppresses wake gating (an open question
/// is already pending)
const OPEN_QUESTION_MARKER: &str = "how can i help";

/// Rendering-command channel depth
const COMMAND_BUFFER: usize = 32;

/// The one state the controller is in at any instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InteractionState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Mic armed for one utterance
    Listening,
    /// Mic armed, next utterance is wake-word gated
    AwaitingWake,
    /// One utterance is being classified or awaiting its remote reply
    Processing,
    /// An assistant reply is being synthesized
    Speaking,
}

impl InteractionState {
    /// Whether the mic is armed (`AwaitingWake` is a listening sub-mode)
    #[must_use]
    pub const fn is_listening(self) -> bool {
        matches!(self, Self::Listening | Self::AwaitingWake)
    }

    /// Whether nothing is in flight
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a turn is being resolved
    #[must_use]
    pub const fn is_processing(self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Whether a reply is being spoken
    #[must_use]
    pub const fn is_speaking(self) -> bool {
        matches!(self, Self::Speaking)
    }
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Listening => write!(f, "Listening"),
            Self::AwaitingWake => write!(f, "AwaitingWake"),
            Self::Processing => write!(f, "Processing"),
            Self::Speaking => write!(f, "Speaking"),
        }
    }
}

/// Commands from the rendering layer
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Arm the microphone
    StartListening,
    /// Cancel a pending listen
    StopListening,
    /// User-typed text submission
    SubmitText(String),
    /// Explicit cancellation: silence speech, halt any pending listen
    Stop,
    /// Speak/stop toggle: cancel if speaking, else speak the standby line
    Standby,
    /// Whether the rendering layer's text entry holds a draft
    DraftChanged(bool),
    /// Tear down both drivers and end the loop
    Shutdown,
}

/// Events for the rendering layer
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// The interaction state changed
    StateChanged(InteractionState),
    /// A turn was appended to the conversation log
    TurnAppended(Turn),
    /// The synthesis voice was (re)selected
    VoiceChanged(VoiceProfile),
    /// A local command requested navigation
    OpenUrl(String),
}

/// Where a submission came from; only armed voice utterances are
/// wake-eligible
#[derive(Debug, Clone, Copy)]
enum InputSource {
    Voice { awaiting_wake: bool },
    Typed,
}

/// A resolved remote call, tagged with the generation it was issued under
struct RemoteOutcome {
    generation: u64,
    result: crate::Result<String>,
}

/// Cloneable command sender for the rendering layer
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    /// Send a command from an async context
    pub async fn send(&self, command: ControllerCommand) {
        if self.commands.send(command).await.is_err() {
            tracing::debug!("controller is gone, command dropped");
        }
    }

    /// Send a command from a plain thread (stdin reader, signal handler)
    pub fn send_blocking(&self, command: ControllerCommand) {
        if self.commands.blocking_send(command).is_err() {
            tracing::debug!("controller is gone, command dropped");
        }
    }
}

/// The interaction controller
pub struct InteractionController {
    config: AgentConfig,
    router: CommandRouter,
    remote: Option<Arc<dyn CompletionService>>,
    output: Box<dyn SpeechOutputPort>,
    input: Box<dyn SpeechInputPort>,

    state: InteractionState,
    log: ConversationLog,
    voice: Option<VoiceProfile>,

    /// Bumped on every explicit stop; remote outcomes from older generations
    /// are appended but never spoken
    generation: u64,
    draft_active: bool,
    /// Set on a wake trigger: re-arm the mic when the acknowledgment finishes
    rearm_after_speech: bool,
    /// Submissions that arrived while a turn was processing, FIFO
    queued: VecDeque<String>,

    command_rx: mpsc::Receiver<ControllerCommand>,
    input_rx: InputEventReceiver,
    output_rx: OutputEventReceiver,
    outcome_tx: mpsc::UnboundedSender<RemoteOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<RemoteOutcome>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl InteractionController {
    /// Construct the controller with its injected capabilities
    ///
    /// The driver event channels are the ports' persistent subscriptions,
    /// established once here and held until disposal. The configured greeting
    /// is seeded as the first assistant turn (not spoken).
    #[must_use]
    pub fn new(
        config: AgentConfig,
        output: Box<dyn SpeechOutputPort>,
        output_rx: OutputEventReceiver,
        input: Box<dyn SpeechInputPort>,
        input_rx: InputEventReceiver,
        remote: Option<Arc<dyn CompletionService>>,
    ) -> (
        Self,
        ControllerHandle,
        mpsc::UnboundedReceiver<ControllerEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let router = CommandRouter::new(&config.wake_word);

        let mut controller = Self {
            router,
            remote,
            output,
            input,
            state: InteractionState::Idle,
            log: ConversationLog::new(),
            voice: None,
            generation: 0,
            draft_active: false,
            rearm_after_speech: false,
            queued: VecDeque::new(),
            command_rx,
            input_rx,
            output_rx,
            outcome_tx,
            outcome_rx,
            events_tx,
            config,
        };

        controller.append_turn(Turn::assistant(controller.config.greeting.clone()));

        (
            controller,
            ControllerHandle {
                commands: command_tx,
            },
            events_rx,
        )
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> InteractionState {
        self.state
    }

    /// Read-only view of the conversation so far
    #[must_use]
    pub fn transcript(&self) -> &[Turn] {
        self.log.all()
    }

    /// Currently selected voice, if the output driver reported one
    #[must_use]
    pub const fn voice(&self) -> Option<&VoiceProfile> {
        self.voice.as_ref()
    }

    /// Run the event loop until shutdown
    ///
    /// Biased toward rendering commands so explicit cancellation always wins
    /// over driver events that raced with it.
    pub async fn run(&mut self) {
        tracing::info!(
            agent = %self.config.name,
            wake_word = %self.router.wake_word(),
            remote = self.remote.is_some(),
            "controller running"
        );

        loop {
            tokio::select! {
                biased;
                command = self.command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(outcome) = self.outcome_rx.recv() => self.handle_remote_outcome(outcome),
                Some(event) = self.input_rx.recv() => self.handle_input_event(event),
                Some(event) = self.output_rx.recv() => self.handle_output_event(event),
            }
        }

        tracing::info!("controller stopped");
    }

    /// Apply one rendering command; false ends the loop
    fn handle_command(&mut self, command: ControllerCommand) -> bool {
        match command {
            ControllerCommand::StartListening => match self.state {
                InteractionState::Idle | InteractionState::Speaking => self.arm_listening(),
                InteractionState::Processing => {
                    // The prior turn's reply has not been appended yet.
                    tracing::debug!("mic refused while a turn is processing");
                }
                InteractionState::Listening | InteractionState::AwaitingWake => {}
            },
            ControllerCommand::StopListening => {
                self.input.stop_listening();
                if self.state.is_listening() {
                    self.set_state(InteractionState::Idle);
                }
            }
            ControllerCommand::SubmitText(text) => {
                self.handle_submission(text, InputSource::Typed);
            }
            ControllerCommand::Stop => self.silence(),
            ControllerCommand::Standby => self.handle_standby(),
            ControllerCommand::DraftChanged(active) => self.draft_active = active,
            ControllerCommand::Shutdown => {
                self.silence();
                return false;
            }
        }
        true
    }

    /// Explicit cancellation: always wins, tears down both drivers
    ///
    /// An in-flight remote request is not canceled; bumping the generation
    /// silences its eventual reply instead.
    fn silence(&mut self) {
        self.generation += 1;
        self.queued.clear();
        self.rearm_after_speech = false;
        self.output.cancel();
        self.input.stop_listening();
        if !self.state.is_idle() {
            self.set_state(InteractionState::Idle);
        }
    }

    /// Speak/stop toggle from the rendering layer
    fn handle_standby(&mut self) {
        if self.output.is_speaking() {
            self.output.cancel();
            if self.state.is_speaking() {
                self.set_state(InteractionState::Idle);
            }
        } else if self.state.is_processing() {
            tracing::debug!("standby refused while a turn is processing");
        } else {
            self.begin_speaking(STANDBY_REPLY);
        }
    }

    /// Arm the mic, choosing the wake-gated sub-mode when eligible
    fn arm_listening(&mut self) {
        // Entering a listening state silences any reply still playing.
        if self.output.is_speaking() {
            self.output.cancel();
        }
        self.rearm_after_speech = false;

        let awaiting = self.wake_eligible();
        self.input.start_listening();

        if self.input.is_listening() {
            self.set_state(if awaiting {
                InteractionState::AwaitingWake
            } else {
                InteractionState::Listening
            });
        } else if !self.state.is_idle() {
            // No recognition capability or the platform rejected the start:
            // the mic indicator reverts, nothing else surfaces.
            self.set_state(InteractionState::Idle);
        }
    }

    /// Whether the next armed utterance should be wake-word gated
    fn wake_eligible(&self) -> bool {
        if self.router.wake_word().is_empty() || self.draft_active || !self.queued.is_empty() {
            return false;
        }

        !self.log.last().is_some_and(|turn| {
            turn.role == Role::Assistant
                && turn.content.to_lowercase().contains(OPEN_QUESTION_MARKER)
        })
    }

    /// React to a speech input driver event
    fn handle_input_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::Utterance(raw) => {
                // A transcript is only meaningful while the mic is armed or a
                // turn is processing (then it queues); anything else is a
                // stale result racing a cancellation.
                if !self.state.is_listening() && !self.state.is_processing() {
                    tracing::debug!(state = %self.state, "discarding stale utterance");
                    return;
                }

                let transcript = raw.trim();
                if transcript.is_empty() {
                    if self.state.is_listening() {
                        self.set_state(InteractionState::Idle);
                    }
                    return;
                }

                let awaiting_wake = self.state == InteractionState::AwaitingWake;
                self.handle_submission(
                    transcript.to_string(),
                    InputSource::Voice { awaiting_wake },
                );
            }
            InputEvent::Ended => {
                // Natural single-shot end with no usable utterance.
                if self.state.is_listening() {
                    self.set_state(InteractionState::Idle);
                }
            }
        }
    }

    /// Classify one submission and resolve the turn
    fn handle_submission(&mut self, text: String, source: InputSource) {
        let content = text.trim().to_string();
        if content.is_empty() {
            return;
        }

        // One utterance in Processing at a time; later arrivals wait their
        // turn.
        if self.state.is_processing() {
            tracing::debug!("turn in flight, queueing submission");
            self.queued.push_back(content);
            return;
        }

        self.set_state(InteractionState::Processing);

        let ctx = ClassifyContext {
            awaiting_wake: matches!(source, InputSource::Voice { awaiting_wake: true }),
        };

        match self.router.classify(&content, ctx) {
            Classification::Trigger => {
                // The triggering utterance is not a user turn.
                self.append_turn(Turn::assistant(WAKE_ACK_TURN));
                self.rearm_after_speech = true;
                self.begin_speaking(WAKE_ACK_SPOKEN);
            }
            Classification::LocalReply { reply, action } => {
                self.append_turn(Turn::user(content));
                if let Some(action) = action {
                    self.dispatch_action(action);
                }
                self.append_turn(Turn::assistant(reply.clone()));
                self.begin_speaking(&reply);
            }
            Classification::Remote => {
                self.append_turn(Turn::user(content));
                self.issue_remote_call();
            }
        }
    }

    /// Forward the full transcript to the remote service, or degrade locally
    fn issue_remote_call(&mut self) {
        let Some(service) = self.remote.as_ref().map(Arc::clone) else {
            self.append_turn(Turn::assistant(NO_ENDPOINT_REPLY));
            self.begin_speaking(NO_ENDPOINT_REPLY);
            return;
        };

        let transcript = self.log.snapshot();
        let generation = self.generation;
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let result = service.complete(&transcript).await;
            let _ = outcome_tx.send(RemoteOutcome { generation, result });
        });
        // State stays Processing until the outcome lands.
    }

    /// React to a resolved remote call
    fn handle_remote_outcome(&mut self, outcome: RemoteOutcome) {
        let stale = outcome.generation != self.generation;

        match outcome.result {
            Ok(reply) => {
                self.append_turn(Turn::assistant(reply.clone()));
                if stale {
                    tracing::debug!("stale remote reply appended, not spoken");
                    return;
                }
                self.begin_speaking(&reply);
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote call failed");
                self.append_turn(Turn::assistant(REMOTE_FALLBACK));
                if stale {
                    return;
                }
                // Degraded mode stays quiet: the fallback is never spoken.
                self.set_state(InteractionState::Idle);
                self.drain_queued();
            }
        }
    }

    /// React to a speech output driver event
    fn handle_output_event(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::Finished => {
                if self.state.is_speaking() {
                    self.on_speech_complete();
                } else {
                    tracing::debug!(state = %self.state, "ignoring stale synthesis completion");
                }
            }
            OutputEvent::VoiceChanged(profile) => {
                tracing::info!(voice = %profile.name, "voice changed");
                self.voice = Some(profile.clone());
                self.emit(ControllerEvent::VoiceChanged(profile));
            }
        }
    }

    /// Start speaking a reply, or complete immediately without synthesis
    fn begin_speaking(&mut self, text: &str) {
        // Never speak over a live mic.
        if self.input.is_listening() {
            self.input.stop_listening();
        }

        if self.output.speak(text) {
            self.set_state(InteractionState::Speaking);
        } else {
            // Text-only host: the utterance completes instantly.
            self.on_speech_complete();
        }
    }

    /// Synthesis completed: re-arm after a wake acknowledgment, else idle
    fn on_speech_complete(&mut self) {
        if self.rearm_after_speech {
            self.rearm_after_speech = false;
            self.arm_listening();
        } else {
            self.set_state(InteractionState::Idle);
            self.drain_queued();
        }
    }

    /// Process the next queued submission, if any
    fn drain_queued(&mut self) {
        if let Some(content) = self.queued.pop_front() {
            // Queued input lost its wake context while waiting.
            self.handle_submission(content, InputSource::Voice {
                awaiting_wake: false,
            });
        }
    }

    /// Dispatch a local command side effect to the rendering layer
    fn dispatch_action(&mut self, action: CommandAction) {
        match action {
            CommandAction::OpenDashboard => {
                tracing::info!(url = %self.config.dashboard_url, "opening dashboard");
                self.emit(ControllerEvent::OpenUrl(self.config.dashboard_url.clone()));
            }
        }
    }

    /// Append a turn and notify the rendering layer
    fn append_turn(&mut self, turn: Turn) {
        self.emit(ControllerEvent::TurnAppended(turn.clone()));
        self.log.append(turn);
    }

    /// Transition, skipping no-op changes
    fn set_state(&mut self, state: InteractionState) {
        if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "state transition");
            self.state = state;
            self.emit(ControllerEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: ControllerEvent) {
        // The rendering layer may be gone during teardown.
        let _ = self.events_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_wake_is_a_listening_submode() {
        assert!(InteractionState::Listening.is_listening());
        assert!(InteractionState::AwaitingWake.is_listening());
        assert!(!InteractionState::Idle.is_listening());
        assert!(!InteractionState::Processing.is_listening());
        assert!(!InteractionState::Speaking.is_listening());
    }

    #[test]
    fn exactly_one_predicate_holds() {
        let states = [
            InteractionState::Idle,
            InteractionState::Listening,
            InteractionState::AwaitingWake,
            InteractionState::Processing,
            InteractionState::Speaking,
        ];

        for state in states {
            let flags = [
                state.is_idle(),
                state.is_listening(),
                state.is_processing(),
                state.is_speaking(),
            ];
            assert_eq!(flags.iter().filter(|&&f| f).count(), 1, "{state}");
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(InteractionState::AwaitingWake.to_string(), "AwaitingWake");
        assert_eq!(InteractionState::default().to_string(), "Idle");
    }
}
