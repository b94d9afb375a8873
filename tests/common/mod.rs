//! Shared test doubles
//!
//! Scripted speech ports and stub completion services so controller scenarios
//! run without audio hardware or a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use orion_agent::speech::{
    InputEvent, InputEventReceiver, InputEventSender, OutputEvent, OutputEventReceiver,
    OutputEventSender, SpeechInputPort, SpeechOutputPort, VoiceProfile,
};
use orion_agent::{
    AgentConfig, CompletionService, ControllerCommand, ControllerEvent, ControllerHandle, Error,
    InteractionController, InteractionState, Result, Turn,
};

/// Output port that records spoken text and completes synthesis instantly
pub struct RecordingOutput {
    spoken: Arc<Mutex<Vec<String>>>,
    events: OutputEventSender,
}

impl RecordingOutput {
    pub fn with_receiver() -> (Self, OutputEventReceiver, Arc<Mutex<Vec<String>>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let spoken = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                spoken: Arc::clone(&spoken),
                events: tx,
            },
            rx,
            spoken,
        )
    }
}

impl SpeechOutputPort for RecordingOutput {
    fn speak(&mut self, text: &str) -> bool {
        self.spoken.lock().unwrap().push(text.to_string());
        // Synthesis is instantaneous in tests.
        let _ = self.events.send(OutputEvent::Finished);
        true
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }

    fn voice(&self) -> Option<VoiceProfile> {
        None
    }
}

/// Hand the test a way to emit recognition results
#[derive(Clone)]
pub struct ScriptedMic {
    listening: Arc<AtomicBool>,
    events: InputEventSender,
}

impl ScriptedMic {
    /// Deliver one recognized utterance with single-shot semantics
    pub fn utter(&self, transcript: &str) {
        let _ = self
            .events
            .send(InputEvent::Utterance(transcript.to_string()));
        self.listening.store(false, Ordering::SeqCst);
        let _ = self.events.send(InputEvent::Ended);
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Input port controlled by a [`ScriptedMic`]
pub struct ScriptedInput {
    listening: Arc<AtomicBool>,
}

impl ScriptedInput {
    pub fn with_receiver() -> (Self, InputEventReceiver, ScriptedMic) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listening = Arc::new(AtomicBool::new(false));
        (
            Self {
                listening: Arc::clone(&listening),
            },
            rx,
            ScriptedMic {
                listening,
                events: tx,
            },
        )
    }
}

impl SpeechInputPort for ScriptedInput {
    fn start_listening(&mut self) {
        self.listening.store(true, Ordering::SeqCst);
    }

    fn stop_listening(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Completion stub that replies (or fails) immediately and records requests
pub struct StubCompletion {
    reply: Option<String>,
    pub requests: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl StubCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.requests.lock().unwrap().push(turns.to_vec());
        self.reply
            .clone()
            .ok_or_else(|| Error::Remote("connection refused".to_string()))
    }
}

/// Completion stub that holds every request until released
pub struct GatedCompletion {
    reply: String,
    gate: tokio::sync::Semaphore,
    pub requests: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl GatedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            gate: tokio::sync::Semaphore::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Let one pending (or the next) request resolve
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl CompletionService for GatedCompletion {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        self.requests.lock().unwrap().push(turns.to_vec());
        self.gate
            .acquire()
            .await
            .expect("gate closed")
            .forget();
        Ok(self.reply.clone())
    }
}

/// A controller wired to scripted ports, running on its own task
pub struct Harness {
    pub handle: ControllerHandle,
    pub events: mpsc::UnboundedReceiver<ControllerEvent>,
    pub mic: ScriptedMic,
    pub spoken: Arc<Mutex<Vec<String>>>,
    task: Option<tokio::task::JoinHandle<InteractionController>>,
}

impl Harness {
    pub fn spawn(remote: Option<Arc<dyn CompletionService>>) -> Self {
        Self::spawn_with_config(AgentConfig::default(), remote)
    }

    pub fn spawn_with_config(
        config: AgentConfig,
        remote: Option<Arc<dyn CompletionService>>,
    ) -> Self {
        let (output, output_rx, spoken) = RecordingOutput::with_receiver();
        let (input, input_rx, mic) = ScriptedInput::with_receiver();

        let (mut controller, handle, events) = InteractionController::new(
            config,
            Box::new(output),
            output_rx,
            Box::new(input),
            input_rx,
            remote,
        );

        let task = tokio::spawn(async move {
            controller.run().await;
            controller
        });

        Self {
            handle,
            events,
            mic,
            spoken,
            task: Some(task),
        }
    }

    /// Next controller event, bounded by a timeout
    pub async fn next_event(&mut self) -> ControllerEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for controller event")
            .expect("controller event channel closed")
    }

    /// Consume events until the given state is reached, returning everything
    /// seen along the way (inclusive)
    pub async fn wait_for_state(&mut self, target: InteractionState) -> Vec<ControllerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next_event().await;
            let done = matches!(event, ControllerEvent::StateChanged(s) if s == target);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    /// Consume events until a turn is appended, returning it
    pub async fn wait_for_turn(&mut self) -> Turn {
        loop {
            if let ControllerEvent::TurnAppended(turn) = self.next_event().await {
                return turn;
            }
        }
    }

    /// Shut the controller down and hand it back for inspection
    pub async fn shutdown(&mut self) -> InteractionController {
        self.handle.send(ControllerCommand::Shutdown).await;
        self.task
            .take()
            .expect("controller already shut down")
            .await
            .expect("controller task panicked")
    }
}
