//! Command routing
//!
//! Classifies a recognized utterance as a wake-word trigger, a local command,
//! or a query for the remote completion service.

/// Side effect requested by a local command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Open the configured dashboard URL in the rendering layer
    OpenDashboard,
}

/// Outcome of classifying one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The utterance contained the wake word while the agent was armed for it
    Trigger,
    /// The utterance matched a local command
    LocalReply {
        /// Canned reply to append and speak
        reply: String,
        /// Optional side effect to dispatch alongside the reply
        action: Option<CommandAction>,
    },
    /// Forward the full transcript to the remote completion service
    Remote,
}

/// Context the controller supplies for classification
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    /// Whether the mic was armed in wake-word mode when this utterance arrived
    pub awaiting_wake: bool,
}

/// A local command rule: substring pattern, canned reply, optional action
struct LocalCommand {
    pattern: &'static str,
    reply: &'static str,
    action: Option<CommandAction>,
}

/// Fixed local command table, checked in priority order, first match wins
const LOCAL_COMMANDS: &[LocalCommand] = &[
    LocalCommand {
        pattern: "status report",
        reply: "Empire status nominal. Funnels online. Awaiting next directive.",
        action: None,
    },
    LocalCommand {
        pattern: "open dashboard",
        reply: "Opening the dashboard.",
        action: Some(CommandAction::OpenDashboard),
    },
    LocalCommand {
        pattern: "for the empire",
        reply: "For the Empire. Profit is Law.",
        action: None,
    },
];

/// Classifies utterances against the wake word and the local command table
pub struct CommandRouter {
    wake_word: String,
}

impl CommandRouter {
    /// Create a router for the given wake word
    ///
    /// The wake word is matched case-insensitively as a substring; it is
    /// normalized once here.
    #[must_use]
    pub fn new(wake_word: &str) -> Self {
        Self {
            wake_word: wake_word.trim().to_lowercase(),
        }
    }

    /// The normalized wake word
    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    /// Classify one non-empty utterance
    ///
    /// Order: wake-word trigger (only when armed for it), then the local
    /// command table in priority order, then `Remote`. Callers drop
    /// empty/whitespace utterances before classification; no pattern can
    /// match one.
    #[must_use]
    pub fn classify(&self, utterance: &str, ctx: ClassifyContext) -> Classification {
        let lowered = utterance.to_lowercase();

        if ctx.awaiting_wake && !self.wake_word.is_empty() && lowered.contains(&self.wake_word) {
            tracing::debug!(wake_word = %self.wake_word, "wake word trigger");
            return Classification::Trigger;
        }

        for command in LOCAL_COMMANDS {
            if lowered.contains(command.pattern) {
                tracing::debug!(pattern = command.pattern, "local command matched");
                return Classification::LocalReply {
                    reply: command.reply.to_string(),
                    action: command.action,
                };
            }
        }

        Classification::Remote
    }
}
