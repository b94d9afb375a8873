//! Remote completion service
//!
//! The boundary to the remote language model: one request/response exchange
//! carrying the full ordered transcript. Credentials live behind the remote
//! endpoint; the core never sees them.

use async_trait::async_trait;
use std::time::Duration;

use crate::conversation::Turn;
use crate::{Error, Result};

/// Reply used when the service returns no text
const EMPTY_REPLY_FALLBACK: &str = "Done.";

/// HTTP timeout for a completion exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque completion collaborator
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce a reply for the ordered transcript
    ///
    /// # Errors
    ///
    /// Returns error if the exchange fails or the response is malformed.
    async fn complete(&self, turns: &[Turn]) -> Result<String>;
}

/// One message on the wire
#[derive(serde::Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Request body for the completion endpoint
#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<WireMessage<'a>>,
}

/// Response body from the completion endpoint
#[derive(serde::Deserialize)]
struct CompletionResponse {
    reply: Option<String>,
}

/// HTTP implementation of the completion boundary
pub struct HttpCompletionService {
    client: reqwest::Client,
    endpoint: String,
    preamble: String,
}

impl HttpCompletionService {
    /// Create a client for the given endpoint
    ///
    /// The fixed system preamble is prepended to every request; it is derived
    /// from the agent's display name.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, agent_name: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            preamble: format!(
                "You are {agent_name}, a concise voice agent for a private digital empire. \
                 Keep replies short and actionable."
            ),
        })
    }

    /// The system preamble sent with every request
    #[must_use]
    pub fn preamble(&self) -> &str {
        &self.preamble
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: &self.preamble,
        });
        messages.extend(turns.iter().map(|t| WireMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));

        tracing::debug!(endpoint = %self.endpoint, turns = turns.len(), "completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&CompletionRequest { messages })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!("completion error {status}: {body}")));
        }

        let result: CompletionResponse = response.json().await?;
        let reply = result
            .reply
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());

        tracing::debug!(reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}

// Keep the wire shape honest: the remote service sees lowercase role names in
// causal order, system preamble first.
#[cfg(test)]
mod tests {
    use super::*;

    fn wire_json(service: &HttpCompletionService, turns: &[Turn]) -> serde_json::Value {
        let mut messages = vec![WireMessage {
            role: "system",
            content: service.preamble(),
        }];
        messages.extend(turns.iter().map(|t| WireMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));
        serde_json::to_value(CompletionRequest { messages }).unwrap()
    }

    #[test]
    fn preamble_carries_agent_name() {
        let service = HttpCompletionService::new("http://localhost/api", "Orion").unwrap();
        assert!(service.preamble().starts_with("You are Orion,"));
    }

    #[test]
    fn request_shape_preserves_order() {
        let service = HttpCompletionService::new("http://localhost/api", "Orion").unwrap();
        let turns = vec![
            Turn::assistant("Ready when you are."),
            Turn::user("how are the funnels"),
        ];

        let value = wire_json(&service, &turns);
        let messages = value["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "how are the funnels");
    }
}
