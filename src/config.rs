//! Agent configuration
//!
//! Built once before the controller is constructed and immutable thereafter:
//! defaults, then an optional TOML file, then environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::speech::SpeechApiConfig;
use crate::{Error, Result};

/// Configuration surface for one agent instance
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Display name
    pub name: String,

    /// Avatar reference for the rendering layer
    pub avatar: Option<String>,

    /// Wake word (case-insensitive literal; empty disables wake gating)
    pub wake_word: String,

    /// Remote completion endpoint; absence degrades remote queries to a
    /// fixed local acknowledgment
    pub endpoint: Option<String>,

    /// Initial greeting, seeded as the first assistant turn
    pub greeting: String,

    /// Recognition / voice-preference language (BCP 47)
    pub language: String,

    /// Navigation target for the dashboard command
    pub dashboard_url: String,

    /// Speech API settings for the HTTP adapters
    pub speech: SpeechApiConfig,
}

/// Optional overrides read from the TOML config file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    name: Option<String>,
    avatar: Option<String>,
    wake_word: Option<String>,
    endpoint: Option<String>,
    greeting: Option<String>,
    language: Option<String>,
    dashboard_url: Option<String>,
    #[serde(default)]
    speech: SpeechFileSection,
}

#[derive(Debug, Default, Deserialize)]
struct SpeechFileSection {
    api_base: Option<String>,
    tts_model: Option<String>,
    stt_model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Orion".to_string(),
            avatar: None,
            wake_word: "orion".to_string(),
            endpoint: None,
            greeting: "Ready when you are. For the Empire.".to_string(),
            language: "en-GB".to_string(),
            dashboard_url: "https://empirecontrol.live".to_string(),
            speech: SpeechApiConfig {
                api_base: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                tts_model: "tts-1".to_string(),
                stt_model: "whisper-1".to_string(),
                language: "en-GB".to_string(),
            },
        }
    }
}

impl AgentConfig {
    /// Build the configuration: defaults, config file, environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given config file cannot be read or
    /// parsed, or if validation fails.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                config.apply_file(toml::from_str(&content)?);
                tracing::info!(path = %path.display(), "loaded config file");
            }
            None => {
                if let Some(path) = default_config_path()
                    && path.exists()
                    && let Ok(content) = std::fs::read_to_string(&path)
                {
                    match toml::from_str(&content) {
                        Ok(file) => {
                            config.apply_file(file);
                            tracing::info!(path = %path.display(), "loaded config file");
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "ignoring malformed config file"
                            );
                        }
                    }
                }
            }
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the config file
    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(name) = file.name {
            self.name = name;
        }
        if file.avatar.is_some() {
            self.avatar = file.avatar;
        }
        if let Some(wake_word) = file.wake_word {
            self.wake_word = wake_word;
        }
        if file.endpoint.is_some() {
            self.endpoint = file.endpoint;
        }
        if let Some(greeting) = file.greeting {
            self.greeting = greeting;
        }
        if let Some(language) = file.language {
            self.language = language.clone();
            self.speech.language = language;
        }
        if let Some(dashboard_url) = file.dashboard_url {
            self.dashboard_url = dashboard_url;
        }
        if let Some(api_base) = file.speech.api_base {
            self.speech.api_base = api_base;
        }
        if let Some(tts_model) = file.speech.tts_model {
            self.speech.tts_model = tts_model;
        }
        if let Some(stt_model) = file.speech.stt_model {
            self.speech.stt_model = stt_model;
        }
    }

    /// Overlay values from the environment
    fn apply_env(&mut self) {
        if let Ok(name) = std::env::var("ORION_NAME") {
            self.name = name;
        }
        if let Ok(avatar) = std::env::var("ORION_AVATAR") {
            self.avatar = Some(avatar);
        }
        if let Ok(wake_word) = std::env::var("ORION_WAKE_WORD") {
            self.wake_word = wake_word;
        }
        if let Ok(endpoint) = std::env::var("ORION_ENDPOINT") {
            self.endpoint = (!endpoint.is_empty()).then_some(endpoint);
        }
        if let Ok(greeting) = std::env::var("ORION_GREETING") {
            self.greeting = greeting;
        }
        if let Ok(language) = std::env::var("ORION_LANGUAGE") {
            self.language = language.clone();
            self.speech.language = language;
        }
        if let Ok(dashboard_url) = std::env::var("ORION_DASHBOARD_URL") {
            self.dashboard_url = dashboard_url;
        }
        if let Ok(api_base) = std::env::var("ORION_SPEECH_API_BASE") {
            self.speech.api_base = api_base;
        }
        if let Ok(key) = std::env::var("ORION_SPEECH_API_KEY") {
            self.speech.api_key = key;
        } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.speech.api_key = key;
        }
        if let Ok(tts_model) = std::env::var("ORION_TTS_MODEL") {
            self.speech.tts_model = tts_model;
        }
        if let Ok(stt_model) = std::env::var("ORION_STT_MODEL") {
            self.speech.stt_model = stt_model;
        }
    }

    /// Validate URLs and normalize the wake word
    fn validate(&mut self) -> Result<()> {
        self.wake_word = self.wake_word.trim().to_lowercase();

        if self.name.trim().is_empty() {
            return Err(Error::Config("agent name must not be empty".to_string()));
        }

        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("invalid endpoint URL: {e}")))?;
        }

        url::Url::parse(&self.dashboard_url)
            .map_err(|e| Error::Config(format!("invalid dashboard URL: {e}")))?;

        Ok(())
    }
}

/// Default config file location (`~/.config/orion/agent.toml` on Linux)
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "orion", "orion")
        .map(|dirs| dirs.config_dir().join("agent.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let mut config = AgentConfig::default();
        config.validate().unwrap();

        assert_eq!(config.name, "Orion");
        assert_eq!(config.wake_word, "orion");
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn file_overlay() {
        let file: ConfigFile = toml::from_str(
            r#"
            name = "Lyra"
            wake_word = "Lyra"
            endpoint = "https://relay.example/api/orion"

            [speech]
            stt_model = "whisper-large"
            "#,
        )
        .unwrap();

        let mut config = AgentConfig::default();
        config.apply_file(file);
        config.validate().unwrap();

        assert_eq!(config.name, "Lyra");
        assert_eq!(config.wake_word, "lyra");
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://relay.example/api/orion")
        );
        assert_eq!(config.speech.stt_model, "whisper-large");
        // Untouched fields keep defaults
        assert_eq!(config.speech.tts_model, "tts-1");
    }

    #[test]
    fn language_flows_to_speech_settings() {
        let file: ConfigFile = toml::from_str(r#"language = "cy-GB""#).unwrap();

        let mut config = AgentConfig::default();
        config.apply_file(file);

        assert_eq!(config.language, "cy-GB");
        assert_eq!(config.speech.language, "cy-GB");
    }

    #[test]
    fn invalid_endpoint_rejected() {
        let mut config = AgentConfig {
            endpoint: Some("not a url".to_string()),
            ..AgentConfig::default()
        };

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn empty_name_rejected() {
        let mut config = AgentConfig {
            name: "   ".to_string(),
            ..AgentConfig::default()
        };

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn wake_word_normalized() {
        let mut config = AgentConfig {
            wake_word: "  OrIoN  ".to_string(),
            ..AgentConfig::default()
        };
        config.validate().unwrap();

        assert_eq!(config.wake_word, "orion");
    }
}
