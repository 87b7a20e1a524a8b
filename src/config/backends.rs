//! Backend routing configuration
//!
//! Each `[[apis]]` entry describes one OpenAI-compatible upstream together
//! with the model id clients see and the model id sent upstream.

use serde::Deserialize;

use super::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// Stream Mode
// ─────────────────────────────────────────────────────────────────────────────

/// Per-backend policy for the outbound `stream` flag
///
/// In the config file this is an optional boolean:
/// - absent: keep whatever the client sent
/// - `true`: always stream
/// - `false`: never stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamMode {
    #[default]
    Unset,
    ForceTrue,
    ForceFalse,
}

impl StreamMode {
    /// Map the config file's optional boolean
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(true) => Self::ForceTrue,
            Some(false) => Self::ForceFalse,
        }
    }

    /// Inverse of [`StreamMode::from_flag`], for TOML serialization
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::ForceTrue => Some(true),
            Self::ForceFalse => Some(false),
        }
    }

    /// Short label for logs and the startup banner
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "client",
            Self::ForceTrue => "forced on",
            Self::ForceFalse => "forced off",
        }
    }
}

impl std::str::FromStr for StreamMode {
    type Err = String;

    /// Command-line form: `true`, `false` or `none`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Self::ForceTrue),
            "false" => Ok(Self::ForceFalse),
            "none" => Ok(Self::Unset),
            other => Err(format!("expected true, false or none (got {other:?})")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Entry
// ─────────────────────────────────────────────────────────────────────────────

/// One configured upstream chat-completion API
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEntry {
    /// Display label
    pub name: String,
    /// Base URL; `/v1/chat/completions` is appended when forwarding
    pub endpoint: String,
    /// Model id clients request and see in responses
    pub custom_model_id: String,
    /// Model id actually sent upstream
    pub target_model_id: String,
    /// Outbound `stream` override
    pub stream_mode: StreamMode,
    /// Whether the entry takes part in selection and `/v1/models`
    pub active: bool,
    /// Present buffered upstream replies as an SSE stream when the client asked
    /// for streaming but the outbound request was non-streaming
    pub simulate_stream: bool,
}

/// Backend entry as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileBackend {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub custom_model_id: String,
    #[serde(default)]
    pub target_model_id: String,
    pub stream_mode: Option<bool>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub simulate_stream: bool,
}

impl BackendEntry {
    /// Create from file config
    pub fn from_file(file: FileBackend) -> Self {
        Self {
            name: file.name,
            endpoint: file.endpoint,
            custom_model_id: file.custom_model_id,
            target_model_id: file.target_model_id,
            stream_mode: StreamMode::from_flag(file.stream_mode),
            active: file.active,
            simulate_stream: file.simulate_stream,
        }
    }

    /// Full upstream URL for chat completions
    ///
    /// A trailing slash on the endpoint is tolerated.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    pub(super) fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let required = [
            ("name", &self.name),
            ("endpoint", &self.endpoint),
            ("custom_model_id", &self.custom_model_id),
            ("target_model_id", &self.target_model_id),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { index, field });
            }
        }
        Ok(())
    }
}
