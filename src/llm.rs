pub mod gemini;
#[cfg(feature = "local")]
pub mod local;

use thiserror::Error;

use crate::config::{Backend, GeneratorConfig};

pub use gemini::GeminiClient;
#[cfg(feature = "local")]
pub use local::LocalClient;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("api error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("local inference failed: {0}")]
    Local(String),
}

// ---------------------------------------------------------------------------
// Chat message helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.role.as_str(), self.content)
    }
}

// ---------------------------------------------------------------------------
// Completion seam
// ---------------------------------------------------------------------------

/// One blocking chat completion: messages in, raw model text out.
pub trait LlmClient {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        (**self).complete(messages)
    }
}

/// Build the client named by `config.backend`.
pub fn build_client(config: &GeneratorConfig) -> Result<Box<dyn LlmClient>, crate::StoryError> {
    match config.backend {
        Backend::Gemini => Ok(Box::new(GeminiClient::from_config(config)?)),
        #[cfg(feature = "local")]
        Backend::Local => Ok(Box::new(LocalClient::load(config)?)),
        #[cfg(not(feature = "local"))]
        Backend::Local => Err(crate::config::ConfigError::Invalid {
            var: "STORY_BACKEND",
            value: "local (rebuild with --features local)".into(),
        }
        .into()),
    }
}
