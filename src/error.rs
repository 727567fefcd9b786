use thiserror::Error;

use crate::config::ConfigError;
use crate::llm::LlmError;

pub type Result<T> = std::result::Result<T, StoryError>;

/// Everything that can go wrong between a theme string and a committed story.
///
/// Nothing here is retried. The variant tells the caller which stage failed.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model output does not match the story schema: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("story {0} not found")]
    NotFound(i64),

    #[error("node {node_id} has unreadable options: {source}")]
    CorruptOptions {
        node_id: i64,
        #[source]
        source: serde_json::Error,
    },
}
