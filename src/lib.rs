//! Branching choose-your-own-adventure stories generated by an LLM and
//! stored as a flattened node tree in SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod game;
pub mod llm;
pub mod story;

pub use config::GeneratorConfig;
pub use error::{Result, StoryError};
pub use story::{StoryGenerator, DEFAULT_THEME};
