pub mod generator;
pub mod parser;
pub mod persist;
pub mod prompt;
pub mod schema;

pub use generator::StoryGenerator;
pub use parser::parse_story_response;
pub use persist::persist_node;
pub use prompt::{build_story_messages, DEFAULT_THEME};
pub use schema::{StoryLlmResponse, StoryNodeLlm, StoryOptionLlm};
