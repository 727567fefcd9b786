use log::info;
use rusqlite::Connection;

use crate::config::GeneratorConfig;
use crate::db::models::Story;
use crate::db::repository::insert_story;
use crate::error::Result;
use crate::llm::{build_client, LlmClient};
use crate::story::parser::parse_story_response;
use crate::story::persist::persist_node;
use crate::story::prompt::build_story_messages;

/// Turns a theme into a committed story: prompt, complete, parse, persist.
pub struct StoryGenerator<C> {
    client: C,
}

impl StoryGenerator<Box<dyn LlmClient>> {
    /// Read the environment and build the configured backend. A missing
    /// credential fails here, before any request is made.
    pub fn from_env() -> Result<Self> {
        let config = GeneratorConfig::from_env()?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self::new(build_client(config)?))
    }
}

impl<C: LlmClient> StoryGenerator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Generate one story for `session_id` and commit it with its full node tree.
    ///
    /// The story row and every node row share one transaction, committed only
    /// after the whole tree is written. Any error drops the transaction, which
    /// rolls it back, so a failed call leaves no rows behind.
    pub fn generate_story(
        &mut self,
        conn: &mut Connection,
        session_id: &str,
        theme: &str,
    ) -> Result<Story> {
        info!("Generating story for session {session_id} with theme {theme:?}");

        let messages = build_story_messages(theme);
        let raw = self.client.complete(&messages)?;
        info!("Model response: {} chars", raw.len());

        let structure = parse_story_response(&raw)?;
        info!(
            "Parsed story {:?} with {} nodes",
            structure.title,
            structure.root_node.node_count()
        );

        let tx = conn.transaction()?;
        let story = insert_story(&tx, &structure.title, session_id)?;
        let root = persist_node(&tx, story.id, &structure.root_node, true)?;
        tx.commit()?;

        info!("Committed story {} (root node {})", story.id, root.id);
        Ok(story)
    }
}
