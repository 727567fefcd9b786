use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A persisted story. One per generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub id: i64,
    pub title: String,
    /// Caller-supplied key correlating this story with a session. Unique.
    pub session_id: String,
    pub created_at: String,
}

/// One entry of a node's embedded options list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOption {
    pub text: String,
    pub node_id: i64,
}

/// A persisted node. Children are referenced by id inside `options`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryNode {
    pub id: i64,
    pub story_id: i64,
    pub content: String,
    pub is_root: bool,
    pub is_ending: bool,
    pub is_winning_ending: bool,
    pub options: Vec<NodeOption>,
}

/// A story with every node loaded, keyed by node id.
#[derive(Debug, Clone)]
pub struct CompleteStory {
    pub story: Story,
    pub root_node_id: i64,
    pub nodes: HashMap<i64, StoryNode>,
}

impl CompleteStory {
    pub fn get(&self, id: i64) -> Option<&StoryNode> {
        self.nodes.get(&id)
    }

    pub fn root(&self) -> Option<&StoryNode> {
        self.nodes.get(&self.root_node_id)
    }

    /// Number of choices on the longest path from the root to an ending
    /// (the most steps a player can complete).
    pub fn total_steps(&self) -> usize {
        self.longest_path(self.root_node_id, 0)
    }

    // Stored ids come from outside the type system, so the walk is bounded by
    // the node count in case a row points back up the tree.
    fn longest_path(&self, node_id: i64, depth: usize) -> usize {
        let node = match self.nodes.get(&node_id) {
            Some(n) => n,
            None => return 0,
        };
        if node.is_ending || depth >= self.nodes.len() {
            return 0;
        }
        let max_child = node
            .options
            .iter()
            .map(|opt| self.longest_path(opt.node_id, depth + 1))
            .max()
            .unwrap_or(0);
        1 + max_child
    }
}
