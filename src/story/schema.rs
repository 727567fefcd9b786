use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The complete JSON document the model must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryLlmResponse {
    /// The title of the story
    pub title: String,
    /// The root node of the story
    pub root_node: StoryNodeLlm,
}

/// One point in the generated story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryNodeLlm {
    /// The main content of the story node
    pub content: String,
    /// Whether this node is an ending node
    pub is_ending: bool,
    /// Whether this node is a winning ending node
    pub is_winning_ending: bool,
    /// The options for this node
    #[serde(default)]
    pub options: Option<Vec<StoryOptionLlm>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryOptionLlm {
    /// The text of the option shown to the user
    pub text: String,
    /// The next node content and its options
    pub next_node: StoryNodeLlm,
}

impl StoryNodeLlm {
    pub fn ending(content: impl Into<String>, winning: bool) -> Self {
        Self {
            content: content.into(),
            is_ending: true,
            is_winning_ending: winning,
            options: None,
        }
    }

    pub fn choice(content: impl Into<String>, options: Vec<StoryOptionLlm>) -> Self {
        Self {
            content: content.into(),
            is_ending: false,
            is_winning_ending: false,
            options: Some(options),
        }
    }

    /// Options the persister will follow. Endings never have any, whatever the
    /// model put in the field.
    pub fn followed_options(&self) -> &[StoryOptionLlm] {
        if self.is_ending {
            return &[];
        }
        self.options.as_deref().unwrap_or(&[])
    }

    /// Number of nodes reachable through followed options, this one included.
    pub fn node_count(&self) -> usize {
        1 + self
            .followed_options()
            .iter()
            .map(|o| o.next_node.node_count())
            .sum::<usize>()
    }
}

impl StoryOptionLlm {
    pub fn new(text: impl Into<String>, next_node: StoryNodeLlm) -> Self {
        Self {
            text: text.into(),
            next_node,
        }
    }
}
