use log::trace;

use crate::llm::ChatMessage;
use crate::story::schema::StoryLlmResponse;

pub const DEFAULT_THEME: &str = "fantasy";

const FORMAT_PLACEHOLDER: &str = "{format_instructions}";

/// System instructions for the storyteller. `{format_instructions}` is
/// replaced with the schema-derived block at assembly time.
pub const STORY_PROMPT: &str = r#"You are a creative story writer that creates engaging choose-your-own-adventure stories.
Generate a complete branching story with multiple paths and endings in the JSON format described below.

The story should have:
1. A compelling title
2. A starting situation (root node) with 2-3 options
3. Each option should lead to another node with its own options
4. Some paths should lead to endings (both winning and losing)
5. At least one path should lead to a winning ending

Story structure requirements:
- Each node should have 2-3 options except for ending nodes
- The story should be 3-4 levels deep (including the root node)
- Add variety in the path lengths (some end earlier, some later)
- Ending nodes have "isEnding": true and "options": null
- Make sure there is exactly one winning ending, marked with "isWinningEnding": true

Output your story in this exact JSON structure:
{format_instructions}

HERE IS AN EXAMPLE OF THE EXACT JSON STRUCTURE YOU MUST FOLLOW:
{
  "title": "The Quest for the Sunstone",
  "rootNode": {
    "content": "You stand at the edge of the Whispering Woods. An ancient map points towards the Sunstone, hidden deep within. To your left is a dark, thorny path. To your right is a gently flowing river.",
    "isEnding": false,
    "isWinningEnding": false,
    "options": [
      {
        "text": "Take the thorny path.",
        "nextNode": {
          "content": "You push through the thorns and discover a hidden clearing with a sleeping giant. You can try to sneak past or turn back.",
          "isEnding": false,
          "isWinningEnding": false,
          "options": [
            {
              "text": "Sneak past the giant.",
              "nextNode": {
                "content": "You successfully sneak past and find the Sunstone! You have won!",
                "isEnding": true,
                "isWinningEnding": true,
                "options": null
              }
            }
          ]
        }
      },
      {
        "text": "Follow the river.",
        "nextNode": {
          "content": "You follow the river, but it leads to a dead-end waterfall. You have failed.",
          "isEnding": true,
          "isWinningEnding": false,
          "options": null
        }
      }
    ]
  }
}

Now, generate a new, unique story based on the user's theme, following this exact JSON structure.
Do not add any extra text or explanations outside of the single JSON object."#;

/// Describe the expected output as a JSON schema derived from the response types.
pub fn format_instructions() -> String {
    let schema = schemars::schema_for!(StoryLlmResponse);
    let schema_json = serde_json::to_string(&schema).unwrap_or_else(|_| "{}".into());
    format!(
        "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\n\
         As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
         the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
         The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\n\
         Here is the output schema:\n```json\n{schema_json}\n```"
    )
}

/// System prompt with the format instructions filled in.
pub fn system_prompt() -> String {
    STORY_PROMPT.replace(FORMAT_PLACEHOLDER, &format_instructions())
}

pub fn theme_request(theme: &str) -> String {
    format!("Create the story with this theme: {theme}")
}

/// The two-message request for one story: system instructions, then the theme.
pub fn build_story_messages(theme: &str) -> Vec<ChatMessage> {
    let messages = vec![
        ChatMessage::system(system_prompt()),
        ChatMessage::user(theme_request(theme)),
    ];
    trace!(
        "=== STORY PROMPT ===\n{}\n=== END PROMPT ===",
        messages
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    );
    messages
}
