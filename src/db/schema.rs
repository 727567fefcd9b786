/// Tables for stories and their flattened node trees.
///
/// `story_nodes.options` holds a JSON array of `{"text", "node_id"}` objects.
/// The ids point at other rows of the same story but are not foreign keys.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    session_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE TABLE IF NOT EXISTS story_nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    story_id INTEGER NOT NULL REFERENCES stories(id),
    content TEXT NOT NULL,
    is_root INTEGER NOT NULL DEFAULT 0,
    is_ending INTEGER NOT NULL DEFAULT 0,
    is_winning_ending INTEGER NOT NULL DEFAULT 0,
    options TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_stories_title ON stories(title);
CREATE INDEX IF NOT EXISTS idx_story_nodes_story ON story_nodes(story_id);
"#;
