use std::collections::HashMap;

use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{CompleteStory, NodeOption, Story, StoryNode};
use crate::error::{Result, StoryError};

/// Fields of a node row before it has an id.
#[derive(Debug, Clone)]
pub struct NewStoryNode<'a> {
    pub story_id: i64,
    pub content: &'a str,
    pub is_root: bool,
    pub is_ending: bool,
    pub is_winning_ending: bool,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert a story row and read back the generated id and timestamp.
pub fn insert_story(conn: &Connection, title: &str, session_id: &str) -> Result<Story> {
    let story = conn.query_row(
        "INSERT INTO stories (title, session_id) VALUES (?1, ?2)
         RETURNING id, title, session_id, created_at",
        params![title, session_id],
        story_from_row,
    )?;
    debug!("Inserted story {} ({:?})", story.id, story.title);
    Ok(story)
}

/// Insert a node with an empty options list; the row id is available at once.
pub fn insert_node(conn: &Connection, node: &NewStoryNode<'_>) -> Result<StoryNode> {
    conn.execute(
        "INSERT INTO story_nodes (story_id, content, is_root, is_ending, is_winning_ending, options)
         VALUES (?1, ?2, ?3, ?4, ?5, '[]')",
        params![
            node.story_id,
            node.content,
            node.is_root,
            node.is_ending,
            node.is_winning_ending
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!("Inserted node {id} (story {}, root={}, ending={})", node.story_id, node.is_root, node.is_ending);
    Ok(StoryNode {
        id,
        story_id: node.story_id,
        content: node.content.to_string(),
        is_root: node.is_root,
        is_ending: node.is_ending,
        is_winning_ending: node.is_winning_ending,
        options: Vec::new(),
    })
}

pub fn update_node_options(conn: &Connection, node_id: i64, options: &[NodeOption]) -> Result<()> {
    let json = serde_json::to_string(options)
        .map_err(|source| StoryError::CorruptOptions { node_id, source })?;
    conn.execute(
        "UPDATE story_nodes SET options = ?1 WHERE id = ?2",
        params![json, node_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
    Ok(Story {
        id: row.get(0)?,
        title: row.get(1)?,
        session_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

const NODE_COLUMNS: &str =
    "id, story_id, content, is_root, is_ending, is_winning_ending, options";

fn node_from_row(row: &Row<'_>) -> Result<StoryNode> {
    let id: i64 = row.get(0)?;
    let options_json: String = row.get(6)?;
    let options: Vec<NodeOption> = serde_json::from_str(&options_json)
        .map_err(|source| StoryError::CorruptOptions { node_id: id, source })?;
    Ok(StoryNode {
        id,
        story_id: row.get(1)?,
        content: row.get(2)?,
        is_root: row.get(3)?,
        is_ending: row.get(4)?,
        is_winning_ending: row.get(5)?,
        options,
    })
}

pub fn get_story(conn: &Connection, story_id: i64) -> Result<Option<Story>> {
    Ok(conn
        .query_row(
            "SELECT id, title, session_id, created_at FROM stories WHERE id = ?1",
            params![story_id],
            story_from_row,
        )
        .optional()?)
}

pub fn find_story_by_session(conn: &Connection, session_id: &str) -> Result<Option<Story>> {
    Ok(conn
        .query_row(
            "SELECT id, title, session_id, created_at FROM stories WHERE session_id = ?1",
            params![session_id],
            story_from_row,
        )
        .optional()?)
}

/// All nodes of a story in insertion order.
pub fn nodes_for_story(conn: &Connection, story_id: i64) -> Result<Vec<StoryNode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM story_nodes WHERE story_id = ?1 ORDER BY id"
    ))?;
    let mut rows = stmt.query(params![story_id])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        nodes.push(node_from_row(row)?);
    }
    Ok(nodes)
}

pub fn find_root_node(conn: &Connection, story_id: i64) -> Result<Option<StoryNode>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM story_nodes WHERE story_id = ?1 AND is_root = 1 LIMIT 1"
    ))?;
    let mut rows = stmt.query(params![story_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(node_from_row(row)?)),
        None => Ok(None),
    }
}

/// Load a story and every node it owns.
pub fn load_complete_story(conn: &Connection, story_id: i64) -> Result<CompleteStory> {
    let story = get_story(conn, story_id)?.ok_or(StoryError::NotFound(story_id))?;
    let nodes = nodes_for_story(conn, story_id)?;
    let root_node_id = nodes
        .iter()
        .find(|n| n.is_root)
        .map(|n| n.id)
        .ok_or(StoryError::NotFound(story_id))?;

    let nodes: HashMap<i64, StoryNode> = nodes.into_iter().map(|n| (n.id, n)).collect();
    Ok(CompleteStory {
        story,
        root_node_id,
        nodes,
    })
}

pub fn count_stories(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM stories", [], |r| r.get(0))?)
}

pub fn count_nodes(conn: &Connection, story_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM story_nodes WHERE story_id = ?1",
        params![story_id],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn test_insert_and_get_story() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Tale", "sess-1").unwrap();
        assert!(story.id > 0);
        assert!(!story.created_at.is_empty());
        assert_eq!(get_story(&conn, story.id).unwrap(), Some(story.clone()));
        assert_eq!(
            find_story_by_session(&conn, "sess-1").unwrap().map(|s| s.id),
            Some(story.id)
        );
        assert!(get_story(&conn, story.id + 100).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_session_rejected() {
        let conn = open_in_memory().unwrap();
        insert_story(&conn, "A", "same").unwrap();
        let err = insert_story(&conn, "B", "same").unwrap_err();
        assert!(matches!(err, StoryError::Persistence(_)));
        assert_eq!(count_stories(&conn).unwrap(), 1);
    }

    #[test]
    fn test_node_options_round_trip() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Tale", "s").unwrap();
        let child = insert_node(
            &conn,
            &NewStoryNode {
                story_id: story.id,
                content: "child",
                is_root: false,
                is_ending: true,
                is_winning_ending: true,
            },
        )
        .unwrap();
        let root = insert_node(
            &conn,
            &NewStoryNode {
                story_id: story.id,
                content: "root",
                is_root: true,
                is_ending: false,
                is_winning_ending: false,
            },
        )
        .unwrap();
        let opts = vec![NodeOption {
            text: "go".into(),
            node_id: child.id,
        }];
        update_node_options(&conn, root.id, &opts).unwrap();

        let loaded = find_root_node(&conn, story.id).unwrap().unwrap();
        assert_eq!(loaded.id, root.id);
        assert_eq!(loaded.options, opts);
        assert_eq!(count_nodes(&conn, story.id).unwrap(), 2);

        let complete = load_complete_story(&conn, story.id).unwrap();
        assert_eq!(complete.root_node_id, root.id);
        assert!(complete.get(child.id).unwrap().is_winning_ending);
    }

    #[test]
    fn test_load_missing_story() {
        let conn = open_in_memory().unwrap();
        assert!(matches!(
            load_complete_story(&conn, 42),
            Err(StoryError::NotFound(42))
        ));
    }

    #[test]
    fn test_corrupt_options_reported() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Tale", "s").unwrap();
        conn.execute(
            "INSERT INTO story_nodes (story_id, content, is_root, options) VALUES (?1, 'x', 1, 'oops')",
            params![story.id],
        )
        .unwrap();
        assert!(matches!(
            nodes_for_story(&conn, story.id),
            Err(StoryError::CorruptOptions { .. })
        ));
    }
}
