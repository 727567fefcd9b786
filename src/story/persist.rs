use log::debug;
use rusqlite::Connection;

use crate::db::models::{NodeOption, StoryNode};
use crate::db::repository::{insert_node, update_node_options, NewStoryNode};
use crate::error::Result;
use crate::story::schema::StoryNodeLlm;

/// Flatten `node` and everything below it into `story_nodes` rows.
///
/// The node row is inserted first so it has an id, then each child subtree
/// is written in option order. A parent's options embed its children's ids,
/// so they are only written once every child exists. Ending nodes are never
/// descended into: options on an ending are dropped.
///
/// Runs inside the caller's transaction and never commits.
pub fn persist_node(
    conn: &Connection,
    story_id: i64,
    node: &StoryNodeLlm,
    is_root: bool,
) -> Result<StoryNode> {
    let mut row = insert_node(
        conn,
        &NewStoryNode {
            story_id,
            content: &node.content,
            is_root,
            is_ending: node.is_ending,
            is_winning_ending: node.is_winning_ending,
        },
    )?;

    if node.is_ending {
        if node.options.as_ref().is_some_and(|o| !o.is_empty()) {
            debug!("Dropping options on ending node {}", row.id);
        }
        return Ok(row);
    }

    let options = node.followed_options();
    if options.is_empty() {
        return Ok(row);
    }

    let mut links = Vec::with_capacity(options.len());
    for option in options {
        let child = persist_node(conn, story_id, &option.next_node, false)?;
        links.push(NodeOption {
            text: option.text.clone(),
            node_id: child.id,
        });
    }

    update_node_options(conn, row.id, &links)?;
    row.options = links;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::db::repository::{count_nodes, insert_story, load_complete_story};
    use crate::story::schema::StoryOptionLlm;

    fn sample_tree() -> StoryNodeLlm {
        StoryNodeLlm::choice(
            "A fork in the road.",
            vec![
                StoryOptionLlm::new(
                    "Go north",
                    StoryNodeLlm::choice(
                        "A troll blocks the bridge.",
                        vec![
                            StoryOptionLlm::new("Fight", StoryNodeLlm::ending("You lose.", false)),
                            StoryOptionLlm::new("Riddle", StoryNodeLlm::ending("You win!", true)),
                        ],
                    ),
                ),
                StoryOptionLlm::new("Go south", StoryNodeLlm::ending("A swamp. The end.", false)),
                StoryOptionLlm::new("Wait", StoryNodeLlm::ending("Night falls.", false)),
            ],
        )
    }

    #[test]
    fn test_every_node_persisted() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Fork", "s").unwrap();
        let tree = sample_tree();
        persist_node(&conn, story.id, &tree, true).unwrap();
        assert_eq!(count_nodes(&conn, story.id).unwrap() as usize, tree.node_count());
    }

    #[test]
    fn test_options_in_order_with_distinct_children() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Fork", "s").unwrap();
        let root = persist_node(&conn, story.id, &sample_tree(), true).unwrap();

        let texts: Vec<&str> = root.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, ["Go north", "Go south", "Wait"]);

        let complete = load_complete_story(&conn, story.id).unwrap();
        let mut ids: Vec<i64> = root.options.iter().map(|o| o.node_id).collect();
        for id in &ids {
            let child = complete.get(*id).unwrap();
            assert_eq!(child.story_id, story.id);
            assert!(!child.is_root);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        let troll = complete.get(root.options[0].node_id).unwrap();
        assert_eq!(troll.content, "A troll blocks the bridge.");
        assert_eq!(troll.options.len(), 2);
        assert!(complete.get(troll.options[1].node_id).unwrap().is_winning_ending);
    }

    #[test]
    fn test_children_get_ids_before_parent_options() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Fork", "s").unwrap();
        let root = persist_node(&conn, story.id, &sample_tree(), true).unwrap();
        // Parent rows are inserted before their children, so every child id is larger.
        assert!(root.options.iter().all(|o| o.node_id > root.id));
    }

    #[test]
    fn test_ending_options_dropped() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Odd", "s").unwrap();
        let mut ending = StoryNodeLlm::ending("It is over.", false);
        ending.options = Some(vec![StoryOptionLlm::new(
            "But wait",
            StoryNodeLlm::ending("Secret", true),
        )]);

        let row = persist_node(&conn, story.id, &ending, true).unwrap();
        assert!(row.options.is_empty());
        assert_eq!(count_nodes(&conn, story.id).unwrap(), 1);

        let stored = load_complete_story(&conn, story.id).unwrap();
        assert!(stored.root().unwrap().options.is_empty());
    }

    #[test]
    fn test_non_ending_without_options() {
        let conn = open_in_memory().unwrap();
        let story = insert_story(&conn, "Stub", "s").unwrap();
        let node = StoryNodeLlm {
            content: "Nowhere to go.".into(),
            is_ending: false,
            is_winning_ending: false,
            options: None,
        };
        let row = persist_node(&conn, story.id, &node, true).unwrap();
        assert!(row.options.is_empty());
        assert!(row.is_root);
    }
}
