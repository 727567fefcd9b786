pub mod models;
pub mod repository;
pub mod schema;

use std::path::Path;

use log::info;
use rusqlite::Connection;

use crate::error::Result;

pub use models::{CompleteStory, NodeOption, Story, StoryNode};

/// Open (or create) the story database and make sure the tables exist.
pub fn open(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    info!("Opening story database: {}", path.display());
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(schema::CREATE_TABLES)?;
    Ok(())
}
