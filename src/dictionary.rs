// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Dictionary Layer (§4.4): the tables shared by both schema variants —
//! process/application/writer/level names and tags — plus the tag-to-message
//! join table.

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;
use crate::overlay::{OverlayMap, OverlayMaps};

/// The common-structure DDL, executed first at file birth (§4.5.1 step a).
/// Indices are created separately, after the initial write, per the same
/// section.
pub const COMMON_STRUCTURE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS processes (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE IF NOT EXISTS applications (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE IF NOT EXISTS writers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE IF NOT EXISTS levels (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE IF NOT EXISTS tags (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE IF NOT EXISTS tag2msg (
        id INTEGER PRIMARY KEY,
        tag_id INTEGER NOT NULL,
        message_id INTEGER NOT NULL
    );
";

pub const COMMON_INDEX_SQL: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_processes_name ON processes(name);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_applications_name ON applications(name);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_writers_name ON writers(name);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_levels_name ON levels(name);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_name ON tags(name);
    CREATE INDEX IF NOT EXISTS idx_tag2msg_tag_id ON tag2msg(tag_id);
    CREATE INDEX IF NOT EXISTS idx_tag2msg_message_id ON tag2msg(message_id);
";

pub const COMMON_DROP_SQL: &str = "
    DROP TABLE IF EXISTS processes;
    DROP TABLE IF EXISTS applications;
    DROP TABLE IF EXISTS writers;
    DROP TABLE IF EXISTS levels;
    DROP TABLE IF EXISTS tags;
    DROP TABLE IF EXISTS tag2msg;
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryTable {
    Processes,
    Applications,
    Writers,
    Levels,
    Tags,
}

impl DictionaryTable {
    fn table_name(self) -> &'static str {
        match self {
            DictionaryTable::Processes => "processes",
            DictionaryTable::Applications => "applications",
            DictionaryTable::Writers => "writers",
            DictionaryTable::Levels => "levels",
            DictionaryTable::Tags => "tags",
        }
    }

    fn overlay(self, overlays: &mut OverlayMaps) -> &mut OverlayMap {
        match self {
            DictionaryTable::Processes => &mut overlays.processes,
            DictionaryTable::Applications => &mut overlays.applications,
            DictionaryTable::Writers => &mut overlays.writers,
            DictionaryTable::Levels => &mut overlays.levels,
            DictionaryTable::Tags => &mut overlays.tags,
        }
    }
}

/// `add_or_get`: try the Overlay Map first; on miss, `INSERT OR IGNORE` then
/// `SELECT id`, then stage the mapping (§4.4).
#[instrument(name = "dictionary::add_or_get", level = "trace", skip(conn, overlays))]
pub fn add_or_get(conn: &Connection, overlays: &mut OverlayMaps, table: DictionaryTable, name: &str) -> Result<i64> {
    if let Some(id) = table.overlay(overlays).try_get(name) {
        return Ok(id);
    }

    let table_name = table.table_name();
    conn.prepare_cached(&format!("INSERT OR IGNORE INTO {table_name} (name) VALUES (?1)"))?
        .execute([name])?;
    let id: i64 = conn
        .prepare_cached(&format!("SELECT id FROM {table_name} WHERE name = ?1"))?
        .query_row([name], |row| row.get(0))?;

    table.overlay(overlays).stage(name, id);
    Ok(id)
}

pub fn attach_tag(conn: &Connection, tag_id: i64, message_id: i64) -> Result<()> {
    conn.prepare_cached("INSERT INTO tag2msg (tag_id, message_id) VALUES (?1, ?2)")?
        .execute((tag_id, message_id))?;
    Ok(())
}

pub fn tags_of(conn: &Connection, message_id: i64) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name FROM tag2msg tm JOIN tags t ON t.id = tm.tag_id WHERE tm.message_id = ?1",
    )?;
    let rows = stmt.query_map([message_id], |row| row.get::<_, String>(0))?;
    let mut tags = BTreeSet::new();
    for row in rows {
        tags.insert(row?);
    }
    Ok(tags)
}

pub fn remove_tag_associations_up_to(conn: &Connection, message_id: i64) -> Result<()> {
    conn.prepare_cached("DELETE FROM tag2msg WHERE message_id <= ?1")?.execute([message_id])?;
    Ok(())
}

/// Distinct names of all rows in `table`, sorted ascending.
pub fn list_all(conn: &Connection, table: DictionaryTable) -> Result<Vec<String>> {
    let table_name = table.table_name();
    let mut stmt = conn.prepare_cached(&format!("SELECT name FROM {table_name} ORDER BY name ASC"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

/// Distinct names of rows in `table` referenced by at least one message,
/// joined on `messages.<join_column>`, sorted ascending. The join column is
/// schema-specific (the Schema Accessor supplies it) since both schema
/// variants name their `messages` table the same way but this layer doesn't
/// otherwise know its structure.
pub fn list_used(conn: &Connection, table: DictionaryTable, join_column: &str) -> Result<Vec<String>> {
    let table_name = table.table_name();
    let sql = format!(
        "SELECT DISTINCT d.name FROM {table_name} d \
         JOIN messages m ON m.{join_column} = d.id \
         ORDER BY d.name ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_common_structure() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(COMMON_STRUCTURE_SQL).unwrap();
        conn
    }

    #[test]
    fn add_or_get_returns_same_id_for_repeated_name() {
        let conn = conn_with_common_structure();
        let mut overlays = OverlayMaps::new();

        let first = add_or_get(&conn, &mut overlays, DictionaryTable::Processes, "worker").unwrap();
        let second = add_or_get(&conn, &mut overlays, DictionaryTable::Processes, "worker").unwrap();

        assert_eq!(first, second);
        assert_eq!(list_all(&conn, DictionaryTable::Processes).unwrap(), vec!["worker".to_string()]);
    }

    #[test]
    fn add_or_get_stages_into_the_overlay_on_first_insert() {
        let conn = conn_with_common_structure();
        let mut overlays = OverlayMaps::new();

        let id = add_or_get(&conn, &mut overlays, DictionaryTable::Tags, "nightly").unwrap();

        assert_eq!(overlays.tags.try_get("nightly"), Some(id));
    }

    #[test]
    fn add_or_get_distinguishes_names_across_tables() {
        let conn = conn_with_common_structure();
        let mut overlays = OverlayMaps::new();

        let process_id = add_or_get(&conn, &mut overlays, DictionaryTable::Processes, "shared").unwrap();
        let app_id = add_or_get(&conn, &mut overlays, DictionaryTable::Applications, "shared").unwrap();

        assert_eq!(process_id, app_id);
        assert_eq!(list_all(&conn, DictionaryTable::Processes).unwrap(), vec!["shared".to_string()]);
        assert_eq!(list_all(&conn, DictionaryTable::Applications).unwrap(), vec!["shared".to_string()]);
    }
}
