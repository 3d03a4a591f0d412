// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Analysis schema (version 2): read-optimized. Text lives in a separate
//! 1:1 `texts` table and every foreign-key column is indexed (§4.5.1).

use rusqlite::Connection;
use tracing::instrument;

use crate::dictionary::{self, DictionaryTable};
use crate::error::{Error, Result};
use crate::handle::DatabaseHandle;
use crate::message::{LogMessage, NewLogMessage};
use crate::overlay::OverlayMaps;
use crate::ticks::Timestamp;

use super::common::{self, Cursor};
use super::{Purpose, SchemaAccessor};

const STRUCTURE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        timezone_offset INTEGER NOT NULL,
        high_precision_timestamp INTEGER NOT NULL,
        lost_message_count INTEGER NOT NULL,
        process_id INTEGER NOT NULL,
        process_name_id INTEGER NOT NULL,
        application_name_id INTEGER NOT NULL,
        writer_name_id INTEGER NOT NULL,
        level_name_id INTEGER NOT NULL,
        has_tags INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS texts (
        message_id INTEGER PRIMARY KEY,
        text TEXT NOT NULL
    );
";

const INDEX_SQL: &str = "
    CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
    CREATE INDEX IF NOT EXISTS idx_messages_process_id ON messages(process_id);
    CREATE INDEX IF NOT EXISTS idx_messages_process_name_id ON messages(process_name_id);
    CREATE INDEX IF NOT EXISTS idx_messages_application_name_id ON messages(application_name_id);
    CREATE INDEX IF NOT EXISTS idx_messages_writer_name_id ON messages(writer_name_id);
    CREATE INDEX IF NOT EXISTS idx_messages_level_name_id ON messages(level_name_id);
";

const DROP_SQL: &str = "
    DROP TABLE IF EXISTS messages;
    DROP TABLE IF EXISTS texts;
";

const READ_SQL: &str = "
    SELECT m.id, m.timestamp, m.timezone_offset, m.high_precision_timestamp, m.lost_message_count,
           m.process_id, p.name, a.name, w.name, l.name, t.text, m.has_tags
    FROM messages m
    JOIN processes p ON p.id = m.process_name_id
    JOIN applications a ON a.id = m.application_name_id
    JOIN writers w ON w.id = m.writer_name_id
    JOIN levels l ON l.id = m.level_name_id
    JOIN texts t ON t.message_id = m.id
    WHERE m.id >= ?1
    ORDER BY m.id ASC
    LIMIT ?2
";

pub struct AnalysisAccessor {
    handle: DatabaseHandle,
    cursor: Cursor,
}

impl AnalysisAccessor {
    pub(super) fn create_new(handle: DatabaseHandle) -> Result<Self> {
        handle.connection().execute_batch(dictionary::COMMON_STRUCTURE_SQL)?;
        handle.connection().execute_batch(STRUCTURE_SQL)?;
        Ok(Self { handle, cursor: Cursor::empty() })
    }

    pub(super) fn open_existing(handle: DatabaseHandle) -> Result<Self> {
        let cursor = Cursor::load(handle.connection())?;
        Ok(Self { handle, cursor })
    }

    fn write_one(conn: &Connection, overlays: &mut OverlayMaps, id: i64, message: &NewLogMessage) -> Result<()> {
        let ids = common::resolve_dictionary_ids(conn, overlays, message)?;
        let has_tags = common::attach_tags(conn, overlays, &message.tags, id)?;

        conn.prepare_cached(
            "INSERT INTO messages (id, timestamp, timezone_offset, high_precision_timestamp, \
             lost_message_count, process_id, process_name_id, application_name_id, writer_name_id, \
             level_name_id, has_tags) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?
        .execute(rusqlite::params![
            id,
            message.timestamp.utc_ticks,
            message.timestamp.offset_ticks,
            message.high_precision_timestamp,
            message.lost_message_count,
            message.process_id,
            ids.process_name_id,
            ids.application_name_id,
            ids.writer_name_id,
            ids.level_name_id,
            has_tags as i64,
        ])?;

        conn.prepare_cached("INSERT INTO texts (message_id, text) VALUES (?1, ?2)")?
            .execute(rusqlite::params![id, message.text])?;

        Ok(())
    }
}

impl SchemaAccessor for AnalysisAccessor {
    fn purpose(&self) -> Purpose {
        Purpose::Analysis
    }

    fn oldest_id(&self) -> i64 {
        self.cursor.oldest_id
    }

    fn newest_id(&self) -> i64 {
        self.cursor.newest_id
    }

    fn is_read_only(&self) -> bool {
        self.handle.is_read_only()
    }

    fn used_process_names(&self) -> Result<Vec<String>> {
        dictionary::list_used(self.handle.connection(), DictionaryTable::Processes, "process_name_id")
    }

    fn used_application_names(&self) -> Result<Vec<String>> {
        dictionary::list_used(self.handle.connection(), DictionaryTable::Applications, "application_name_id")
    }

    fn used_writer_names(&self) -> Result<Vec<String>> {
        dictionary::list_used(self.handle.connection(), DictionaryTable::Writers, "writer_name_id")
    }

    fn used_level_names(&self) -> Result<Vec<String>> {
        dictionary::list_used(self.handle.connection(), DictionaryTable::Levels, "level_name_id")
    }

    fn all_process_names(&self) -> Result<Vec<String>> {
        dictionary::list_all(self.handle.connection(), DictionaryTable::Processes)
    }

    fn all_application_names(&self) -> Result<Vec<String>> {
        dictionary::list_all(self.handle.connection(), DictionaryTable::Applications)
    }

    fn all_writer_names(&self) -> Result<Vec<String>> {
        dictionary::list_all(self.handle.connection(), DictionaryTable::Writers)
    }

    fn all_level_names(&self) -> Result<Vec<String>> {
        dictionary::list_all(self.handle.connection(), DictionaryTable::Levels)
    }

    fn all_tag_names(&self) -> Result<Vec<String>> {
        dictionary::list_all(self.handle.connection(), DictionaryTable::Tags)
    }

    #[instrument(name = "analysis::write_message", level = "trace", skip(self, message))]
    fn write_message(&mut self, message: &NewLogMessage) -> Result<i64> {
        let next_id = self.cursor.newest_id + 1;
        self.handle.run_in_transaction(|conn, overlays| {
            Self::write_one(conn, overlays, next_id, message)?;
            Ok(())
        })?;
        self.cursor.record_write(next_id);
        Ok(next_id)
    }

    #[instrument(name = "analysis::write_messages", level = "debug", skip(self, messages))]
    fn write_messages(&mut self, messages: &[NewLogMessage]) -> Result<usize> {
        let start_id = self.cursor.newest_id + 1;
        self.handle.run_in_transaction(|conn, overlays| {
            for (offset, message) in messages.iter().enumerate() {
                Self::write_one(conn, overlays, start_id + offset as i64, message)?;
            }
            Ok(())
        })?;
        for offset in 0..messages.len() {
            self.cursor.record_write(start_id + offset as i64);
        }
        Ok(messages.len())
    }

    fn read(&self, from_id: i64, count: i64, callback: &mut dyn FnMut(LogMessage) -> bool) -> Result<bool> {
        if from_id < 0 || count < 0 {
            return Err(Error::ArgumentOutOfRange(format!("from_id={from_id}, count={count}")));
        }
        if !self.cursor.is_empty() && (from_id < self.cursor.oldest_id || from_id > self.cursor.newest_id) {
            return Err(Error::ArgumentOutOfRange(format!(
                "from_id {from_id} not in [{}, {}]",
                self.cursor.oldest_id, self.cursor.newest_id
            )));
        }

        let conn = self.handle.connection();
        let mut stmt = conn.prepare_cached(READ_SQL)?;
        let mut rows = stmt.query(rusqlite::params![from_id, count])?;

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let has_tags: i64 = row.get(11)?;
            let tags = if has_tags != 0 { dictionary::tags_of(conn, id)? } else { Default::default() };

            let message = common::hydrate(
                id,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                &row.get::<_, String>(6)?,
                &row.get::<_, String>(7)?,
                &row.get::<_, String>(8)?,
                &row.get::<_, String>(9)?,
                row.get(10)?,
                tags,
                &self.handle.interner,
            );

            if !callback(message) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[instrument(name = "analysis::prune", level = "debug", skip(self))]
    fn prune(&mut self, max_count: Option<i64>, min_timestamp: Option<Timestamp>) -> Result<i64> {
        self.prune_collecting(max_count, min_timestamp).map(|(removed, _)| removed)
    }

    fn prune_collecting(
        &mut self,
        max_count: Option<i64>,
        min_timestamp: Option<Timestamp>,
    ) -> Result<(i64, Vec<LogMessage>)> {
        let cursor = self.cursor;
        let cut = common::compute_cutoff(self.handle.connection(), &cursor, max_count, min_timestamp)?;
        let Some(cut) = cut else {
            return Ok((0, Vec::new()));
        };
        let removed = cut - cursor.oldest_id + 1;

        let mut collected = Vec::new();
        self.read(cursor.oldest_id, removed, &mut |message| {
            collected.push(message);
            true
        })?;

        self.handle.run_in_transaction(|conn, _overlays| {
            // texts has a FK-shaped 1:1 relationship to messages; delete it
            // first so no row in texts ever outlives its message.
            conn.prepare_cached("DELETE FROM texts WHERE message_id <= ?1")?.execute([cut])?;
            conn.prepare_cached("DELETE FROM messages WHERE id <= ?1")?.execute([cut])?;
            dictionary::remove_tag_associations_up_to(conn, cut)?;
            Ok(())
        })?;

        if cut >= self.cursor.newest_id {
            self.cursor.reset();
        } else {
            self.cursor.oldest_id = cut + 1;
        }

        Ok((removed, collected))
    }

    fn clear_specific(&mut self) -> Result<()> {
        self.handle.run_in_transaction(|conn, _overlays| {
            conn.execute_batch(DROP_SQL)?;
            conn.execute_batch(STRUCTURE_SQL)?;
            conn.execute_batch(INDEX_SQL)?;
            Ok(())
        })?;
        self.cursor.reset();
        Ok(())
    }

    fn clear_all(&mut self) -> Result<()> {
        self.handle.run_in_transaction(|conn, overlays| {
            conn.execute_batch(DROP_SQL)?;
            conn.execute_batch(dictionary::COMMON_DROP_SQL)?;
            conn.execute_batch(dictionary::COMMON_STRUCTURE_SQL)?;
            conn.execute_batch(STRUCTURE_SQL)?;
            conn.execute_batch(dictionary::COMMON_INDEX_SQL)?;
            conn.execute_batch(INDEX_SQL)?;
            overlays.clear_all();
            Ok(())
        })?;
        self.cursor.reset();
        Ok(())
    }

    fn create_indices(&self) -> Result<()> {
        let conn = self.handle.connection();
        conn.execute_batch(dictionary::COMMON_INDEX_SQL)?;
        conn.execute_batch(INDEX_SQL)?;
        Ok(())
    }

    fn connection(&self) -> &Connection {
        self.handle.connection()
    }

    fn into_handle(self: Box<Self>) -> DatabaseHandle {
        self.handle
    }
}
