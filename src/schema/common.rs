// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Shared logic used by both [`super::recording::RecordingAccessor`] and
//! [`super::analysis::AnalysisAccessor`]: the `[OldestId, NewestId]` cursor,
//! dictionary-id resolution, tag attachment, and prune-cutoff arithmetic
//! (§4.5.3, §4.5.5).

use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension};

use crate::dictionary::{self, DictionaryTable};
use crate::error::Result;
use crate::interner::StringInterner;
use crate::message::{LogMessage, NewLogMessage};
use crate::overlay::OverlayMaps;
use crate::ticks::Timestamp;

/// The in-memory `[OldestId, NewestId]` cursor (Invariant 1). `-1, -1` means
/// empty.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub oldest_id: i64,
    pub newest_id: i64,
}

impl Cursor {
    pub fn empty() -> Self {
        Self { oldest_id: -1, newest_id: -1 }
    }

    pub fn is_empty(&self) -> bool {
        self.oldest_id < 0 || self.newest_id < self.oldest_id
    }

    pub fn message_count(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.newest_id - self.oldest_id + 1
        }
    }

    /// Recomputes the cursor from the `messages` table (§4.5.2's `Open`
    /// path): `OldestId = MIN(id)`, `NewestId = MAX(id)`, both `-1` if empty.
    pub fn load(conn: &Connection) -> Result<Self> {
        let (oldest, newest): (Option<i64>, Option<i64>) =
            conn.query_row("SELECT MIN(id), MAX(id) FROM messages", [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        match (oldest, newest) {
            (Some(oldest), Some(newest)) => Ok(Self { oldest_id: oldest, newest_id: newest }),
            _ => Ok(Self::empty()),
        }
    }

    /// Records a just-assigned id, the way `write` updates the cursor on
    /// commit (§4.5.3 step 5).
    pub fn record_write(&mut self, id: i64) {
        if self.is_empty() {
            self.oldest_id = id;
        }
        self.newest_id = id;
    }

    pub fn reset(&mut self) {
        *self = Self::empty();
    }
}

pub struct DictionaryIds {
    pub process_name_id: i64,
    pub application_name_id: i64,
    pub writer_name_id: i64,
    pub level_name_id: i64,
}

/// Step 1 of Write (§4.5.3): look up/insert the four name dictionaries.
pub fn resolve_dictionary_ids(
    conn: &Connection,
    overlays: &mut OverlayMaps,
    message: &NewLogMessage,
) -> Result<DictionaryIds> {
    Ok(DictionaryIds {
        process_name_id: dictionary::add_or_get(conn, overlays, DictionaryTable::Processes, &message.process_name)?,
        application_name_id: dictionary::add_or_get(
            conn,
            overlays,
            DictionaryTable::Applications,
            &message.application_name,
        )?,
        writer_name_id: dictionary::add_or_get(conn, overlays, DictionaryTable::Writers, &message.log_writer_name)?,
        level_name_id: dictionary::add_or_get(conn, overlays, DictionaryTable::Levels, &message.log_level_name)?,
    })
}

/// Step 2 of Write (§4.5.3): attach every tag, returning whether `has_tags`
/// should be set.
pub fn attach_tags(
    conn: &Connection,
    overlays: &mut OverlayMaps,
    tags: &BTreeSet<String>,
    message_id: i64,
) -> Result<bool> {
    for tag in tags {
        let tag_id = dictionary::add_or_get(conn, overlays, DictionaryTable::Tags, tag)?;
        dictionary::attach_tag(conn, tag_id, message_id)?;
    }
    Ok(!tags.is_empty())
}

/// One fully-hydrated row from a Read query, before tags are attached.
#[allow(clippy::too_many_arguments)]
pub fn hydrate(
    id: i64,
    utc_ticks: i64,
    offset_ticks: i64,
    high_precision_timestamp: i64,
    lost_message_count: i64,
    process_id: i64,
    process_name: &str,
    application_name: &str,
    writer_name: &str,
    level_name: &str,
    text: String,
    tags: BTreeSet<String>,
    interner: &StringInterner,
) -> LogMessage {
    LogMessage {
        id,
        timestamp: Timestamp::new(utc_ticks, offset_ticks),
        high_precision_timestamp,
        lost_message_count: lost_message_count as u32,
        process_id: process_id as i32,
        process_name: interner.intern(process_name),
        application_name: interner.intern(application_name),
        log_writer_name: interner.intern(writer_name),
        log_level_name: interner.intern(level_name),
        text,
        tags,
    }
}

/// Prune cutoff arithmetic (§4.5.5, steps 1-4). Returns `None` when there is
/// nothing to prune.
pub fn compute_cutoff(
    conn: &Connection,
    cursor: &Cursor,
    max_count: Option<i64>,
    min_timestamp: Option<Timestamp>,
) -> Result<Option<i64>> {
    if cursor.is_empty() {
        return Ok(None);
    }

    let age_cutoff: Option<i64> = match min_timestamp {
        Some(ts) if ts.utc_ticks > Timestamp::MIN.utc_ticks => conn
            .prepare_cached("SELECT id FROM messages WHERE timestamp < ?1 ORDER BY id DESC LIMIT 1")?
            .query_row([ts.utc_ticks], |row| row.get(0))
            .optional()?,
        _ => None,
    };

    let count_cutoff: Option<i64> = match max_count {
        Some(max_count) if max_count >= 0 => {
            let excess = (cursor.message_count() - max_count).max(0);
            if excess > 0 {
                Some(cursor.oldest_id + excess - 1)
            } else {
                None
            }
        }
        _ => None,
    };

    let cut = match (age_cutoff, count_cutoff) {
        (None, None) => return Ok(None),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (Some(a), Some(b)) => a.max(b),
    };

    // Clamp to at most i32::MAX rows removed in one call (§4.5.5 step 4); the
    // caller is expected to re-invoke prune until the backlog drains below
    // the cap.
    let clamped = if cut - cursor.oldest_id + 1 > i32::MAX as i64 {
        cursor.oldest_id + i32::MAX as i64 - 1
    } else {
        cut
    };

    Ok(Some(clamped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_count_is_zero_when_empty() {
        assert_eq!(Cursor::empty().message_count(), 0);
    }

    #[test]
    fn record_write_sets_oldest_on_first_write() {
        let mut cursor = Cursor::empty();
        cursor.record_write(7);
        assert_eq!(cursor.oldest_id, 7);
        assert_eq!(cursor.newest_id, 7);
        cursor.record_write(8);
        assert_eq!(cursor.oldest_id, 7);
        assert_eq!(cursor.newest_id, 8);
    }
}
