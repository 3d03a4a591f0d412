// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Schema Accessor (§4.5): the polymorphic layer over {Recording, Analysis}.
//!
//! Modeled per §9's design note as a tagged variant (not an inheritance
//! hierarchy): [`SchemaAccessor`] is the shared capability set
//! (`{Purpose, GetUsedXxx, ClearSpecific, Read, WriteLogMessage, Prune}`
//! from §4.7), implemented once each by [`recording::RecordingAccessor`] and
//! [`analysis::AnalysisAccessor`], and [`Accessor`] is the enum the Facade
//! actually holds and dispatches through.

pub mod analysis;
pub mod common;
pub mod recording;

use std::path::Path;

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::handle::{DatabaseHandle, WriteMode};
use crate::message::{LogMessage, NewLogMessage};
use crate::ticks::Timestamp;

use analysis::AnalysisAccessor;
use recording::RecordingAccessor;

/// The fixed application magic stored via `PRAGMA application_id` (Invariant 6).
pub const APPLICATION_MAGIC: i32 = 0x4750_4C47u32 as i32;

pub const SCHEMA_VERSION_RECORDING: i64 = 1;
pub const SCHEMA_VERSION_ANALYSIS: i64 = 2;

/// Purpose options (§6). `NotSpecified` is only valid when opening an
/// existing file — the purpose is then recovered from the on-disk schema
/// version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Recording,
    Analysis,
    NotSpecified,
}

impl Purpose {
    fn schema_version(self) -> Result<i64> {
        match self {
            Purpose::Recording => Ok(SCHEMA_VERSION_RECORDING),
            Purpose::Analysis => Ok(SCHEMA_VERSION_ANALYSIS),
            Purpose::NotSpecified => Err(Error::PurposeNotSpecified),
        }
    }

    fn from_schema_version(version: i64) -> Result<Self> {
        match version {
            SCHEMA_VERSION_RECORDING => Ok(Purpose::Recording),
            SCHEMA_VERSION_ANALYSIS => Ok(Purpose::Analysis),
            other => Err(Error::FileVersionNotSupported(other)),
        }
    }
}

/// The shared capability set every Schema Accessor implements (§4.7).
pub trait SchemaAccessor {
    fn purpose(&self) -> Purpose;
    fn oldest_id(&self) -> i64;
    fn newest_id(&self) -> i64;

    fn message_count(&self) -> i64 {
        let (oldest, newest) = (self.oldest_id(), self.newest_id());
        if oldest < 0 || newest < oldest {
            0
        } else {
            newest - oldest + 1
        }
    }

    fn is_read_only(&self) -> bool;

    fn used_process_names(&self) -> Result<Vec<String>>;
    fn used_application_names(&self) -> Result<Vec<String>>;
    fn used_writer_names(&self) -> Result<Vec<String>>;
    fn used_level_names(&self) -> Result<Vec<String>>;

    fn all_process_names(&self) -> Result<Vec<String>>;
    fn all_application_names(&self) -> Result<Vec<String>>;
    fn all_writer_names(&self) -> Result<Vec<String>>;
    fn all_level_names(&self) -> Result<Vec<String>>;
    fn all_tag_names(&self) -> Result<Vec<String>>;

    fn write_message(&mut self, message: &NewLogMessage) -> Result<i64>;
    fn write_messages(&mut self, messages: &[NewLogMessage]) -> Result<usize>;

    /// Invokes `callback` once per row in `[from_id, from_id + count)`
    /// (clamped to `newest_id`), in ascending id order. Returns `false` if
    /// the callback stopped iteration early.
    fn read(&self, from_id: i64, count: i64, callback: &mut dyn FnMut(LogMessage) -> bool) -> Result<bool>;

    fn prune(&mut self, max_count: Option<i64>, min_timestamp: Option<Timestamp>) -> Result<i64>;
    fn prune_collecting(
        &mut self,
        max_count: Option<i64>,
        min_timestamp: Option<Timestamp>,
    ) -> Result<(i64, Vec<LogMessage>)>;

    /// Drops and recreates only the schema-specific tables and indices;
    /// dictionary tables are preserved.
    fn clear_specific(&mut self) -> Result<()>;

    /// Drops and recreates the schema-specific tables AND the common
    /// dictionary tables, and clears every Overlay Map.
    fn clear_all(&mut self) -> Result<()>;

    /// Creates every index (common, then schema-specific). Deferred until
    /// after the initial seed batch at file birth (§4.5.1 step d).
    fn create_indices(&self) -> Result<()>;

    fn connection(&self) -> &Connection;
    fn into_handle(self: Box<Self>) -> DatabaseHandle;
}

/// The enum the Facade holds; dispatches through [`SchemaAccessor`] without
/// ever matching on schema version again after open-time dispatch.
pub enum Accessor {
    Recording(RecordingAccessor),
    Analysis(AnalysisAccessor),
}

macro_rules! forward {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Accessor::Recording(a) => a.$method($($arg),*),
            Accessor::Analysis(a) => a.$method($($arg),*),
        }
    };
}

impl Accessor {
    pub fn purpose(&self) -> Purpose {
        forward!(self, purpose)
    }

    pub fn oldest_id(&self) -> i64 {
        forward!(self, oldest_id)
    }

    pub fn newest_id(&self) -> i64 {
        forward!(self, newest_id)
    }

    pub fn message_count(&self) -> i64 {
        forward!(self, message_count)
    }

    pub fn is_read_only(&self) -> bool {
        forward!(self, is_read_only)
    }

    pub fn used_process_names(&self) -> Result<Vec<String>> {
        forward!(self, used_process_names)
    }

    pub fn used_application_names(&self) -> Result<Vec<String>> {
        forward!(self, used_application_names)
    }

    pub fn used_writer_names(&self) -> Result<Vec<String>> {
        forward!(self, used_writer_names)
    }

    pub fn used_level_names(&self) -> Result<Vec<String>> {
        forward!(self, used_level_names)
    }

    pub fn all_process_names(&self) -> Result<Vec<String>> {
        forward!(self, all_process_names)
    }

    pub fn all_application_names(&self) -> Result<Vec<String>> {
        forward!(self, all_application_names)
    }

    pub fn all_writer_names(&self) -> Result<Vec<String>> {
        forward!(self, all_writer_names)
    }

    pub fn all_level_names(&self) -> Result<Vec<String>> {
        forward!(self, all_level_names)
    }

    pub fn all_tag_names(&self) -> Result<Vec<String>> {
        forward!(self, all_tag_names)
    }

    pub fn write_message(&mut self, message: &NewLogMessage) -> Result<i64> {
        forward!(self, write_message, message)
    }

    pub fn write_messages(&mut self, messages: &[NewLogMessage]) -> Result<usize> {
        forward!(self, write_messages, messages)
    }

    pub fn read(&self, from_id: i64, count: i64, callback: &mut dyn FnMut(LogMessage) -> bool) -> Result<bool> {
        forward!(self, read, from_id, count, callback)
    }

    pub fn prune(&mut self, max_count: Option<i64>, min_timestamp: Option<Timestamp>) -> Result<i64> {
        forward!(self, prune, max_count, min_timestamp)
    }

    pub fn prune_collecting(
        &mut self,
        max_count: Option<i64>,
        min_timestamp: Option<Timestamp>,
    ) -> Result<(i64, Vec<LogMessage>)> {
        forward!(self, prune_collecting, max_count, min_timestamp)
    }

    pub fn clear_specific(&mut self) -> Result<()> {
        forward!(self, clear_specific)
    }

    pub fn clear_all(&mut self) -> Result<()> {
        forward!(self, clear_all)
    }

    pub fn create_indices(&self) -> Result<()> {
        forward!(self, create_indices)
    }

    pub fn connection(&self) -> &Connection {
        match self {
            Accessor::Recording(a) => a.connection(),
            Accessor::Analysis(a) => a.connection(),
        }
    }

    pub fn into_handle(self) -> DatabaseHandle {
        match self {
            Accessor::Recording(a) => Box::new(a).into_handle(),
            Accessor::Analysis(a) => Box::new(a).into_handle(),
        }
    }

    /// Opens an existing file, dispatching on the on-disk schema version
    /// (§4.5.2). Rejects a magic mismatch or an unsupported version before
    /// any table is touched.
    pub fn open(path: &Path, write_mode: WriteMode) -> Result<Self> {
        let handle = DatabaseHandle::open_read_write(path, write_mode)?;
        Self::from_existing_handle(handle, path)
    }

    pub fn open_read_only(path: &Path) -> Result<Self> {
        let handle = DatabaseHandle::open_read_only(path)?;
        Self::from_existing_handle(handle, path)
    }

    fn from_existing_handle(handle: DatabaseHandle, path: &Path) -> Result<Self> {
        let magic: i32 = handle.connection().pragma_query_value(None, "application_id", |row| row.get(0))?;
        if magic != APPLICATION_MAGIC {
            return Err(Error::InvalidLogFileFormat(path.to_path_buf()));
        }
        let version: i64 = handle.connection().pragma_query_value(None, "user_version", |row| row.get(0))?;
        match Purpose::from_schema_version(version)? {
            Purpose::Recording => Ok(Accessor::Recording(RecordingAccessor::open_existing(handle)?)),
            Purpose::Analysis => Ok(Accessor::Analysis(AnalysisAccessor::open_existing(handle)?)),
            Purpose::NotSpecified => unreachable!("from_schema_version never returns NotSpecified"),
        }
    }

    /// Creates a brand-new file with the given `purpose`. `path` must not
    /// already exist — the caller (the Facade) is responsible for that check
    /// so the error can name the right variant (`LogFileExistsAlready`).
    pub fn create(path: &Path, purpose: Purpose, write_mode: WriteMode) -> Result<Self> {
        let schema_version = purpose.schema_version()?;
        let handle = DatabaseHandle::open_read_write(path, write_mode)?;
        let conn = handle.connection();
        conn.pragma_update(None, "application_id", APPLICATION_MAGIC)?;
        conn.pragma_update(None, "user_version", schema_version)?;
        conn.pragma_update(None, "page_size", 65536i64)?;
        // UTF-8 is SQLite's default text encoding; no pragma needed.

        match purpose {
            Purpose::Recording => Ok(Accessor::Recording(RecordingAccessor::create_new(handle)?)),
            Purpose::Analysis => Ok(Accessor::Analysis(AnalysisAccessor::create_new(handle)?)),
            Purpose::NotSpecified => unreachable!("schema_version() rejects NotSpecified above"),
        }
    }
}
