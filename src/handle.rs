// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Database Handle (§4.3): owns the connection, applies mode-specific
//! pragmas, and drives the single transaction primitive every mutating
//! operation goes through.

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::interner::StringInterner;
use crate::overlay::OverlayMaps;

/// Write-mode options (§6). `NotSpecified` is a legal value at the type
/// level but rejected at every use site that would otherwise need it —
/// `DatabaseHandle::open_read_write` returns [`Error::WriteModeNotSpecified`]
/// rather than silently defaulting to one of the real modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// `synchronous=NORMAL`, `journal_mode=WAL`. Rollback is supported.
    Robust,
    /// `synchronous=OFF`, `journal_mode=OFF`. Rollback is NOT supported; a
    /// failed transaction leaves the file in an undefined state.
    Fast,
    NotSpecified,
}

impl WriteMode {
    fn require(self) -> Result<Self> {
        match self {
            WriteMode::NotSpecified => Err(Error::WriteModeNotSpecified),
            mode => Ok(mode),
        }
    }

    fn supports_rollback(self) -> bool {
        matches!(self, WriteMode::Robust)
    }
}

pub struct DatabaseHandle {
    conn: Connection,
    write_mode: Option<WriteMode>,
    read_only: bool,
    pub overlays: OverlayMaps,
    pub interner: StringInterner,
}

impl DatabaseHandle {
    #[instrument(name = "handle::open_read_write", level = "debug", skip(path))]
    pub fn open_read_write(path: &Path, write_mode: WriteMode) -> Result<Self> {
        let write_mode = write_mode.require()?;
        let conn = Connection::open(path)?;
        apply_common_pragmas(&conn)?;
        match write_mode {
            WriteMode::Robust => {
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            WriteMode::Fast => {
                conn.pragma_update(None, "synchronous", "OFF")?;
                conn.pragma_update(None, "journal_mode", "OFF")?;
            }
            WriteMode::NotSpecified => unreachable!("require() rejects NotSpecified"),
        }
        // Materialize the exclusive file lock for the lifetime of the handle.
        conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;")?;

        Ok(Self {
            conn,
            write_mode: Some(write_mode),
            read_only: false,
            overlays: OverlayMaps::new(),
            interner: StringInterner::new(),
        })
    }

    #[instrument(name = "handle::open_read_only", level = "debug", skip(path))]
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        apply_common_pragmas(&conn)?;
        // A read-only connection cannot BEGIN EXCLUSIVE; `locking_mode =
        // EXCLUSIVE` combined with any statement is enough to make SQLite
        // escalate to, and hold, the exclusive lock for the connection's
        // lifetime.
        conn.query_row("SELECT 1", [], |_| Ok(()))?;

        Ok(Self {
            conn,
            write_mode: None,
            read_only: true,
            overlays: OverlayMaps::new(),
            interner: StringInterner::new(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyViolation);
        }
        Ok(())
    }

    /// Runs `op` inside `BEGIN IMMEDIATE TRANSACTION`, committing the Overlay
    /// Maps on success and discarding their staged entries on failure (§4.3).
    /// In `Fast` mode a failed transaction is not rolled back: the error is
    /// propagated with the on-disk state left as-is.
    pub fn run_in_transaction<T>(
        &mut self,
        op: impl FnOnce(&Connection, &mut OverlayMaps) -> Result<T>,
    ) -> Result<T> {
        self.require_writable()?;
        self.conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;

        match op(&self.conn, &mut self.overlays) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT TRANSACTION;")?;
                self.overlays.commit_all();
                Ok(value)
            }
            Err(err) => {
                self.overlays.discard_all();
                if self.write_mode.map(WriteMode::supports_rollback).unwrap_or(false) {
                    // Best-effort: if the rollback itself fails there is
                    // nothing more this layer can do but propagate the
                    // original error.
                    let _ = self.conn.execute_batch("ROLLBACK TRANSACTION;");
                }
                Err(err)
            }
        }
    }

    /// Closes the underlying connection. If the handle was opened in
    /// `Robust` (WAL) mode, switches to `journal_mode=delete` first so no
    /// orphan `-shm`/`-wal` sidecar files are left behind; errors from that
    /// best-effort step are swallowed.
    pub fn close(self) {
        if self.write_mode == Some(WriteMode::Robust) {
            if let Err(err) = self.conn.pragma_update(None, "journal_mode", "delete") {
                debug!(?err, "failed to switch journal mode to delete on close");
            }
        }
        // Connection is dropped here, releasing every cached prepared
        // statement together with it.
    }
}

fn apply_common_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "busy_timeout", 5000i64)?;
    conn.pragma_update(None, "locking_mode", "EXCLUSIVE")?;
    Ok(())
}
