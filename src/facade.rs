// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Log File Facade (§4.6): the public entry point. Owns a [`Accessor`] and
//! dispatches every public call to it, enforcing the New/Open/Disposed state
//! machine and the disposed/read-only checks the Schema Accessor layer
//! doesn't know about.

use std::path::{Path, PathBuf};

use rusqlite::backup::{Backup, StepResult};
use rusqlite::Connection;
use tracing::{instrument, warn};

use crate::error::{Error, Result};
use crate::handle::WriteMode;
use crate::message::{LogMessage, NewLogMessage};
use crate::schema::{Accessor, Purpose};
use crate::ticks::Timestamp;

/// Pages copied per incremental-backup slice, sized to roughly 1 MiB at the
/// fixed 65536-byte page size (§4.6).
const PAGES_PER_SLICE: i32 = 16;

enum State {
    Open(Accessor),
    Disposed,
}

/// A single open log file. Every mutating method requires a writable handle;
/// every method requires the file not yet be disposed.
pub struct LogFile {
    path: PathBuf,
    state: State,
}

/// Logs `err` at `warn` here, at the Facade — the first call site that
/// observes a failure — so lower layers never need to log the same failure
/// again as it bubbles up through them (§7).
fn log_err<T>(result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        warn!(error = %err, "log file operation failed");
    }
    result
}

impl LogFile {
    #[instrument(name = "logfile::create", level = "debug", skip(initial_messages))]
    pub fn create(
        path: &Path,
        purpose: Purpose,
        write_mode: WriteMode,
        initial_messages: Option<&[NewLogMessage]>,
    ) -> Result<Self> {
        log_err((|| {
            if path.exists() {
                return Err(Error::LogFileExistsAlready(path.to_path_buf()));
            }
            let mut accessor = Accessor::create(path, purpose, write_mode)?;
            if let Some(messages) = initial_messages {
                if let Err(err) = accessor.write_messages(messages) {
                    accessor.into_handle().close();
                    let _ = std::fs::remove_file(path);
                    return Err(err);
                }
            }
            if let Err(err) = accessor.create_indices() {
                accessor.into_handle().close();
                let _ = std::fs::remove_file(path);
                return Err(err);
            }
            Ok(Self { path: path.to_path_buf(), state: State::Open(accessor) })
        })())
    }

    /// Forwards to [`Self::open`] or [`Self::create`], both of which already
    /// log their own failures — not wrapped again here to avoid a duplicate
    /// line for the same error.
    pub fn open_or_create(path: &Path, purpose: Purpose, write_mode: WriteMode) -> Result<Self> {
        if path.exists() {
            Self::open(path, write_mode)
        } else {
            Self::create(path, purpose, write_mode, None)
        }
    }

    #[instrument(name = "logfile::open", level = "debug")]
    pub fn open(path: &Path, write_mode: WriteMode) -> Result<Self> {
        log_err((|| {
            if !path.exists() {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            let accessor = Accessor::open(path, write_mode)?;
            Ok(Self { path: path.to_path_buf(), state: State::Open(accessor) })
        })())
    }

    #[instrument(name = "logfile::open_read_only", level = "debug")]
    pub fn open_read_only(path: &Path) -> Result<Self> {
        log_err((|| {
            if !path.exists() {
                return Err(Error::FileNotFound(path.to_path_buf()));
            }
            let accessor = Accessor::open_read_only(path)?;
            Ok(Self { path: path.to_path_buf(), state: State::Open(accessor) })
        })())
    }

    fn accessor(&self) -> Result<&Accessor> {
        match &self.state {
            State::Open(accessor) => Ok(accessor),
            State::Disposed => Err(Error::AlreadyDisposed),
        }
    }

    fn accessor_mut(&mut self) -> Result<&mut Accessor> {
        match &mut self.state {
            State::Open(accessor) => Ok(accessor),
            State::Disposed => Err(Error::AlreadyDisposed),
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn purpose(&self) -> Result<Purpose> {
        log_err(self.accessor().map(|a| a.purpose()))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn oldest_id(&self) -> Result<i64> {
        log_err(self.accessor().map(|a| a.oldest_id()))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn newest_id(&self) -> Result<i64> {
        log_err(self.accessor().map(|a| a.newest_id()))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn message_count(&self) -> Result<i64> {
        log_err(self.accessor().map(|a| a.message_count()))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn is_read_only(&self) -> Result<bool> {
        log_err(self.accessor().map(|a| a.is_read_only()))
    }

    pub fn used_process_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.used_process_names()))
    }

    pub fn used_application_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.used_application_names()))
    }

    pub fn used_writer_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.used_writer_names()))
    }

    pub fn used_level_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.used_level_names()))
    }

    pub fn all_process_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.all_process_names()))
    }

    pub fn all_application_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.all_application_names()))
    }

    pub fn all_writer_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.all_writer_names()))
    }

    pub fn all_level_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.all_level_names()))
    }

    pub fn all_tag_names(&self) -> Result<Vec<String>> {
        log_err(self.accessor().and_then(|a| a.all_tag_names()))
    }

    #[instrument(level = "debug", skip(self, message))]
    pub fn write(&mut self, message: &NewLogMessage) -> Result<i64> {
        log_err(self.accessor_mut().and_then(|a| a.write_message(message)))
    }

    #[instrument(level = "debug", skip(self, messages))]
    pub fn write_all(&mut self, messages: &[NewLogMessage]) -> Result<usize> {
        log_err(self.accessor_mut().and_then(|a| a.write_messages(messages)))
    }

    pub fn read(&self, from_id: i64, count: i64, callback: &mut dyn FnMut(LogMessage) -> bool) -> Result<bool> {
        log_err(self.accessor().and_then(|a| a.read(from_id, count, callback)))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn prune(&mut self, max_count: Option<i64>, min_timestamp: Option<Timestamp>) -> Result<i64> {
        log_err(self.accessor_mut().and_then(|a| a.prune(max_count, min_timestamp)))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn prune_collecting(
        &mut self,
        max_count: Option<i64>,
        min_timestamp: Option<Timestamp>,
    ) -> Result<(i64, Vec<LogMessage>)> {
        log_err(self.accessor_mut().and_then(|a| a.prune_collecting(max_count, min_timestamp)))
    }

    #[instrument(level = "debug", skip(self))]
    pub fn clear(&mut self, messages_only: bool) -> Result<()> {
        log_err(self.accessor_mut().and_then(|accessor| {
            if messages_only {
                accessor.clear_specific()
            } else {
                accessor.clear_all()
            }
        }))
    }

    /// `VACUUM`s the underlying connection in place.
    #[instrument(name = "logfile::compact", level = "debug", skip(self))]
    pub fn compact(&mut self) -> Result<()> {
        log_err((|| {
            self.accessor()?.connection().execute_batch("VACUUM;")?;
            Ok(())
        })())
    }

    /// Non-cancellable snapshot: `VACUUM INTO dst`.
    #[instrument(name = "logfile::save_snapshot", level = "debug", skip(self))]
    pub fn save_snapshot(&self, dst: &Path) -> Result<()> {
        log_err((|| {
            self.accessor()?.connection().execute("VACUUM INTO ?1", [dst.to_string_lossy()])?;
            Ok(())
        })())
    }

    /// Cancellable snapshot driven by the incremental backup API, streaming
    /// pages in slices and reporting progress after each one (§4.6).
    #[instrument(name = "logfile::save_snapshot_with_progress", level = "debug", skip(self, progress))]
    pub fn save_snapshot_with_progress(
        &self,
        dst: &Path,
        mut progress: impl FnMut(f64, bool) -> bool,
    ) -> Result<()> {
        log_err((|| {
            // Cancelling on the very first call still owes the caller the
            // closing invocation the contract promises unconditionally.
            if !progress(0.0, false) {
                progress(1.0, true);
                return Ok(());
            }

            let src_conn = self.accessor()?.connection();
            let page_size: i64 = src_conn.pragma_query_value(None, "page_size", |row| row.get(0))?;

            let mut dst_conn = Connection::open(dst)?;
            dst_conn.pragma_update(None, "journal_mode", "OFF")?;
            dst_conn.pragma_update(None, "synchronous", "OFF")?;
            dst_conn.pragma_update(None, "page_size", page_size)?;

            let cancelled = {
                let backup = Backup::new(src_conn, &mut dst_conn)?;
                let mut cancelled = false;
                loop {
                    match backup.step(PAGES_PER_SLICE)? {
                        StepResult::Done => break,
                        StepResult::More => {
                            let p = backup.progress();
                            let fraction = if p.pagecount > 0 {
                                (p.pagecount - p.remaining) as f64 / p.pagecount as f64
                            } else {
                                1.0
                            };
                            if !progress(fraction, false) {
                                cancelled = true;
                                break;
                            }
                        }
                        StepResult::Busy | StepResult::Locked => {
                            warn!("backup step reported contention, retrying");
                        }
                    }
                }
                cancelled
            };

            drop(dst_conn);

            if cancelled {
                progress(1.0, true);
                let _ = std::fs::remove_file(dst);
                return Ok(());
            }

            let dst_conn = Connection::open(dst)?;
            dst_conn.execute_batch("VACUUM;")?;
            drop(dst_conn);

            progress(1.0, false);
            Ok(())
        })())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent: disposing an already-disposed file is a no-op.
    pub fn dispose(&mut self) {
        if let State::Open(accessor) = std::mem::replace(&mut self.state, State::Disposed) {
            accessor.into_handle().close();
        }
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        self.dispose();
    }
}
