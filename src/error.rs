// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Errors surfaced by the public [`crate::LogFile`] API.
///
/// Engine-level failures are never stringified away: [`Error::LogFileError`]
/// keeps the original `rusqlite::Error` in the variant itself (not just its
/// message), so callers can still recover it via
/// [`std::error::Error::source`].
#[derive(Debug)]
pub enum Error {
    LogFileExistsAlready(PathBuf),
    FileNotFound(PathBuf),
    InvalidLogFileFormat(PathBuf),
    FileVersionNotSupported(i64),
    ReadOnlyViolation,
    ArgumentOutOfRange(String),
    WriteModeNotSpecified,
    PurposeNotSpecified,
    AlreadyDisposed,
    LogFileError(rusqlite::Error),
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::LogFileExistsAlready(path) => {
                write!(f, "log file already exists: {}", path.display())
            }
            Error::FileNotFound(path) => write!(f, "log file not found: {}", path.display()),
            Error::InvalidLogFileFormat(path) => {
                write!(f, "not a valid log file (application id mismatch): {}", path.display())
            }
            Error::FileVersionNotSupported(version) => {
                write!(f, "log file schema version {version} is not supported")
            }
            Error::ReadOnlyViolation => write!(f, "cannot mutate a log file opened read-only"),
            Error::ArgumentOutOfRange(msg) => write!(f, "argument out of range: {msg}"),
            Error::WriteModeNotSpecified => write!(f, "write mode must be specified"),
            Error::PurposeNotSpecified => {
                write!(f, "purpose must be specified when creating a new log file")
            }
            Error::AlreadyDisposed => write!(f, "log file handle has already been disposed"),
            Error::LogFileError(err) => write!(f, "log file operation failed: {err}"),
            Error::Io(err) => Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::LogFileError(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::LogFileError(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
