// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

//! Message data contract (ingress/egress).
//!
//! This type is "external" in the sense that the distilled specification
//! treats it as a data contract owned elsewhere, but the core still needs a
//! concrete shape to write and read against. [`NewLogMessage`] is what callers
//! hand to [`crate::LogFile::write`]; [`LogMessage`] is what Read hands back,
//! with the assigned id attached.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::ticks::Timestamp;

/// A message submitted for storage. No `id` — one is assigned on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogMessage {
    pub timestamp: Timestamp,
    pub high_precision_timestamp: i64,
    pub lost_message_count: u32,
    pub process_id: i32,
    pub process_name: String,
    pub application_name: String,
    pub log_writer_name: String,
    pub log_level_name: String,
    pub text: String,
    pub tags: BTreeSet<String>,
}

/// A message retrieved from storage. Logically immutable: every field is
/// `pub` but there is deliberately no setter — callers that need a modified
/// copy build a new value with `..` struct update syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub id: i64,
    pub timestamp: Timestamp,
    pub high_precision_timestamp: i64,
    pub lost_message_count: u32,
    pub process_id: i32,
    pub process_name: Arc<str>,
    pub application_name: Arc<str>,
    pub log_writer_name: Arc<str>,
    pub log_level_name: Arc<str>,
    pub text: String,
    pub tags: BTreeSet<String>,
}

impl LogMessage {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }
}
