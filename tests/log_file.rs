// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

use std::collections::BTreeSet;

use griffith_logstore::{Error, LogFile, NewLogMessage, Purpose, Timestamp, WriteMode};

const TICKS_PER_SECOND: i64 = 10_000_000;
const BASE_TICKS: i64 = 638_390_976_000_000_000;

fn message(seconds: i64, text: &str) -> NewLogMessage {
    NewLogMessage {
        timestamp: Timestamp::new(BASE_TICKS + seconds * TICKS_PER_SECOND, 0),
        high_precision_timestamp: seconds,
        lost_message_count: 0,
        process_id: 42,
        process_name: "p".into(),
        application_name: "a".into(),
        log_writer_name: "w".into(),
        log_level_name: "l".into(),
        text: text.into(),
        tags: BTreeSet::new(),
    }
}

fn seed_three(path: &std::path::Path) -> LogFile {
    let mut file = LogFile::create(path, Purpose::Recording, WriteMode::Robust, None).unwrap();
    assert_eq!(file.write(&message(0, "m1")).unwrap(), 0);
    assert_eq!(file.write(&message(1, "m2")).unwrap(), 1);
    assert_eq!(file.write(&message(2, "m3")).unwrap(), 2);
    file
}

#[test]
fn create_write_read_round_trips_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let file = seed_three(&path);

    assert_eq!(file.oldest_id().unwrap(), 0);
    assert_eq!(file.newest_id().unwrap(), 2);
    assert_eq!(file.message_count().unwrap(), 3);

    let mut seen = Vec::new();
    let completed = file.read(0, 3, &mut |m| {
        seen.push(m);
        true
    }).unwrap();
    assert!(completed);
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].id, 0);
    assert_eq!(seen[1].id, 1);
    assert_eq!(seen[2].id, 2);
    assert_eq!(seen[0].text, "m1");
    assert_eq!(&*seen[0].process_name, "p");
    assert_eq!(&*seen[0].application_name, "a");
    assert_eq!(&*seen[0].log_writer_name, "w");
    assert_eq!(&*seen[0].log_level_name, "l");
    assert!(!seen[0].has_tags());

    assert_eq!(file.all_process_names().unwrap(), vec!["p".to_string()]);
    assert_eq!(file.all_application_names().unwrap(), vec!["a".to_string()]);
    assert_eq!(file.all_writer_names().unwrap(), vec!["w".to_string()]);
    assert_eq!(file.all_level_names().unwrap(), vec!["l".to_string()]);
    assert!(file.all_tag_names().unwrap().is_empty());
}

#[test]
fn prune_by_count_drops_oldest_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let mut file = seed_three(&path);

    let removed = file.prune(Some(2), Some(Timestamp::MIN)).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(file.oldest_id().unwrap(), 1);
    assert_eq!(file.newest_id().unwrap(), 2);
    assert_eq!(file.message_count().unwrap(), 2);
}

#[test]
fn prune_by_age_drops_messages_older_than_cutoff() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let mut file = seed_three(&path);

    let cutoff = Timestamp::new(BASE_TICKS + TICKS_PER_SECOND + TICKS_PER_SECOND / 2, 0);
    let removed = file.prune(None, Some(cutoff)).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(file.oldest_id().unwrap(), 2);
    assert_eq!(file.newest_id().unwrap(), 2);
}

#[test]
fn tags_round_trip_in_analysis_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.glog");
    let mut file = LogFile::create(&path, Purpose::Analysis, WriteMode::Robust, None).unwrap();

    let mut msg = message(0, "tagged");
    msg.tags.insert("net".to_string());
    msg.tags.insert("io".to_string());
    file.write(&msg).unwrap();

    let mut seen = Vec::new();
    file.read(0, 1, &mut |m| {
        seen.push(m);
        true
    }).unwrap();

    assert_eq!(seen.len(), 1);
    assert!(seen[0].has_tags());
    let tags: Vec<_> = seen[0].tags.iter().cloned().collect();
    assert_eq!(tags, vec!["io".to_string(), "net".to_string()]);

    let mut tag_names = file.all_tag_names().unwrap();
    tag_names.sort();
    assert_eq!(tag_names, vec!["io".to_string(), "net".to_string()]);
}

#[test]
fn read_stop_after_first_row_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let file = seed_three(&path);

    let mut count = 0;
    let completed = file.read(0, 3, &mut |_m| {
        count += 1;
        count < 2
    }).unwrap();
    assert!(!completed);
    assert_eq!(count, 2);
}

#[test]
fn read_rejects_out_of_range_from_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let file = seed_three(&path);

    let err = file.read(99, 1, &mut |_| true).unwrap_err();
    assert!(matches!(err, Error::ArgumentOutOfRange(_)));
}

#[test]
fn clear_messages_only_preserves_dictionaries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let mut file = seed_three(&path);

    file.clear(true).unwrap();
    assert_eq!(file.message_count().unwrap(), 0);
    assert_eq!(file.oldest_id().unwrap(), -1);
    assert_eq!(file.all_process_names().unwrap(), vec!["p".to_string()]);
}

#[test]
fn clear_all_wipes_dictionaries_too() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let mut file = seed_three(&path);

    file.clear(false).unwrap();
    assert_eq!(file.message_count().unwrap(), 0);
    assert!(file.all_process_names().unwrap().is_empty());
}

#[test]
fn create_rejects_pre_existing_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let _first = LogFile::create(&path, Purpose::Recording, WriteMode::Robust, None).unwrap();

    let err = LogFile::create(&path, Purpose::Recording, WriteMode::Robust, None).unwrap_err();
    assert!(matches!(err, Error::LogFileExistsAlready(_)));
}

#[test]
fn open_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.glog");
    let err = LogFile::open(&path, WriteMode::Robust).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[test]
fn write_on_read_only_handle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    {
        let _file = seed_three(&path);
    }

    let mut reopened = LogFile::open_read_only(&path).unwrap();
    let err = reopened.write(&message(0, "m4")).unwrap_err();
    assert!(matches!(err, Error::ReadOnlyViolation));
}

#[test]
fn schema_purpose_survives_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let recording_path = dir.path().join("recording.glog");
    let analysis_path = dir.path().join("analysis.glog");

    {
        let _r = LogFile::create(&recording_path, Purpose::Recording, WriteMode::Robust, None).unwrap();
        let _a = LogFile::create(&analysis_path, Purpose::Analysis, WriteMode::Robust, None).unwrap();
    }

    let reopened_recording = LogFile::open(&recording_path, WriteMode::Robust).unwrap();
    let reopened_analysis = LogFile::open(&analysis_path, WriteMode::Robust).unwrap();
    assert_eq!(reopened_recording.purpose().unwrap(), Purpose::Recording);
    assert_eq!(reopened_analysis.purpose().unwrap(), Purpose::Analysis);
}

#[test]
fn compact_does_not_disturb_message_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    let mut file = seed_three(&path);

    file.compact().unwrap();
    assert_eq!(file.message_count().unwrap(), 3);
}

#[test]
fn open_rejects_application_id_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    {
        let _file = seed_three(&path);
    }

    {
        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.pragma_update(None, "application_id", 0xDEAD_BEEFu32 as i32).unwrap();
    }

    let err = LogFile::open(&path, WriteMode::Robust).unwrap_err();
    assert!(matches!(err, Error::InvalidLogFileFormat(_)));
}

#[test]
fn open_rejects_unsupported_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.glog");
    {
        let _file = seed_three(&path);
    }

    {
        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.pragma_update(None, "user_version", 99i64).unwrap();
    }

    let err = LogFile::open(&path, WriteMode::Robust).unwrap_err();
    assert!(matches!(err, Error::FileVersionNotSupported(99)));
}
