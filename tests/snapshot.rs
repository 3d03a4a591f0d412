// Copyright (c) reifydb.com 2025
// This file is licensed under the AGPL-3.0-or-later

use std::collections::BTreeSet;

use griffith_logstore::{LogFile, NewLogMessage, Purpose, Timestamp, WriteMode};

const TICKS_PER_SECOND: i64 = 10_000_000;
const BASE_TICKS: i64 = 638_390_976_000_000_000;

fn message(seconds: i64) -> NewLogMessage {
    NewLogMessage {
        timestamp: Timestamp::new(BASE_TICKS + seconds * TICKS_PER_SECOND, 0),
        high_precision_timestamp: seconds,
        lost_message_count: 0,
        process_id: 7,
        process_name: "p".into(),
        application_name: "a".into(),
        log_writer_name: "w".into(),
        log_level_name: "l".into(),
        text: format!("message-{seconds}"),
        tags: BTreeSet::new(),
    }
}

#[test]
fn vacuum_into_snapshot_reads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("source.glog");
    let dst_path = dir.path().join("snapshot.glog");

    let mut file = LogFile::create(&src_path, Purpose::Recording, WriteMode::Robust, None).unwrap();
    let batch: Vec<_> = (0..10).map(message).collect();
    file.write_all(&batch).unwrap();

    file.save_snapshot(&dst_path).unwrap();
    assert!(dst_path.exists());

    let snapshot = LogFile::open_read_only(&dst_path).unwrap();
    assert_eq!(snapshot.oldest_id().unwrap(), file.oldest_id().unwrap());
    assert_eq!(snapshot.newest_id().unwrap(), file.newest_id().unwrap());

    let mut source_rows = Vec::new();
    file.read(0, 10, &mut |m| {
        source_rows.push(m);
        true
    }).unwrap();

    let mut snapshot_rows = Vec::new();
    snapshot.read(0, 10, &mut |m| {
        snapshot_rows.push(m);
        true
    }).unwrap();

    assert_eq!(source_rows.len(), snapshot_rows.len());
    for (src, dst) in source_rows.iter().zip(snapshot_rows.iter()) {
        assert_eq!(src.id, dst.id);
        assert_eq!(src.text, dst.text);
        assert_eq!(src.timestamp, dst.timestamp);
    }
}

#[test]
fn incremental_snapshot_can_be_cancelled_mid_stream() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("source.glog");
    let dst_path = dir.path().join("partial.glog");

    let mut file = LogFile::create(&src_path, Purpose::Recording, WriteMode::Robust, None).unwrap();
    let batch: Vec<_> = (0..1000).map(message).collect();
    file.write_all(&batch).unwrap();

    let mut calls = Vec::new();
    file.save_snapshot_with_progress(&dst_path, |progress, cancelled| {
        calls.push((progress, cancelled));
        calls.len() <= 1
    }).unwrap();

    assert!(!dst_path.exists(), "cancelled snapshot must not leave a partial file behind");
    assert_eq!(calls.first(), Some(&(0.0, false)));
    assert_eq!(calls.last(), Some(&(1.0, true)));
}

#[test]
fn incremental_snapshot_completes_when_never_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("source.glog");
    let dst_path = dir.path().join("full.glog");

    let mut file = LogFile::create(&src_path, Purpose::Recording, WriteMode::Robust, None).unwrap();
    let batch: Vec<_> = (0..50).map(message).collect();
    file.write_all(&batch).unwrap();

    let mut calls = Vec::new();
    file.save_snapshot_with_progress(&dst_path, |progress, cancelled| {
        calls.push((progress, cancelled));
        true
    }).unwrap();

    assert!(dst_path.exists());
    assert_eq!(calls.last(), Some(&(1.0, false)));

    let snapshot = LogFile::open_read_only(&dst_path).unwrap();
    assert_eq!(snapshot.message_count().unwrap(), 50);
}
