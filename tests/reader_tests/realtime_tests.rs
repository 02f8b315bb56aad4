//! Tests for the dispatching Realtime Reader
//!
//! These tests verify:
//! - Strategy selection from hoodie.realtime.merge.skip
//! - Configuration errors surface before any file is touched
//! - Setup failures surface from the constructor
//! - Placeholder reuse through advance_into
//! - End to end reads over a row file base and log files

use std::path::{Path, PathBuf};

use morread::base::BaseRecordSource;
use morread::{
    FileSplit, JobConf, LogFile, MorError, RealtimeReader, ReaderConfig, Record, RecordIterator,
    Value, REALTIME_SKIP_MERGE_PROP,
};

use crate::common::{
    data, delete, drain, end_of_commit, extractor, log_file, memory_base, pairs, rec, rollback,
    schema, setup_temp_dir, write_base,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn job(skip_merge: &str) -> JobConf {
    JobConf::new().with(REALTIME_SKIP_MERGE_PROP, skip_merge)
}

/// Base {A:1, B:1} at instant 10; log updates A and deletes B
fn scenario_split(dir: &Path) -> FileSplit {
    let base_path = dir.join("base.row");
    write_base(&base_path, &[rec("A", 0, 1), rec("B", 0, 1)]);

    let log = log_file(
        dir,
        "1.log",
        10,
        &[
            data(11, vec![rec("A", 5, 2)]),
            end_of_commit(11),
            delete(12, &[("B", 5)]),
            end_of_commit(12),
        ],
    );
    FileSplit::new(base_path, 10, vec![log])
}

fn open(split: &FileSplit, job: &JobConf) -> morread::Result<RealtimeReader> {
    RealtimeReader::open(split, job, ReaderConfig::default(), extractor())
}

fn missing(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

// =============================================================================
// Strategy Selection Tests
// =============================================================================

#[test]
fn test_default_is_compacted() {
    let (_temp, dir) = setup_temp_dir();
    let split = scenario_split(&dir);

    let mut reader = open(&split, &JobConf::new()).unwrap();

    assert!(reader.is_merging());
    assert!(matches!(reader, RealtimeReader::Compacted(_)));
    assert_eq!(drain(&mut reader), pairs(&[("A", 2)]));
}

#[test]
fn test_skip_merge_is_unmerged() {
    let (_temp, dir) = setup_temp_dir();
    let split = scenario_split(&dir);

    let mut reader = open(&split, &job("true")).unwrap();

    assert!(!reader.is_merging());
    assert_eq!(drain(&mut reader), pairs(&[("A", 1), ("B", 1), ("A", 2)]));
}

#[test]
fn test_skip_merge_flag_is_case_insensitive() {
    let (_temp, dir) = setup_temp_dir();
    let split = scenario_split(&dir);

    assert!(!open(&split, &job("TRUE")).unwrap().is_merging());
    assert!(open(&split, &job("False")).unwrap().is_merging());
}

#[test]
fn test_invalid_flag_fails_before_io() {
    let (_temp, dir) = setup_temp_dir();
    let split = FileSplit::new(
        missing(&dir, "base.row"),
        1,
        vec![LogFile::new(missing(&dir, "1.log"), 1)],
    );

    let result = open(&split, &job("maybe"));

    match result {
        Err(MorError::Config(msg)) => assert!(msg.contains(REALTIME_SKIP_MERGE_PROP)),
        Err(other) => panic!("expected Config error, got {:?}", other),
        Ok(_) => panic!("expected construction to fail"),
    }
}

// =============================================================================
// Setup Failure Tests
// =============================================================================

#[test]
fn test_missing_base_file_fails_construction() {
    let (_temp, dir) = setup_temp_dir();
    let split = FileSplit::new(missing(&dir, "base.row"), 1, Vec::new());

    assert!(matches!(open(&split, &JobConf::new()), Err(MorError::IoAt { .. })));
}

#[test]
fn test_missing_log_file_fails_construction() {
    let (_temp, dir) = setup_temp_dir();
    let base_path = dir.join("base.row");
    write_base(&base_path, &[rec("a", 1, 1)]);
    let split = FileSplit::new(&base_path, 1, vec![LogFile::new(missing(&dir, "1.log"), 1)]);

    for flag in ["false", "true"] {
        assert!(matches!(open(&split, &job(flag)), Err(MorError::IoAt { .. })));
    }
}

#[test]
fn test_corrupt_base_row_fails_mid_stream() {
    let (_temp, dir) = setup_temp_dir();
    let base_path = dir.join("base.row");
    write_base(&base_path, &[rec("a", 1, 1), rec("b", 1, 2)]);

    let mut bytes = std::fs::read(&base_path).unwrap();
    let crc_at = bytes.len() - 8;
    bytes[crc_at] ^= 0xff;
    std::fs::write(&base_path, &bytes).unwrap();

    let split = FileSplit::new(&base_path, 1, Vec::new());
    let mut reader = open(&split, &JobConf::new()).unwrap();

    assert!(reader.advance().unwrap());
    assert!(reader.advance().is_err());
    reader.close().unwrap();
}

// =============================================================================
// Placeholder API Tests
// =============================================================================

#[test]
fn test_advance_into_fills_placeholders() {
    let (_temp, dir) = setup_temp_dir();
    let split = scenario_split(&dir);
    let mut reader = open(&split, &job("true")).unwrap();

    let mut key = reader.create_key_placeholder();
    let mut value = reader.create_value_placeholder();
    assert!(key.is_empty());
    assert_eq!(value.schema().as_ref(), schema().as_ref());
    assert!(value.values().iter().all(Value::is_null));

    let mut seen = Vec::new();
    while reader.advance_into(&mut key, &mut value).unwrap() {
        seen.push((key.clone(), value.get("val").cloned()));
    }

    assert_eq!(
        seen,
        vec![
            ("A".to_string(), Some(Value::Int(1))),
            ("B".to_string(), Some(Value::Int(1))),
            ("A".to_string(), Some(Value::Int(2))),
        ]
    );

    // Exhausted: placeholders keep the last record
    assert_eq!(key, "A");
    assert_eq!(value, rec("A", 5, 2));
}

#[test]
fn test_value_placeholder_for_log_only_split() {
    let (_temp, dir) = setup_temp_dir();
    let log = log_file(&dir, "1.log", 1, &[data(1, vec![rec("x", 1, 7)])]);
    let split = FileSplit::log_only(vec![log]);

    let mut reader = open(&split, &JobConf::new()).unwrap();
    assert!(reader.schema().is_none());

    let mut key = reader.create_key_placeholder();
    let mut value = reader.create_value_placeholder();
    assert!(value.schema().is_empty());

    assert!(reader.advance_into(&mut key, &mut value).unwrap());
    assert_eq!(key, "x");
    assert_eq!(value, rec("x", 1, 7));
    assert!(!reader.advance_into(&mut key, &mut value).unwrap());
}

// =============================================================================
// End to End Tests
// =============================================================================

#[test]
fn test_base_instant_window_and_rollback() {
    let (_temp, dir) = setup_temp_dir();
    let base_path = dir.join("base.row");
    write_base(&base_path, &[rec("a", 1, 1), rec("b", 1, 1), rec("c", 1, 1)]);

    let older = log_file(&dir, "0.log", 5, &[data(6, vec![rec("a", 9, 100)])]);
    let current = log_file(
        &dir,
        "1.log",
        20,
        &[
            data(20, vec![rec("b", 9, 200)]),
            data(21, vec![rec("c", 2, 3), rec("d", 1, 4)]),
            data(22, vec![rec("c", 3, 30)]),
            rollback(23, 22),
        ],
    );
    let split = FileSplit::new(&base_path, 20, vec![older, current]);

    let mut reader = open(&split, &JobConf::new()).unwrap();
    let stats = reader.scan_stats().clone();
    let out = drain(&mut reader);

    assert_eq!(out, pairs(&[("a", 1), ("b", 1), ("c", 3), ("d", 4)]));
    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.blocks_skipped, 1);
    assert_eq!(stats.blocks_rolled_back, 1);
}

#[test]
fn test_new_with_supplied_base_source() {
    let (_temp, dir) = setup_temp_dir();
    let log = log_file(&dir, "1.log", 1, &[data(2, vec![rec("b", 1, 20)])]);
    let split = FileSplit::log_only(vec![log]);
    let base = memory_base(vec![rec("a", 1, 1), rec("b", 0, 2)]);

    let mut reader =
        RealtimeReader::new(&split, &JobConf::new(), ReaderConfig::default(), base, extractor())
            .unwrap();

    assert_eq!(drain(&mut reader), pairs(&[("a", 1), ("b", 20)]));
    assert_eq!(reader.position(), 2);
    assert_eq!(reader.progress(), 1.0);
    assert_eq!(reader.merge_map().len(), 1);
}

#[test]
fn test_spilling_reader_end_to_end() {
    let (_temp, dir) = setup_temp_dir();
    let split = scenario_split(&dir);
    let spill_dir = dir.join("spill");
    let config = ReaderConfig::builder()
        .max_memory_bytes(0)
        .spill_dir(&spill_dir)
        .build();

    let mut reader = RealtimeReader::open(&split, &JobConf::new(), config, extractor()).unwrap();
    assert!(reader.merge_map().spilled_count() > 0);
    assert_eq!(drain(&mut reader), pairs(&[("A", 2)]));

    reader.close().unwrap();
    reader.close().unwrap();
    assert_eq!(std::fs::read_dir(&spill_dir).unwrap().count(), 0);
}

#[test]
fn test_reader_is_send() {
    fn assert_send<T: Send>() {}
    assert_send::<RealtimeReader>();
    assert_send::<Box<dyn BaseRecordSource>>();
    assert_send::<Record>();
}
