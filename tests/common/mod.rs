//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use morread::base::{BaseRecordSource, MemorySource, RowFileWriter};
use morread::log::{CommandKind, DeleteKey, LogBlock, LogWriter};
use morread::{
    FieldKeyExtractor, KeyExtractor, LogFile, Lookup, MergeMap, Record, RecordIterator, Schema,
    Value,
};
use tempfile::TempDir;

// =============================================================================
// Records
// =============================================================================

/// `id` (key), `ts` (ordering), `val`
pub fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(["id", "ts", "val"]))
}

pub fn rec(id: &str, ts: i64, val: i64) -> Record {
    Record::new(
        schema(),
        vec![Value::from(id), Value::Int(ts), Value::Int(val)],
    )
}

pub fn extractor() -> Arc<dyn KeyExtractor> {
    Arc::new(FieldKeyExtractor::new("id").with_ordering("ts"))
}

/// `(id, val)` of a record in the test schema
pub fn id_val(record: &Record) -> (String, i64) {
    let id = match record.get("id") {
        Some(Value::Str(s)) => s.clone(),
        other => panic!("unexpected id {:?}", other),
    };
    let val = match record.get("val") {
        Some(Value::Int(v)) => *v,
        other => panic!("unexpected val {:?}", other),
    };
    (id, val)
}

pub fn pairs(expected: &[(&str, i64)]) -> Vec<(String, i64)> {
    expected.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// =============================================================================
// Blocks
// =============================================================================

pub fn data(instant: u64, records: Vec<Record>) -> LogBlock {
    LogBlock::Data { instant, records }
}

pub fn delete(instant: u64, keys: &[(&str, i64)]) -> LogBlock {
    LogBlock::Delete {
        instant,
        keys: keys.iter().map(|(k, ts)| DeleteKey::new(*k, *ts)).collect(),
    }
}

pub fn rollback(instant: u64, target_instant: u64) -> LogBlock {
    LogBlock::Rollback {
        instant,
        target_instant,
    }
}

pub fn end_of_commit(instant: u64) -> LogBlock {
    LogBlock::Command {
        instant,
        command: CommandKind::EndOfCommit,
    }
}

// =============================================================================
// Files
// =============================================================================

pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Write blocks through LogWriter
pub fn write_log(path: &Path, blocks: &[LogBlock]) {
    let mut writer = LogWriter::create(path).unwrap();
    for block in blocks {
        writer.append(block).unwrap();
    }
    writer.finish().unwrap();
}

/// Write raw bytes directly to a file (for crafting corruption)
pub fn write_raw(path: &Path, chunks: &[&[u8]]) {
    let mut file = File::create(path).unwrap();
    for chunk in chunks {
        file.write_all(chunk).unwrap();
    }
    file.sync_all().unwrap();
}

/// Write a log under `dir` and return its handle
pub fn log_file(dir: &Path, name: &str, instant: u64, blocks: &[LogBlock]) -> LogFile {
    let path = dir.join(name);
    write_log(&path, blocks);
    LogFile::new(path, instant)
}

pub fn write_base(path: &Path, records: &[Record]) {
    let mut writer = RowFileWriter::create(path, schema()).unwrap();
    for record in records {
        writer.add(record).unwrap();
    }
    writer.finish().unwrap();
}

pub fn memory_base(records: Vec<Record>) -> Option<Box<dyn BaseRecordSource>> {
    Some(Box::new(MemorySource::new(schema(), records)))
}

// =============================================================================
// Draining
// =============================================================================

pub fn drain<R: RecordIterator>(reader: &mut R) -> Vec<(String, i64)> {
    let mut out = Vec::new();
    while reader.advance().unwrap() {
        out.push(id_val(reader.current().unwrap()));
    }
    out
}

/// Every key of the map with its lookup result, in key order
pub fn snapshot(map: &MergeMap) -> Vec<(String, Lookup)> {
    map.keys()
        .map(|k| {
            let lookup = map.lookup(&k).unwrap();
            (k, lookup)
        })
        .collect()
}
