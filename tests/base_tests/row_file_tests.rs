//! Tests for Row File reader and writer
//!
//! These tests verify:
//! - Writing and reading back records in order
//! - Header row count and length hint
//! - Projection onto the file schema on write
//! - Rejection of bad magic, short files and checksum mismatches

use std::sync::Arc;

use morread::base::{BaseRecordSource, RowFileReader, RowFileWriter};
use morread::{MorError, Record, Schema, Value};

use crate::common::{id_val, rec, schema, setup_temp_dir, write_base};

// =============================================================================
// Helper Functions
// =============================================================================

fn read_all(reader: &mut RowFileReader) -> Vec<Record> {
    let mut records = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        records.push(record);
    }
    records
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_write_and_read_rows() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    let records = vec![rec("a", 1, 10), rec("b", 2, 20), rec("c", 3, 30)];
    write_base(&path, &records);

    let mut reader = RowFileReader::open(&path).unwrap();
    assert_eq!(reader.schema().as_ref(), schema().as_ref());
    assert_eq!(reader.row_count(), 3);
    assert_eq!(reader.len_hint(), Some(3));

    let read = read_all(&mut reader);
    assert_eq!(read, records);
    assert_eq!(reader.rows_read(), 3);

    // Exhausted reader keeps returning None
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_empty_row_file() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    write_base(&path, &[]);

    let mut reader = RowFileReader::open(&path).unwrap();
    assert_eq!(reader.row_count(), 0);
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_writer_projects_onto_file_schema() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");

    let wide = Arc::new(Schema::new(["extra", "val", "id"]));
    let record = Record::new(wide, vec![Value::from("x"), Value::Int(7), Value::from("k")]);

    let mut writer = RowFileWriter::create(&path, schema()).unwrap();
    writer.add(&record).unwrap();
    assert_eq!(writer.row_count(), 1);
    assert_eq!(writer.finish().unwrap(), 1);

    let mut reader = RowFileReader::open(&path).unwrap();
    let read = reader.next_record().unwrap().unwrap();
    assert_eq!(read.get("ts"), Some(&Value::Null));
    assert_eq!(id_val(&read), ("k".to_string(), 7));
    assert_eq!(read.get("extra"), None);
}

#[test]
fn test_close_stops_reading() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    write_base(&path, &[rec("a", 1, 1), rec("b", 1, 2)]);

    let mut reader = RowFileReader::open(&path).unwrap();
    assert!(reader.next_record().unwrap().is_some());
    reader.close().unwrap();
    assert!(reader.next_record().unwrap().is_none());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_open_missing_file() {
    let (_temp, dir) = setup_temp_dir();
    let result = RowFileReader::open(&dir.join("missing.row"));
    assert!(matches!(result, Err(MorError::IoAt { .. })));
}

#[test]
fn test_bad_magic_rejected() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    write_base(&path, &[rec("a", 1, 1)]);

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"NOPE");
    std::fs::write(&path, &bytes).unwrap();

    let result = RowFileReader::open(&path);
    assert!(matches!(result, Err(MorError::Storage(_))));
}

#[test]
fn test_short_file_rejected() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    std::fs::write(&path, b"MORW").unwrap();

    let result = RowFileReader::open(&path);
    assert!(matches!(result, Err(MorError::Storage(_))));
}

#[test]
fn test_checksum_mismatch_detected() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    write_base(&path, &[rec("a", 1, 1), rec("b", 1, 2)]);

    // Footer: RowsEnd (8) | RowCRC (4) | Padding (4)
    let mut bytes = std::fs::read(&path).unwrap();
    let crc_at = bytes.len() - 8;
    bytes[crc_at] ^= 0xff;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = RowFileReader::open(&path).unwrap();
    assert!(reader.next_record().unwrap().is_some());
    match reader.next_record() {
        Err(MorError::Storage(msg)) => assert!(msg.contains("checksum"), "msg: {}", msg),
        other => panic!("expected checksum error, got {:?}", other),
    }
}

#[test]
fn test_truncated_file_rejected() {
    let (_temp, dir) = setup_temp_dir();
    let path = dir.join("base.row");
    write_base(&path, &[rec("a", 1, 1), rec("b", 1, 2)]);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    // Footer no longer points at itself
    assert!(RowFileReader::open(&path).is_err());
}
