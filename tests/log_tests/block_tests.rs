//! Tests for Log Block encoding
//!
//! These tests verify:
//! - Header and footer layout
//! - Checksum flag handling
//! - Block type tags
//! - Blocks that cannot be encoded faithfully are rejected

use std::sync::Arc;

use morread::log::{
    BlockType, LogBlock, FLAG_CHECKSUM, FOOTER_SIZE, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE,
};
use morread::{MorError, Record, Schema, Value};

use crate::common::{data, delete, end_of_commit, rec, rollback, schema};

// =============================================================================
// Helper Functions
// =============================================================================

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encoded_header_layout() {
    let block = data(42, vec![rec("a", 1, 10)]);
    let bytes = block.encode().unwrap();

    assert_eq!(&bytes[0..4], MAGIC);
    assert_eq!(bytes[4], BlockType::Data as u8);
    assert_eq!(bytes[5], FLAG_CHECKSUM);
    assert_eq!(u64_at(&bytes, 6), 42);

    let payload_len = u32_at(&bytes, 14) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + payload_len + FOOTER_SIZE);
}

#[test]
fn test_footer_repeats_payload_size() {
    let block = delete(7, &[("a", 1), ("b", 2)]);
    let bytes = block.encode().unwrap();

    let header_len = u32_at(&bytes, 14);
    let footer_len = u32_at(&bytes, bytes.len() - 4);
    assert_eq!(header_len, footer_len);
}

#[test]
fn test_footer_crc_covers_payload() {
    let block = data(1, vec![rec("a", 1, 10), rec("b", 1, 20)]);
    let bytes = block.encode().unwrap();

    let payload = &bytes[HEADER_SIZE..bytes.len() - FOOTER_SIZE];
    let stored = u32_at(&bytes, bytes.len() - FOOTER_SIZE);
    assert_eq!(stored, crc32fast::hash(payload));
}

#[test]
fn test_encode_without_checksum() {
    let block = rollback(5, 3);
    let bytes = block.encode_with(false).unwrap();

    assert_eq!(bytes[5], 0);
    assert_eq!(u32_at(&bytes, bytes.len() - FOOTER_SIZE), 0);
}

// =============================================================================
// Block Type Tests
// =============================================================================

#[test]
fn test_block_type_and_instant() {
    let blocks = [
        (data(1, vec![]), BlockType::Data),
        (delete(2, &[]), BlockType::Delete),
        (rollback(3, 1), BlockType::Rollback),
        (end_of_commit(4), BlockType::Command),
    ];

    for (i, (block, expected)) in blocks.iter().enumerate() {
        assert_eq!(block.block_type(), *expected);
        assert_eq!(block.instant(), i as u64 + 1);
    }
}

#[test]
fn test_block_type_tags() {
    assert_eq!(BlockType::try_from(0x01), Ok(BlockType::Data));
    assert_eq!(BlockType::try_from(0x02), Ok(BlockType::Delete));
    assert_eq!(BlockType::try_from(0x03), Ok(BlockType::Rollback));
    assert_eq!(BlockType::try_from(0x04), Ok(BlockType::Command));
    assert_eq!(BlockType::try_from(0x00), Err(0x00));
    assert_eq!(BlockType::try_from(0x7f), Err(0x7f));
}

#[test]
fn test_empty_data_block_encodes() {
    let bytes = LogBlock::Data {
        instant: 9,
        records: Vec::new(),
    }
    .encode()
    .unwrap();
    assert!(bytes.len() > HEADER_SIZE + FOOTER_SIZE);
}

// =============================================================================
// Rejection Tests
// =============================================================================

#[test]
fn test_mixed_schema_data_block_rejected() {
    let narrow = Arc::new(Schema::new(["id", "ts"]));
    let other = Record::new(narrow, vec![Value::from("b"), Value::Int(2)]);
    let block = data(1, vec![rec("a", 1, 10), other]);

    let err = block.encode().unwrap_err();
    assert!(matches!(err, MorError::Serialization(_)), "got {:?}", err);
}

#[test]
fn test_equal_schemas_in_separate_allocations_accepted() {
    let copy = Arc::new(Schema::new(["id", "ts", "val"]));
    let other = Record::new(copy, vec![Value::from("b"), Value::Int(2), Value::Int(20)]);
    let block = data(1, vec![rec("a", 1, 10), other]);

    assert!(block.encode().is_ok());
}

#[test]
fn test_oversized_payload_rejected() {
    let huge = Record::new(
        schema(),
        vec![
            Value::from("a"),
            Value::Int(1),
            Value::Bytes(vec![0u8; MAX_PAYLOAD_SIZE as usize]),
        ],
    );

    let err = data(1, vec![huge]).encode().unwrap_err();
    assert!(matches!(err, MorError::Serialization(_)), "got {:?}", err);
}
