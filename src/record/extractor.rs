//! Record key extraction
//!
//! Pulls the record key and ordering value out of a decoded row.

use crate::error::{MorError, Result};

use super::{OrderingValue, Record, Value};

/// Key and precombine value of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub key: String,
    pub ordering: OrderingValue,
}

/// Extracts the unique record key and the ordering value of a record
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, record: &Record) -> Result<RecordKey>;
}

/// Extractor reading the key and ordering value from named fields
#[derive(Debug, Clone)]
pub struct FieldKeyExtractor {
    key_field: String,
    ordering_field: Option<String>,
}

impl FieldKeyExtractor {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            ordering_field: None,
        }
    }

    /// Use `field` as the precombine field
    pub fn with_ordering(mut self, field: impl Into<String>) -> Self {
        self.ordering_field = Some(field.into());
        self
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }
}

impl KeyExtractor for FieldKeyExtractor {
    fn extract(&self, record: &Record) -> Result<RecordKey> {
        let key = match record.get(&self.key_field) {
            Some(Value::Str(s)) => s.clone(),
            Some(Value::Int(i)) => i.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Null) | None => {
                return Err(MorError::KeyExtraction(format!(
                    "record has no value for key field {:?}: {}",
                    self.key_field, record
                )))
            }
            Some(other) => {
                return Err(MorError::KeyExtraction(format!(
                    "unsupported key type in field {:?}: {:?}",
                    self.key_field, other
                )))
            }
        };

        // Missing precombine values sort lowest
        let ordering = match self.ordering_field.as_deref().and_then(|f| record.get(f)) {
            Some(Value::Int(i)) => OrderingValue::Int(*i),
            Some(Value::Float(x)) => OrderingValue::Float(*x),
            Some(Value::Str(s)) => OrderingValue::Str(s.clone()),
            Some(Value::Bool(b)) => OrderingValue::Int(i64::from(*b)),
            _ => OrderingValue::Null,
        };

        Ok(RecordKey { key, ordering })
    }
}
