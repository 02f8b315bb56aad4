//! In-memory base source

use std::sync::Arc;
use std::vec::IntoIter;

use crate::error::Result;
use crate::record::{Record, Schema, Value};

use super::BaseRecordSource;

/// Base records held in memory
pub struct MemorySource {
    schema: Arc<Schema>,
    total: u64,
    rows: IntoIter<Record>,
}

impl MemorySource {
    pub fn new(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        Self {
            schema,
            total: records.len() as u64,
            rows: records.into_iter(),
        }
    }

    /// Build from raw rows sharing `schema`
    pub fn from_rows(schema: Arc<Schema>, rows: Vec<Vec<Value>>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| Record::new(Arc::clone(&schema), row))
            .collect();
        Self::new(schema, records)
    }
}

impl BaseRecordSource for MemorySource {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.rows.next())
    }

    fn len_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}
