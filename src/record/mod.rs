//! Record Module
//!
//! Decoded rows shared by the base stream, log blocks and the merge map.
//!
//! ## Responsibilities
//! - Schema: ordered field names for a row
//! - Value: a single column value
//! - Record: schema + values, with projection onto another schema
//! - OrderingValue: totally ordered precombine value used for conflict resolution
//!
//! Records are produced by a decoder (base file or log block), owned by the
//! component holding them and never shared between threads.

mod extractor;
mod value;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use extractor::{FieldKeyExtractor, KeyExtractor, RecordKey};
pub use value::{OrderingValue, Value};

/// Fixed per-record bookkeeping charged by [`Record::approx_size`]
const RECORD_OVERHEAD: usize = 48;

// =============================================================================
// Schema
// =============================================================================

/// Ordered list of field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

// =============================================================================
// Record
// =============================================================================

/// A decoded row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Record {
    /// Build a record. Missing trailing values are padded with `Null`,
    /// extra values are dropped.
    pub fn new(schema: Arc<Schema>, mut values: Vec<Value>) -> Self {
        values.resize(schema.len(), Value::Null);
        Self { schema, values }
    }

    /// An all-null row, used as a reusable placeholder
    pub fn empty(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Value of a field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.schema.index_of(field).map(|i| &self.values[i])
    }

    /// Re-shape this record onto `target`, matching fields by name.
    /// Fields the record does not carry come out as `Null`.
    pub fn project(&self, target: &Arc<Schema>) -> Record {
        if Arc::ptr_eq(&self.schema, target) || *self.schema == **target {
            return Record {
                schema: Arc::clone(target),
                values: self.values.clone(),
            };
        }

        let values = target
            .fields()
            .iter()
            .map(|name| self.get(name).cloned().unwrap_or(Value::Null))
            .collect();

        Record {
            schema: Arc::clone(target),
            values,
        }
    }

    /// Copy this record into `dest`, reusing its value buffer
    pub fn copy_into(&self, dest: &mut Record) {
        if !Arc::ptr_eq(&dest.schema, &self.schema) {
            dest.schema = Arc::clone(&self.schema);
        }
        dest.values.clone_from(&self.values);
    }

    /// Rough heap footprint in bytes, used for spill accounting
    pub fn approx_size(&self) -> usize {
        RECORD_OVERHEAD + self.values.iter().map(Value::approx_size).sum::<usize>()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.schema.fields().iter().zip(&self.values).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}
