//! Base Module
//!
//! The base file of a file group, consumed as a sequential record source.
//!
//! ## Responsibilities
//! - [`BaseRecordSource`]: the narrow decoder interface the readers drive
//! - [`MemorySource`]: records already in memory
//! - [`RowFileReader`] / [`RowFileWriter`]: a simple checksummed row container

mod memory;
mod row_file;

use std::sync::Arc;

use crate::error::Result;
use crate::record::{Record, Schema};

pub use memory::MemorySource;
pub use row_file::{RowFileReader, RowFileWriter};

/// Sequential decoder over the records of a base file
pub trait BaseRecordSource: Send {
    /// Schema of the records produced
    fn schema(&self) -> &Arc<Schema>;

    /// Next record, `None` when exhausted
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Total number of records, when known up front
    fn len_hint(&self) -> Option<u64> {
        None
    }

    /// Release the underlying file. Called at most once by the readers.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: BaseRecordSource + ?Sized> BaseRecordSource for Box<S> {
    fn schema(&self) -> &Arc<Schema> {
        (**self).schema()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        (**self).next_record()
    }

    fn len_hint(&self) -> Option<u64> {
        (**self).len_hint()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
