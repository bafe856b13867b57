//! Merge layer
//!
//! Combines normalized fragments for one identifier into a [`UnifiedRecord`]
//! using the static precedence in [`crate::schema::SCHEMA`], and shapes
//! record batches for output.

pub mod merge;
pub mod record;

pub use merge::{merge, resolve_field};
pub use record::{
    FieldConflict, Projection, RecordBatch, RecordStatus, Table, UnifiedRecord,
};
