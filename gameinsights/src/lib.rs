//! gameinsights library interface
//!
//! Multi-source fetch → normalize → merge pipeline for per-game metadata.
//! The `gameinsights` binary is a thin CLI over [`collector::Collector`].

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod fusion;
pub mod metrics;
pub mod normalize;
pub mod ratelimit;
pub mod raw;
pub mod schema;
pub mod sources;
pub mod types;

pub use crate::collector::Collector;
pub use crate::config::{CollectorConfig, TotalFailurePolicy};
pub use crate::error::{CollectorError, CollectorResult};
pub use crate::fusion::{Projection, RecordBatch, RecordStatus, UnifiedRecord};
pub use crate::schema::{Field, FieldValue};
pub use crate::types::{FetchError, FetchErrorKind, RawFragment, SourceFetcher, SourceId};
