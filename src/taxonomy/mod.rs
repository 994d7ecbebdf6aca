//! Static reference enumerations
//!
//! This module defines the fixed lookup taxonomies the rest of the crate is
//! built on: the crawl actions a task can request, the failure kinds a task
//! can be marked with (and whether retrying can ever resolve them), and the
//! backends a fetched payload can be stored in. All three are seeded into the
//! database once and treated as immutable reference tables afterwards.

mod action;
mod backend;
mod failure;

pub use action::ActionKind;
pub use backend::StorageBackend;
pub use failure::{FailureKind, FailureKindDef, DEFAULT_FAILURE_TAXONOMY};
