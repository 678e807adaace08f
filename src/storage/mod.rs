//! Record store layer for PostClone.
//!
//! The orchestrator only talks to the [`Storage`] trait. [`JsonlStorage`]
//! is the file-backed store the CLI runs against.

mod jsonl;
mod traits;

pub use jsonl::JsonlStorage;
pub use traits::{Filter, FilterOp, Record, Storage};
