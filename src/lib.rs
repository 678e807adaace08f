//! PostClone - environment-aware configuration for freshly cloned instances
//!
//! PostClone reads the instance's name, decides whether it is a development,
//! QA, or production copy, and applies an ordered set of idempotent
//! configuration steps for dev and QA. Production and unrecognized
//! instances are never touched.

pub mod config;
pub mod environment;
pub mod error;
pub mod login;
pub mod mutation;
pub mod pipeline;
pub mod properties;
pub mod report;
pub mod steps;
pub mod storage;

pub use error::{PostCloneError, Result};
