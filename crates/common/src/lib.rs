//! Common crate
//!
//! Shared types and error handling for mongordd.
//!
//! # Example
//! ```rust
//! use mongordd_common::Error;
//! let err = Error::invalid_argument("example error");
//! assert_eq!(err.kind(), "invalid_argument");
//! ```

pub mod error;

pub use error::{Error, Result};

/// The record type flowing through every stage of a read job.
pub use mongodb::bson::Document;
