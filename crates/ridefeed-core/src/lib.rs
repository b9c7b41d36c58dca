//! Core types and trait definitions for the ridefeed listing aggregator.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! defines the unified post record, timestamp normalization, the filter
//! predicate, the published feed state, and the seams (sources, identity,
//! write path) that the engine and the storage backends plug into.

pub mod error;
pub mod feed;
pub mod filter;
pub mod post;
pub mod source;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
