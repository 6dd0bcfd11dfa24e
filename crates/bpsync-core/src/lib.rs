//! Core types and trait definitions for blueprint rollout.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod backend;
pub mod binding;
pub mod blueprint;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod factory;
pub mod store;
pub mod sync;
pub mod version;

pub use error::{Error, ErrorKind, Result};
