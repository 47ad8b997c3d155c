//! Shared test utilities for paperflow integration tests.
//!
//! This module provides:
//! - `TestHarness` with temp directories and an in-memory database
//! - Recording and misbehaving collaborators for the pipeline

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{hash_bytes, TestHarness};
