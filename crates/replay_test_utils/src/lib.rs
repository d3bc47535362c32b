//! # Replay Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Scripted in-memory simulation engine with failure injection
//! - Observation, replay and action-record fixtures
//! - Output-tree determinism checks
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod engine;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
