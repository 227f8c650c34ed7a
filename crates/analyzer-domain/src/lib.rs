//! Core data model, ports and error types for the rule engine.
//!
//! This crate has no opinion on how rules are parsed, how providers talk to
//! the outside world, or how results are rendered — those are the concern
//! of `analyzer-engine`, `analyzer-providers` and `analyzer-cli`
//! respectively. It defines the shapes they agree on.

pub mod error;
pub mod model;
pub mod ports;
