//! afmon - analysis-facility telemetry collector library.
//!
//! This library provides the building blocks of the `afmon` binary:
//! - `collector` — host counters, batch-scheduler queries, session listings
//! - `report` — normalized record types, obfuscation, group filtering
//! - `sink` — HTTP and local-file record transport
//! - `util` — helper utilities
//!
//! The binary is invoked periodically by an external scheduler; one
//! invocation produces one sample of every enabled subsystem.

pub mod collector;
pub mod report;
pub mod sink;
pub mod util;
