//! Ingest Harness - a concurrent conformance/load harness for event ingestion
//!
//! Many simulated sessions register with an ingestion service, submit a
//! bounded sequence of events and poll until each event is confirmed as
//! recorded. Every event and session outcome is collected for reporting.

pub mod application;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod report;
pub mod transport;

pub use application::Application;
pub use error::{Error, Result};
