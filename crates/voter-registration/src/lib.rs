//! Voter registration intake workflows.
//!
//! The library hosts the registrant lifecycle (step state machine, conditional validation,
//! derived fields, completion side effects) together with the jurisdiction reference data it
//! consumes. HTTP wiring and concrete collaborators live in the `services/api` binary.

pub mod config;
pub mod error;
pub mod jurisdiction;
pub mod telemetry;
pub mod workflows;
