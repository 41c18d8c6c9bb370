//! Grade aggregation and report-card ("bulletin") generation.
//!
//! The [`grading`] module holds the pure computation engines (averages, mentions, ranking,
//! cohort statistics). The [`bulletins`] module persists their output through collaborator
//! traits and drives bulk generation for a class or an explicit list of students.

pub mod bulletins;
pub mod config;
pub mod error;
pub mod grading;
pub mod telemetry;
