//! # gradesync
//!
//! Keeps classroom grades in sync with an editable grade table: export the
//! roster, edit grades offline, and push them back with a per-row report of
//! what changed, what was skipped, and what was rejected or refused.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// The remote classroom collaborator and its REST implementation
pub mod classroom;
/// The grade synchronization commands
pub mod commands;
/// Runtime configuration built from the environment
pub mod config;
/// A module defining a bunch of constant values to be used throughout
pub mod constants;
/// Error types shared across the crate
pub mod error;
/// Grade write permission probing
pub mod probe;
/// Applying change sets to the remote service
pub mod push;
/// Turning parsed input into validated change sets
pub mod reconcile;
/// Run reports and terminal rendering
pub mod report;
/// Submission rosters, snapshots and display numbering
pub mod roster;
/// The interactive bulk selector grammar
pub mod selector;
/// The grade table codec
pub mod table;
