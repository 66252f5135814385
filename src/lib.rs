//! Recursive response combination for shape optimization drivers.
//!
//! Objectives may be weighted combinations of other responses, nested to any
//! depth. Each iteration the [`application::Analyzer`] pushes the driver's
//! demand down to the atomic responses, lets the analyzers evaluate them, folds
//! values and gradients back up the tree and appends a summary row to the
//! combination report.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
