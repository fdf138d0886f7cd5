//! cpn_e2e: end-to-end checks for the canvas-where-am-I navigation script.
//!
//! This library crate re-exports modules so integration tests
//! (under `tests/`) can access them.

pub mod browser;
pub mod canvas;
pub mod checks;
pub mod config;
pub mod fixtures;
pub mod logs;
pub mod runner;
pub mod suites;
pub mod utils;
