//! Deterministic, pure logic shared by the installer.
//!
//! Core modules are free of I/O. They operate on in-memory text and payloads
//! and return deterministic outputs suitable for tests.

pub mod action;
pub mod catalog;
pub mod classifier;
pub mod fence;
pub mod files;
pub mod marker;
pub mod mode;
pub mod planner;
pub mod report;
pub mod scanner;
pub mod slug;
pub mod synth;
pub mod types;
