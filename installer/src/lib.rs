//! Streaming extraction and dependency-ordered installation engine.
//!
//! A generative model answers with prose mixed with sentinel-delimited
//! payloads. This crate recovers those payloads from a token stream, orders
//! schema and record creation, and links slug-shaped references to real ids
//! once everything exists. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (scanning, classification,
//!   synthesis, planning). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting collaborators (platform, media, config,
//!   filesystem), behind traits where tests need doubles.
//!
//! Orchestration modules ([`turn`], [`install`], [`resolver`], [`actions`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod actions;
pub mod core;
pub mod exit_codes;
pub mod install;
pub mod io;
pub mod logging;
pub mod resolver;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod turn;
