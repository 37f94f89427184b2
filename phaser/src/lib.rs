//! Phase-based task orchestration for agent work cycles.
//!
//! A task document (Markdown) is parsed into phases and tasks. Each
//! invocation selects the lowest-numbered phase with outstanding work,
//! compiles a prompt for it, runs an external agent once, classifies the
//! result, and records metrics. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parsing, selection,
//!   classification, invariants). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, process execution,
//!   task persistence). Isolated behind traits so tests can substitute them.
//!
//! Orchestration modules ([`cycle`], [`select`]) coordinate core logic with
//! I/O to implement CLI commands.

pub mod core;
pub mod cycle;
pub mod document;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod select;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
