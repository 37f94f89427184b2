//! I/O helpers for phaser commands.

pub mod config;
pub mod document;
pub mod executor;
pub mod git;
pub mod metrics;
pub mod process;
pub mod prompt;
pub mod report;
pub mod task_store;
