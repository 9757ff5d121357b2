//! fili - File Library Indexer
//!
//! Builds a persistent index of the files under one or more directory roots,
//! identified by a sampled fastsum and a SHA-1 hash, and uses it to find
//! duplicates, search paths, and move indexes between machines.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod storage;

pub use commands::run_app;
