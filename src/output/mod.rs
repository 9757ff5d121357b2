//! Rendering of command results.
//!
//! - [`text`] for terminals, colored with yansi
//! - [`json`] for scripting
//!
//! Paths are rendered lossily; exact bytes only survive in the database and
//! in exported index documents.

pub mod json;
pub mod text;

pub use json::{JsonDiff, JsonDuplicates, JsonOutputError};
pub use text::TextOutput;
