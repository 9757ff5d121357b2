//! Filesystem actions taken on indexed files.
//!
//! Deletion moves files to the system trash by default and only removes
//! them permanently when asked to.

pub mod delete;

pub use delete::{
    delete_file, delete_to_trash, permanent_delete, DeleteConfig, DeleteError, DeleteResult,
    FileSnapshot,
};
