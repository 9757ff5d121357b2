//! Duplicate detection over the index.
//!
//! Groups are formed from persisted rows only; nothing here reads file
//! contents. Deletion re-checks each file on disk before touching it.

pub mod groups;
pub mod resolver;

pub use groups::{DuplicateGroup, GroupSummary};
pub use resolver::{find_duplicate_groups, DuplicateGroups, DuplicateResolver, ResolveReport};
