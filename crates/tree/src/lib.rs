//! Staged project trees: snapshot, path-safety guard and rule-driven filtering.

pub mod filter;
pub mod node;
pub mod safety;
pub mod snapshot;

pub use filter::{plan_removals, DeletionFailure, FilterReport, Removal, TreeFilter};
pub use node::Node;
pub use safety::{ensure_contained, ensure_tree_contained};
pub use snapshot::build;
