//! Git diff access, splitting and truncation.

pub mod diff_split;
pub mod repository;
pub mod truncate;

pub use diff_split::{split_by_file, FileSegment};
pub use repository::{GitRepository, RepositoryReader};
pub use truncate::{truncate_diff, truncation_marker, TruncatedDiff, TruncationPlan};
