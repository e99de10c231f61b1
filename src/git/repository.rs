//! Git repository inspection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{DiffFormat, DiffOptions, ErrorCode, Repository};
use tracing::debug;

/// Source of the diff to describe.
pub trait RepositoryReader: Send + Sync {
    /// Whether the working location is inside a git repository.
    fn is_repository(&self) -> Result<bool>;

    /// Unified diff of all uncommitted changes; empty when there are none.
    fn get_diff(&self) -> Result<String>;
}

/// Reads diffs with libgit2 from the repository containing `start`.
#[derive(Debug, Clone)]
pub struct GitRepository {
    start: PathBuf,
}

impl GitRepository {
    /// Repository discovered from the current directory.
    pub fn current_dir() -> Result<Self> {
        let start = std::env::current_dir().context("Failed to read current directory")?;
        Ok(Self::discover_from(start))
    }

    /// Repository discovered from `start`, searching parent directories.
    pub fn discover_from<P: AsRef<Path>>(start: P) -> Self {
        Self {
            start: start.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::discover(&self.start)
            .with_context(|| format!("Not in a git repository: {}", self.start.display()))
    }
}

impl RepositoryReader for GitRepository {
    fn is_repository(&self) -> Result<bool> {
        Ok(Repository::discover(&self.start).is_ok())
    }

    fn get_diff(&self) -> Result<String> {
        let repo = self.open()?;

        // Unborn HEAD diffs against the empty tree.
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree().context("Failed to peel HEAD to tree")?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e).context("Failed to read HEAD"),
        };

        let mut options = DiffOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let diff = repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut options))
            .context("Failed to create diff")?;

        let mut diff_content = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            let content = String::from_utf8_lossy(line.content());
            let prefix = match line.origin() {
                '+' => "+",
                '-' => "-",
                ' ' => " ",
                _ => "",
            };
            diff_content.push_str(prefix);
            diff_content.push_str(&content);
            true
        })
        .context("Failed to format diff")?;

        debug!(diff_len = diff_content.len(), "Read working tree diff");
        Ok(diff_content)
    }
}
