//! Git data operations the relay needs from the hosting service

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CommitInfo, DispatchEvent, RepoId, TreeEntry};

/// Remote git data API
///
/// Every method is a single remote call. Object-creating methods return the
/// identifier (sha) assigned by the remote.
#[async_trait]
pub trait GitApi: Send + Sync {
    /// Commit sha the branch currently points at
    async fn get_ref(&self, repo: &RepoId, branch: &str) -> Result<String>;

    /// Commit metadata, used to find its tree
    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<CommitInfo>;

    async fn create_blob(&self, repo: &RepoId, content: &[u8]) -> Result<String>;

    /// Create a tree overlaying `entries` on `base_tree`
    async fn create_tree(&self, repo: &RepoId, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;

    async fn create_commit(
        &self,
        repo: &RepoId,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String>;

    /// Move the branch to `sha`. Not forced: the remote rejects non fast-forward updates.
    async fn update_ref(&self, repo: &RepoId, branch: &str, sha: &str) -> Result<()>;

    /// Fire a repository dispatch event
    async fn dispatch(&self, repo: &RepoId, event: &DispatchEvent) -> Result<()>;
}
