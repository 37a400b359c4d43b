//! Multi-file commit construction
//!
//! Turns a set of in-memory files into one commit on an existing branch with
//! the git data API: read the branch head and its tree, create one blob per
//! file, create a tree overlaying the new entries on the head tree, create a
//! commit with the head as sole parent, then move the branch.
//!
//! Only the final ref update changes what the branch shows. A failure at any
//! earlier step leaves unreferenced objects behind, which the remote
//! garbage-collects. Concurrent updates of the same branch are arbitrated by
//! the remote: the ref update is not forced, so the loser gets an error.

use tracing::{debug, info, warn};

use crate::api::GitApi;
use crate::error::{RelayError, Result};
use crate::types::{RepoId, TreeEntry, UploadFile};

/// Files to commit to one branch
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub repo: RepoId,
    pub branch: String,
    pub message: String,
    pub files: Vec<UploadFile>,
}

impl UploadRequest {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
        files: Vec<UploadFile>,
    ) -> Self {
        Self {
            repo: RepoId::new(owner, repo),
            branch: branch.into(),
            message: message.into(),
            files,
        }
    }

    /// Check required fields, naming every one that is missing
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.repo.owner.trim().is_empty() {
            missing.push("owner");
        }
        if self.repo.repo.trim().is_empty() {
            missing.push("repo");
        }
        if self.branch.trim().is_empty() {
            missing.push("branch");
        }
        if self.files.is_empty() {
            missing.push("files");
        } else if self.files.iter().any(|f| f.repo_path().is_empty()) {
            missing.push("filename");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RelayError::Validation { missing })
        }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub commit_sha: String,
    /// One raw URL per uploaded file, in upload order
    pub raw_urls: Vec<String>,
}

/// Builds commits through a [`GitApi`]
pub struct CommitBuilder<A> {
    api: A,
    raw_base: String,
}

impl<A: GitApi> CommitBuilder<A> {
    pub fn new(api: A, raw_base: impl Into<String>) -> Self {
        Self {
            api,
            raw_base: raw_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Raw content URL of `path` on the request's branch
    pub fn raw_url(&self, request: &UploadRequest, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, request.repo.owner, request.repo.repo, request.branch, path
        )
    }

    /// Commit all files of `request` as one commit on its branch
    pub async fn commit_files(&self, request: &UploadRequest) -> Result<CommitOutcome> {
        request.validate()?;
        let repo = &request.repo;
        let branch = request.branch.as_str();

        let head = self.api.get_ref(repo, branch).await.map_err(|e| {
            warn!("Failed to resolve {}@{}: {}", repo, branch, e);
            e
        })?;
        let base = self.api.get_commit(repo, &head).await?;
        debug!("{}@{} head {} tree {}", repo, branch, head, base.tree_sha);

        let mut entries = Vec::with_capacity(request.files.len());
        let mut raw_urls = Vec::with_capacity(request.files.len());
        for file in &request.files {
            let path = file.repo_path();
            let blob = self.api.create_blob(repo, &file.content).await?;
            debug!("Blob {} for {} ({} bytes)", blob, path, file.content.len());
            entries.push(TreeEntry::blob(path, blob));
            raw_urls.push(self.raw_url(request, path));
        }

        let tree = self.api.create_tree(repo, &base.tree_sha, &entries).await?;
        let commit = self
            .api
            .create_commit(repo, &request.message, &tree, &[head.clone()])
            .await?;

        self.api.update_ref(repo, branch, &commit).await.map_err(|e| {
            warn!("Commit {} created but {}@{} was not updated: {}", commit, repo, branch, e);
            e
        })?;

        info!(
            "Committed {} file(s) to {}@{}: {} -> {}",
            request.files.len(),
            repo,
            branch,
            head,
            commit
        );
        Ok(CommitOutcome {
            commit_sha: commit,
            raw_urls,
        })
    }
}
