//! In-memory git data API
//!
//! Emulates the subset of the hosting service the relay talks to: branches,
//! blobs, trees with base-tree overlay, commits and dispatch events. Keeps a
//! call log and can be told to fail a given call, which makes it usable for
//! dry runs and for exercising error paths.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::api::GitApi;
use crate::error::{RelayError, Result};
use crate::types::{CommitInfo, DispatchEvent, RepoId, TreeEntry};

/// Remote call kinds, as recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    GetRef,
    GetCommit,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    Dispatch,
}

#[derive(Debug, Clone)]
struct StoredCommit {
    tree: String,
    message: String,
    parents: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryGitInner {
    refs: HashMap<(RepoId, String), String>,
    blobs: HashMap<String, Vec<u8>>,
    /// path -> blob sha
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, StoredCommit>,
    dispatches: Vec<(RepoId, DispatchEvent)>,
    calls: Vec<Call>,
    failures: HashMap<Call, (u16, String)>,
}

/// In-memory git data API
#[derive(Debug, Clone, Default)]
pub struct MemoryGitApi {
    inner: Arc<RwLock<MemoryGitInner>>,
}

impl MemoryGitApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `branch` pointing at a root commit whose tree holds `files`
    pub fn with_branch(self, repo: &RepoId, branch: &str, files: &[(&str, &[u8])]) -> Self {
        {
            let mut inner = self.inner.write().unwrap();
            let mut tree = BTreeMap::new();
            for (path, content) in files {
                let sha = object_id("blob", content);
                inner.blobs.insert(sha.clone(), content.to_vec());
                tree.insert(path.to_string(), sha);
            }
            let tree_sha = tree_id(&tree);
            inner.trees.insert(tree_sha.clone(), tree);
            let commit_sha = commit_id(&tree_sha, "initial", &[]);
            inner.commits.insert(
                commit_sha.clone(),
                StoredCommit {
                    tree: tree_sha,
                    message: "initial".to_string(),
                    parents: vec![],
                },
            );
            inner.refs.insert((repo.clone(), branch.to_string()), commit_sha);
        }
        self
    }

    /// Make every subsequent `call` fail with `status` and `message`
    pub fn fail_on(&self, call: Call, status: u16, message: impl Into<String>) {
        self.inner
            .write()
            .unwrap()
            .failures
            .insert(call, (status, message.into()));
    }

    /// Move a branch behind the caller's back (simulates a concurrent push)
    pub fn set_ref(&self, repo: &RepoId, branch: &str, sha: &str) {
        self.inner
            .write()
            .unwrap()
            .refs
            .insert((repo.clone(), branch.to_string()), sha.to_string());
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.inner.read().unwrap().calls.clone()
    }

    pub fn branch_head(&self, repo: &RepoId, branch: &str) -> Option<String> {
        self.inner
            .read()
            .unwrap()
            .refs
            .get(&(repo.clone(), branch.to_string()))
            .cloned()
    }

    pub fn commit_parents(&self, sha: &str) -> Option<Vec<String>> {
        self.inner.read().unwrap().commits.get(sha).map(|c| c.parents.clone())
    }

    /// Commits having `sha` among their parents
    pub fn children_of(&self, sha: &str) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .commits
            .iter()
            .filter(|(_, c)| c.parents.iter().any(|p| p == sha))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn commit_message(&self, sha: &str) -> Option<String> {
        self.inner.read().unwrap().commits.get(sha).map(|c| c.message.clone())
    }

    /// Content of `path` in the tree of commit `sha`
    pub fn file_at(&self, sha: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.read().unwrap();
        let commit = inner.commits.get(sha)?;
        let blob = inner.trees.get(&commit.tree)?.get(path)?;
        inner.blobs.get(blob).cloned()
    }

    /// Paths in the tree of commit `sha`, sorted
    pub fn paths_at(&self, sha: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner
            .commits
            .get(sha)
            .and_then(|c| inner.trees.get(&c.tree))
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dispatches(&self) -> Vec<(RepoId, DispatchEvent)> {
        self.inner.read().unwrap().dispatches.clone()
    }

    /// Record the call and return the injected failure, if any
    fn enter(&self, call: Call) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.calls.push(call);
        match inner.failures.get(&call) {
            Some((status, message)) => Err(RelayError::upstream(*status, message.clone())),
            None => Ok(()),
        }
    }
}

fn not_found() -> RelayError {
    RelayError::upstream(404, "Not Found")
}

fn object_id(kind: &str, data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn tree_id(tree: &BTreeMap<String, String>) -> String {
    let mut buf = Vec::new();
    for (path, sha) in tree {
        buf.extend_from_slice(path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(sha.as_bytes());
        buf.push(b'\n');
    }
    object_id("tree", &buf)
}

fn commit_id(tree: &str, message: &str, parents: &[String]) -> String {
    let text = format!("tree {}\nparents {}\n\n{}", tree, parents.join(" "), message);
    object_id("commit", text.as_bytes())
}

#[async_trait]
impl GitApi for MemoryGitApi {
    async fn get_ref(&self, repo: &RepoId, branch: &str) -> Result<String> {
        self.enter(Call::GetRef)?;
        self.branch_head(repo, branch).ok_or_else(not_found)
    }

    async fn get_commit(&self, _repo: &RepoId, sha: &str) -> Result<CommitInfo> {
        self.enter(Call::GetCommit)?;
        let inner = self.inner.read().unwrap();
        let commit = inner.commits.get(sha).ok_or_else(not_found)?;
        Ok(CommitInfo {
            sha: sha.to_string(),
            tree_sha: commit.tree.clone(),
        })
    }

    async fn create_blob(&self, _repo: &RepoId, content: &[u8]) -> Result<String> {
        self.enter(Call::CreateBlob)?;
        let sha = object_id("blob", content);
        self.inner
            .write()
            .unwrap()
            .blobs
            .insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    async fn create_tree(&self, _repo: &RepoId, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        self.enter(Call::CreateTree)?;
        let mut inner = self.inner.write().unwrap();
        let mut tree = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| RelayError::upstream(422, "Invalid tree info"))?;
        for entry in entries {
            if !inner.blobs.contains_key(&entry.sha) {
                return Err(RelayError::upstream(422, "Invalid tree info"));
            }
            tree.insert(entry.path.clone(), entry.sha.clone());
        }
        let sha = tree_id(&tree);
        inner.trees.insert(sha.clone(), tree);
        Ok(sha)
    }

    async fn create_commit(
        &self,
        _repo: &RepoId,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String> {
        self.enter(Call::CreateCommit)?;
        let mut inner = self.inner.write().unwrap();
        if !inner.trees.contains_key(tree) || parents.iter().any(|p| !inner.commits.contains_key(p)) {
            return Err(RelayError::upstream(422, "Tree or parent does not exist"));
        }
        let sha = commit_id(tree, message, parents);
        inner.commits.insert(
            sha.clone(),
            StoredCommit {
                tree: tree.to_string(),
                message: message.to_string(),
                parents: parents.to_vec(),
            },
        );
        Ok(sha)
    }

    async fn update_ref(&self, repo: &RepoId, branch: &str, sha: &str) -> Result<()> {
        self.enter(Call::UpdateRef)?;
        let mut inner = self.inner.write().unwrap();
        let key = (repo.clone(), branch.to_string());
        let current = inner.refs.get(&key).cloned().ok_or_else(not_found)?;
        let commit = inner
            .commits
            .get(sha)
            .ok_or_else(|| RelayError::upstream(422, "Object does not exist"))?;
        // Non-forced update: the new commit must descend from the current head
        if !commit.parents.contains(&current) {
            return Err(RelayError::upstream(422, "Update is not a fast forward"));
        }
        inner.refs.insert(key, sha.to_string());
        Ok(())
    }

    async fn dispatch(&self, repo: &RepoId, event: &DispatchEvent) -> Result<()> {
        self.enter(Call::Dispatch)?;
        self.inner
            .write()
            .unwrap()
            .dispatches
            .push((repo.clone(), event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_ids_are_content_derived() {
        let api = MemoryGitApi::new();
        let repo = RepoId::new("acme", "site");
        let a = api.create_blob(&repo, b"hello").await.unwrap();
        let b = api.create_blob(&repo, b"hello").await.unwrap();
        let c = api.create_blob(&repo, b"world").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_tree_overlay_keeps_base_paths() {
        let repo = RepoId::new("acme", "site");
        let api = MemoryGitApi::new().with_branch(&repo, "main", &[("README.md", &b"readme"[..]), ("a.txt", &b"old"[..])]);
        let head = api.get_ref(&repo, "main").await.unwrap();
        let base = api.get_commit(&repo, &head).await.unwrap();

        let blob = api.create_blob(&repo, b"new").await.unwrap();
        let tree = api
            .create_tree(&repo, &base.tree_sha, &[TreeEntry::blob("a.txt", blob)])
            .await
            .unwrap();
        let commit = api
            .create_commit(&repo, "overlay", &tree, &[head.clone()])
            .await
            .unwrap();

        assert_eq!(api.paths_at(&commit), vec!["README.md", "a.txt"]);
        assert_eq!(api.file_at(&commit, "a.txt").unwrap(), b"new");
        assert_eq!(api.file_at(&commit, "README.md").unwrap(), b"readme");
    }

    #[tokio::test]
    async fn test_update_ref_rejects_non_fast_forward() {
        let repo = RepoId::new("acme", "site");
        let api = MemoryGitApi::new().with_branch(&repo, "main", &[]);
        let head = api.get_ref(&repo, "main").await.unwrap();
        let base = api.get_commit(&repo, &head).await.unwrap();

        let unrelated = api.create_commit(&repo, "orphan", &base.tree_sha, &[]).await.unwrap();
        let err = api.update_ref(&repo, "main", &unrelated).await.unwrap_err();
        assert_eq!(err.http_status(), 422);
        assert_eq!(api.branch_head(&repo, "main"), Some(head));
    }

    #[tokio::test]
    async fn test_failure_injection_is_logged() {
        let api = MemoryGitApi::new();
        api.fail_on(Call::GetRef, 403, "Resource not accessible by integration");
        let err = api.get_ref(&RepoId::new("a", "b"), "main").await.unwrap_err();
        assert_eq!(err, RelayError::upstream(403, "Resource not accessible by integration"));
        assert_eq!(api.calls(), vec![Call::GetRef]);
    }
}
