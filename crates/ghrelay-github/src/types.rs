//! Domain types and GitHub git-data wire formats

use base64::Engine;
use serde::{Deserialize, Serialize};

/// File mode for a regular, non-executable file
pub const MODE_FILE: &str = "100644";

/// Owner/name pair identifying a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// One uploaded file, fully buffered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Relative path inside the repository
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Path the file is committed at: the filename without surrounding
    /// whitespace or slashes
    pub fn repo_path(&self) -> &str {
        self.filename.trim().trim_matches('/')
    }

    pub fn content_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.content)
    }
}

/// Entry of a tree creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: String,
}

impl TreeEntry {
    /// Regular file entry pointing at a blob
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: MODE_FILE.to_string(),
            kind: "blob".to_string(),
            sha: sha.into(),
        }
    }
}

/// Commit as returned by `GET /git/commits/{sha}`, reduced to what we use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
}

/// Repository dispatch event body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub event_type: String,
    pub client_payload: DispatchPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    pub branch: String,
    pub commit_message: String,
    /// JSON string of `[{filename, content_base64}]`
    pub files_payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_repo: Option<String>,
}

/// File as carried inside `files_payload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchFile {
    pub filename: String,
    pub content_base64: String,
}

// Wire formats of the git data API

#[derive(Debug, Serialize)]
pub(crate) struct NewBlob<'a> {
    pub content: String,
    pub encoding: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewTree<'a> {
    pub base_tree: &'a str,
    pub tree: &'a [TreeEntry],
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCommit<'a> {
    pub message: &'a str,
    pub tree: &'a str,
    pub parents: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct RefUpdate<'a> {
    pub sha: &'a str,
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ShaResponse {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefResponse {
    pub object: ShaResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    pub sha: String,
    pub tree: ShaResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_entry_wire_format() {
        let entry = TreeEntry::blob("docs/a.txt", "abc123");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"path": "docs/a.txt", "mode": "100644", "type": "blob", "sha": "abc123"})
        );
    }

    #[test]
    fn test_new_tree_wire_format() {
        let entries = vec![TreeEntry::blob("a.txt", "1"), TreeEntry::blob("b.txt", "2")];
        let body = NewTree { base_tree: "base", tree: &entries };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["base_tree"], "base");
        assert_eq!(value["tree"][1]["path"], "b.txt");
    }

    #[test]
    fn test_dispatch_payload_omits_missing_target() {
        let payload = DispatchPayload {
            branch: "main".into(),
            commit_message: ".".into(),
            files_payload: "[]".into(),
            target_owner: None,
            target_repo: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("target_owner").is_none());
        assert_eq!(value["branch"], "main");
    }

    #[test]
    fn test_repo_path() {
        assert_eq!(UploadFile::new("/img/logo.png", "").repo_path(), "img/logo.png");
        assert_eq!(UploadFile::new(" docs/a.md ", "").repo_path(), "docs/a.md");
        assert_eq!(UploadFile::new("/", "").repo_path(), "");
    }

    #[test]
    fn test_content_base64() {
        let file = UploadFile::new("a.txt", b"hello".to_vec());
        assert_eq!(file.content_base64(), "aGVsbG8=");
    }

    #[test]
    fn test_parse_ref_response() {
        let body = r#"{"ref":"refs/heads/main","object":{"sha":"deadbeef","type":"commit"}}"#;
        let parsed: RefResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.object.sha, "deadbeef");
    }
}
