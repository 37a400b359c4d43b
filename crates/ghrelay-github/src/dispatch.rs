//! Repository dispatch relay
//!
//! Packs uploaded files into a single `repository_dispatch` event and leaves
//! the commit to whatever workflow listens for it. Success only means the
//! event was accepted; the workflow run is not observed.

use tracing::info;

use crate::api::GitApi;
use crate::error::{RelayError, Result};
use crate::types::{DispatchEvent, DispatchFile, DispatchPayload, RepoId, UploadFile};

/// Files to hand to an upload workflow
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Repository whose workflow receives the event
    pub repo: RepoId,
    /// Repository the workflow should commit to, when not `repo` itself
    pub target: Option<RepoId>,
    pub branch: String,
    pub message: String,
    pub files: Vec<UploadFile>,
}

impl DispatchRequest {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        message: impl Into<String>,
        files: Vec<UploadFile>,
    ) -> Self {
        Self {
            repo: RepoId::new(owner, repo),
            target: None,
            branch: branch.into(),
            message: message.into(),
            files,
        }
    }

    /// Have the workflow in `repo` commit to `target` instead
    pub fn with_target(mut self, target: RepoId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        let cross = self.target.is_some();
        if self.repo.owner.trim().is_empty() {
            missing.push(if cross { "source_owner" } else { "owner" });
        }
        if self.repo.repo.trim().is_empty() {
            missing.push(if cross { "source_repo" } else { "repo" });
        }
        if let Some(target) = &self.target {
            if target.owner.trim().is_empty() {
                missing.push("target_owner");
            }
            if target.repo.trim().is_empty() {
                missing.push("target_repo");
            }
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

    /// Build the event body sent to the dispatches endpoint
    pub fn to_event(&self, event_type: &str) -> Result<DispatchEvent> {
        let files: Vec<DispatchFile> = self
            .files
            .iter()
            .map(|f| DispatchFile {
                filename: f.repo_path().to_string(),
                content_base64: f.content_base64(),
            })
            .collect();
        let files_payload = serde_json::to_string(&files)
            .map_err(|e| RelayError::Configuration(format!("Failed to encode files: {}", e)))?;

        Ok(DispatchEvent {
            event_type: event_type.to_string(),
            client_payload: DispatchPayload {
                branch: self.branch.clone(),
                commit_message: self.message.clone(),
                files_payload,
                target_owner: self.target.as_ref().map(|t| t.owner.clone()),
                target_repo: self.target.as_ref().map(|t| t.repo.clone()),
            },
        })
    }
}

/// Sends dispatch events through a [`GitApi`]
pub struct DispatchRelay<A> {
    api: A,
    event_type: String,
}

impl<A: GitApi> DispatchRelay<A> {
    pub fn new(api: A, event_type: impl Into<String>) -> Self {
        Self {
            api,
            event_type: event_type.into(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Validate and fire the event. Returns once the remote accepted it.
    pub async fn trigger(&self, request: &DispatchRequest) -> Result<()> {
        request.validate()?;
        let event = request.to_event(&self.event_type)?;
        self.api.dispatch(&request.repo, &event).await?;
        match &request.target {
            Some(target) => info!(
                "Dispatched {} with {} file(s) to {} for {}@{}",
                self.event_type,
                request.files.len(),
                request.repo,
                target,
                request.branch
            ),
            None => info!(
                "Dispatched {} with {} file(s) to {}@{}",
                self.event_type,
                request.files.len(),
                request.repo,
                request.branch
            ),
        }
        Ok(())
    }
}
