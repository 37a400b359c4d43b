//! GitHub REST client for the git data and dispatch endpoints

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::GitApi;
use crate::error::{RelayError, Result};
use crate::types::{
    CommitInfo, CommitResponse, DispatchEvent, ErrorResponse, NewBlob, NewCommit, NewTree,
    RefResponse, RefUpdate, RepoId, ShaResponse, TreeEntry,
};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// GitHub API client bound to one access token
#[derive(Clone)]
pub struct GitHubClient {
    api_base: String,
    token: String,
    user_agent: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client for `api_base` (e.g. https://api.github.com) with its
    /// own connection pool
    ///
    /// Fails with a configuration error if the token is empty.
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_client(api_base, token, build_http(DEFAULT_TIMEOUT)?)
    }

    /// Create a client on top of an existing HTTP client, sharing its
    /// connection pool and timeout
    pub fn with_client(
        api_base: impl Into<String>,
        token: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(RelayError::Configuration("GitHub access token is not set".to_string()));
        }
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            user_agent: default_user_agent(),
            http,
        })
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http = build_http(timeout)?;
        Ok(self)
    }

    fn repo_url(&self, repo: &RepoId, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, repo.owner, repo.repo, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, &self.user_agent)
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let resp = builder.send().await.map_err(|e| {
            warn!("{} failed: {}", what, e);
            RelayError::from(e)
        })?;
        let status = resp.status();
        if status.is_success() {
            debug!("{} -> {}", what, status);
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&text)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        warn!("{} returned {}: {}", what, status, message);
        Err(RelayError::upstream(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let resp = self.send(builder, what).await?;
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl GitApi for GitHubClient {
    async fn get_ref(&self, repo: &RepoId, branch: &str) -> Result<String> {
        let url = self.repo_url(repo, &format!("git/refs/heads/{}", branch));
        let resp: RefResponse = self
            .send_json(self.request(Method::GET, &url), "GET ref")
            .await?;
        Ok(resp.object.sha)
    }

    async fn get_commit(&self, repo: &RepoId, sha: &str) -> Result<CommitInfo> {
        let url = self.repo_url(repo, &format!("git/commits/{}", sha));
        let resp: CommitResponse = self
            .send_json(self.request(Method::GET, &url), "GET commit")
            .await?;
        Ok(CommitInfo {
            sha: resp.sha,
            tree_sha: resp.tree.sha,
        })
    }

    async fn create_blob(&self, repo: &RepoId, content: &[u8]) -> Result<String> {
        use base64::Engine;
        let url = self.repo_url(repo, "git/blobs");
        let body = NewBlob {
            content: base64::engine::general_purpose::STANDARD.encode(content),
            encoding: "base64",
        };
        let resp: ShaResponse = self
            .send_json(self.request(Method::POST, &url).json(&body), "POST blob")
            .await?;
        Ok(resp.sha)
    }

    async fn create_tree(&self, repo: &RepoId, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let url = self.repo_url(repo, "git/trees");
        let body = NewTree { base_tree, tree: entries };
        let resp: ShaResponse = self
            .send_json(self.request(Method::POST, &url).json(&body), "POST tree")
            .await?;
        Ok(resp.sha)
    }

    async fn create_commit(
        &self,
        repo: &RepoId,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String> {
        let url = self.repo_url(repo, "git/commits");
        let body = NewCommit { message, tree, parents };
        let resp: ShaResponse = self
            .send_json(self.request(Method::POST, &url).json(&body), "POST commit")
            .await?;
        Ok(resp.sha)
    }

    async fn update_ref(&self, repo: &RepoId, branch: &str, sha: &str) -> Result<()> {
        let url = self.repo_url(repo, &format!("git/refs/heads/{}", branch));
        let body = RefUpdate { sha, force: false };
        self.send(self.request(Method::PATCH, &url).json(&body), "PATCH ref")
            .await?;
        Ok(())
    }

    async fn dispatch(&self, repo: &RepoId, event: &DispatchEvent) -> Result<()> {
        let url = self.repo_url(repo, "dispatches");
        self.send(self.request(Method::POST, &url).json(event), "POST dispatch")
            .await?;
        Ok(())
    }
}

fn default_user_agent() -> String {
    format!("ghrelay/{}", env!("CARGO_PKG_VERSION"))
}

fn build_http(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::Configuration(format!("Failed to build HTTP client: {}", e)))
}
