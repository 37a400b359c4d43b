//! Shared test infrastructure for relay integration tests
//!
//! Provides:
//! - FakeGitHub: HTTP front for MemoryGitApi speaking the GitHub git data wire format
//! - start_relay: ghrelay server on an ephemeral port pointed at a FakeGitHub

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    Router,
};
use base64::Engine;
use ghrelay_cli::{Config, Credentials, RelayServer};
use ghrelay_github::{DispatchEvent, GitApi, MemoryGitApi, RelayError, RepoId, TreeEntry};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const TOKEN: &str = "test-token";
pub const DISPATCH_TOKEN: &str = "test-dispatch-token";

/// One request as seen by the fake API
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    pub body: Value,
}

impl Recorded {
    /// "METHOD /path" shorthand for sequence assertions
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Clone)]
struct FakeState {
    api: MemoryGitApi,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct FakeGitHub {
    pub api: MemoryGitApi,
    requests: Arc<Mutex<Vec<Recorded>>>,
    addr: SocketAddr,
}

impl FakeGitHub {
    /// Serve `api` on an ephemeral port
    pub async fn start(api: MemoryGitApi) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            api: api.clone(),
            requests: requests.clone(),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake github");
        let addr = listener.local_addr().expect("fake github addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake github server");
        });

        FakeGitHub { api, requests, addr }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_lines(&self) -> Vec<String> {
        self.requests().iter().map(Recorded::line).collect()
    }
}

#[derive(Deserialize)]
struct BlobBody {
    content: String,
    encoding: String,
}

#[derive(Deserialize)]
struct TreeBody {
    base_tree: String,
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct CommitBody {
    message: String,
    tree: String,
    parents: Vec<String>,
}

#[derive(Deserialize)]
struct RefBody {
    sha: String,
}

async fn handle(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: header("authorization"),
        user_agent: header("user-agent"),
        body: body.clone(),
    });

    match route(&state.api, &method, uri.path(), body).await {
        Ok((StatusCode::NO_CONTENT, _)) => StatusCode::NO_CONTENT.into_response(),
        Ok((status, value)) => (status, Json(value)).into_response(),
        Err(RelayError::Upstream { status, message }) => {
            let status = StatusCode::from_u16(status.unwrap_or(500)).unwrap();
            (status, Json(json!({ "message": message }))).into_response()
        }
        Err(other) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": other.to_string() })),
        )
            .into_response(),
    }
}

fn bad_request(what: &str) -> RelayError {
    RelayError::upstream(400, format!("Problems parsing JSON: {}", what))
}

async fn route(
    api: &MemoryGitApi,
    method: &Method,
    path: &str,
    body: Value,
) -> Result<(StatusCode, Value), RelayError> {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if segments.len() < 4 || segments[0] != "repos" {
        return Err(RelayError::upstream(404, "Not Found"));
    }
    let repo = RepoId::new(segments[1], segments[2]);
    let rest = &segments[3..];

    match (method.as_str(), rest) {
        ("GET", ["git", "refs", "heads", branch @ ..]) => {
            let branch = branch.join("/");
            let sha = api.get_ref(&repo, &branch).await?;
            Ok((
                StatusCode::OK,
                json!({ "ref": format!("refs/heads/{}", branch), "object": { "sha": sha, "type": "commit" } }),
            ))
        }
        ("PATCH", ["git", "refs", "heads", branch @ ..]) => {
            let branch = branch.join("/");
            let update: RefBody = serde_json::from_value(body).map_err(|_| bad_request("ref"))?;
            api.update_ref(&repo, &branch, &update.sha).await?;
            Ok((
                StatusCode::OK,
                json!({ "ref": format!("refs/heads/{}", branch), "object": { "sha": update.sha, "type": "commit" } }),
            ))
        }
        ("GET", ["git", "commits", sha]) => {
            let commit = api.get_commit(&repo, sha).await?;
            Ok((
                StatusCode::OK,
                json!({ "sha": commit.sha, "tree": { "sha": commit.tree_sha } }),
            ))
        }
        ("POST", ["git", "blobs"]) => {
            let blob: BlobBody = serde_json::from_value(body).map_err(|_| bad_request("blob"))?;
            if blob.encoding != "base64" {
                return Err(bad_request("encoding"));
            }
            let content = base64::engine::general_purpose::STANDARD
                .decode(blob.content)
                .map_err(|_| bad_request("content"))?;
            let sha = api.create_blob(&repo, &content).await?;
            Ok((StatusCode::CREATED, json!({ "sha": sha })))
        }
        ("POST", ["git", "trees"]) => {
            let tree: TreeBody = serde_json::from_value(body).map_err(|_| bad_request("tree"))?;
            let sha = api.create_tree(&repo, &tree.base_tree, &tree.tree).await?;
            Ok((StatusCode::CREATED, json!({ "sha": sha })))
        }
        ("POST", ["git", "commits"]) => {
            let commit: CommitBody = serde_json::from_value(body).map_err(|_| bad_request("commit"))?;
            let sha = api
                .create_commit(&repo, &commit.message, &commit.tree, &commit.parents)
                .await?;
            Ok((StatusCode::CREATED, json!({ "sha": sha })))
        }
        ("POST", ["dispatches"]) => {
            let event: DispatchEvent = serde_json::from_value(body).map_err(|_| bad_request("dispatch"))?;
            api.dispatch(&repo, &event).await?;
            Ok((StatusCode::NO_CONTENT, Value::Null))
        }
        _ => Err(RelayError::upstream(404, "Not Found")),
    }
}

/// Both tokens set
pub fn credentials() -> Credentials {
    Credentials {
        token: Some(TOKEN.to_string()),
        dispatch_token: Some(DISPATCH_TOKEN.to_string()),
    }
}

/// Relay configured to talk to `github`, not yet serving
pub fn relay_server(github: &FakeGitHub, credentials: Credentials) -> RelayServer {
    let mut config = Config::default();
    config.github.api_base = github.base_url();
    config.github.timeout_secs = 5;

    RelayServer::new(&config, "127.0.0.1:0".to_string())
        .expect("build relay")
        .with_credentials(credentials)
}

/// Serve `server` on an ephemeral port, returns its base URL
pub async fn serve_relay(server: RelayServer) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = listener.local_addr().expect("relay addr");
    tokio::spawn(async move {
        server.serve(listener).await.expect("relay server");
    });

    format!("http://{}", addr)
}

/// Start a relay talking to `github`, returns its base URL
pub async fn start_relay(github: &FakeGitHub, credentials: Credentials) -> String {
    serve_relay(relay_server(github, credentials)).await
}

/// Repository `acme/site` with branch `main` holding README.md
pub fn acme_site() -> MemoryGitApi {
    MemoryGitApi::new().with_branch(&RepoId::new("acme", "site"), "main", &[("README.md", &b"# site"[..])])
}
