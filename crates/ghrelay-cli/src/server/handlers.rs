use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use ghrelay_github::{
    CommitBuilder, DispatchRelay, DispatchRequest, GitHubClient, RelayError, RepoId, UploadRequest,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use super::form::UploadForm;
use super::state::AppState;

const MISSING_FIELDS: &str = "Missing Owner, Repo, Branch, or File.";
const MISSING_CROSS_FIELDS: &str = "Missing source repository, target repository, Branch, or File.";

/// JSON response carrying the configured CORS origin
fn json_response(state: &AppState, status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, state.cors_origin.clone())],
        Json(body),
    )
        .into_response()
}

/// Map a relay error to the response the client sees
fn error_response(state: &AppState, err: &RelayError, validation_message: &str, upstream_context: &str) -> Response {
    match err {
        RelayError::Validation { .. } => {
            warn!("Rejected request: {}", err);
            json_response(state, StatusCode::BAD_REQUEST, json!({ "message": validation_message }))
        }
        RelayError::Configuration(detail) => {
            error!("Server misconfigured: {}", detail);
            json_response(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": format!("Server configuration error: {}", detail) }),
            )
        }
        RelayError::Upstream { message, .. } => {
            let code = err.http_status();
            error!("{} failed: {}", upstream_context, err);
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            json_response(
                state,
                status,
                json!({
                    "message": format!("{} (Status: {})", upstream_context, code),
                    "detail": message,
                }),
            )
        }
    }
}

async fn read_form(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, Response> {
    let multipart = multipart.map_err(|e| {
        warn!("Rejected request body: {}", e);
        json_response(state, StatusCode::BAD_REQUEST, json!({ "message": e.body_text() }))
    })?;
    UploadForm::read(multipart).await.map_err(|e| {
        warn!("Failed to read multipart body: {}", e);
        json_response(state, e.status(), json!({ "message": e.body_text() }))
    })
}

/// Commit the uploaded files directly through the git data API
pub async fn upload_github(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let client = match state.commit_client() {
        Ok(client) => client,
        Err(e) => return error_response(&state, &e, MISSING_FIELDS, "GitHub API error"),
    };
    let form = match read_form(&state, multipart).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let message = form
        .optional("commitMessage")
        .unwrap_or_else(|| state.github.default_commit_message.clone());
    let request = UploadRequest::new(
        form.field("owner"),
        form.field("repo"),
        form.field("branch"),
        message,
        form.files,
    );

    let builder = CommitBuilder::new(client, state.github.raw_base.clone());
    match builder.commit_files(&request).await {
        Ok(outcome) => json_response(
            &state,
            StatusCode::OK,
            json!({
                "message": "Upload and commit succeeded!",
                "commitSha": outcome.commit_sha,
                "rawUrls": outcome.raw_urls,
            }),
        ),
        Err(e) => error_response(&state, &e, MISSING_FIELDS, "GitHub API error"),
    }
}

/// Hand the uploaded files to the upload workflow of `owner/repo`
pub async fn trigger_action(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let (client, form) = match prepare_dispatch(&state, multipart).await {
        Ok(prepared) => prepared,
        Err(resp) => return resp,
    };
    let request = DispatchRequest::new(
        form.field("owner"),
        form.field("repo"),
        form.field("branch"),
        dispatch_message(&state, &form),
        form.files,
    );
    run_dispatch(&state, client, request, MISSING_FIELDS).await
}

/// Hand the uploaded files to the workflow of `source_owner/source_repo`,
/// asking it to commit to `target_owner/target_repo`
pub async fn trigger_action_cross(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let (client, form) = match prepare_dispatch(&state, multipart).await {
        Ok(prepared) => prepared,
        Err(resp) => return resp,
    };
    let target = RepoId::new(form.field("target_owner"), form.field("target_repo"));
    let request = DispatchRequest::new(
        form.field("source_owner"),
        form.field("source_repo"),
        form.field("branch"),
        dispatch_message(&state, &form),
        form.files,
    )
    .with_target(target);
    run_dispatch(&state, client, request, MISSING_CROSS_FIELDS).await
}

const DISPATCH_CONTEXT: &str = "GitHub API error while triggering the Action";

async fn prepare_dispatch(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(GitHubClient, UploadForm), Response> {
    let client = state
        .dispatch_client()
        .map_err(|e| error_response(state, &e, MISSING_FIELDS, DISPATCH_CONTEXT))?;
    let form = read_form(state, multipart).await?;
    Ok((client, form))
}

fn dispatch_message(state: &AppState, form: &UploadForm) -> String {
    form.optional("commitMessage")
        .unwrap_or_else(|| state.dispatch.commit_message.clone())
}

async fn run_dispatch(
    state: &AppState,
    client: GitHubClient,
    request: DispatchRequest,
    validation_message: &str,
) -> Response {
    let relay = DispatchRelay::new(client, state.dispatch.event_type.clone());
    match relay.trigger(&request).await {
        Ok(()) => json_response(
            state,
            StatusCode::OK,
            json!({
                "message": "Upload request sent. GitHub Action is processing the commit.",
                "action_url": state.github.actions_url(&request.repo.owner, &request.repo.repo),
            }),
        ),
        Err(e) => error_response(state, &e, validation_message, DISPATCH_CONTEXT),
    }
}

pub async fn health_check(State(state): State<AppState>) -> Response {
    json_response(
        &state,
        StatusCode::OK,
        json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

pub async fn cors_preflight(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let allowed_headers = headers
        .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("Content-Type")
        .to_string();

    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, state.cors_origin.clone()),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS".to_string()),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers),
            (header::ACCESS_CONTROL_MAX_AGE, "86400".to_string()),
        ],
    )
}
