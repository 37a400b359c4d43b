mod form;
mod handlers;
mod state;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use ghrelay_config::Config;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

pub use form::UploadForm;
pub use state::{AppState, Credentials};

pub struct RelayServer {
    state: AppState,
    addr: String,
    max_body_bytes: usize,
}

impl RelayServer {
    /// Build a server from config; tokens are read from the environment
    /// variables the config names
    pub fn new(config: &Config, addr: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.github.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            state: AppState {
                github: config.github.clone(),
                dispatch: config.dispatch.clone(),
                credentials: Credentials::from_config(&config.github),
                cors_origin: config.server.cors_origin.clone(),
                http,
            },
            addr,
            max_body_bytes: config.server.max_body_bytes(),
        })
    }

    /// Replace the tokens resolved from the environment
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.state.credentials = credentials;
        self
    }

    pub fn with_cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.state.cors_origin = origin.into();
        self
    }

    /// Commit message used when an upload carries none
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.state.github.default_commit_message = message.into();
        self
    }

    /// Set maximum request body size
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route(
                "/api/upload-github",
                post(handlers::upload_github).options(handlers::cors_preflight),
            )
            .route(
                "/api/trigger-action",
                post(handlers::trigger_action).options(handlers::cors_preflight),
            )
            .route(
                "/api/trigger-action-cross",
                post(handlers::trigger_action_cross).options(handlers::cors_preflight),
            )
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .with_state(self.state.clone())
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("ghrelay listening on {}", addr);
        }
        let app = self.router();
        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghrelay_github::RelayError;

    fn server() -> RelayServer {
        RelayServer::new(&Config::default(), "127.0.0.1:0".to_string()).unwrap()
    }

    #[test]
    fn test_builder() {
        let server = server()
            .with_cors_origin("https://app.example.com")
            .with_max_body_bytes(1024)
            .with_commit_message("relay upload")
            .with_credentials(Credentials {
                token: Some("t".to_string()),
                dispatch_token: None,
            });

        assert_eq!(server.addr(), "127.0.0.1:0");
        assert_eq!(server.state().cors_origin, "https://app.example.com");
        assert_eq!(server.max_body_bytes, 1024);
        assert_eq!(server.state().github.default_commit_message, "relay upload");
        assert!(server.state().commit_client().is_ok());
    }

    #[test]
    fn test_missing_tokens_are_configuration_errors() {
        let server = server().with_credentials(Credentials::default());

        let err = server.state().commit_client().unwrap_err();
        assert_eq!(
            err,
            RelayError::Configuration("environment variable TOKEN is not set".to_string())
        );
        let err = server.state().dispatch_client().unwrap_err();
        assert_eq!(
            err,
            RelayError::Configuration("environment variable DISPATCH_TOKEN is not set".to_string())
        );
    }

    #[test]
    fn test_credentials_debug_hides_tokens() {
        let credentials = Credentials {
            token: Some("ghp_secret".to_string()),
            dispatch_token: None,
        };
        let shown = format!("{:?}", credentials);
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains("<set>"));
    }
}
