use ghrelay_config::{DispatchConfig, GitHubConfig};
use ghrelay_github::{GitHubClient, RelayError};

/// Access tokens, resolved once when the server is built
///
/// A missing token is not fatal at startup; requests that need it fail with
/// a configuration error instead.
#[derive(Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
    pub dispatch_token: Option<String>,
}

impl Credentials {
    /// Read both tokens from the environment variables named in config
    pub fn from_config(github: &GitHubConfig) -> Self {
        Self {
            token: github.token(),
            dispatch_token: github.dispatch_token(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<set>"))
            .field("dispatch_token", &self.dispatch_token.as_ref().map(|_| "<set>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub github: GitHubConfig,
    pub dispatch: DispatchConfig,
    pub credentials: Credentials,
    /// Value of Access-Control-Allow-Origin
    pub cors_origin: String,
    /// Shared connection pool for outbound GitHub calls
    pub http: reqwest::Client,
}

impl AppState {
    /// Client for the direct commit path
    pub fn commit_client(&self) -> Result<GitHubClient, RelayError> {
        let token = self.credentials.token.as_deref().ok_or_else(|| {
            RelayError::Configuration(format!(
                "environment variable {} is not set",
                self.github.token_env
            ))
        })?;
        GitHubClient::with_client(&self.github.api_base, token, self.http.clone())
    }

    /// Client for repository dispatch
    pub fn dispatch_client(&self) -> Result<GitHubClient, RelayError> {
        let token = self.credentials.dispatch_token.as_deref().ok_or_else(|| {
            RelayError::Configuration(format!(
                "environment variable {} is not set",
                self.github.dispatch_token_env
            ))
        })?;
        GitHubClient::with_client(&self.github.api_base, token, self.http.clone())
    }
}
