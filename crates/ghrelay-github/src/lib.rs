//! GitHub git-data client for ghrelay
//!
//! Commits uploaded files to a branch through the git data API
//! (blob -> tree -> commit -> ref), or hands them to a workflow through a
//! repository dispatch event.
//!
//! # Example
//!
//! ```rust,no_run
//! use ghrelay_github::{CommitBuilder, GitHubClient, UploadFile, UploadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GitHubClient::new("https://api.github.com", std::env::var("TOKEN")?)?;
//!     let builder = CommitBuilder::new(client, "https://raw.githubusercontent.com");
//!
//!     let request = UploadRequest::new(
//!         "acme",
//!         "site",
//!         "main",
//!         "update",
//!         vec![UploadFile::new("a.txt", "hello")],
//!     );
//!     let outcome = builder.commit_files(&request).await?;
//!     println!("{} {:?}", outcome.commit_sha, outcome.raw_urls);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod commit;
pub mod dispatch;
pub mod error;
pub mod memory;
pub mod types;

pub use api::GitApi;
pub use client::GitHubClient;
pub use commit::{CommitBuilder, CommitOutcome, UploadRequest};
pub use dispatch::{DispatchRelay, DispatchRequest};
pub use error::{RelayError, Result};
pub use memory::{Call, MemoryGitApi};
pub use types::{DispatchEvent, DispatchFile, DispatchPayload, RepoId, TreeEntry, UploadFile};
