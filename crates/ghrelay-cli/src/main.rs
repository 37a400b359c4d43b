//! ghrelay: commit uploaded files to GitHub
//!
//! Usage:
//!   ghrelay start [--addr 0.0.0.0:3000]
//!   ghrelay upload --owner <o> --repo <r> --branch <b> [-m <msg>] [--dry-run] <paths>...
//!   ghrelay config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ghrelay_cli::{Config, RelayServer};
use ghrelay_config::get_config_path;
use ghrelay_github::{CommitBuilder, GitApi, GitHubClient, MemoryGitApi, UploadFile, UploadRequest};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Parser)]
#[command(name = "ghrelay")]
#[command(about = "HTTP relay that turns file uploads into GitHub commits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Start {
        /// Bind address (defaults to server.bind_address, PORT overrides the port)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Commit local files to a branch in one commit
    Upload {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        #[arg(long)]
        branch: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// Path inside the repository; defaults to each file's name
        #[arg(long)]
        prefix: Option<String>,
        /// Run against an in-memory repository instead of GitHub
        #[arg(long)]
        dry_run: bool,
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show config path and effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info, override with RUST_LOG=ghrelay=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ghrelay=info,ghrelay_cli=info,ghrelay_github=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { addr } => {
            let config = Config::load()?;
            let addr = addr.unwrap_or_else(|| config.server.effective_bind_address());

            let server = RelayServer::new(&config, addr.clone())?;
            let credentials = &server.state().credentials;
            if credentials.token.is_none() {
                warn!("{} is not set: /api/upload-github will answer 500", config.github.token_env);
            }
            if credentials.dispatch_token.is_none() {
                warn!(
                    "{} is not set: /api/trigger-action will answer 500",
                    config.github.dispatch_token_env
                );
            }

            println!("Starting ghrelay on {}", addr);
            println!("GitHub API: {}", config.github.api_base);
            println!("Dispatch event: {}", config.dispatch.event_type);

            server.run().await?;
        }
        Commands::Upload {
            owner,
            repo,
            branch,
            message,
            prefix,
            dry_run,
            paths,
        } => {
            let config = Config::load_or_default();
            let files = read_files(&paths, prefix.as_deref())?;
            let message = message.unwrap_or_else(|| config.github.default_commit_message.clone());
            let request = UploadRequest::new(owner, repo, branch, message, files);

            if dry_run {
                let api = MemoryGitApi::new().with_branch(&request.repo, &request.branch, &[]);
                let builder = CommitBuilder::new(api, config.github.raw_base.clone());
                run_upload(&builder, &request).await?;
            } else {
                let token = config
                    .github
                    .token()
                    .with_context(|| format!("{} is not set", config.github.token_env))?;
                let client = GitHubClient::new(&config.github.api_base, token)?
                    .with_timeout(Duration::from_secs(config.github.timeout_secs))?;
                let builder = CommitBuilder::new(client, config.github.raw_base.clone());
                run_upload(&builder, &request).await?;
            }
        }
        Commands::Config => {
            let config = Config::load_or_default();
            println!("Config file: {}", get_config_path().display());
            println!("Bind address: {}", config.server.effective_bind_address());
            println!("CORS origin: {}", config.server.cors_origin);
            println!("GitHub API: {}", config.github.api_base);
            println!("Raw base: {}", config.github.raw_base);
            println!(
                "Token ({}): {}",
                config.github.token_env,
                if config.github.token().is_some() { "set" } else { "not set" }
            );
            println!(
                "Dispatch token ({}): {}",
                config.github.dispatch_token_env,
                if config.github.dispatch_token().is_some() { "set" } else { "not set" }
            );
            println!("Dispatch event: {}", config.dispatch.event_type);
        }
    }

    Ok(())
}

async fn run_upload<A: GitApi>(builder: &CommitBuilder<A>, request: &UploadRequest) -> Result<()> {
    let outcome = builder
        .commit_files(request)
        .await
        .with_context(|| format!("Failed to commit to {}@{}", request.repo, request.branch))?;

    println!("commit {}", outcome.commit_sha);
    for url in &outcome.raw_urls {
        println!("  {}", url);
    }
    Ok(())
}

/// Read files fully into memory, naming each `<prefix>/<file name>`
fn read_files(paths: &[PathBuf], prefix: Option<&str>) -> Result<Vec<UploadFile>> {
    paths
        .iter()
        .map(|path| {
            let content = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(UploadFile::new(repo_path(path, prefix)?, content))
        })
        .collect()
}

fn repo_path(path: &Path, prefix: Option<&str>) -> Result<String> {
    let name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?
        .to_string_lossy()
        .to_string();
    Ok(match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, name),
        None => name,
    })
}
