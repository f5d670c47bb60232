/// # youtube-uploader CLI interface
///
/// Argument parsing and the async [`run`] entrypoint. The pieces that do real
/// work (metadata, OAuth flows, the upload pipeline) live in
/// `youtube-uploader-core`; this module wires them to the concrete reqwest
/// clients and the terminal.
///
/// Call [`run`] with a constructed [`Cli`] for programmatic or test use.
use crate::load_config::resolve_config;
use crate::oauth::GoogleOAuthClient;
use crate::output::{print_success, ProgressBarSink, TerminalPrompt};
use crate::upload::YouTubeClient;
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use youtube_uploader_core::auth::token::TokenCache;
use youtube_uploader_core::auth::{authenticate, AuthMode};
use youtube_uploader_core::credentials::load_client_secret;
use youtube_uploader_core::upload::upload_video;

/// Upload a video to YouTube with metadata from a JSON file.
#[derive(Parser, Debug)]
#[clap(
    name = "youtube-uploader",
    version,
    about = "Upload a video to YouTube with OAuth2 authentication"
)]
pub struct Cli {
    /// Path to the video file to upload
    pub video_file: PathBuf,

    /// Path to the JSON metadata file (snippet + status)
    pub metadata_file: PathBuf,

    /// OAuth2 client secret JSON downloaded from the Google Cloud console
    #[clap(long, env = "CLIENT_SECRET_FILE")]
    pub client_secret: Option<PathBuf>,

    /// Where the OAuth token is cached between runs [default: token.json]
    #[clap(long, env = "YOUTUBE_UPLOADER_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Use the device code flow (for machines without a browser)
    #[clap(long, conflicts_with = "manual_auth")]
    pub device_auth: bool,

    /// Print the consent URL and paste the authorization code back
    #[clap(long)]
    pub manual_auth: bool,

    /// Upload chunk size in bytes, a multiple of 262144
    #[clap(long, env = "YOUTUBE_UPLOADER_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Optional YAML file with defaults for the settings above
    #[clap(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Auth mode selected by flags, if any.
    pub fn auth_mode(&self) -> Option<AuthMode> {
        if self.device_auth {
            Some(AuthMode::Device)
        } else if self.manual_auth {
            Some(AuthMode::Manual)
        } else {
            None
        }
    }
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!(
        video = %cli.video_file.display(),
        metadata = %cli.metadata_file.display(),
        "youtube-uploader starting"
    );

    let config = resolve_config(&cli)?;
    config.trace_loaded();

    // Fail on missing inputs before sending the user through a consent screen.
    for (label, path) in [("Video", &cli.video_file), ("Metadata", &cli.metadata_file)] {
        if !path.is_file() {
            tracing::error!(path = %path.display(), "{label} file missing");
            return Err(anyhow!("{label} file not found: {}", path.display()));
        }
    }

    let secret = load_client_secret(&config.client_secret_file)?;
    let oauth = GoogleOAuthClient::new(secret)?;
    let cache = TokenCache::new(&config.token_file);
    let token = authenticate(&oauth, &cache, config.auth_mode, &TerminalPrompt)
        .await
        .context("Authentication failed")?;

    let uploader = YouTubeClient::new(token.access_token.clone())?
        .with_chunk_size(config.chunk_size)?
        .with_progress(Arc::new(ProgressBarSink::new()));

    println!("⏳ Uploading {}...", cli.video_file.display());
    match upload_video(&uploader, &cli.video_file, &cli.metadata_file).await {
        Ok(report) => {
            tracing::info!(video_id = %report.video_id, "Upload complete");
            print_success(&mut io::stdout().lock(), &report)?;
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Upload failed");
            Err(e.into())
        }
    }
}
