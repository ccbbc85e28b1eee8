//! Command-line interface for vidrelay.
//!
//! Provides commands for checking the monitored channel, running relay
//! cycles once or periodically, forcing or retrying a transfer, and
//! obtaining upload credentials.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{
    CredentialSource, Downloader, OAuthClient, RefreshingTokenFile, StaticCredentials, TokenFile,
    TrimmedDownloader, YouTubeDataApi, YouTubeUploader, YtDlpDownloader,
};
use crate::config::Config;
use crate::core::{
    check_status, CycleOutcome, Relay, SourcePoller, TransferObserver, TransferOrchestrator,
    TransferOutcome, UploadOverrides, WatermarkStore,
};
use crate::domain::{Credential, TransferAttempt, TransferPhase, VideoId, Visibility};
use crate::error::TransferError;

/// vidrelay - republish a channel's newest upload to your own channel
#[derive(Parser, Debug)]
#[command(name = "vidrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Bearer token for uploads (otherwise the token file is used)
    #[arg(long, global = true, env = "YOUTUBE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Override the configured upload visibility
    #[arg(long, global = true)]
    pub visibility: Option<Visibility>,

    /// Allow publishing with public visibility
    #[arg(long, global = true)]
    pub confirm_public: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether the channel has a video that was not transferred yet
    Check,

    /// Run one relay cycle: poll, then transfer if there is a new video
    Run,

    /// Run relay cycles periodically until interrupted
    Watch {
        /// Seconds between cycles (defaults to poll.interval_seconds)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Transfer a specific video regardless of the watermark
    Transfer {
        /// Source video id
        video_id: String,
    },

    /// Upload a file that is already on disk (e.g. after a failed upload)
    Upload {
        /// Local media file
        file: PathBuf,

        /// Source video id recorded in the watermark
        #[arg(long)]
        video_id: String,

        /// Title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Description (defaults to the configured one)
        #[arg(long)]
        description: Option<String>,
    },

    /// Obtain or refresh upload credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Show resolved configuration (secrets redacted)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Print the consent URL to open in a browser
    Url,

    /// Exchange the authorization code from the redirect for tokens
    Exchange {
        /// Value of the `code` query parameter
        code: String,
    },

    /// Refresh the stored access token
    Refresh,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load()?;
        if let Some(visibility) = self.visibility {
            config.upload.visibility = visibility;
        }
        if self.confirm_public {
            config.upload.confirm_public = true;
        }
        let access_token = self.access_token;

        match self.command {
            Commands::Check => check(&config).await,
            Commands::Run => run_once(&config, access_token).await,
            Commands::Watch { interval } => {
                let interval = interval
                    .map(|secs| Duration::from_secs(secs.max(1)))
                    .unwrap_or(config.poll.interval);
                watch(&config, access_token, interval).await
            }
            Commands::Transfer { video_id } => transfer(&config, access_token, &video_id).await,
            Commands::Upload {
                file,
                video_id,
                title,
                description,
            } => upload(&config, access_token, file, &video_id, title, description).await,
            Commands::Auth { command } => auth(&config, command).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Prints phase changes to stderr
struct ProgressPrinter;

impl TransferObserver for ProgressPrinter {
    fn on_phase(&self, attempt: &TransferAttempt) {
        match attempt.phase {
            TransferPhase::Pending => eprintln!("[{}] queued", attempt.video_id),
            TransferPhase::Downloading => eprintln!("[{}] downloading...", attempt.video_id),
            TransferPhase::Downloaded => match &attempt.local_file {
                Some(path) => eprintln!("[{}] downloaded to {}", attempt.video_id, path.display()),
                None => eprintln!("[{}] downloaded", attempt.video_id),
            },
            TransferPhase::Uploading => eprintln!("[{}] uploading...", attempt.video_id),
            TransferPhase::Completed => eprintln!("[{}] done", attempt.video_id),
            TransferPhase::Failed => eprintln!("[{}] failed", attempt.video_id),
        }
    }
}

fn build_downloader(config: &Config) -> Arc<dyn Downloader> {
    let mut ytdlp = YtDlpDownloader::new(&config.download_dir)
        .with_binary_path(&config.download.yt_dlp_path)
        .with_timeout(config.download.timeout);
    if let Some(ref format) = config.download.format {
        ytdlp = ytdlp.with_format(format);
    }

    match config.download.trim_start_seconds {
        Some(skip) => Arc::new(
            TrimmedDownloader::new(Arc::new(ytdlp), skip)
                .with_ffmpeg_path(&config.download.ffmpeg_path)
                .with_timeout(config.download.trim_timeout),
        ),
        None => Arc::new(ytdlp),
    }
}

fn build_credentials(config: &Config, access_token: Option<String>) -> Arc<dyn CredentialSource> {
    if let Some(token) = access_token {
        return Arc::new(StaticCredentials::new(Credential::new(token)));
    }

    let token_file = TokenFile::new(config.token_path());
    match config.oauth_client() {
        Ok((client_id, client_secret)) => Arc::new(RefreshingTokenFile::new(
            token_file,
            OAuthClient::new(client_id, client_secret, &config.oauth.redirect_uri),
        )),
        Err(_) => Arc::new(token_file),
    }
}

fn build_orchestrator(config: &Config, access_token: Option<String>) -> Result<TransferOrchestrator> {
    let defaults = config.upload_defaults()?;

    Ok(TransferOrchestrator::new(
        build_downloader(config),
        Arc::new(YouTubeUploader::new(config.upload.timeout)),
        build_credentials(config, access_token),
        WatermarkStore::new(config.watermark_path()),
        defaults,
    )
    .with_observer(Arc::new(ProgressPrinter)))
}

fn build_relay(config: &Config, access_token: Option<String>) -> Result<Relay> {
    let source = config.source()?;
    let api = YouTubeDataApi::new(source.api_key, config.poll.request_timeout);

    Ok(Relay::new(
        source.channel,
        SourcePoller::new(Arc::new(api)),
        Arc::new(build_orchestrator(config, access_token)?),
    ))
}

/// Print the check status as JSON
async fn check(config: &Config) -> Result<()> {
    let source = config.source()?;
    let api = YouTubeDataApi::new(source.api_key, config.poll.request_timeout);
    let status = check_status(
        &SourcePoller::new(Arc::new(api)),
        &source.channel,
        &WatermarkStore::new(config.watermark_path()),
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn run_once(config: &Config, access_token: Option<String>) -> Result<()> {
    let relay = build_relay(config, access_token)?;
    let outcome = relay.run_once().await;
    report_cycle(&outcome);
    outcome.map(|_| ()).map_err(Into::into)
}

/// Periodic relay cycles; Ctrl-C cancels a transfer that has not started
/// uploading and waits for one that has
async fn watch(config: &Config, access_token: Option<String>, interval: Duration) -> Result<()> {
    let relay = build_relay(config, access_token)?;
    eprintln!(
        "Watching channel {} every {}s (Ctrl-C to stop)",
        relay.channel(),
        interval.as_secs()
    );

    loop {
        let mut stopping = false;
        let cycle = relay.run_once();
        tokio::pin!(cycle);

        let outcome = tokio::select! {
            outcome = &mut cycle => outcome,
            _ = tokio::signal::ctrl_c() => {
                stopping = true;
                if relay.orchestrator().cancel() {
                    eprintln!("Cancelling transfer...");
                } else if relay.orchestrator().is_busy() {
                    eprintln!("Upload in progress, waiting for it to finish...");
                }
                cycle.await
            }
        };
        report_cycle(&outcome);

        if stopping {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    eprintln!("Stopped");
    Ok(())
}

async fn transfer(config: &Config, access_token: Option<String>, video_id: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config, access_token)?;
    let result = orchestrator.transfer(&VideoId::from(video_id)).await;
    report_transfer(result.as_ref());
    result.map(|_| ()).map_err(Into::into)
}

async fn upload(
    config: &Config,
    access_token: Option<String>,
    file: PathBuf,
    video_id: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if !file.is_file() {
        anyhow::bail!("No such file: {}", file.display());
    }

    let orchestrator = build_orchestrator(config, access_token)?;
    let result = orchestrator
        .transfer_file(
            &VideoId::from(video_id),
            file,
            UploadOverrides { title, description },
        )
        .await;
    report_transfer(result.as_ref());
    result.map(|_| ()).map_err(Into::into)
}

fn report_cycle(outcome: &Result<CycleOutcome, TransferError>) {
    match outcome {
        Ok(CycleOutcome::PollFailed(reason)) => eprintln!("Could not check for new videos: {}", reason),
        Ok(CycleOutcome::NoUploads) => eprintln!("No uploads found yet"),
        Ok(CycleOutcome::UpToDate(video_id)) => eprintln!("No new video (latest: {})", video_id),
        Ok(CycleOutcome::Transferred(outcome)) => report_transfer(Ok(outcome)),
        Err(e) => report_transfer(Err(e)),
    }
}

fn report_transfer(result: Result<&TransferOutcome, &TransferError>) {
    match result {
        Ok(outcome) => {
            eprintln!("\nTransfer completed");
            eprintln!("   Source:   {}", outcome.video_id.watch_url());
            eprintln!(
                "   Uploaded: https://www.youtube.com/watch?v={}",
                outcome.uploaded_video_id
            );
            if !outcome.watermark_committed {
                eprintln!("   Warning: watermark not saved, this video may be transferred again");
            }
            if !outcome.local_file_removed {
                eprintln!("   Warning: local file could not be deleted");
            }
        }
        Err(e) => {
            eprintln!("\nTransfer failed: {}", e);
            if let Some(file) = e.retained_file() {
                eprintln!("   File kept at {}", file.display());
            }
            if let Some(command) = e.retry_command() {
                eprintln!("   Retry with: {}", command);
            }
        }
    }
}

async fn auth(config: &Config, command: AuthCommands) -> Result<()> {
    let (client_id, client_secret) = config.oauth_client()?;
    let client = OAuthClient::new(client_id, client_secret, &config.oauth.redirect_uri);
    let token_file = TokenFile::new(config.token_path());

    match command {
        AuthCommands::Url => {
            println!("{}", client.authorization_url()?);
        }
        AuthCommands::Exchange { code } => {
            let tokens = client.exchange_code(&code).await?;
            token_file.save(&tokens).await?;
            eprintln!("Tokens saved to {}", token_file.path().display());
            if tokens.refresh_token.is_none() {
                eprintln!("Warning: no refresh token issued; re-run `auth url` to grant offline access");
            }
        }
        AuthCommands::Refresh => {
            let stored = token_file
                .load()
                .await?
                .with_context(|| format!("No token file at {}", token_file.path().display()))?;
            let refresh_token = stored
                .refresh_token
                .context("Stored tokens have no refresh token; run `auth url` again")?;
            let tokens = client.refresh(&refresh_token).await?;
            token_file.save(&tokens).await?;
            eprintln!("Access token refreshed");
        }
    }

    Ok(())
}

fn redact(value: &Option<String>) -> &'static str {
    match value {
        Some(_) => "(set)",
        None => "(not set)",
    }
}

fn show_config(config: &Config) -> Result<()> {
    println!("vidrelay configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Source:");
    println!("  API key:   {}", redact(&config.api_key));
    println!(
        "  Channel:   {}",
        config.channel_identifier.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Paths:");
    println!("  Home:      {}", config.home.display());
    println!("  Downloads: {}", config.download_dir.display());
    println!("  Watermark: {}", config.watermark_path().display());
    println!("  Tokens:    {}", config.token_path().display());
    println!();
    println!("OAuth:");
    println!("  Client id:     {}", redact(&config.oauth.client_id));
    println!("  Client secret: {}", redact(&config.oauth.client_secret));
    println!("  Redirect URI:  {}", config.oauth.redirect_uri);
    println!();
    println!("Upload:");
    println!("  Visibility:     {}", config.upload.visibility);
    println!("  Confirm public: {}", config.upload.confirm_public);
    println!("  Category:       {}", config.upload.category_id);
    println!("  Description:    {}", config.upload.description);
    println!();
    println!("Download:");
    println!("  yt-dlp:  {}", config.download.yt_dlp_path);
    match config.download.trim_start_seconds {
        Some(secs) => println!("  Trim:    first {}s ({})", secs, config.download.ffmpeg_path),
        None => println!("  Trim:    off"),
    }
    println!("  Timeout: {}s", config.download.timeout.as_secs());
    println!();
    println!("Poll interval: {}s", config.poll.interval.as_secs());

    Ok(())
}
