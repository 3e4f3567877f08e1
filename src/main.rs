use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_service::cli::{Cli, Commands};
use transcript_service::config::Config;
use transcript_service::output::{self, TranscriptDocument};
use transcript_service::server;
use transcript_service::utils::extract_video_id;
use transcript_service::{resolve_proxy, FetchOutcome, FetchRequest, ResilientFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "transcript_service=debug,tower_http=debug"
    } else {
        "transcript_service=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = Config::load().await?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .with_context(|| {
                    format!("Invalid listen address {}:{}", config.server.host, config.server.port)
                })?;

            if resolve_proxy(config.proxy.source().as_ref()).is_some() {
                tracing::info!("Proxy support enabled");
            }

            server::serve(addr, ResilientFetcher::from_config(&config)).await?;
        }
        Commands::Fetch {
            video,
            languages,
            format,
            output,
            timestamps,
        } => {
            let video_id = extract_video_id(&video)?;
            let config = Config::load().await?;
            let fetcher = ResilientFetcher::from_config(&config);

            tracing::info!("Fetching transcript for video: {}", video_id);

            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .context("Invalid progress template")?,
            );
            progress.enable_steady_tick(Duration::from_millis(120));
            progress.set_message(format!("Fetching transcript for {}...", video_id));

            let request = FetchRequest::new(video_id.clone()).with_languages(languages.clone());
            let outcome = fetcher.fetch_with_retry(&request).await;

            let transcript = match outcome {
                FetchOutcome::Success { transcript } => {
                    progress.finish_with_message("Transcript fetched");
                    transcript
                }
                FetchOutcome::Failure { reason, .. } => {
                    progress.finish_with_message("Fetch failed");
                    anyhow::bail!("Failed to fetch transcript for {}: {}", video_id, reason);
                }
            };

            let doc = TranscriptDocument {
                video_id: &video_id,
                language_code: languages.first().map(String::as_str),
                segments: transcript.len(),
                transcript: &transcript,
            };

            match output {
                Some(path) => {
                    output::save_to_file(&doc, &path, &format, timestamps)?;
                    println!("Transcript saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&doc, &format, timestamps)?;
                }
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            } else {
                let config = Config::load().await?;
                if !show {
                    println!("Use --show to print the configuration or --init to write defaults.");
                }
                config.display();
            }
        }
    }

    Ok(())
}
