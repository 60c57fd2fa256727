//! Wires the loaded configuration into the fetch or stream flow.

use anyhow::{Context, Result};
use perch_analysis::{tabulate, VaderScorer};
use perch_config::{PerchConfig, RunMode};
use perch_social::{export, Authenticator, Client, Streamer};

pub async fn run(cfg: PerchConfig) -> Result<()> {
    let authenticator = Authenticator::new(cfg.credentials.clone());

    match cfg.mode {
        RunMode::Fetch => fetch(&cfg, &authenticator).await,
        RunMode::Stream => stream(&cfg, authenticator).await,
    }
}

/// Fetch the subject's timeline, tag it, print the table; optionally export
/// raw lines and the friends listing.
async fn fetch(cfg: &PerchConfig, authenticator: &Authenticator) -> Result<()> {
    let session = authenticator.authenticate()?;
    let client = Client::new(session)?;

    let posts = client
        .fetch_timeline(&cfg.fetch.subject, cfg.fetch.count)
        .await
        .context("timeline fetch failed")?;
    tracing::info!(subject = %cfg.fetch.subject, fetched = posts.len(), "timeline.fetched");

    let mut table = tabulate(&posts);
    table.apply_sentiment(&VaderScorer::new());
    println!("{table}");

    if let Some(path) = &cfg.fetch.timeline_out {
        let lines: Vec<&str> = posts.iter().map(|p| p.text.as_str()).collect();
        export::write_lines(path, &lines)?;
    }

    if cfg.fetch.friends_count > 0 {
        let friends = client
            .fetch_friends(&cfg.fetch.subject, cfg.fetch.friends_count)
            .await
            .context("friends fetch failed")?;
        tracing::info!(subject = %cfg.fetch.subject, fetched = friends.len(), "friends.fetched");
        if let Some(path) = &cfg.fetch.friends_out {
            export::write_lines(path, &friends)?;
        }
    }

    Ok(())
}

/// Run the keyword-filtered push subscription until its listener stops it.
async fn stream(cfg: &PerchConfig, authenticator: Authenticator) -> Result<()> {
    let stream_cfg = cfg
        .stream
        .as_ref()
        .context("stream mode requires a `stream` section in perch.yaml")?;

    Streamer::new(authenticator)
        .stream(&stream_cfg.target_file, &stream_cfg.keywords)
        .await?;
    Ok(())
}
