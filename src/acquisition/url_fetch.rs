//! Scheduled URL fetch adapter.
//!
//! Periodic GET of the source's configured URL with bounded
//! retry-and-backoff on transient failures, streaming the body into the
//! pipeline.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::links::file_name_from_url;
use crate::coordinator::ImportCoordinator;
use crate::error::ImportError;
use crate::formats::grid::RawFile;
use crate::models::PipelineResult;
use crate::pipeline::{ImportPipeline, PipelineInput, RunOptions};

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 500;

/// Download one feed URL, retrying transient failures with exponential
/// backoff.
pub async fn download_feed(http: &Client, url: &str) -> Result<RawFile> {
    let mut backoff = INITIAL_BACKOFF_MS;
    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match http.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let bytes = resp.bytes().await.context("failed to read feed body")?;
                    return Ok(RawFile::new(file_name_from_url(url), bytes.to_vec()));
                }
                if status.is_server_error() || status.as_u16() == 429 {
                    warn!(url, %status, attempt, "feed fetch failed, will retry");
                    last_error = Some(format!("HTTP {}", status));
                } else {
                    bail!("feed fetch failed with HTTP {}", status);
                }
            }
            Err(e) => {
                warn!(url, attempt, "feed fetch error: {}", e);
                last_error = Some(e.to_string());
            }
        }

        if attempt < MAX_RETRIES {
            sleep(Duration::from_millis(backoff)).await;
            backoff *= 2;
        }
    }

    bail!(
        "feed fetch failed after {} attempts: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    )
}

/// Run a scheduled (or manually triggered) URL pull for one source.
pub async fn import_from_url(
    pipeline: &ImportPipeline,
    coordinator: &ImportCoordinator,
    http: &Client,
    source_id: &str,
    trigger: &str,
) -> Result<PipelineResult> {
    let source = pipeline
        .db()
        .get_source(source_id)?
        .ok_or_else(|| ImportError::Config(format!("unknown source {}", source_id)))?;
    super::require_valid(&source)?;
    let url = source
        .url
        .clone()
        .ok_or_else(|| ImportError::Config(format!("source {} has no URL", source_id)))?;

    let guard = coordinator.start_import(source_id, trigger)?;

    let file = match download_feed(http, &url).await {
        Ok(f) => f,
        Err(e) => {
            let msg = format!("{:#}", e);
            guard.fail_import(&msg);
            return Err(ImportError::Acquisition(msg).into());
        }
    };
    info!(source = source_id, bytes = file.data.len(), "feed downloaded");

    let result = pipeline
        .run(
            &source,
            PipelineInput::Files(vec![file]),
            RunOptions {
                trigger: trigger.to_string(),
                multi_file: false,
                cancel: None,
            },
        )
        .await;

    match &result {
        Ok(r) if r.success => guard.complete_import(r.item_count),
        Ok(r) => guard.fail_import(r.error.as_deref().unwrap_or("blocked")),
        Err(e) => guard.fail_import(&format!("{:#}", e)),
    }
    result
}
