//! Email (IMAP) acquisition adapter.
//!
//! The IMAP transport itself lives behind [`MailFetcher`]; this adapter
//! owns everything above it: sender/subject filtering, attachment and
//! body-link harvesting, (message-id, content-hash) dedupe, mark-read and
//! delete policies, and the single-file vs. staged multi-file split.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use super::{combine, content_hash, links};
use crate::coordinator::ImportCoordinator;
use crate::error::ImportError;
use crate::formats::grid::{is_feed_extension, RawFile};
use crate::models::PipelineResult;
use crate::pipeline::{ImportPipeline, PipelineInput, RunOptions};
use crate::sources::EmailSettings;

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub message_id: String,
    pub from: String,
    pub subject: String,
    pub body_text: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<MailAttachment>,
}

/// The interface the core consumes; the IMAP transport is out of scope
/// and supplied by the embedding application (tests use an in-memory
/// fetcher).
#[async_trait]
pub trait MailFetcher: Send + Sync {
    async fn fetch_unread(&self, settings: &EmailSettings) -> Result<Vec<MailMessage>>;
    async fn mark_read(&self, settings: &EmailSettings, message_id: &str) -> Result<()>;
    async fn delete(&self, settings: &EmailSettings, message_id: &str) -> Result<()>;
}

#[derive(Debug)]
pub enum EmailPullOutcome {
    /// Nothing matched; the retry queue may reschedule this run.
    NoMatchingMail,
    Imported(PipelineResult),
    Staged {
        staged: usize,
        combined: Option<PipelineResult>,
    },
}

fn sender_allowed(settings: &EmailSettings, from: &str) -> bool {
    if settings.sender_whitelist.is_empty() {
        return true;
    }
    let from_lower = from.to_lowercase();
    settings
        .sender_whitelist
        .iter()
        .any(|allowed| from_lower.contains(&allowed.trim().to_lowercase()))
}

fn subject_matches(settings: &EmailSettings, subject: &str) -> bool {
    match &settings.subject_filter {
        Some(filter) if !filter.trim().is_empty() => subject
            .to_lowercase()
            .contains(&filter.trim().to_lowercase()),
        _ => true,
    }
}

/// Harvest feed files from one message: matching attachments plus, when
/// enabled, bodies fetched from embedded download links.
async fn harvest_files(
    http: &Client,
    settings: &EmailSettings,
    message: &MailMessage,
) -> Vec<RawFile> {
    let mut files = Vec::new();

    for attachment in &message.attachments {
        if is_feed_extension(&attachment.file_name) {
            files.push(RawFile::new(
                attachment.file_name.clone(),
                attachment.data.clone(),
            ));
        } else {
            debug!(file = %attachment.file_name, "attachment skipped (extension)");
        }
    }

    if settings.extract_links_from_body {
        let urls = links::extract_download_links(
            message.body_html.as_deref(),
            message.body_text.as_deref(),
        );
        for url in urls {
            match http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                    Ok(bytes) => {
                        files.push(RawFile::new(links::file_name_from_url(&url), bytes.to_vec()));
                    }
                    Err(e) => warn!(url, "link body read failed: {}", e),
                },
                Ok(resp) => warn!(url, status = %resp.status(), "link download failed"),
                Err(e) => warn!(url, "link download failed: {}", e),
            }
        }
    }

    files
}

/// One scheduled (or retried) email pull for a source.
pub async fn run_email_pull(
    pipeline: &ImportPipeline,
    coordinator: &ImportCoordinator,
    fetcher: &dyn MailFetcher,
    http: &Client,
    source_id: &str,
    trigger: &str,
) -> Result<EmailPullOutcome> {
    let source = pipeline
        .db()
        .get_source(source_id)?
        .ok_or_else(|| ImportError::Config(format!("unknown source {}", source_id)))?;
    super::require_valid(&source)?;
    let settings = source
        .email
        .clone()
        .ok_or_else(|| ImportError::Config(format!("source {} has no email settings", source_id)))?;

    let guard = coordinator.start_import(source_id, trigger)?;

    let run = async {
        let messages = fetcher
            .fetch_unread(&settings)
            .await
            .map_err(|e| ImportError::Acquisition(format!("{:#}", e)))?;

        let mut harvested: Vec<RawFile> = Vec::new();
        for message in &messages {
            if !sender_allowed(&settings, &message.from) {
                debug!(from = %message.from, "message skipped (sender)");
                continue;
            }
            if !subject_matches(&settings, &message.subject) {
                debug!(subject = %message.subject, "message skipped (subject)");
                continue;
            }

            let files = harvest_files(http, &settings, message).await;
            if files.is_empty() {
                continue;
            }

            // Dedupe by (message id, content hash); clearing the seen
            // table re-enables processing of the same messages.
            let mut all_bytes: Vec<u8> = Vec::new();
            for f in &files {
                all_bytes.extend_from_slice(&f.data);
            }
            let hash = content_hash(&all_bytes);
            if !pipeline.db().mark_message_seen(&message.message_id, &hash)? {
                debug!(message = %message.message_id, "message already processed");
                continue;
            }

            if settings.mark_as_read {
                if let Err(e) = fetcher.mark_read(&settings, &message.message_id).await {
                    warn!(message = %message.message_id, "mark-read failed: {:#}", e);
                }
            }
            if settings.delete_after_download {
                if let Err(e) = fetcher.delete(&settings, &message.message_id).await {
                    warn!(message = %message.message_id, "delete failed: {:#}", e);
                }
            }

            harvested.extend(files);
        }

        if harvested.is_empty() {
            info!(source = source_id, "email pull found no matching mail");
            return Ok(EmailPullOutcome::NoMatchingMail);
        }

        let multi = settings.multi_file_mode || harvested.len() > 1;
        if multi {
            let mut staged = 0usize;
            for file in &harvested {
                let staged_file = pipeline.parse_for_staging(&source, file)?;
                pipeline.db().stage_file(&staged_file)?;
                staged += 1;
            }

            let total_staged = pipeline.db().count_staged(source_id)?;
            let ready = settings
                .expected_files
                .map(|expected| total_staged >= expected as usize)
                .unwrap_or(true);
            info!(
                source = source_id,
                staged,
                total_staged,
                ready,
                "email files staged"
            );

            let combined = if ready {
                Some(combine::import_staged_for_source(pipeline, &source, trigger).await?)
            } else {
                None
            };
            return Ok(EmailPullOutcome::Staged { staged, combined });
        }

        let result = pipeline
            .run(
                &source,
                PipelineInput::Files(harvested),
                RunOptions {
                    trigger: trigger.to_string(),
                    multi_file: false,
                    cancel: None,
                },
            )
            .await?;
        Ok(EmailPullOutcome::Imported(result))
    }
    .await;

    match &run {
        Ok(EmailPullOutcome::NoMatchingMail) => {
            guard.fail_import("no matching mail");
        }
        Ok(EmailPullOutcome::Imported(r)) => {
            if r.success {
                guard.complete_import(r.item_count);
            } else {
                guard.fail_import(r.error.as_deref().unwrap_or("blocked"));
            }
        }
        Ok(EmailPullOutcome::Staged { combined, .. }) => match combined {
            Some(r) if r.success => guard.complete_import(r.item_count),
            Some(r) => guard.fail_import(r.error.as_deref().unwrap_or("blocked")),
            None => guard.complete_import(0),
        },
        Err(e) => {
            guard.fail_import(&format!("{:#}", e));
        }
    }

    run
}
