//! Staged-file combine adapter.
//!
//! Reads every file in status `staged` for a source and feeds their
//! already-prefixed items to the pipeline as one pre-consolidated run.
//! On success the pipeline marks the staged files `imported`.

use anyhow::Result;
use tracing::info;

use crate::coordinator::ImportCoordinator;
use crate::error::ImportError;
use crate::models::{PipelineResult, StagedFileStatus};
use crate::pipeline::{ImportPipeline, PipelineInput, RunOptions};
use crate::sources::DataSource;

/// Combine with the source already claimed by the caller (the email
/// adapter holds its guard across staging and combine).
pub async fn import_staged_for_source(
    pipeline: &ImportPipeline,
    source: &DataSource,
    trigger: &str,
) -> Result<PipelineResult> {
    let staged = pipeline
        .db()
        .staged_files(&source.id, StagedFileStatus::Staged)?;
    if staged.is_empty() {
        return Err(ImportError::Parse(format!(
            "no staged files for source {}",
            source.id
        ))
        .into());
    }

    let file_ids: Vec<String> = staged.iter().map(|f| f.id.clone()).collect();
    let items: Vec<_> = staged.into_iter().flat_map(|f| f.items).collect();
    info!(
        source = %source.id,
        files = file_ids.len(),
        items = items.len(),
        "combining staged files"
    );

    pipeline
        .run(
            source,
            PipelineInput::Staged {
                items,
                file_ids,
            },
            RunOptions {
                trigger: trigger.to_string(),
                multi_file: true,
                cancel: None,
            },
        )
        .await
}

/// Standalone combine entry point (e.g. user-triggered).
pub async fn import_staged(
    pipeline: &ImportPipeline,
    coordinator: &ImportCoordinator,
    source_id: &str,
) -> Result<PipelineResult> {
    let source = pipeline
        .db()
        .get_source(source_id)?
        .ok_or_else(|| ImportError::Config(format!("unknown source {}", source_id)))?;

    let guard = coordinator.start_import(source_id, "combine")?;
    let result = import_staged_for_source(pipeline, &source, "combine").await;
    match &result {
        Ok(r) if r.success => guard.complete_import(r.item_count),
        Ok(r) => guard.fail_import(r.error.as_deref().unwrap_or("blocked")),
        Err(e) => guard.fail_import(&format!("{:#}", e)),
    }
    result
}
