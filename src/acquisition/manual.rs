//! Manual upload adapter.
//!
//! Buffers submitted with a source id. Multiple buffers either
//! consolidate into one sheet for a single pipeline run, or stage for a
//! combine when the caller asks for the staged flow.

use anyhow::Result;
use tracing::info;

use crate::coordinator::ImportCoordinator;
use crate::error::ImportError;
use crate::formats::grid::RawFile;
use crate::models::PipelineResult;
use crate::pipeline::{ImportPipeline, PipelineInput, RunOptions};

/// Import one or more uploaded buffers right now. Multi-file uploads are
/// consolidated (first file's header, all files' rows) before detection.
pub async fn import_upload(
    pipeline: &ImportPipeline,
    coordinator: &ImportCoordinator,
    source_id: &str,
    files: Vec<RawFile>,
) -> Result<PipelineResult> {
    let source = pipeline
        .db()
        .get_source(source_id)?
        .ok_or_else(|| ImportError::Config(format!("unknown source {}", source_id)))?;
    super::require_valid(&source)?;

    let guard = coordinator.start_import(source_id, "manual")?;
    let multi_file = files.len() > 1;
    info!(source = source_id, files = files.len(), "manual upload received");

    let result = pipeline
        .run(
            &source,
            PipelineInput::Files(files),
            RunOptions {
                trigger: "manual".to_string(),
                multi_file,
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

/// Stage uploaded buffers for a later combine instead of importing them
/// one by one.
pub fn stage_upload(
    pipeline: &ImportPipeline,
    source_id: &str,
    files: Vec<RawFile>,
) -> Result<usize> {
    let source = pipeline
        .db()
        .get_source(source_id)?
        .ok_or_else(|| ImportError::Config(format!("unknown source {}", source_id)))?;

    let mut staged = 0;
    for file in &files {
        let staged_file = pipeline.parse_for_staging(&source, file)?;
        info!(
            source = source_id,
            file = %file.name,
            items = staged_file.items.len(),
            "file staged"
        );
        pipeline.db().stage_file(&staged_file)?;
        staged += 1;
    }
    Ok(staged)
}
