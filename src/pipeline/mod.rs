//! The unified import pipeline.
//!
//! Every acquisition channel funnels into this fixed 20-step sequence;
//! adapters only produce buffers (or pre-consolidated staged items) and
//! consume the result. Steps are strictly sequential — each one fully
//! materializes its stream before the next begins — and a cancellation
//! flag is observed between steps, never mid-write.

pub mod cleaner;
pub mod discontinued;
pub mod prefix;
pub mod price_expand;
pub mod rules;
pub mod safety;
pub mod stats;
pub mod stock_info;
pub mod variant_rules;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::colors::advisor::ColorAdvisor;
use crate::colors::mapping_index;
use crate::error::ImportError;
use crate::formats::grid::{self, RawFile, SheetGrid};
use crate::formats::{detect, parse_with_format, row, FormatType, ParseContext};
use crate::models::{ImportRunStats, ImportedItem, PipelineResult, StagedFileStatus, Variant};
use crate::sources::{DataSource, SourceRole, UpdateStrategy};
use crate::storage::InventoryDb;
use crate::validation::{self, SourceFileCounts};

/// What an adapter hands the pipeline.
pub enum PipelineInput {
    /// Raw feed files; multiple buffers are consolidated before parsing.
    Files(Vec<RawFile>),
    /// Pre-consolidated staged items. Parsing, style cleaning and
    /// prefixing already happened at staging time.
    Staged {
        items: Vec<Variant>,
        file_ids: Vec<String>,
    },
}

#[derive(Clone, Default)]
pub struct RunOptions {
    pub trigger: String,
    /// Relaxes the row-drop pre-check; single files of a batch are small.
    pub multi_file: bool,
    pub cancel: Option<Arc<AtomicBool>>,
}

pub struct ImportPipeline {
    db: InventoryDb,
    advisor: Arc<dyn ColorAdvisor>,
}

impl ImportPipeline {
    pub fn new(db: InventoryDb, advisor: Arc<dyn ColorAdvisor>) -> Self {
        Self { db, advisor }
    }

    pub fn db(&self) -> &InventoryDb {
        &self.db
    }

    /// Run the full sequence for one source. Safety blocks and validation
    /// failures come back inside the result; config, parse and write
    /// failures are errors.
    pub async fn run(
        &self,
        source: &DataSource,
        input: PipelineInput,
        opts: RunOptions,
    ) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4().to_string();
        let today = Local::now().date_naive();
        let mut stats = ImportRunStats::default();

        self.db
            .record_run_start(&run_id, &source.id, &opts.trigger)
            .ok();

        let result = self
            .run_inner(source, input, &opts, &run_id, today, &mut stats)
            .await;

        match &result {
            Ok(r) => {
                let outcome = if r.success { "success" } else { "blocked" };
                self.db
                    .record_run_finish(&run_id, outcome, r.error.as_deref(), Some(r.item_count))
                    .ok();
            }
            Err(e) => {
                self.db
                    .record_run_finish(&run_id, "error", Some(&format!("{:#}", e)), None)
                    .ok();
            }
        }
        result
    }

    async fn run_inner(
        &self,
        source: &DataSource,
        input: PipelineInput,
        opts: &RunOptions,
        run_id: &str,
        today: NaiveDate,
        stats: &mut ImportRunStats,
    ) -> Result<PipelineResult> {
        let cancelled = || {
            opts.cancel
                .as_ref()
                .map(|c| c.load(Ordering::Relaxed))
                .unwrap_or(false)
        };
        let cancel_result = |stats: &ImportRunStats| PipelineResult {
            success: false,
            item_count: 0,
            file_id: None,
            stats: stats.clone(),
            validation: None,
            error: Some("import cancelled".to_string()),
            safety_block: None,
        };

        let is_staged = matches!(input, PipelineInput::Staged { .. });
        let mut file_id: Option<String> = None;
        let mut staged_file_ids: Vec<String> = Vec::new();

        // Steps 1-4: read, detect, parse, style-clean. The staged path
        // skips them; staging already did this work per file.
        let mut variants: Vec<Variant>;
        let mut pre_checks = Vec::new();

        match input {
            PipelineInput::Staged { items, file_ids } => {
                variants = items;
                staged_file_ids = file_ids;
                stats.rows_parsed = variants.len();
            }
            PipelineInput::Files(files) => {
                if files.is_empty() {
                    return Err(ImportError::Parse("no files provided".into()).into());
                }
                let first_name = files[0].name.clone();
                file_id = Some(Uuid::new_v4().to_string());

                // Step 1: read and consolidate buffers.
                let mut grids = Vec::new();
                for f in &files {
                    let g = grid::read_grid(f)
                        .map_err(|e| ImportError::Parse(format!("{}: {:#}", f.name, e)))?;
                    grids.push(g);
                }
                let sheet = grid::consolidate(grids);
                if sheet.is_empty() {
                    return Err(ImportError::Parse(format!("{} has no rows", first_name)).into());
                }

                // Pre-import structural checks.
                if let Some(vcfg) = &source.config.validation_config {
                    let header_row = row::find_header_row(&sheet);
                    let previous_rows = source
                        .last_import_stats
                        .as_ref()
                        .map(|s| s.item_count)
                        .or_else(|| {
                            self.db
                                .latest_import_stats(&source.id)
                                .ok()
                                .flatten()
                                .map(|s| s.item_count)
                        });
                    pre_checks = validation::run_pre_import(
                        vcfg,
                        sheet.row(header_row),
                        sheet.data_row_count().saturating_sub(1),
                        previous_rows,
                        opts.multi_file,
                    );
                    if pre_checks.iter().any(|c| !c.passed) {
                        let report = validation::ValidationReport::from_checks(pre_checks);
                        let detail: Vec<String> = report
                            .failures()
                            .iter()
                            .map(|c| format!("{}: {}", c.name, c.detail))
                            .collect();
                        warn!(
                            source = %source.id,
                            run = run_id,
                            "pre-import validation blocked the run: {}",
                            detail.join("; ")
                        );
                        self.db
                            .record_alert(
                                &source.id,
                                "error",
                                "pre_import_validation",
                                &detail.join("; "),
                            )
                            .ok();
                        return Ok(PipelineResult {
                            success: false,
                            item_count: 0,
                            file_id,
                            stats: stats.clone(),
                            validation: Some(report),
                            error: Some(format!(
                                "pre-import validation failed: {}",
                                detail.join("; ")
                            )),
                            safety_block: None,
                        });
                    }
                }

                // Steps 2-3: resolve the layout (learning it when fresh)
                // and parse.
                variants = self.detect_and_parse(source, &sheet, Some(&first_name), stats)?;

                // Step 4: configured style-cleaning rules.
                if let Some(cleaning) = &source.config.cleaning_config {
                    for v in variants.iter_mut() {
                        let cleaned = cleaner::clean_style(&v.style, cleaning);
                        if cleaned != v.style {
                            v.style = cleaned;
                            v.rebuild_sku();
                        }
                    }
                }
            }
        }

        if cancelled() {
            return Ok(cancel_result(stats));
        }

        // Capture source-file counts for the checksum family before any
        // filtering mutates the stream.
        let file_counts = SourceFileCounts::from_variants(&variants);

        // Step 5: skip-rule filter, honoring continue-selling.
        let continue_selling = source
            .config
            .discontinued_config
            .as_ref()
            .map(|d| d.continue_selling)
            .unwrap_or(false);
        let before = variants.len();
        variants.retain(|v| {
            !(v.should_skip || (v.skip_unless_continue_selling && !continue_selling))
        });
        stats.skip_filtered += before - variants.len();

        // Step 6: discontinued with zero stock and no future signal.
        let before = variants.len();
        variants.retain(|v| {
            !(v.discontinued && v.stock == 0 && !v.zero_stock_protected(today))
        });
        stats.discontinued_zero_stock_removed += before - variants.len();

        // Step 7: dedupe, then neutralize stale ship dates. Runs after
        // step 6 so preserved zero-stock date rows are not lost to a
        // higher-stock duplicate without the date.
        variants = cleaner::dedupe_variants(variants, stats);
        let offset_days = source
            .config
            .stock_info_config
            .as_ref()
            .map(|c| c.date_offset_days)
            .unwrap_or(0);
        for v in variants.iter_mut() {
            if !v.has_future_stock {
                continue;
            }
            let Some(date) = v.parsed_ship_date() else {
                continue;
            };
            if date + Duration::days(offset_days) <= today {
                // Incoming stock whose window already passed never
                // materialized; the date itself stays for display.
                v.stock = 0;
                v.has_future_stock = false;
                v.preserve_zero_stock = false;
                stats.stale_dates_zeroed += 1;
            }
        }

        if cancelled() {
            return Ok(cancel_result(stats));
        }

        // Step 8: prefix styles, title-case colors, rebuild SKUs.
        if !is_staged {
            prefix::apply_prefixes(&mut variants, source);
        }
        let prefix_label = source.default_prefix();

        // Step 9: cleaning pass plus the batched advisor round-trip.
        // Batches go out concurrently but are all awaited here; step 10
        // never starts with suggestions in flight.
        variants = cleaner::clean_variants(variants, stats);
        let codes = cleaner::colors_needing_suggestion(&variants);
        if !codes.is_empty() {
            const ADVISOR_BATCH: usize = 25;
            let mut join_set = tokio::task::JoinSet::new();
            for chunk in codes.chunks(ADVISOR_BATCH) {
                let advisor = self.advisor.clone();
                let batch: Vec<String> = chunk.to_vec();
                join_set.spawn(async move { advisor.suggest_colors(&batch).await });
            }
            let mut suggestions = Vec::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(batch)) => suggestions.extend(batch),
                    Ok(Err(e)) => {
                        stats.warn(format!("color advisor batch failed: {:#}", e));
                    }
                    Err(e) => {
                        stats.warn(format!("color advisor task failed: {}", e));
                    }
                }
            }
            let threshold = source.config.color_confidence_threshold();
            let deferred =
                cleaner::apply_color_suggestions(&mut variants, &suggestions, threshold, stats);
            for s in &suggestions {
                if s.confidence >= threshold {
                    self.db.upsert_color_mapping(&s.bad, &s.good).ok();
                }
            }
            for s in deferred {
                self.db.queue_color_suggestion(&s).ok();
            }
        }

        if cancelled() {
            return Ok(cancel_result(stats));
        }

        // Step 10: the rule engine.
        variants = rules::apply_import_rules(variants, source, today, stats);

        // Step 11: authoritative global color-mapping pass (idempotent,
        // catches values the rule engine just rewrote).
        let mappings: HashMap<String, String> = mapping_index(
            &self
                .db
                .get_color_mappings()
                .unwrap_or_else(|e| {
                    stats.warn(format!("color mappings unavailable: {:#}", e));
                    Vec::new()
                }),
        );
        cleaner::apply_global_color_mappings(&mut variants, &mappings, stats);

        // Step 12: variant rules.
        if let Some(limit) = &source.config.size_limit_config {
            variants = variant_rules::size_limit_filter(variants, limit, stats);
        }
        if let Some(vr) = &source.config.variant_rules {
            if vr.filter_zero_stock {
                variants = variant_rules::zero_stock_filter(variants, today, stats);
            }
            variants = variant_rules::expand_sizes(
                variants,
                vr,
                source.config.size_limit_config.as_ref(),
                stats,
            );
        }

        if cancelled() {
            return Ok(cancel_result(stats));
        }

        // Step 13: price-tiered expansion from the marketplace cache.
        if let Some(pe) = &source.config.price_based_expansion_config {
            let sku_prices = match &source.store_id {
                Some(store_id) => self.db.marketplace_prices_for_store(store_id).unwrap_or_else(
                    |e| {
                        stats.warn(format!("marketplace price cache unavailable: {:#}", e));
                        HashMap::new()
                    },
                ),
                None => HashMap::new(),
            };
            variants = price_expand::expand_by_price(
                variants,
                pe,
                source.config.size_limit_config.as_ref(),
                &sku_prices,
                stats,
            );
        }

        // Step 14: discontinued-styles cross-reference.
        if source.role == SourceRole::Regular {
            if let Some(sale_id) = &source.linked_sale_source_id {
                variants = discontinued::exclude_sale_owned_styles(
                    variants, &self.db, &source.id, sale_id, stats,
                )?;
            }
        }

        // Step 15: sale-source pricing and compare-at stamping.
        if source.role == SourceRole::Sale {
            if let Some(sales) = &source.config.sales_config {
                for v in variants.iter_mut() {
                    if let Some(p) = v.price {
                        v.price = Some(p * sales.price_multiplier);
                    }
                }
                if sales.use_compare_at_price {
                    if let Some(store_id) = &source.store_id {
                        for v in variants.iter_mut() {
                            match self.db.marketplace_price(store_id, &v.sku) {
                                Ok(Some(existing)) => v.cost = Some(existing),
                                Ok(None) => {}
                                Err(e) => {
                                    stats.warn(format!(
                                        "compare-at lookup failed for {}: {:#}",
                                        v.sku, e
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }

        // Step 16: stock-info rendering.
        let stock_info_cfg = match &source.config.stock_info_config {
            Some(cfg) => Some(cfg.clone()),
            None => self.db.global_stock_info().unwrap_or(None),
        };
        if let Some(cfg) = &stock_info_cfg {
            stock_info::render_all(&mut variants, cfg, today);
        }

        if cancelled() {
            return Ok(cancel_result(stats));
        }

        // Step 17: safety nets.
        let existing = self.db.count_items(&source.id)?;
        if let Some(block) = safety::pre_write_guard(
            source.update_strategy,
            existing,
            variants.len(),
            source.safety_threshold,
        ) {
            warn!(
                source = %source.id,
                run = run_id,
                existing = block.existing_count,
                incoming = block.new_count,
                "safety net blocked the write: {}",
                block.message
            );
            self.db
                .record_alert(&source.id, "error", "safety_block", &block.message)
                .ok();
            return Ok(PipelineResult::blocked(block, stats.clone()));
        }

        // Step 18: atomic replace or keyed upsert.
        let items: Vec<ImportedItem> = variants
            .iter()
            .map(|v| {
                let mut item =
                    ImportedItem::from_variant(&source.id, file_id.as_deref(), v.clone());
                item.sale_owns_style = source.role == SourceRole::Sale;
                item
            })
            .collect();

        let written = match source.update_strategy {
            UpdateStrategy::FullSync => self
                .db
                .replace_source_inventory(&source.id, &items)
                .map_err(|e| ImportError::Write(format!("{:#}", e)))?,
            UpdateStrategy::Upsert => {
                if source.role == SourceRole::Regular
                    && source.config.clears_sale_owns_on_upsert()
                {
                    self.db.clear_sale_owns_flags(&source.id)?;
                }
                self.db
                    .upsert_inventory(&source.id, &items)
                    .map_err(|e| ImportError::Write(format!("{:#}", e)))?
            }
        };

        // Step 19: persist the stats snapshot.
        let import_stats = stats::build_import_stats(&variants, source, &prefix_label);
        self.db
            .record_import_stats(&source.id, &import_stats)
            .context("failed to record import stats")?;

        // Step 20: post-import bookkeeping.
        if source.role == SourceRole::Sale {
            discontinued::register_sale_styles(&self.db, &source.id, &variants)?;
        }
        self.db
            .update_last_sync(&source.id, &Utc::now().to_rfc3339())?;
        for staged_id in &staged_file_ids {
            self.db
                .set_staged_status(staged_id, StagedFileStatus::Imported)
                .ok();
        }

        // Post-import validation: reported, never a rollback.
        let mut report_checks = pre_checks;
        let previous = source.last_import_stats.clone();
        if let Some(vcfg) = &source.config.validation_config {
            let post = validation::run_post_import(
                vcfg,
                &file_counts,
                &variants,
                previous.as_ref(),
                today,
            );
            report_checks.extend(post.checks);
        }
        let validation_report = if report_checks.is_empty() {
            None
        } else {
            Some(validation::ValidationReport::from_checks(report_checks))
        };
        if let Some(r) = &validation_report {
            if !r.all_passed() {
                warn!(
                    source = %source.id,
                    run = run_id,
                    accuracy = r.accuracy,
                    "post-import validation reported failures"
                );
                let detail: Vec<String> = r
                    .failures()
                    .iter()
                    .map(|c| format!("{}/{}: {}", c.family, c.name, c.detail))
                    .collect();
                self.db
                    .record_alert(
                        &source.id,
                        "warning",
                        "post_import_validation",
                        &detail.join("; "),
                    )
                    .ok();
            }
        }

        info!(
            source = %source.id,
            run = run_id,
            written,
            styles = import_stats.unique_style_count,
            "import complete"
        );

        Ok(PipelineResult {
            success: true,
            item_count: written,
            file_id,
            stats: stats.clone(),
            validation: validation_report,
            error: None,
            safety_block: None,
        })
    }

    /// Stage one file for a later combine: parse, style-clean and prefix
    /// it now so combined items match what the per-file import path would
    /// have produced.
    pub fn parse_for_staging(
        &self,
        source: &DataSource,
        file: &RawFile,
    ) -> Result<crate::models::StagedFile> {
        let sheet = grid::read_grid(file)
            .map_err(|e| ImportError::Parse(format!("{}: {:#}", file.name, e)))?;
        let mut stats = ImportRunStats::default();
        let mut items = self.detect_and_parse(source, &sheet, Some(&file.name), &mut stats)?;

        if let Some(cleaning) = &source.config.cleaning_config {
            for v in items.iter_mut() {
                let cleaned = cleaner::clean_style(&v.style, cleaning);
                if cleaned != v.style {
                    v.style = cleaned;
                    v.rebuild_sku();
                }
            }
        }
        prefix::apply_prefixes(&mut items, source);

        let header_row = row::find_header_row(&sheet);
        Ok(crate::models::StagedFile {
            id: Uuid::new_v4().to_string(),
            source_id: source.id.clone(),
            file_name: file.name.clone(),
            status: StagedFileStatus::Staged,
            header: sheet.row(header_row).to_vec(),
            items,
            staged_at: Utc::now().to_rfc3339(),
        })
    }

    /// Steps 2-3 with format learning: use the saved layout when present,
    /// fall back per the auto-detection contract, and write back what was
    /// learned.
    fn detect_and_parse(
        &self,
        source: &DataSource,
        sheet: &SheetGrid,
        file_name: Option<&str>,
        stats: &mut ImportRunStats,
    ) -> Result<Vec<Variant>> {
        let ctx = ParseContext::new(source, file_name);

        let saved = if source.pivot_enabled {
            source.format_type.as_deref().and_then(FormatType::parse)
        } else {
            None
        };

        if let Some(fmt) = saved {
            let items = match parse_with_format(fmt, sheet, &ctx) {
                Ok(items) => items,
                Err(e) => {
                    stats.warn(format!("saved format {} failed: {:#}", fmt.as_str(), e));
                    Vec::new()
                }
            };
            if !items.is_empty() {
                stats.rows_parsed = items.len();
                return Ok(items);
            }

            // Saved layout produced nothing. Only abandon it when the
            // detector no longer confirms it on this file.
            let detected = detect::detect_format(&source.name, file_name, sheet);
            if detected == Some(fmt) {
                stats.rows_parsed = 0;
                return Ok(items);
            }

            let row_items = row::parse(sheet, &ctx)?;
            if !row_items.is_empty() {
                info!(
                    source = %source.id,
                    "saved format {} corrected to row",
                    fmt.as_str()
                );
                self.db.save_learned_format(&source.id, "row", false).ok();
            }
            stats.rows_parsed = row_items.len();
            return Ok(row_items);
        }

        let detected = detect::detect_format(&source.name, file_name, sheet);
        let fmt = detected.unwrap_or(FormatType::Row);
        debug!(source = %source.id, format = fmt.as_str(), "format resolved");

        let mut items = match parse_with_format(fmt, sheet, &ctx) {
            Ok(items) => items,
            Err(e) => {
                stats.warn(format!("{} parser failed: {:#}", fmt.as_str(), e));
                Vec::new()
            }
        };
        if items.is_empty() && fmt != FormatType::Row {
            items = row::parse(sheet, &ctx)?;
        } else if let Some(d) = detected {
            if !items.is_empty() {
                // Learn the detection so the next run skips probing.
                self.db
                    .save_learned_format(&source.id, d.as_str(), true)
                    .ok();
            }
        }

        stats.rows_parsed = items.len();
        Ok(items)
    }
}
