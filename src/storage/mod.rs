//! SQLite-backed store.
//!
//! One connection behind a mutex, WAL mode, cached prepared statements.
//! Nested config blocks are stored as JSON next to the typed columns the
//! queries filter on. Inventory writes live in `inventory.rs`; everything
//! else (sources, registry, color mappings, staged files, stats, run log,
//! email dedupe, price cache) is here.

mod inventory;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::colors::advisor::ColorSuggestion;
use crate::models::{ImportStats, StagedFile, StagedFileStatus};
use crate::sources::DataSource;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    role TEXT NOT NULL,
    linked_sale_source_id TEXT,
    store_id TEXT,
    update_strategy TEXT NOT NULL,
    safety_threshold REAL NOT NULL DEFAULT 50.0,
    url TEXT,
    schedule_json TEXT,
    email_json TEXT,
    format_type TEXT,
    pivot_enabled INTEGER NOT NULL DEFAULT 0,
    config_json TEXT NOT NULL,
    last_sync_at TEXT,
    last_import_stats_json TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS inventory_items (
    source_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    style TEXT NOT NULL,
    color TEXT NOT NULL,
    size TEXT NOT NULL,
    stock INTEGER NOT NULL,
    price REAL,
    cost REAL,
    ship_date TEXT,
    discontinued INTEGER NOT NULL DEFAULT 0,
    has_future_stock INTEGER NOT NULL DEFAULT 0,
    preserve_zero_stock INTEGER NOT NULL DEFAULT 0,
    is_expanded_size INTEGER NOT NULL DEFAULT 0,
    expanded_from TEXT,
    special_order INTEGER NOT NULL DEFAULT 0,
    brand TEXT,
    stock_info TEXT,
    sale_owns_style INTEGER NOT NULL DEFAULT 0,
    file_id TEXT,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    PRIMARY KEY (source_id, sku)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_inventory_source_style
    ON inventory_items(source_id, style);

CREATE TABLE IF NOT EXISTS discontinued_styles (
    sale_source_id TEXT NOT NULL,
    style TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    PRIMARY KEY (sale_source_id, style)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS color_mappings (
    bad TEXT PRIMARY KEY,
    good TEXT NOT NULL
) WITHOUT ROWID;

-- Advisor suggestions below the auto-apply threshold, parked for review.
CREATE TABLE IF NOT EXISTS color_suggestions_pending (
    bad TEXT PRIMARY KEY,
    good TEXT NOT NULL,
    confidence REAL NOT NULL,
    suggested_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS staged_files (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    status TEXT NOT NULL,
    header_json TEXT NOT NULL,
    items_json TEXT NOT NULL,
    staged_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_staged_files_source_status
    ON staged_files(source_id, status);

CREATE TABLE IF NOT EXISTS import_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    stats_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_import_stats_source
    ON import_stats(source_id, created_at DESC);

CREATE TABLE IF NOT EXISTS import_runs (
    run_id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    trigger TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    outcome TEXT,
    message TEXT,
    item_count INTEGER
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_import_runs_source
    ON import_runs(source_id, started_at DESC);

-- Processed mail, deduped by (message id, content hash). Clearing this
-- table re-enables processing of the same messages.
CREATE TABLE IF NOT EXISTS email_seen (
    message_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    seen_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    PRIMARY KEY (message_id, content_hash)
) WITHOUT ROWID;

-- Operator-facing alerts raised by safety nets and validation.
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    severity TEXT NOT NULL,
    kind TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    acknowledged INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_alerts_source
    ON alerts(source_id, created_at DESC);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
) WITHOUT ROWID;

-- Read-through cache of marketplace variant prices.
CREATE TABLE IF NOT EXISTS marketplace_prices (
    store_id TEXT NOT NULL,
    sku TEXT NOT NULL,
    price REAL NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now')),
    PRIMARY KEY (store_id, sku)
) WITHOUT ROWID;
"#;

/// The application store. Cheap to clone.
#[derive(Clone)]
pub struct InventoryDb {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone)]
pub struct ImportRunRow {
    pub run_id: String,
    pub source_id: String,
    pub trigger: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub outcome: Option<String>,
    pub message: Option<String>,
    pub item_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AlertRow {
    pub id: i64,
    pub source_id: String,
    pub severity: String,
    pub kind: String,
    pub message: String,
    pub created_at: i64,
}

impl InventoryDb {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        info!("inventory database ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // --- metadata ------------------------------------------------------

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1 LIMIT 1",
                [key],
                |row| row.get(0),
            )
            .ok();
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Legacy store-wide stock-info rule, used when a source has no
    /// stock-info block of its own.
    pub fn global_stock_info(&self) -> Result<Option<crate::sources::StockInfoConfig>> {
        match self.get_metadata("global_stock_info")? {
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    pub fn set_global_stock_info(&self, cfg: &crate::sources::StockInfoConfig) -> Result<()> {
        self.set_metadata("global_stock_info", &serde_json::to_string(cfg)?)
    }

    // --- sources -------------------------------------------------------

    pub fn upsert_source(&self, source: &DataSource) -> Result<()> {
        let schedule_json = source
            .schedule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let email_json = source.email.as_ref().map(serde_json::to_string).transpose()?;
        let config_json = serde_json::to_string(&source.config)?;
        let stats_json = source
            .last_import_stats
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sources
                (id, name, kind, role, linked_sale_source_id, store_id, update_strategy,
                 safety_threshold, url, schedule_json, email_json, format_type, pivot_enabled,
                 config_json, last_sync_at, last_import_stats_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, strftime('%s','now'))
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                kind=excluded.kind,
                role=excluded.role,
                linked_sale_source_id=excluded.linked_sale_source_id,
                store_id=excluded.store_id,
                update_strategy=excluded.update_strategy,
                safety_threshold=excluded.safety_threshold,
                url=excluded.url,
                schedule_json=excluded.schedule_json,
                email_json=excluded.email_json,
                format_type=excluded.format_type,
                pivot_enabled=excluded.pivot_enabled,
                config_json=excluded.config_json,
                last_sync_at=excluded.last_sync_at,
                last_import_stats_json=excluded.last_import_stats_json,
                updated_at=excluded.updated_at",
            params![
                source.id,
                source.name,
                source.kind.as_str(),
                source.role.as_str(),
                source.linked_sale_source_id,
                source.store_id,
                source.update_strategy.as_str(),
                source.safety_threshold,
                source.url,
                schedule_json,
                email_json,
                source.format_type,
                source.pivot_enabled as i64,
                config_json,
                source.last_sync_at,
                stats_json,
            ],
        )?;
        Ok(())
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<DataSource> {
        use crate::sources::{SourceKind, SourceRole, UpdateStrategy};

        let kind_str: String = row.get(2)?;
        let role_str: String = row.get(3)?;
        let strategy_str: String = row.get(6)?;
        let schedule_json: Option<String> = row.get(9)?;
        let email_json: Option<String> = row.get(10)?;
        let config_json: String = row.get(13)?;
        let stats_json: Option<String> = row.get(15)?;

        let bad_col =
            |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));

        Ok(DataSource {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: SourceKind::parse(&kind_str).unwrap_or(SourceKind::Manual),
            role: SourceRole::parse(&role_str).unwrap_or(SourceRole::Regular),
            linked_sale_source_id: row.get(4)?,
            store_id: row.get(5)?,
            update_strategy: UpdateStrategy::parse(&strategy_str)
                .unwrap_or(UpdateStrategy::FullSync),
            safety_threshold: row.get(7)?,
            url: row.get(8)?,
            schedule: schedule_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(bad_col)?,
            email: email_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(bad_col)?,
            format_type: row.get(11)?,
            pivot_enabled: row.get::<_, i64>(12)? != 0,
            config: serde_json::from_str(&config_json).map_err(bad_col)?,
            last_sync_at: row.get(14)?,
            last_import_stats: stats_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(bad_col)?,
        })
    }

    const SOURCE_COLUMNS: &'static str =
        "id, name, kind, role, linked_sale_source_id, store_id, update_strategy, \
         safety_threshold, url, schedule_json, email_json, format_type, pivot_enabled, \
         config_json, last_sync_at, last_import_stats_json";

    pub fn get_source(&self, id: &str) -> Result<Option<DataSource>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM sources WHERE id = ?1 LIMIT 1",
            Self::SOURCE_COLUMNS
        ))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::row_to_source(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_sources(&self) -> Result<Vec<DataSource>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM sources ORDER BY name",
            Self::SOURCE_COLUMNS
        ))?;
        let sources = stmt
            .query_map([], Self::row_to_source)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(sources)
    }

    pub fn delete_source(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM inventory_items WHERE source_id = ?1", [id])?;
        conn.execute("DELETE FROM staged_files WHERE source_id = ?1", [id])?;
        conn.execute("DELETE FROM sources WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Format learning write-back (step 2 of the pipeline).
    pub fn save_learned_format(&self, source_id: &str, format: &str, pivot: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sources SET format_type = ?2, pivot_enabled = ?3,
                    updated_at = strftime('%s','now')
             WHERE id = ?1",
            params![source_id, format, pivot as i64],
        )?;
        Ok(())
    }

    pub fn update_last_sync(&self, source_id: &str, timestamp: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sources SET last_sync_at = ?2, updated_at = strftime('%s','now')
             WHERE id = ?1",
            params![source_id, timestamp],
        )?;
        Ok(())
    }

    // --- discontinued-styles registry ----------------------------------

    /// Upsert the sale file's styles as active and deactivate registrations
    /// missing from this run, in one transaction.
    pub fn sync_sale_styles(&self, sale_source_id: &str, styles: &HashSet<String>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<()> {
            {
                let mut stmt = conn.prepare_cached(
                    "INSERT INTO discontinued_styles (sale_source_id, style, active, updated_at)
                     VALUES (?1, ?2, 1, strftime('%s','now'))
                     ON CONFLICT(sale_source_id, style) DO UPDATE SET
                        active = 1, updated_at = excluded.updated_at",
                )?;
                for style in styles {
                    stmt.execute(params![sale_source_id, style])?;
                }
            }

            let mut existing = Vec::new();
            {
                let mut stmt = conn.prepare_cached(
                    "SELECT style FROM discontinued_styles
                     WHERE sale_source_id = ?1 AND active = 1",
                )?;
                let mut rows = stmt.query([sale_source_id])?;
                while let Some(row) = rows.next()? {
                    existing.push(row.get::<_, String>(0)?);
                }
            }

            {
                let mut stmt = conn.prepare_cached(
                    "UPDATE discontinued_styles SET active = 0, updated_at = strftime('%s','now')
                     WHERE sale_source_id = ?1 AND style = ?2",
                )?;
                for style in existing {
                    if !styles.contains(&style) {
                        stmt.execute(params![sale_source_id, style])?;
                    }
                }
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn active_sale_styles(&self, sale_source_id: &str) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT style FROM discontinued_styles WHERE sale_source_id = ?1 AND active = 1",
        )?;
        let mut out = HashSet::new();
        let mut rows = stmt.query([sale_source_id])?;
        while let Some(row) = rows.next()? {
            out.insert(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    // --- color mappings ------------------------------------------------

    pub fn get_color_mappings(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT bad, good FROM color_mappings")?;
        let mappings = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(mappings)
    }

    pub fn upsert_color_mapping(&self, bad: &str, good: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO color_mappings (bad, good) VALUES (?1, ?2)
             ON CONFLICT(bad) DO UPDATE SET good = excluded.good",
            params![bad.trim().to_uppercase(), good],
        )?;
        Ok(())
    }

    /// Park a low-confidence suggestion for human review.
    pub fn queue_color_suggestion(&self, suggestion: &ColorSuggestion) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO color_suggestions_pending (bad, good, confidence, suggested_at)
             VALUES (?1, ?2, ?3, strftime('%s','now'))
             ON CONFLICT(bad) DO UPDATE SET
                good = excluded.good,
                confidence = excluded.confidence,
                suggested_at = excluded.suggested_at",
            params![
                suggestion.bad.trim().to_uppercase(),
                suggestion.good,
                suggestion.confidence
            ],
        )?;
        Ok(())
    }

    /// Promote a parked suggestion into the live mapping table.
    pub fn approve_color_suggestion(&self, bad: &str) -> Result<bool> {
        let key = bad.trim().to_uppercase();
        let conn = self.conn.lock();

        let good: Option<String> = conn
            .query_row(
                "SELECT good FROM color_suggestions_pending WHERE bad = ?1",
                [&key],
                |row| row.get(0),
            )
            .ok();
        let Some(good) = good else {
            return Ok(false);
        };

        conn.execute(
            "INSERT INTO color_mappings (bad, good) VALUES (?1, ?2)
             ON CONFLICT(bad) DO UPDATE SET good = excluded.good",
            params![key, good],
        )?;
        conn.execute(
            "DELETE FROM color_suggestions_pending WHERE bad = ?1",
            [&key],
        )?;
        Ok(true)
    }

    pub fn pending_color_suggestions(&self) -> Result<Vec<ColorSuggestion>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT bad, good, confidence FROM color_suggestions_pending ORDER BY suggested_at DESC",
        )?;
        let suggestions = stmt
            .query_map([], |row| {
                Ok(ColorSuggestion {
                    bad: row.get(0)?,
                    good: row.get(1)?,
                    confidence: row.get(2)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(suggestions)
    }

    // --- staged files --------------------------------------------------

    pub fn stage_file(&self, file: &StagedFile) -> Result<()> {
        let header_json = serde_json::to_string(&file.header)?;
        let items_json = serde_json::to_string(&file.items)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO staged_files (id, source_id, file_name, status, header_json, items_json, staged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                header_json = excluded.header_json,
                items_json = excluded.items_json",
            params![
                file.id,
                file.source_id,
                file.file_name,
                file.status.as_str(),
                header_json,
                items_json,
                file.staged_at,
            ],
        )?;
        Ok(())
    }

    pub fn staged_files(
        &self,
        source_id: &str,
        status: StagedFileStatus,
    ) -> Result<Vec<StagedFile>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, source_id, file_name, status, header_json, items_json, staged_at
             FROM staged_files WHERE source_id = ?1 AND status = ?2
             ORDER BY staged_at",
        )?;

        let mut out = Vec::new();
        let mut rows = stmt.query(params![source_id, status.as_str()])?;
        while let Some(row) = rows.next()? {
            let status_str: String = row.get(3)?;
            let header_json: String = row.get(4)?;
            let items_json: String = row.get(5)?;
            out.push(StagedFile {
                id: row.get(0)?,
                source_id: row.get(1)?,
                file_name: row.get(2)?,
                status: StagedFileStatus::parse(&status_str).unwrap_or(StagedFileStatus::Error),
                header: serde_json::from_str(&header_json).unwrap_or_default(),
                items: serde_json::from_str(&items_json).unwrap_or_default(),
                staged_at: row.get(6)?,
            });
        }
        Ok(out)
    }

    pub fn set_staged_status(&self, file_id: &str, status: StagedFileStatus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE staged_files SET status = ?2 WHERE id = ?1",
            params![file_id, status.as_str()],
        )?;
        Ok(())
    }

    pub fn count_staged(&self, source_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM staged_files WHERE source_id = ?1 AND status = 'staged'",
            [source_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // --- import stats + run log ----------------------------------------

    pub fn record_import_stats(&self, source_id: &str, stats: &ImportStats) -> Result<()> {
        let stats_json = serde_json::to_string(stats)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO import_stats (source_id, created_at, stats_json)
             VALUES (?1, strftime('%s','now'), ?2)",
            params![source_id, stats_json],
        )?;
        conn.execute(
            "UPDATE sources SET last_import_stats_json = ?2 WHERE id = ?1",
            params![source_id, stats_json],
        )?;
        Ok(())
    }

    pub fn latest_import_stats(&self, source_id: &str) -> Result<Option<ImportStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT stats_json FROM import_stats
             WHERE source_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query([source_id])?;
        match rows.next()? {
            Some(row) => {
                let json: String = row.get(0)?;
                Ok(serde_json::from_str(&json).ok())
            }
            None => Ok(None),
        }
    }

    pub fn list_import_stats(&self, source_id: &str, limit: usize) -> Result<Vec<ImportStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT stats_json FROM import_stats
             WHERE source_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let stats = stmt
            .query_map(params![source_id, limit], |row| {
                row.get::<_, String>(0)
            })?
            .filter_map(|r| r.ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        Ok(stats)
    }

    pub fn recent_runs(&self, source_id: &str, limit: usize) -> Result<Vec<ImportRunRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT run_id, source_id, trigger, started_at, finished_at, outcome, message, item_count
             FROM import_runs WHERE source_id = ?1
             ORDER BY started_at DESC LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(params![source_id, limit], |row| {
                Ok(ImportRunRow {
                    run_id: row.get(0)?,
                    source_id: row.get(1)?,
                    trigger: row.get(2)?,
                    started_at: row.get(3)?,
                    finished_at: row.get(4)?,
                    outcome: row.get(5)?,
                    message: row.get(6)?,
                    item_count: row.get::<_, Option<i64>>(7)?.map(|c| c.max(0) as usize),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }

    pub fn record_run_start(&self, run_id: &str, source_id: &str, trigger: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO import_runs (run_id, source_id, trigger, started_at)
             VALUES (?1, ?2, ?3, strftime('%s','now'))",
            params![run_id, source_id, trigger],
        )?;
        Ok(())
    }

    pub fn record_run_finish(
        &self,
        run_id: &str,
        outcome: &str,
        message: Option<&str>,
        item_count: Option<usize>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE import_runs SET finished_at = strftime('%s','now'),
                    outcome = ?2, message = ?3, item_count = ?4
             WHERE run_id = ?1",
            params![run_id, outcome, message, item_count.map(|c| c as i64)],
        )?;
        Ok(())
    }

    // --- alerts --------------------------------------------------------

    pub fn record_alert(
        &self,
        source_id: &str,
        severity: &str,
        kind: &str,
        message: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO alerts (source_id, severity, kind, message, created_at)
             VALUES (?1, ?2, ?3, ?4, strftime('%s','now'))",
            params![source_id, severity, kind, message],
        )?;
        Ok(())
    }

    pub fn unacknowledged_alerts(&self, source_id: &str) -> Result<Vec<AlertRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, source_id, severity, kind, message, created_at
             FROM alerts WHERE source_id = ?1 AND acknowledged = 0
             ORDER BY created_at DESC",
        )?;
        let alerts = stmt
            .query_map([source_id], |row| {
                Ok(AlertRow {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    severity: row.get(2)?,
                    kind: row.get(3)?,
                    message: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(alerts)
    }

    pub fn acknowledge_alert(&self, alert_id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE alerts SET acknowledged = 1 WHERE id = ?1",
            params![alert_id],
        )?;
        Ok(())
    }

    // --- email dedupe --------------------------------------------------

    /// Record a processed message. Returns false when the (id, hash) pair
    /// was already seen.
    pub fn mark_message_seen(&self, message_id: &str, content_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changes = conn.execute(
            "INSERT OR IGNORE INTO email_seen (message_id, content_hash, seen_at)
             VALUES (?1, ?2, strftime('%s','now'))",
            params![message_id, content_hash],
        )?;
        Ok(changes > 0)
    }

    pub fn clear_email_seen(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM email_seen", [])?;
        Ok(deleted)
    }

    // --- marketplace price cache ---------------------------------------

    pub fn upsert_marketplace_price(&self, store_id: &str, sku: &str, price: f64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO marketplace_prices (store_id, sku, price, updated_at)
             VALUES (?1, ?2, ?3, strftime('%s','now'))
             ON CONFLICT(store_id, sku) DO UPDATE SET
                price = excluded.price, updated_at = excluded.updated_at",
            params![store_id, sku, price],
        )?;
        Ok(())
    }

    pub fn marketplace_price(&self, store_id: &str, sku: &str) -> Result<Option<f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT price FROM marketplace_prices WHERE store_id = ?1 AND sku = ?2 LIMIT 1",
        )?;
        let mut rows = stmt.query(params![store_id, sku])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn marketplace_prices_for_store(&self, store_id: &str) -> Result<HashMap<String, f64>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT sku, price FROM marketplace_prices WHERE store_id = ?1")?;
        let mut out = HashMap::new();
        let mut rows = stmt.query([store_id])?;
        while let Some(row) = rows.next()? {
            out.insert(row.get::<_, String>(0)?, row.get::<_, f64>(1)?);
        }
        Ok(out)
    }
}
