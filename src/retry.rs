//! Email retry queue.
//!
//! When a scheduled email pull finds no matching mail, the source can ask
//! to be polled again every `retry_interval_minutes` until
//! `retry_cutoff_hour` local time. Retries carry the original scheduled
//! run's identity so downstream systems see one logical run however many
//! polls it took.

use chrono::{DateTime, Duration, Local, Timelike};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::sources::DataSource;

#[derive(Debug, Clone)]
pub struct PendingRetry {
    pub source_id: String,
    /// Identity of the scheduled run this retry continues.
    pub original_run_id: String,
    pub attempt: u32,
    pub next_at: DateTime<Local>,
}

#[derive(Clone, Default)]
pub struct RetryQueue {
    pending: Arc<Mutex<HashMap<String, PendingRetry>>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a follow-up poll if the source opted in and the cutoff
    /// hour has not passed. Returns the scheduled time.
    pub fn schedule_if_eligible(
        &self,
        source: &DataSource,
        original_run_id: &str,
        now: DateTime<Local>,
    ) -> Option<DateTime<Local>> {
        let email = source.email.as_ref()?;
        if !email.retry_if_no_email {
            return None;
        }
        if now.hour() >= email.retry_cutoff_hour {
            debug!(
                source = %source.id,
                cutoff = email.retry_cutoff_hour,
                "retry cutoff reached, not rescheduling"
            );
            return None;
        }

        let next_at = now + Duration::minutes(email.retry_interval_minutes as i64);
        let mut pending = self.pending.lock();
        let attempt = pending
            .get(&source.id)
            .map(|p| p.attempt + 1)
            .unwrap_or(1);
        pending.insert(
            source.id.clone(),
            PendingRetry {
                source_id: source.id.clone(),
                original_run_id: original_run_id.to_string(),
                attempt,
                next_at,
            },
        );
        info!(
            source = %source.id,
            attempt,
            next_at = %next_at,
            "email pull rescheduled"
        );
        Some(next_at)
    }

    /// Remove and return the retries whose time has come.
    pub fn take_due(&self, now: DateTime<Local>) -> Vec<PendingRetry> {
        let mut pending = self.pending.lock();
        let due_ids: Vec<String> = pending
            .values()
            .filter(|p| p.next_at <= now)
            .map(|p| p.source_id.clone())
            .collect();
        due_ids
            .into_iter()
            .filter_map(|id| pending.remove(&id))
            .collect()
    }

    /// Drop any pending retry for the source (mail arrived).
    pub fn clear(&self, source_id: &str) {
        self.pending.lock().remove(source_id);
    }

    pub fn pending_for(&self, source_id: &str) -> Option<PendingRetry> {
        self.pending.lock().get(source_id).cloned()
    }
}
