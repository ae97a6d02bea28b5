//! Scheduled acquisition loop.
//!
//! One tick per interval: run every auto-scheduled URL/email source whose
//! wall-clock window has arrived, then drain the email retry queue.
//! Sources run concurrently; the per-source coordinator keeps overlapping
//! runs out.

use chrono::{DateTime, Datelike, Local, NaiveTime};
use reqwest::Client;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::acquisition::{email, url_fetch};
use crate::acquisition::email::{EmailPullOutcome, MailFetcher};
use crate::coordinator::ImportCoordinator;
use crate::pipeline::ImportPipeline;
use crate::retry::RetryQueue;
use crate::sources::{DataSource, ScheduleConfig, ScheduleFrequency, SourceKind};

pub struct Scheduler {
    pipeline: Arc<ImportPipeline>,
    coordinator: ImportCoordinator,
    retry: RetryQueue,
    http: Client,
    mail: Option<Arc<dyn MailFetcher>>,
}

/// Is a source due at `now`, given when it last synced?
pub fn is_due(
    schedule: &ScheduleConfig,
    last_sync: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> bool {
    if !schedule.auto {
        return false;
    }

    let configured_time = schedule
        .time
        .as_deref()
        .and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok())
        .unwrap_or_else(|| NaiveTime::from_hms_opt(6, 0, 0).unwrap());

    match schedule.frequency {
        ScheduleFrequency::Hourly => match last_sync {
            None => true,
            Some(last) => now.signed_duration_since(last).num_minutes() >= 60,
        },
        ScheduleFrequency::Daily => {
            if now.time() < configured_time {
                return false;
            }
            match last_sync {
                None => true,
                Some(last) => last.date_naive() < now.date_naive(),
            }
        }
        ScheduleFrequency::Weekly => {
            let weekday_ok = schedule
                .weekday
                .map(|w| now.weekday().num_days_from_monday() as u8 == w)
                .unwrap_or(true);
            if !weekday_ok || now.time() < configured_time {
                return false;
            }
            match last_sync {
                None => true,
                Some(last) => now.signed_duration_since(last).num_days() >= 1,
            }
        }
    }
}

fn parse_last_sync(source: &DataSource) -> Option<DateTime<Local>> {
    source
        .last_sync_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Local))
}

impl Scheduler {
    pub fn new(
        pipeline: Arc<ImportPipeline>,
        coordinator: ImportCoordinator,
        retry: RetryQueue,
        http: Client,
        mail: Option<Arc<dyn MailFetcher>>,
    ) -> Self {
        Self {
            pipeline,
            coordinator,
            retry,
            http,
            mail,
        }
    }

    async fn run_source(&self, source: DataSource, trigger: &str) {
        match source.kind {
            SourceKind::Url => {
                if let Err(e) = url_fetch::import_from_url(
                    &self.pipeline,
                    &self.coordinator,
                    &self.http,
                    &source.id,
                    trigger,
                )
                .await
                {
                    error!(source = %source.id, "scheduled url pull failed: {:#}", e);
                }
            }
            SourceKind::Email => {
                let Some(mail) = &self.mail else {
                    debug!(source = %source.id, "no mail fetcher configured, skipping");
                    return;
                };
                match email::run_email_pull(
                    &self.pipeline,
                    &self.coordinator,
                    mail.as_ref(),
                    &self.http,
                    &source.id,
                    trigger,
                )
                .await
                {
                    Ok(EmailPullOutcome::NoMatchingMail) => {
                        self.retry
                            .schedule_if_eligible(&source, trigger, Local::now());
                    }
                    Ok(_) => self.retry.clear(&source.id),
                    Err(e) => {
                        error!(source = %source.id, "scheduled email pull failed: {:#}", e);
                    }
                }
            }
            SourceKind::Manual => {}
        }
    }

    /// One scheduler pass.
    pub async fn tick(&self, now: DateTime<Local>) {
        let sources = match self.pipeline.db().list_sources() {
            Ok(s) => s,
            Err(e) => {
                error!("scheduler could not list sources: {:#}", e);
                return;
            }
        };

        for source in sources {
            if source.kind == SourceKind::Manual {
                continue;
            }
            let Some(schedule) = &source.schedule else {
                continue;
            };
            if self.coordinator.is_active(&source.id) {
                continue;
            }
            if self.retry.pending_for(&source.id).is_some() {
                // The retry queue owns this source until it drains.
                continue;
            }
            if is_due(schedule, parse_last_sync(&source), now) {
                info!(source = %source.id, kind = source.kind.as_str(), "source due, starting pull");
                let run_id = format!("sched-{}-{}", source.id, now.timestamp());
                self.run_source(source, &run_id).await;
            }
        }

        // Retries carry their original run identity.
        for pending in self.retry.take_due(now) {
            if let Ok(Some(source)) = self.pipeline.db().get_source(&pending.source_id) {
                info!(
                    source = %source.id,
                    attempt = pending.attempt,
                    "retrying email pull"
                );
                self.run_source(source, &pending.original_run_id).await;
            }
        }
    }

    /// Park on an interval and tick forever.
    pub async fn run_forever(self, tick_secs: u64) {
        let mut ticker = interval(std::time::Duration::from_secs(tick_secs.max(5)));
        loop {
            ticker.tick().await;
            self.tick(Local::now()).await;
        }
    }
}
