//! Pipeline passes and the fixed-interval driver

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::GmailClient;
use crate::config::{Config, ScheduleConfig};
use crate::error::GmailError;
use crate::label_manager::LabelManager;
use crate::responder::{EmailResponder, ReplyOutcome};
use crate::selector::{EmailSelector, Selection};

/// Summary of one select-then-reply pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub candidates: usize,
    pub replied: usize,
    /// Messages skipped for missing Subject/From headers
    pub skipped: usize,
    pub failed: usize,
    /// The list call failed, so nothing was attempted
    pub list_failed: bool,
}

impl PassReport {
    fn new() -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            started_at: Utc::now(),
            duration_ms: 0,
            candidates: 0,
            replied: 0,
            skipped: 0,
            failed: 0,
            list_failed: false,
        }
    }
}

/// Selector and responder wired to one client handle
pub struct Pipeline {
    selector: EmailSelector,
    responder: EmailResponder,
    test_label_only: bool,
    unread_only: bool,
}

impl Pipeline {
    pub fn new(
        selector: EmailSelector,
        responder: EmailResponder,
        test_label_only: bool,
        unread_only: bool,
    ) -> Self {
        Self {
            selector,
            responder,
            test_label_only,
            unread_only,
        }
    }

    /// Wire every component to the shared client from a validated config
    pub fn from_config(client: Arc<dyn GmailClient>, config: &Config) -> Self {
        let selector = EmailSelector::new(
            Arc::clone(&client),
            config.label_to_watch.clone(),
            config.query.clone(),
        );
        let labels = LabelManager::new(
            Arc::clone(&client),
            config.label_to_watch.clone(),
            config.labels.use_created_label_id,
        );
        let responder = EmailResponder::new(client, labels, config.reply.body.clone());

        Self::new(
            selector,
            responder,
            config.query.test_label_only,
            config.query.unread_only,
        )
    }

    /// Select candidates and reply to each one, strictly in order
    pub async fn run_pass(&self) -> PassReport {
        let mut report = PassReport::new();
        let span = info_span!("pass", pass_id = %report.pass_id);

        async {
            let selection = self
                .selector
                .select_candidate_thread_heads(self.test_label_only, self.unread_only)
                .await;
            report.list_failed = selection.is_failed();
            report.candidates = selection.ids().len();

            if let Selection::Candidates(ids) = &selection {
                for id in ids {
                    info!("Going to process: {}", id);
                    match self.responder.process_email_by_id(id).await {
                        Ok(outcome) if outcome.is_sent() => report.replied += 1,
                        Ok(ReplyOutcome::LabelFailed(_)) => {
                            warn!(message_id = %id, "Reply suppressed by label failure");
                            report.failed += 1;
                        }
                        Ok(ReplyOutcome::MissingSubject(_)) => report.skipped += 1,
                        Ok(_) => report.failed += 1,
                        Err(e @ GmailError::MissingHeader { .. }) => {
                            warn!("Skipping message: {}", e);
                            report.skipped += 1;
                        }
                        Err(e) => {
                            error!(message_id = %id, "Failed to fetch message: {}", e);
                            report.failed += 1;
                        }
                    }
                }
            }

            report.duration_ms = (Utc::now() - report.started_at).num_milliseconds();
            info!(
                candidates = report.candidates,
                replied = report.replied,
                skipped = report.skipped,
                failed = report.failed,
                list_failed = report.list_failed,
                duration_ms = report.duration_ms,
                "Done."
            );
        }
        .instrument(span)
        .await;

        report
    }
}

/// Runs passes at startup and on a fixed interval, one at a time
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    run_on_start: bool,
    gate: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, schedule: &ScheduleConfig) -> Self {
        Self {
            pipeline,
            interval: schedule.interval(),
            run_on_start: schedule.run_on_start,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Spawn a pass unless one is already running
    pub fn try_start_pass(&self) -> Option<JoinHandle<PassReport>> {
        let permit = Arc::clone(&self.gate).try_lock_owned().ok()?;
        let pipeline = Arc::clone(&self.pipeline);

        Some(tokio::spawn(async move {
            let report = pipeline.run_pass().await;
            drop(permit);
            report
        }))
    }

    /// Drive passes until `shutdown` resolves
    ///
    /// An in-flight pass is not awaited on shutdown.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        if !self.run_on_start {
            // The first tick completes immediately
            ticker.tick().await;
        }

        info!("Polling every {:?}", self.interval);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Closing...");
                    return;
                }
                _ = ticker.tick() => {
                    info!("Running scheduled pass...");
                    if self.try_start_pass().is_none() {
                        warn!("Previous pass still running, skipping this tick");
                    }
                }
            }
        }
    }
}
