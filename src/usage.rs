//! Non-blocking usage event recording.
//!
//! Commands hand events to an unbounded channel and move on; a background
//! writer appends them to the usage database (at-least-once: failed
//! appends are retried, so a duplicate is possible but a loss is not) and
//! bumps the license row's usage counter. Shutdown drains the channel
//! before stopping.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::db::{queries, DbPool};
use crate::id::EntityType;
use crate::models::{RecordUsage, UsageEvent};

const WRITE_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_millis(200);

/// Handle for submitting usage events. Cheap to clone; sending never
/// blocks command completion.
#[derive(Clone)]
pub struct UsageRecorder {
    tx: mpsc::UnboundedSender<RecordUsage>,
}

impl UsageRecorder {
    /// Record one usage event. Errors only if the writer has shut down,
    /// in which case the event is logged and dropped.
    pub fn record(&self, usage: RecordUsage) {
        if let Err(e) = self.tx.send(usage) {
            tracing::error!("usage recorder is down, dropping event: {}", e);
        }
    }
}

/// Start the background usage writer. Returns the submission handle; the
/// token stops the writer after draining pending events.
pub fn start(main_db: DbPool, usage_db: DbPool, cancel: CancellationToken) -> UsageRecorder {
    let (tx, mut rx) = mpsc::unbounded_channel::<RecordUsage>();

    tokio::spawn(async move {
        tracing::info!("usage writer started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Drain whatever is still queued before stopping.
                    while let Ok(usage) = rx.try_recv() {
                        write_event(&main_db, &usage_db, usage).await;
                    }
                    tracing::info!("usage writer stopped");
                    break;
                }
                received = rx.recv() => {
                    match received {
                        Some(usage) => write_event(&main_db, &usage_db, usage).await,
                        None => {
                            tracing::info!("usage channel closed, writer stopping");
                            break;
                        }
                    }
                }
            }
        }
    });

    UsageRecorder { tx }
}

async fn write_event(main_db: &DbPool, usage_db: &DbPool, usage: RecordUsage) {
    let event = UsageEvent {
        id: EntityType::UsageEvent.gen_id(),
        license_id: usage.license_id,
        company_id: usage.company_id,
        user_id: usage.user_id,
        activity: usage.activity,
        timestamp: queries::now(),
        client_meta: usage.client_meta,
    };

    for attempt in 1..=WRITE_RETRIES {
        let appended = usage_db
            .get()
            .map_err(crate::error::AppError::from)
            .and_then(|conn| queries::insert_usage_event(&conn, &event));

        match appended {
            Ok(()) => {
                // Counter bump is best-effort bookkeeping on the license
                // row; the append log above is the source of truth.
                if let Ok(conn) = main_db.get() {
                    if let Err(e) =
                        queries::bump_license_usage(&conn, &event.license_id, event.timestamp)
                    {
                        tracing::warn!(
                            "failed to bump usage counter for {}: {}",
                            event.license_id,
                            e
                        );
                    }
                }
                return;
            }
            Err(e) if attempt < WRITE_RETRIES => {
                tracing::warn!(
                    "usage append failed (attempt {}/{}): {}",
                    attempt,
                    WRITE_RETRIES,
                    e
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::error!(
                    "usage append gave up after {} attempts for license {}: {}",
                    WRITE_RETRIES,
                    event.license_id,
                    e
                );
            }
        }
    }
}
