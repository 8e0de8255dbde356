//! Background re-scoring worker.
//!
//! Scheduled meetings carry the compatibility verdict shown at
//! confirmation time; when profiles change afterwards, an operator can
//! enqueue the meeting here to refresh the stored score out of band.
//! Enqueueing never blocks the caller: a full queue drops the job and
//! reports it, nothing more.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::oracle::CompatibilityOracle;
use crate::store::MeetingStore;
use crate::types::MeetingId;

/// Counters shared between the worker task and its handle.
#[derive(Default)]
struct RescoreStats {
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Handle to a running [`RescoreWorker`].
pub struct RescoreHandle {
    queue: mpsc::Sender<MeetingId>,
    task: JoinHandle<()>,
    stats: Arc<RescoreStats>,
}

impl RescoreHandle {
    /// Enqueue a meeting for re-scoring. Returns `false` if the queue is
    /// full; the job is dropped, not retried.
    pub fn enqueue(&self, meeting_id: impl Into<MeetingId>) -> bool {
        let meeting_id = meeting_id.into();
        match self.queue.try_send(meeting_id.clone()) {
            Ok(()) => true,
            Err(_) => {
                warn!(meeting_id = %meeting_id, "Rescore queue full, dropping job");
                false
            }
        }
    }

    /// Jobs that finished with a fresh score written back.
    pub fn processed(&self) -> u64 {
        self.stats.processed.load(Ordering::SeqCst)
    }

    /// Jobs that failed (missing meeting, oracle failure or timeout).
    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs, drain the queue and wait for the worker to
    /// finish.
    pub async fn shutdown(self) {
        drop(self.queue);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Rescore worker did not shut down cleanly");
        }
    }
}

/// Worker that refreshes compatibility scores of committed meetings.
pub struct RescoreWorker;

impl RescoreWorker {
    /// Spawn the worker task and return its handle.
    pub fn spawn(
        oracle: Arc<dyn CompatibilityOracle>,
        meetings: Arc<dyn MeetingStore>,
        oracle_timeout: Duration,
        queue_capacity: usize,
    ) -> RescoreHandle {
        let (tx, mut rx) = mpsc::channel::<MeetingId>(queue_capacity.max(1));
        let stats = Arc::new(RescoreStats::default());
        let worker_stats = stats.clone();

        let task = tokio::spawn(async move {
            while let Some(meeting_id) = rx.recv().await {
                match Self::rescore_one(&*oracle, &*meetings, oracle_timeout, &meeting_id).await {
                    Ok(score) => {
                        worker_stats.processed.fetch_add(1, Ordering::SeqCst);
                        debug!(meeting_id = %meeting_id, score, "Meeting re-scored");
                    }
                    Err(reason) => {
                        worker_stats.failed.fetch_add(1, Ordering::SeqCst);
                        warn!(meeting_id = %meeting_id, reason = %reason, "Rescore failed");
                    }
                }
            }
            info!("Rescore worker drained and stopped");
        });

        RescoreHandle {
            queue: tx,
            task,
            stats,
        }
    }

    async fn rescore_one(
        oracle: &dyn CompatibilityOracle,
        meetings: &dyn MeetingStore,
        oracle_timeout: Duration,
        meeting_id: &str,
    ) -> Result<u8, String> {
        let meeting = meetings
            .get_meeting(meeting_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "meeting no longer exists".to_string())?;

        let report = match timeout(
            oracle_timeout,
            oracle.score(&meeting.party_a, &meeting.party_b),
        )
        .await
        {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => return Err(err.to_string()),
            Err(_) => return Err(format!("oracle timed out after {oracle_timeout:?}")),
        };

        let written = meetings
            .update_meeting_score(meeting_id, report.score, report.reasons)
            .await
            .map_err(|e| e.to_string())?;
        if !written {
            return Err("meeting vanished before write-back".to_string());
        }
        Ok(report.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    use crate::oracle::MockOracle;
    use crate::store::MemoryStore;
    use crate::time::ClockTime;
    use crate::types::{Meeting, MeetingState};

    async fn seed_meeting(store: &MemoryStore, id: &str) -> Meeting {
        let meeting = Meeting {
            id: id.to_string(),
            party_a: "alice".into(),
            party_b: "bob".into(),
            slot_a: "s-a".into(),
            slot_b: "s-b".into(),
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time_of_day: ClockTime::parse("10:00").unwrap(),
            duration_minutes: 15,
            compatibility_score: 40,
            compatibility_reasons: serde_json::json!({"summary": "stale"}),
            state: MeetingState::Scheduled,
            join_url: "https://example.test/j/x".into(),
            scheduled_at: Utc::now(),
        };
        store.insert_meeting(meeting.clone()).await.unwrap();
        meeting
    }

    #[tokio::test]
    async fn test_rescore_updates_stored_score() {
        let store = Arc::new(MemoryStore::new());
        seed_meeting(&store, "m-1").await;

        let handle = RescoreWorker::spawn(
            Arc::new(MockOracle::new(91)),
            store.clone(),
            Duration::from_millis(500),
            16,
        );
        assert!(handle.enqueue("m-1"));
        handle.shutdown().await;

        let meeting = crate::store::MeetingStore::get_meeting(store.as_ref(), "m-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meeting.compatibility_score, 91);
        assert_ne!(meeting.compatibility_reasons["summary"], "stale");
    }

    #[tokio::test]
    async fn test_missing_meeting_counts_as_failure() {
        let store = Arc::new(MemoryStore::new());
        let handle = RescoreWorker::spawn(
            Arc::new(MockOracle::default()),
            store,
            Duration::from_millis(500),
            16,
        );
        assert!(handle.enqueue("ghost"));

        // shutdown drains the queue before the worker exits.
        let processed = {
            let stats = handle.stats.clone();
            handle.shutdown().await;
            stats
        };
        assert_eq!(processed.processed.load(Ordering::SeqCst), 0);
        assert_eq!(processed.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_keeps_old_score() {
        let store = Arc::new(MemoryStore::new());
        seed_meeting(&store, "m-1").await;

        let handle = RescoreWorker::spawn(
            Arc::new(MockOracle::default().with_failure("bob")),
            store.clone(),
            Duration::from_millis(500),
            16,
        );
        assert!(handle.enqueue("m-1"));
        handle.shutdown().await;

        let meeting = crate::store::MeetingStore::get_meeting(store.as_ref(), "m-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meeting.compatibility_score, 40);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let store = Arc::new(MemoryStore::new());
        seed_meeting(&store, "m-1").await;

        // Slow oracle keeps the worker busy so the 1-slot queue fills.
        let handle = RescoreWorker::spawn(
            Arc::new(MockOracle::new(70).with_delay(Duration::from_millis(100))),
            store,
            Duration::from_secs(1),
            1,
        );
        assert!(handle.enqueue("m-1"));
        // First job may be in-flight; keep pushing until try_send fails.
        let mut dropped = false;
        for _ in 0..8 {
            if !handle.enqueue("m-1") {
                dropped = true;
                break;
            }
        }
        assert!(dropped);
        handle.shutdown().await;
    }
}
