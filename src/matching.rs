//! Best-match selection and batch matching.
//!
//! One window is matched by scoring every eligible candidate through the
//! compatibility oracle and keeping the maximum; ties keep the first
//! candidate encountered. Scoring calls run concurrently, each bounded
//! by a timeout and a shared concurrency limit. A failed or timed-out
//! call only removes that candidate from consideration.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::eligibility::{EligibilityFilter, ProfileRule};
use crate::oracle::{CompatibilityOracle, CompatibilityReport};
use crate::types::{AvailabilitySlot, EngineError, MeetingWindow, Result};

/// A selected counterpart slot with its oracle verdict.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    /// The counterpart's open slot
    pub slot: AvailabilitySlot,
    /// Compatibility score, 0-100
    pub score: u8,
    /// Opaque reasons payload for display at confirmation time
    pub reasons: serde_json::Value,
}

/// Per-window outcome of a batch match. `None` is the normal no-match
/// outcome, not an error.
#[derive(Debug, Clone)]
pub struct WindowMatch {
    pub window: MeetingWindow,
    pub result: Option<MatchCandidate>,
}

/// Selects the best counterpart for windows.
pub struct MatchSelector {
    filter: EligibilityFilter,
    oracle: Arc<dyn CompatibilityOracle>,
    oracle_timeout: Duration,
    scoring_permits: Arc<Semaphore>,
}

impl MatchSelector {
    pub fn new(
        filter: EligibilityFilter,
        oracle: Arc<dyn CompatibilityOracle>,
        oracle_timeout: Duration,
        max_concurrent_scoring: usize,
    ) -> Self {
        Self {
            filter,
            oracle,
            oracle_timeout,
            scoring_permits: Arc::new(Semaphore::new(max_concurrent_scoring.max(1))),
        }
    }

    /// Find the best match for a single window.
    ///
    /// `Ok(None)` means the candidate pool was empty. When candidates
    /// exist but every oracle call failed, this reports
    /// [`EngineError::OracleUnavailable`] so the batch layer can log and
    /// degrade it to a no-match.
    pub async fn best_match(
        &self,
        requester: &str,
        window: &MeetingWindow,
        rule: &ProfileRule,
    ) -> Result<Option<MatchCandidate>> {
        let candidates = self.filter.candidates(requester, window, rule).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let verdicts = future::join_all(candidates.iter().map(|slot| {
            let permits = Arc::clone(&self.scoring_permits);
            let oracle = Arc::clone(&self.oracle);
            let counterpart = slot.owner.clone();
            async move {
                let _permit = match permits.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                match timeout(self.oracle_timeout, oracle.score(requester, &counterpart)).await {
                    Ok(Ok(report)) => Some(report),
                    Ok(Err(err)) => {
                        warn!(
                            requester = %requester,
                            counterpart = %counterpart,
                            error = %err,
                            "Oracle call failed, dropping candidate"
                        );
                        None
                    }
                    Err(_) => {
                        warn!(
                            requester = %requester,
                            counterpart = %counterpart,
                            timeout_ms = self.oracle_timeout.as_millis() as u64,
                            "Oracle call timed out, dropping candidate"
                        );
                        None
                    }
                }
            }
        }))
        .await;

        // Strictly-greater comparison keeps the first-seen candidate on
        // ties; join_all preserves input order.
        let mut best: Option<(AvailabilitySlot, CompatibilityReport)> = None;
        let mut scored = 0usize;
        for (slot, verdict) in candidates.into_iter().zip(verdicts) {
            let Some(report) = verdict else { continue };
            scored += 1;
            let replace = best
                .as_ref()
                .map(|(_, current)| report.score > current.score)
                .unwrap_or(true);
            if replace {
                best = Some((slot, report));
            }
        }

        if scored == 0 {
            return Err(EngineError::OracleUnavailable);
        }

        Ok(best.map(|(slot, report)| MatchCandidate {
            slot,
            score: report.score,
            reasons: report.reasons,
        }))
    }

    /// Match each window of a batch independently.
    ///
    /// Windows do not compete with each other: the same candidate may be
    /// the best match for two windows at once; the race resolves at
    /// confirmation time. Oracle collapse on one window degrades to a
    /// no-match for that window only.
    pub async fn find_best_matches(
        &self,
        requester: &str,
        windows: Vec<MeetingWindow>,
        rule: &ProfileRule,
    ) -> Result<Vec<WindowMatch>> {
        let mut matches = Vec::with_capacity(windows.len());
        for window in windows {
            window.validate()?;
            let result = match self.best_match(requester, &window, rule).await {
                Ok(result) => result,
                Err(EngineError::OracleUnavailable) => {
                    warn!(
                        requester = %requester,
                        date = %window.date,
                        time = %window.time_of_day,
                        "Scoring failed for every candidate, reporting no match"
                    );
                    None
                }
                Err(err) => return Err(err),
            };

            debug!(
                requester = %requester,
                date = %window.date,
                time = %window.time_of_day,
                matched = result.is_some(),
                "Window matched"
            );
            matches.push(WindowMatch { window, result });
        }
        Ok(matches)
    }
}
