//! Outbox replay
//!
//! Writes attempted while offline sit in the cache's pending-action outbox
//! until the embedding app reports connectivity and calls
//! [`SyncEngine::replay`]. Replay is at-least-once and FIFO by creation
//! time: an action is removed only after its server write succeeds, a
//! transient failure stops the drain so later actions cannot overtake an
//! earlier one, and an action that keeps failing is dropped once it
//! exhausts its attempts. The SDK runs no background timer; when to sync
//! is the caller's decision.

use sproutly_rust_cache::{OfflineCache, PendingAction};
use tracing::{debug, warn};

use crate::driver::DriverClient;
use crate::error::Error;
use crate::teacher::TeacherClient;
use crate::types::{BulkAttendanceRequest, LocationPing, NewActivity};

/// Outbox tag for a deferred bulk attendance submission.
pub const MARK_ATTENDANCE: &str = "mark_attendance";
/// Outbox tag for a deferred activity post.
pub const POST_ACTIVITY: &str = "post_activity";
/// Outbox tag for a deferred GPS ping.
pub const UPDATE_BUS_LOCATION: &str = "update_bus_location";

/// What one replay pass accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Actions replayed against the server and removed.
    pub replayed: usize,
    /// Actions discarded (exhausted attempts or unreadable payload).
    pub dropped: usize,
    /// Actions still queued after this pass.
    pub pending: usize,
}

/// Drains the pending-action outbox against the API.
pub struct SyncEngine {
    cache: OfflineCache,
    teacher: TeacherClient,
    driver: DriverClient,
}

impl SyncEngine {
    /// Attempts before a repeatedly failing action is dropped.
    pub const MAX_REPLAY_ATTEMPTS: i64 = 5;

    pub(crate) fn new(cache: OfflineCache, teacher: TeacherClient, driver: DriverClient) -> Self {
        Self {
            cache,
            teacher,
            driver,
        }
    }

    /// Queue a bulk attendance submission for later replay.
    pub async fn queue_attendance_marks(
        &self,
        request: &BulkAttendanceRequest,
    ) -> Result<i64, Error> {
        Ok(self
            .cache
            .queue_action(MARK_ATTENDANCE, &serde_json::to_value(request)?)
            .await?)
    }

    /// Queue an activity post for later replay.
    pub async fn queue_activity_post(&self, activity: &NewActivity) -> Result<i64, Error> {
        Ok(self
            .cache
            .queue_action(POST_ACTIVITY, &serde_json::to_value(activity)?)
            .await?)
    }

    /// Queue a GPS ping for later replay.
    pub async fn queue_location_update(&self, ping: &LocationPing) -> Result<i64, Error> {
        Ok(self
            .cache
            .queue_action(UPDATE_BUS_LOCATION, &serde_json::to_value(ping)?)
            .await?)
    }

    /// Replay the outbox in FIFO order.
    ///
    /// Stops at the first transient failure so ordering is preserved;
    /// the failed action keeps its place and its `retry_count` is bumped.
    pub async fn replay(&self) -> Result<SyncReport, Error> {
        let mut replayed = 0;
        let mut dropped = 0;

        for action in self.cache.pending_actions().await? {
            if action.retry_count >= Self::MAX_REPLAY_ATTEMPTS {
                warn!(
                    "dropping action {} ({}) after {} attempts",
                    action.id, action.action_type, action.retry_count
                );
                self.cache.remove_pending_action(action.id).await?;
                dropped += 1;
                continue;
            }

            match self.dispatch(&action).await {
                Ok(()) => {
                    debug!("replayed action {} ({})", action.id, action.action_type);
                    self.cache.remove_pending_action(action.id).await?;
                    replayed += 1;
                }
                Err(Error::Json(e)) => {
                    // An unreadable payload will never replay; keeping it
                    // would wedge the queue.
                    warn!("dropping action {} with unreadable payload: {e}", action.id);
                    self.cache.remove_pending_action(action.id).await?;
                    dropped += 1;
                }
                Err(Error::UnknownAction(tag)) => {
                    warn!("dropping action {} with unknown type {tag}", action.id);
                    self.cache.remove_pending_action(action.id).await?;
                    dropped += 1;
                }
                Err(e) => {
                    warn!(
                        "replay of action {} ({}) failed, stopping drain: {e}",
                        action.id, action.action_type
                    );
                    self.cache.bump_retry(action.id).await?;
                    break;
                }
            }
        }

        let pending = self.cache.pending_actions().await?.len();
        Ok(SyncReport {
            replayed,
            dropped,
            pending,
        })
    }

    async fn dispatch(&self, action: &PendingAction) -> Result<(), Error> {
        match action.action_type.as_str() {
            MARK_ATTENDANCE => {
                let request: BulkAttendanceRequest = serde_json::from_str(&action.payload)?;
                self.teacher.mark_attendance_bulk(&request).await
            }
            POST_ACTIVITY => {
                let activity: NewActivity = serde_json::from_str(&action.payload)?;
                self.teacher.post_activity(&activity).await.map(|_| ())
            }
            UPDATE_BUS_LOCATION => {
                let ping: LocationPing = serde_json::from_str(&action.payload)?;
                self.driver.update_bus_location(&ping).await
            }
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}
