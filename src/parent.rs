//! Parent-facing API methods

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};

use crate::clock::Clock;
use crate::error::Error;
use crate::fetch::Transport;
use crate::types::{Announcement, Attendance, BusLocation, Child, DailyUpdate, Event, FeeSummary};

/// Client for the parent role.
pub struct ParentClient {
    transport: Transport,
    clock: Arc<dyn Clock>,
    timezone: FixedOffset,
}

impl ParentClient {
    pub(crate) fn new(transport: Transport, clock: Arc<dyn Clock>, timezone: FixedOffset) -> Self {
        Self {
            transport,
            clock,
            timezone,
        }
    }

    /// The children linked to the logged-in parent.
    pub async fn children(&self) -> Result<Vec<Child>, Error> {
        self.transport.get("/parent/children").await
    }

    /// Recent attendance for one child, newest first.
    pub async fn attendance(&self, child_id: i64, limit: u32) -> Result<Vec<Attendance>, Error> {
        self.transport
            .get(&format!("/parent/child/{child_id}/attendance?limit={limit}"))
            .await
    }

    /// Today's attendance record for one child, if the most recent record
    /// is from today in the configured school timezone.
    pub async fn today_attendance(&self, child_id: i64) -> Result<Option<Attendance>, Error> {
        let recent = self.attendance(child_id, 1).await?;
        let today = self
            .clock
            .now_utc()
            .with_timezone(&self.timezone)
            .date_naive();

        Ok(recent.into_iter().next().filter(|record| {
            NaiveDate::parse_from_str(&record.date, "%Y-%m-%d")
                .map(|date| date == today)
                .unwrap_or(false)
        }))
    }

    /// Recent activity updates for one child, newest first.
    pub async fn daily_updates(&self, child_id: i64, limit: u32) -> Result<Vec<DailyUpdate>, Error> {
        self.transport
            .get(&format!("/parent/child/{child_id}/activities?limit={limit}"))
            .await
    }

    /// Fee totals and the EMI schedule for one child.
    pub async fn student_fees(&self, child_id: i64) -> Result<FeeSummary, Error> {
        self.transport
            .get(&format!("/parent/child/{child_id}/fees"))
            .await
    }

    pub async fn announcements(&self) -> Result<Vec<Announcement>, Error> {
        self.transport.get("/parent/announcements").await
    }

    pub async fn events(&self) -> Result<Vec<Event>, Error> {
        self.transport.get("/parent/events").await
    }

    /// Last known position of the child's bus.
    pub async fn bus_location(&self, child_id: i64) -> Result<BusLocation, Error> {
        self.transport
            .get(&format!("/parent/child/{child_id}/bus-location"))
            .await
    }

    /// Live position of the child's bus. Polled on an interval by the bus
    /// screen; the interval and its teardown belong to the caller.
    pub async fn live_bus_location(&self, child_id: i64) -> Result<BusLocation, Error> {
        self.transport
            .get(&format!("/parent/child/{child_id}/bus-location/live"))
            .await
    }
}
