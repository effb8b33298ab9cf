//! Driver-facing API methods

use serde_json::json;

use crate::error::Error;
use crate::fetch::Transport;
use crate::types::{DriverDashboard, LocationPing, Trip, TripStudentStatus};

/// Client for the driver role.
pub struct DriverClient {
    transport: Transport,
}

impl DriverClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn dashboard(&self) -> Result<DriverDashboard, Error> {
        self.transport.get("/driver/dashboard").await
    }

    /// Push one GPS ping. The driver app calls this on an interval while a
    /// trip is active; the interval and its teardown belong to the caller.
    pub async fn update_bus_location(&self, ping: &LocationPing) -> Result<(), Error> {
        self.transport.post_and_forget("/driver/location", ping).await
    }

    pub async fn start_trip(&self, route_id: i64) -> Result<Trip, Error> {
        self.transport
            .post("/driver/trip/start", &json!({ "routeId": route_id }))
            .await
    }

    pub async fn end_trip(&self, trip_id: i64) -> Result<Trip, Error> {
        self.transport
            .post(&format!("/driver/trip/{trip_id}/end"), &json!({}))
            .await
    }

    /// The in-progress trip, if any.
    pub async fn active_trip(&self) -> Result<Option<Trip>, Error> {
        self.transport.get("/driver/trip/active").await
    }

    /// Record a boarding-state transition for one student on a trip.
    pub async fn update_student_trip_status(
        &self,
        trip_id: i64,
        student_id: i64,
        status: TripStudentStatus,
    ) -> Result<(), Error> {
        self.transport
            .post_and_forget(
                &format!("/driver/trip/{trip_id}/student/{student_id}"),
                &json!({ "status": status }),
            )
            .await
    }
}
