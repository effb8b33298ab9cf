//! Teacher-facing API methods

use crate::error::Error;
use crate::fetch::Transport;
use crate::types::{
    Attendance, BulkAttendanceRequest, Child, DailyUpdate, Event, NewActivity, StudentAttendance,
    TeacherDashboard,
};

/// Client for the teacher role.
pub struct TeacherClient {
    transport: Transport,
}

impl TeacherClient {
    pub(crate) fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn dashboard(&self) -> Result<TeacherDashboard, Error> {
        self.transport.get("/teacher/dashboard").await
    }

    /// The students in the teacher's class.
    pub async fn students(&self) -> Result<Vec<Child>, Error> {
        self.transport.get("/teacher/students").await
    }

    /// Submit one day's attendance for many students in a single call.
    pub async fn mark_attendance_bulk(&self, request: &BulkAttendanceRequest) -> Result<(), Error> {
        self.transport
            .post_and_forget("/teacher/attendance/bulk", request)
            .await
    }

    /// Post an activity update; returns the created record.
    pub async fn post_activity(&self, activity: &NewActivity) -> Result<DailyUpdate, Error> {
        self.transport.post("/teacher/activity", activity).await
    }

    /// Today's status for every student in the class.
    pub async fn today_attendance_all(&self) -> Result<Vec<StudentAttendance>, Error> {
        self.transport.get("/teacher/attendance/today").await
    }

    /// Attendance history for one student over a date range (inclusive,
    /// `YYYY-MM-DD`).
    pub async fn student_attendance_history(
        &self,
        student_id: i64,
        from: &str,
        to: &str,
    ) -> Result<Vec<Attendance>, Error> {
        self.transport
            .get(&format!(
                "/teacher/student/{student_id}/attendance?from={from}&to={to}"
            ))
            .await
    }

    /// The organization's holiday calendar.
    pub async fn organization_holidays(&self) -> Result<Vec<Event>, Error> {
        self.transport.get("/teacher/holidays").await
    }
}
