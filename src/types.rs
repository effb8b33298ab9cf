//! Wire types shared across the role clients
//!
//! The mirrored entities (children, attendance, activities, announcements,
//! events) are defined in `sproutly-rust-cache` so the cache stays a leaf
//! crate; they are re-exported here and used unchanged on the wire.

use serde::{Deserialize, Serialize};

pub use sproutly_rust_cache::{
    Announcement, AnnouncementPriority, Attendance, AttendanceStatus, Child, DailyUpdate, Event,
    PendingAction,
};

/// Fee position for one child: totals plus the EMI schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_amount: f64,
    pub paid_amount: f64,
    pub balance_amount: f64,
    #[serde(default)]
    pub installments: Vec<EmiInstallment>,
}

/// One EMI installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiInstallment {
    pub id: i64,
    pub due_date: String,
    pub amount: f64,
    pub paid: bool,
    pub paid_on: Option<String>,
}

/// A bus position as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: String,
}

/// A GPS ping pushed by the driver app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPing {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

/// A bus trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: i64,
    pub route_id: i64,
    pub status: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

/// Per-student boarding state within a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStudentStatus {
    Waiting,
    Boarded,
    Dropped,
    Absent,
}

/// One student's attendance mark inside a bulk submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMark {
    pub student_id: i64,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
}

/// A bulk attendance submission for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAttendanceRequest {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub records: Vec<AttendanceMark>,
}

/// A new activity post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub activity_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Children the activity is posted for.
    pub child_ids: Vec<i64>,
}

/// Today's status for one student, as the teacher overview lists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttendance {
    pub student_id: i64,
    pub name: String,
    pub status: AttendanceStatus,
}

/// The teacher home screen summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub class_name: String,
    pub student_count: u32,
    pub marked_today: u32,
}

/// A stop on a bus route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sequence: u32,
}

/// A student assigned to the driver's route.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStudent {
    pub id: i64,
    pub name: String,
    pub stop_name: Option<String>,
}

/// The driver home screen summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDashboard {
    pub route_id: i64,
    pub route_name: String,
    #[serde(default)]
    pub stops: Vec<RouteStop>,
    #[serde(default)]
    pub students: Vec<TripStudent>,
    pub active_trip: Option<Trip>,
}

/// Response from a media upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpload {
    pub url: String,
}
