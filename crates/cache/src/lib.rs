//! Sproutly offline cache for Rust
//!
//! This crate provides a local SQLite mirror of the read-mostly server
//! entities (children, attendance, activities, announcements, events) plus
//! a pending-action outbox for writes attempted while offline.
//!
//! The mirror is advisory, never authoritative: singleton collections are
//! wholesale-replaced on every sync, keyed collections are upserted by
//! natural key, and every row carries a `cached_at` stamp used for
//! staleness pruning. An outbox entry is removed only after the
//! corresponding server write succeeds.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Result type
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error type
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Retention for attendance and activity rows.
const RETENTION_DAYS: i64 = 30;

/// A child as mirrored from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: i64,
    pub name: String,
    pub class_name: String,
    pub email: Option<String>,
    pub parent_name: String,
    pub parent_phone: String,
    pub status: String,
}

/// Attendance status for one (child, date).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    NotMarked,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::NotMarked => "not_marked",
        }
    }

    /// Parse a stored status tag; unknown tags read as `NotMarked`.
    pub fn parse(value: &str) -> Self {
        match value {
            "present" => Self::Present,
            "absent" => Self::Absent,
            "late" => Self::Late,
            _ => Self::NotMarked,
        }
    }
}

/// One attendance record. The server enforces one per (child, date); the
/// mirror enforces the same with a UNIQUE constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub id: i64,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub status: AttendanceStatus,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
}

/// A daily activity update posted by a teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUpdate {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub activity_type: String,
    pub mood: Option<String>,
    pub teacher_name: String,
    pub posted_at: String,
}

/// Announcement priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementPriority {
    Normal,
    High,
}

impl AnnouncementPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "high" => Self::High,
            _ => Self::Normal,
        }
    }
}

/// A school-wide announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub priority: AnnouncementPriority,
    pub published_at: String,
}

/// A calendar event (holidays included).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_type: String,
}

/// A deferred write recorded while offline, awaiting replay.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingAction {
    pub id: i64,
    pub action_type: String,
    /// JSON payload, opaque to the cache.
    pub payload: String,
    /// Creation time, unix millis. Replay order is FIFO on this.
    pub created_at: i64,
    pub retry_count: i64,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS children (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        class_name TEXT NOT NULL,
        email TEXT,
        parent_name TEXT NOT NULL,
        parent_phone TEXT NOT NULL,
        status TEXT NOT NULL,
        cached_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER NOT NULL,
        child_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        status TEXT NOT NULL,
        check_in TEXT,
        check_out TEXT,
        cached_at INTEGER NOT NULL,
        UNIQUE(child_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activities (
        id INTEGER PRIMARY KEY,
        child_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        media_urls TEXT NOT NULL,
        activity_type TEXT NOT NULL,
        mood TEXT,
        teacher_name TEXT NOT NULL,
        posted_at TEXT NOT NULL,
        cached_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS announcements (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        priority TEXT NOT NULL,
        published_at TEXT NOT NULL,
        cached_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        event_date TEXT NOT NULL,
        event_type TEXT NOT NULL,
        cached_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action_type TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_child ON attendance(child_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_activities_child ON activities(child_id, posted_at)",
    "CREATE INDEX IF NOT EXISTS idx_pending_created ON pending_actions(created_at)",
];

/// Local durable mirror plus write-behind outbox.
///
/// Cheap to clone; clones share the underlying pool.
#[derive(Clone)]
pub struct OfflineCache {
    pool: SqlitePool,
}

impl OfflineCache {
    /// Open (or create) the cache database at the given sqlite URL and
    /// apply the idempotent schema.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let cache = Self { pool };
        cache.init().await?;
        Ok(cache)
    }

    /// Open an in-memory cache. A single connection keeps every caller on
    /// the same database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let cache = Self { pool };
        cache.init().await?;
        Ok(cache)
    }

    async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Wholesale-replace the mirrored children list.
    pub async fn cache_children(&self, children: &[Child]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM children").execute(&mut *tx).await?;
        for child in children {
            sqlx::query(
                r#"
                INSERT INTO children (id, name, class_name, email, parent_name, parent_phone, status, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(child.id)
            .bind(&child.name)
            .bind(&child.class_name)
            .bind(&child.email)
            .bind(&child.parent_name)
            .bind(&child.parent_phone)
            .bind(&child.status)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_last_synced("children").await
    }

    pub async fn cached_children(&self) -> Result<Vec<Child>> {
        let rows = sqlx::query("SELECT * FROM children ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Child {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    class_name: row.try_get("class_name")?,
                    email: row.try_get("email")?,
                    parent_name: row.try_get("parent_name")?,
                    parent_phone: row.try_get("parent_phone")?,
                    status: row.try_get("status")?,
                })
            })
            .collect()
    }

    /// Upsert attendance rows for one child, keyed on (child, date).
    pub async fn cache_attendance(&self, child_id: i64, records: &[Attendance]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO attendance (id, child_id, date, status, check_in, check_out, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(child_id, date) DO UPDATE SET
                    id = excluded.id,
                    status = excluded.status,
                    check_in = excluded.check_in,
                    check_out = excluded.check_out,
                    cached_at = excluded.cached_at
                "#,
            )
            .bind(record.id)
            .bind(child_id)
            .bind(&record.date)
            .bind(record.status.as_str())
            .bind(&record.check_in)
            .bind(&record.check_out)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_last_synced(&format!("attendance:{child_id}")).await
    }

    pub async fn cached_attendance(&self, child_id: i64, limit: u32) -> Result<Vec<Attendance>> {
        let rows = sqlx::query(
            "SELECT * FROM attendance WHERE child_id = ?1 ORDER BY date DESC LIMIT ?2",
        )
        .bind(child_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.try_get("status")?;
                Ok(Attendance {
                    id: row.try_get("id")?,
                    date: row.try_get("date")?,
                    status: AttendanceStatus::parse(&status),
                    check_in: row.try_get("check_in")?,
                    check_out: row.try_get("check_out")?,
                })
            })
            .collect()
    }

    /// Upsert activity updates for one child, keyed on the server id.
    pub async fn cache_activities(&self, child_id: i64, updates: &[DailyUpdate]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        for update in updates {
            let media_urls = serde_json::to_string(&update.media_urls)?;
            sqlx::query(
                r#"
                INSERT INTO activities
                    (id, child_id, title, content, media_urls, activity_type, mood, teacher_name, posted_at, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    media_urls = excluded.media_urls,
                    activity_type = excluded.activity_type,
                    mood = excluded.mood,
                    teacher_name = excluded.teacher_name,
                    posted_at = excluded.posted_at,
                    cached_at = excluded.cached_at
                "#,
            )
            .bind(update.id)
            .bind(child_id)
            .bind(&update.title)
            .bind(&update.content)
            .bind(&media_urls)
            .bind(&update.activity_type)
            .bind(&update.mood)
            .bind(&update.teacher_name)
            .bind(&update.posted_at)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_last_synced(&format!("activities:{child_id}")).await
    }

    pub async fn cached_activities(&self, child_id: i64, limit: u32) -> Result<Vec<DailyUpdate>> {
        let rows = sqlx::query(
            "SELECT * FROM activities WHERE child_id = ?1 ORDER BY posted_at DESC LIMIT ?2",
        )
        .bind(child_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let media_urls: String = row.try_get("media_urls")?;
                Ok(DailyUpdate {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    media_urls: serde_json::from_str(&media_urls).unwrap_or_default(),
                    activity_type: row.try_get("activity_type")?,
                    mood: row.try_get("mood")?,
                    teacher_name: row.try_get("teacher_name")?,
                    posted_at: row.try_get("posted_at")?,
                })
            })
            .collect()
    }

    /// Wholesale-replace the mirrored announcements.
    pub async fn cache_announcements(&self, announcements: &[Announcement]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM announcements")
            .execute(&mut *tx)
            .await?;
        for announcement in announcements {
            sqlx::query(
                r#"
                INSERT INTO announcements (id, title, content, priority, published_at, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(announcement.id)
            .bind(&announcement.title)
            .bind(&announcement.content)
            .bind(announcement.priority.as_str())
            .bind(&announcement.published_at)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_last_synced("announcements").await
    }

    pub async fn cached_announcements(&self) -> Result<Vec<Announcement>> {
        let rows = sqlx::query("SELECT * FROM announcements ORDER BY published_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let priority: String = row.try_get("priority")?;
                Ok(Announcement {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    priority: AnnouncementPriority::parse(&priority),
                    published_at: row.try_get("published_at")?,
                })
            })
            .collect()
    }

    /// Wholesale-replace the mirrored events.
    pub async fn cache_events(&self, events: &[Event]) -> Result<()> {
        let cached_at = now_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM events").execute(&mut *tx).await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (id, title, description, event_date, event_type, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.event_date)
            .bind(&event.event_type)
            .bind(cached_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_last_synced("events").await
    }

    pub async fn cached_events(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY event_date ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Event {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    event_date: row.try_get("event_date")?,
                    event_type: row.try_get("event_type")?,
                })
            })
            .collect()
    }

    /// Append a deferred write to the outbox. Returns the outbox row id.
    pub async fn queue_action(&self, action_type: &str, payload: &serde_json::Value) -> Result<i64> {
        let payload = serde_json::to_string(payload)?;
        let result = sqlx::query(
            r#"
            INSERT INTO pending_actions (action_type, payload, created_at, retry_count)
            VALUES (?1, ?2, ?3, 0)
            "#,
        )
        .bind(action_type)
        .bind(&payload)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All pending actions, FIFO by creation time.
    pub async fn pending_actions(&self) -> Result<Vec<PendingAction>> {
        let actions = sqlx::query_as::<_, PendingAction>(
            "SELECT * FROM pending_actions ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(actions)
    }

    /// Remove an outbox entry after its server write succeeded.
    pub async fn remove_pending_action(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_actions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed replay attempt.
    pub async fn bump_retry(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE pending_actions SET retry_count = retry_count + 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_last_synced(&self, data_type: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_metadata (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(format!("last_synced:{data_type}"))
        .bind(now_millis().to_string())
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// When the given data type was last written, if ever.
    pub async fn last_synced(&self, data_type: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT value FROM cache_metadata WHERE key = ?1")
            .bind(format!("last_synced:{data_type}"))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .and_then(|row| row.try_get::<String, _>("value").ok())
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()))
    }

    /// Prune attendance and activity rows cached more than 30 days ago.
    /// Returns the number of rows removed.
    pub async fn clear_old_cache(&self) -> Result<u64> {
        let cutoff = now_millis() - RETENTION_DAYS * 24 * 60 * 60 * 1000;

        let attendance = sqlx::query("DELETE FROM attendance WHERE cached_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();
        let activities = sqlx::query("DELETE FROM activities WHERE cached_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let pruned = attendance + activities;
        debug!("pruned {pruned} stale cache rows");
        Ok(pruned)
    }

    /// Wipe every table. Invoked on logout.
    pub async fn clear_all_cache(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "children",
            "attendance",
            "activities",
            "announcements",
            "events",
            "pending_actions",
            "cache_metadata",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
