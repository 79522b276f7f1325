//! Shared wire types for the sql-insight backend API.
//!
//! Every REST endpoint wraps its payload in the `{code, message, data}`
//! envelope; field names are camelCase on the wire. These types define the
//! contract the client is written against.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// SSE Event Names
// ============================================================================

/// Event kinds used by the `/ai/chat/stream` endpoint.
pub mod sse {
    pub const STAGE: &str = "stage";
    pub const SQL: &str = "sql";
    pub const DATA: &str = "data";
    pub const SUMMARY: &str = "summary";
    pub const DONE: &str = "done";
    pub const ERROR: &str = "error";

    /// Kind assumed when a frame carries no `event:` field. The backend
    /// always names its events, so these frames are dropped.
    pub const DEFAULT: &str = "message";
}

// ============================================================================
// Response Envelopes
// ============================================================================

/// Unified response envelope used by every REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Pagination envelope for list endpoints. Only `records` is required;
/// the counters tolerate absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub records: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub size: u64,
}

// ============================================================================
// Auth Types
// ============================================================================

/// Request body for `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// The authenticated user as returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

// ============================================================================
// Session Types
// ============================================================================

/// A persisted conversation thread, scoped to one data source.
///
/// Every field except `id` tolerates absence: the session list endpoint is
/// normalized leniently so a partial record never poisons the whole cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub data_source_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<NaiveDateTime>,
}

// ============================================================================
// Chat Types
// ============================================================================

/// Request body for both the blocking and the streaming chat endpoints.
///
/// `session_id` absent means the server creates a new session for the
/// question; `question` must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<i64>,
    pub question: String,
}

impl SqlChatRequest {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            session_id: None,
            data_source_id: None,
            question: question.into(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn with_data_source(mut self, data_source_id: i64) -> Self {
        self.data_source_id = Some(data_source_id);
        self
    }
}

/// Response of the blocking `/ai/chat` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlChatResponse {
    pub session_id: i64,
    pub sql: String,
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub summary: String,
}

// ============================================================================
// History Types
// ============================================================================

/// One question/answer record inside a session.
///
/// `result_data` is served from a short-lived cache; once it expires the
/// field is null and `result_expired` is set, and the record can be
/// re-executed via `/ai/records/{id}/rerun`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: i64,
    pub session_id: i64,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub sql_text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub row_total: u64,
    #[serde(default)]
    pub corrected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub result_expired: bool,
}

// ============================================================================
// Data Source Types
// ============================================================================

/// A database connection the user is authorized to query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: i64,
    #[serde(default)]
    pub conn_name: String,
    #[serde(default)]
    pub db_type: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub database_name: String,
    #[serde(default)]
    pub username: String,
}

// ============================================================================
// SSE JSON Payloads
// ============================================================================

/// Payload of a `stage` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StagePayload {
    pub message: String,
}

/// Payload of a `sql` event. `corrected` is set when the server auto-repaired
/// the generated query after a failed first execution.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlPayload {
    pub sql: String,
    #[serde(default)]
    pub corrected: bool,
}

/// Payload of a `data` event. `session_id` echoes the session the rows
/// belong to — a new session may have been created server-side for the
/// first question of a conversation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPayload {
    pub rows: Vec<Map<String, Value>>,
    pub total: u64,
    pub session_id: i64,
}

/// Payload of a `summary` event: one fragment of the incrementally
/// generated natural-language summary.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryPayload {
    pub token: String,
}

/// Payload of an `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}
