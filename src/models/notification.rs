//! Notification model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    IssueRequest,
    Issued,
    Rejected,
    Returned,
    Overdue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::IssueRequest => "ISSUE_REQUEST",
            NotificationKind::Issued => "ISSUED",
            NotificationKind::Rejected => "REJECTED",
            NotificationKind::Returned => "RETURNED",
            NotificationKind::Overdue => "OVERDUE",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ISSUE_REQUEST" => Ok(NotificationKind::IssueRequest),
            "ISSUED" => Ok(NotificationKind::Issued),
            "REJECTED" => Ok(NotificationKind::Rejected),
            "RETURNED" => Ok(NotificationKind::Returned),
            "OVERDUE" => Ok(NotificationKind::Overdue),
            _ => Err(format!("Invalid notification kind: {}", s)),
        }
    }
}

// SQLx conversion for NotificationKind (stored as text)
impl sqlx::Type<Postgres> for NotificationKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for NotificationKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for NotificationKind {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// A stored notification, read by its recipient through the API
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    /// Loan the notification refers to, when any
    pub loan_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Payload handed to the notifier by the ledger
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub message: String,
    pub loan_id: Option<i64>,
}
