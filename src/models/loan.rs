//! Loan record model and lifecycle states

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Lifecycle states of a loan.
///
/// REQUESTED and ISSUED/OVERDUE are open states; RETURNED and REJECTED are
/// terminal. OVERDUE is derived from the due date by the overdue sweep, never
/// set directly by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Requested,
    Issued,
    Returned,
    Rejected,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Requested => "REQUESTED",
            LoanStatus::Issued => "ISSUED",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Rejected => "REJECTED",
            LoanStatus::Overdue => "OVERDUE",
        }
    }

    /// Open states hold (or may come to hold) a copy of the book
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            LoanStatus::Requested | LoanStatus::Issued | LoanStatus::Overdue
        )
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REQUESTED" => Ok(LoanStatus::Requested),
            "ISSUED" => Ok(LoanStatus::Issued),
            "RETURNED" => Ok(LoanStatus::Returned),
            "REJECTED" => Ok(LoanStatus::Rejected),
            "OVERDUE" => Ok(LoanStatus::Overdue),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as text)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// A single borrow transaction for one book copy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanRecord {
    pub id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    /// Staff or admin who approved or rejected the request
    pub validator_id: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub reissue_count: i16,
    pub status: LoanStatus,
    /// Fine accrued at return time; zero until then
    pub late_fine: Decimal,
    /// Optimistic-concurrency token, bumped on every write
    #[serde(skip_serializing, default)]
    pub version: i64,
}

impl LoanRecord {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none() && self.status.is_open()
    }

    /// True when the due date exists and lies strictly before `now`
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at.map(|due| due < now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(status: LoanStatus, due_at: Option<DateTime<Utc>>) -> LoanRecord {
        LoanRecord {
            id: 1,
            book_id: 1,
            borrower_id: 1,
            validator_id: None,
            requested_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            issued_at: None,
            due_at,
            returned_at: None,
            reissue_count: 0,
            status,
            late_fine: Decimal::ZERO,
            version: 0,
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            LoanStatus::Requested,
            LoanStatus::Issued,
            LoanStatus::Returned,
            LoanStatus::Rejected,
            LoanStatus::Overdue,
        ] {
            assert_eq!(status.as_str().parse::<LoanStatus>().unwrap(), status);
        }
        assert!("LOST".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn open_states() {
        assert!(record(LoanStatus::Requested, None).is_open());
        assert!(record(LoanStatus::Issued, None).is_open());
        assert!(record(LoanStatus::Overdue, None).is_open());
        assert!(!record(LoanStatus::Returned, None).is_open());
        assert!(!record(LoanStatus::Rejected, None).is_open());
    }

    #[test]
    fn past_due_needs_a_due_date() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(!record(LoanStatus::Requested, None).is_past_due(now));

        let due = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert!(record(LoanStatus::Issued, Some(due)).is_past_due(now));
        assert!(!record(LoanStatus::Issued, Some(now)).is_past_due(now));
    }
}
