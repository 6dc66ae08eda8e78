//! Loans repository: ledger record storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{LoanRecord, LoanStatus},
};

/// Loan record storage.
///
/// `update` carries an optimistic version check: the write only lands when
/// the stored version still matches the one the record was loaded with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn insert(&self, record: &LoanRecord) -> AppResult<LoanRecord>;
    async fn get_by_id(&self, id: i64) -> AppResult<LoanRecord>;
    /// Version-checked write; `Busy` when the record moved underneath us
    async fn update(&self, record: &LoanRecord) -> AppResult<LoanRecord>;
    /// The open record for (book, borrower), when one exists
    async fn find_open(&self, book_id: i64, borrower_id: i64) -> AppResult<Option<LoanRecord>>;
    /// Open records across all borrowers of a book
    async fn count_open_for_book(&self, book_id: i64) -> AppResult<i64>;
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<LoanRecord>>;
    async fn list_all(&self) -> AppResult<Vec<LoanRecord>>;
    async fn list_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanRecord>>;
    /// ISSUED records whose due date lies strictly before `now`
    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanRecord>>;
    async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64>;
    async fn count_for_user_by_status(&self, user_id: i64, status: LoanStatus) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgLoanRepository {
    pool: Pool<Postgres>,
}

impl PgLoanRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepository for PgLoanRepository {
    async fn insert(&self, record: &LoanRecord) -> AppResult<LoanRecord> {
        let inserted = sqlx::query_as::<_, LoanRecord>(
            r#"
            INSERT INTO loans
                (id, book_id, borrower_id, validator_id, requested_at, issued_at,
                 due_at, returned_at, reissue_count, status, late_fine, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.book_id)
        .bind(record.borrower_id)
        .bind(record.validator_id)
        .bind(record.requested_at)
        .bind(record.issued_at)
        .bind(record.due_at)
        .bind(record.returned_at)
        .bind(record.reissue_count)
        .bind(record.status)
        .bind(record.late_fine)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(record) => Ok(record),
            // The partial unique index on open (book, borrower) pairs is the
            // last line of defense against a duplicate active loan
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::DuplicateActiveLoan(format!(
                    "User {} already has an open loan for book {}",
                    record.borrower_id, record.book_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: i64) -> AppResult<LoanRecord> {
        sqlx::query_as::<_, LoanRecord>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn update(&self, record: &LoanRecord) -> AppResult<LoanRecord> {
        let updated = sqlx::query_as::<_, LoanRecord>(
            r#"
            UPDATE loans SET
                validator_id = $3,
                issued_at = $4,
                due_at = $5,
                returned_at = $6,
                reissue_count = $7,
                status = $8,
                late_fine = $9,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.version)
        .bind(record.validator_id)
        .bind(record.issued_at)
        .bind(record.due_at)
        .bind(record.returned_at)
        .bind(record.reissue_count)
        .bind(record.status)
        .bind(record.late_fine)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(record) => Ok(record),
            None => {
                // Distinguish a deleted record from a lost version race
                self.get_by_id(record.id).await?;
                Err(AppError::Busy(format!(
                    "Loan {} was modified concurrently",
                    record.id
                )))
            }
        }
    }

    async fn find_open(&self, book_id: i64, borrower_id: i64) -> AppResult<Option<LoanRecord>> {
        let record = sqlx::query_as::<_, LoanRecord>(
            r#"
            SELECT * FROM loans
            WHERE book_id = $1 AND borrower_id = $2
              AND returned_at IS NULL
              AND status IN ('REQUESTED', 'ISSUED', 'OVERDUE')
            "#,
        )
        .bind(book_id)
        .bind(borrower_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn count_open_for_book(&self, book_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM loans
            WHERE book_id = $1
              AND returned_at IS NULL
              AND status IN ('REQUESTED', 'ISSUED', 'OVERDUE')
            "#,
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<LoanRecord>> {
        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE borrower_id = $1 ORDER BY requested_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_all(&self) -> AppResult<Vec<LoanRecord>> {
        let records =
            sqlx::query_as::<_, LoanRecord>("SELECT * FROM loans ORDER BY requested_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(records)
    }

    async fn list_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanRecord>> {
        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE status = $1 ORDER BY requested_at DESC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanRecord>> {
        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT * FROM loans WHERE status = 'ISSUED' AND due_at < $1 ORDER BY due_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_for_user_by_status(&self, user_id: i64, status: LoanStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
