//! Loan ledger: the lifecycle state machine for book loans.
//!
//! Every mutation runs under the book's lease and writes back through a
//! version-checked update, so two concurrent operations on the same book can
//! neither double-issue a copy nor corrupt its availability count.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::LoanPolicy,
    error::{AppError, AppResult},
    models::{
        loan::{LoanRecord, LoanStatus},
        notification::{NewNotification, NotificationKind},
        user::{Action, Role, User},
    },
    repository::{IdGenerator, LeaseRegistry, Repository},
    services::{clock::Clock, fine, notifier::Notifier},
};

/// Per-record result of an overdue sweep
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepOutcome {
    pub loan_id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    pub swept: bool,
    /// Present when this record's transition failed; the sweep continues
    pub error: Option<String>,
}

pub struct LedgerService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    leases: Arc<LeaseRegistry>,
    ids: Arc<IdGenerator>,
    policy: LoanPolicy,
}

impl LedgerService {
    pub fn new(
        repository: Repository,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        leases: Arc<LeaseRegistry>,
        ids: Arc<IdGenerator>,
        policy: LoanPolicy,
    ) -> Self {
        Self {
            repository,
            notifier,
            clock,
            leases,
            ids,
            policy,
        }
    }

    async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        message: String,
        loan_id: Option<i64>,
    ) {
        self.notifier
            .notify(NewNotification {
                user_id,
                kind,
                message,
                loan_id,
            })
            .await;
    }

    /// A member asks to borrow a book. Creates a REQUESTED record and tells
    /// the staff about it.
    pub async fn request_loan(&self, book_id: i64, borrower: &User) -> AppResult<LoanRecord> {
        let _lease = self.leases.acquire(book_id).await?;

        let book = self.repository.books.get_by_id(book_id).await?;
        if !book.is_available() {
            return Err(AppError::Unavailable(format!(
                "No copies of '{}' available",
                book.title
            )));
        }

        if self
            .repository
            .loans
            .find_open(book_id, borrower.id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateActiveLoan(format!(
                "You already have an active request or loan for '{}'",
                book.title
            )));
        }

        let record = LoanRecord {
            id: self.ids.next(),
            book_id,
            borrower_id: borrower.id,
            validator_id: None,
            requested_at: self.clock.now(),
            issued_at: None,
            due_at: None,
            returned_at: None,
            reissue_count: 0,
            status: LoanStatus::Requested,
            late_fine: Decimal::ZERO,
            version: 0,
        };
        let record = self.repository.loans.insert(&record).await?;

        tracing::info!(
            loan_id = record.id,
            book_id,
            borrower_id = borrower.id,
            "Loan requested"
        );

        // Tell every staff member; a failed lookup only costs the fan-out
        match self
            .repository
            .users
            .list_by_roles(&[Role::Staff, Role::Admin])
            .await
        {
            Ok(staff) => {
                for member in staff {
                    self.notify(
                        member.id,
                        NotificationKind::IssueRequest,
                        format!("{} has requested '{}'", borrower.display_name, book.title),
                        Some(record.id),
                    )
                    .await;
                }
            }
            Err(e) => tracing::warn!("Staff notification fan-out skipped: {}", e),
        }

        Ok(record)
    }

    /// Staff approval: reserves a copy and issues the loan
    pub async fn approve_loan(&self, loan_id: i64, validator: &User) -> AppResult<LoanRecord> {
        validator.require(Action::ValidateLoans)?;

        let probe = self.repository.loans.get_by_id(loan_id).await?;
        let _lease = self.leases.acquire(probe.book_id).await?;

        // Reload under the lease; the probe may already be stale
        let mut record = self.repository.loans.get_by_id(loan_id).await?;
        if record.status != LoanStatus::Requested {
            return Err(AppError::InvalidState(format!(
                "Only requested loans can be approved; loan {} is {}",
                loan_id, record.status
            )));
        }

        let book = self.repository.books.reserve_copy(record.book_id).await?;

        let now = self.clock.now();
        record.validator_id = Some(validator.id);
        record.issued_at = Some(now);
        record.due_at = Some(now + Duration::days(self.policy.due_days));
        record.status = LoanStatus::Issued;

        let record = match self.repository.loans.update(&record).await {
            Ok(record) => record,
            Err(e) => {
                // Give the reserved copy back so the failure leaves no trace
                if let Err(release_err) =
                    self.repository.books.release_copy(record.book_id).await
                {
                    tracing::error!(
                        book_id = record.book_id,
                        "Failed to roll back copy reservation: {}",
                        release_err
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            loan_id,
            book_id = record.book_id,
            validator_id = validator.id,
            "Loan issued"
        );

        let due = record.due_at.map(|d| d.format("%Y-%m-%d").to_string());
        self.notify(
            record.borrower_id,
            NotificationKind::Issued,
            format!(
                "Your request for '{}' has been approved. Due back {}",
                book.title,
                due.unwrap_or_default()
            ),
            Some(record.id),
        )
        .await;

        Ok(record)
    }

    /// Staff rejection of a pending request. Copy counts are untouched.
    pub async fn reject_loan(&self, loan_id: i64, validator: &User) -> AppResult<LoanRecord> {
        validator.require(Action::ValidateLoans)?;

        let probe = self.repository.loans.get_by_id(loan_id).await?;
        let _lease = self.leases.acquire(probe.book_id).await?;

        let mut record = self.repository.loans.get_by_id(loan_id).await?;
        if record.status != LoanStatus::Requested {
            return Err(AppError::InvalidState(format!(
                "Only requested loans can be rejected; loan {} is {}",
                loan_id, record.status
            )));
        }

        record.validator_id = Some(validator.id);
        record.status = LoanStatus::Rejected;
        let record = self.repository.loans.update(&record).await?;

        tracing::info!(loan_id, validator_id = validator.id, "Loan rejected");

        let book = self.repository.books.get_by_id(record.book_id).await?;
        self.notify(
            record.borrower_id,
            NotificationKind::Rejected,
            format!("Your request for '{}' has been rejected", book.title),
            Some(record.id),
        )
        .await;

        Ok(record)
    }

    /// Desk return: closes the loan, charges the late fine, frees the copy
    pub async fn return_loan(&self, loan_id: i64, validator: &User) -> AppResult<LoanRecord> {
        validator.require(Action::ValidateLoans)?;

        let probe = self.repository.loans.get_by_id(loan_id).await?;
        let _lease = self.leases.acquire(probe.book_id).await?;

        let mut record = self.repository.loans.get_by_id(loan_id).await?;
        if !matches!(record.status, LoanStatus::Issued | LoanStatus::Overdue) {
            return Err(AppError::InvalidState(format!(
                "Only issued or overdue loans can be returned; loan {} is {}",
                loan_id, record.status
            )));
        }

        let due_at = record.due_at.ok_or_else(|| {
            AppError::Internal(format!("Loan {} is issued without a due date", loan_id))
        })?;

        let now = self.clock.now();
        let book = self.repository.books.release_copy(record.book_id).await?;

        record.returned_at = Some(now);
        record.status = LoanStatus::Returned;
        record.late_fine = fine::late_fine(due_at, now, self.policy.daily_fine_rate);

        let record = match self.repository.loans.update(&record).await {
            Ok(record) => record,
            Err(e) => {
                // Take the copy back out so the failure leaves no trace
                if let Err(reserve_err) =
                    self.repository.books.reserve_copy(record.book_id).await
                {
                    tracing::error!(
                        book_id = record.book_id,
                        "Failed to roll back copy release: {}",
                        reserve_err
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            loan_id,
            book_id = record.book_id,
            late_fine = %record.late_fine,
            "Loan returned"
        );

        let message = if record.late_fine > Decimal::ZERO {
            format!(
                "You have returned '{}'. Late fine: {}",
                book.title, record.late_fine
            )
        } else {
            format!("You have returned '{}'", book.title)
        };
        self.notify(
            record.borrower_id,
            NotificationKind::Returned,
            message,
            Some(record.id),
        )
        .await;

        Ok(record)
    }

    /// Extends the due date of an active loan. The borrower may reissue
    /// their own loan; staff may reissue anyone's.
    pub async fn reissue_loan(&self, loan_id: i64, requester: &User) -> AppResult<LoanRecord> {
        let probe = self.repository.loans.get_by_id(loan_id).await?;
        if requester.id != probe.borrower_id && !requester.role.permits(Action::ValidateLoans) {
            return Err(AppError::PermissionDenied(
                "Only the borrower or staff may reissue a loan".to_string(),
            ));
        }

        let _lease = self.leases.acquire(probe.book_id).await?;

        let mut record = self.repository.loans.get_by_id(loan_id).await?;
        if !matches!(record.status, LoanStatus::Issued | LoanStatus::Overdue) {
            return Err(AppError::InvalidState(format!(
                "Only issued or overdue loans can be reissued; loan {} is {}",
                loan_id, record.status
            )));
        }

        if record.reissue_count >= self.policy.max_reissues {
            return Err(AppError::ReissueLimitExceeded(format!(
                "Loan {} has reached the maximum of {} reissues",
                loan_id, self.policy.max_reissues
            )));
        }

        let now = self.clock.now();
        if record.is_past_due(now) && !self.policy.allow_overdue_reissue {
            return Err(AppError::Overdue(format!(
                "Loan {} is overdue and cannot be reissued",
                loan_id
            )));
        }

        let due_at = record.due_at.ok_or_else(|| {
            AppError::Internal(format!("Loan {} is issued without a due date", loan_id))
        })?;

        record.due_at = Some(due_at + Duration::days(self.policy.reissue_extension_days));
        record.reissue_count += 1;
        // An overdue loan granted an extension is active again
        record.status = LoanStatus::Issued;

        let record = self.repository.loans.update(&record).await?;

        tracing::info!(
            loan_id,
            reissue_count = record.reissue_count,
            "Loan reissued"
        );

        let book = self.repository.books.get_by_id(record.book_id).await?;
        let due = record.due_at.map(|d| d.format("%Y-%m-%d").to_string());
        self.notify(
            record.borrower_id,
            NotificationKind::Issued,
            format!(
                "'{}' has been reissued. New due date: {}",
                book.title,
                due.unwrap_or_default()
            ),
            Some(record.id),
        )
        .await;

        Ok(record)
    }

    /// Flags every issued loan past its due date as OVERDUE.
    ///
    /// Idempotent: records already swept are not candidates on the next run.
    /// Each record is processed under its own lease and a failure on one
    /// never aborts the rest.
    pub async fn sweep_overdue(&self) -> AppResult<Vec<SweepOutcome>> {
        let now = self.clock.now();
        let candidates = self.repository.loans.list_issued_due_before(now).await?;

        let mut outcomes = Vec::new();
        for candidate in candidates {
            let (loan_id, book_id, borrower_id) =
                (candidate.id, candidate.book_id, candidate.borrower_id);
            match self.sweep_one(candidate).await {
                Ok(true) => outcomes.push(SweepOutcome {
                    loan_id,
                    book_id,
                    borrower_id,
                    swept: true,
                    error: None,
                }),
                // Moved on between scan and lease; nothing to report
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(loan_id, "Overdue sweep failed for loan: {}", e);
                    outcomes.push(SweepOutcome {
                        loan_id,
                        book_id,
                        borrower_id,
                        swept: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if !outcomes.is_empty() {
            tracing::info!(count = outcomes.len(), "Overdue sweep finished");
        }
        Ok(outcomes)
    }

    async fn sweep_one(&self, candidate: LoanRecord) -> AppResult<bool> {
        let _lease = self.leases.acquire(candidate.book_id).await?;

        let now = self.clock.now();
        let mut record = self.repository.loans.get_by_id(candidate.id).await?;
        if record.status != LoanStatus::Issued || !record.is_past_due(now) {
            return Ok(false);
        }

        record.status = LoanStatus::Overdue;
        let record = self.repository.loans.update(&record).await?;

        let book = self.repository.books.get_by_id(record.book_id).await?;
        self.notify(
            record.borrower_id,
            NotificationKind::Overdue,
            format!("'{}' is overdue. Please return it.", book.title),
            Some(record.id),
        )
        .await;

        Ok(true)
    }

    /// A borrower sees their own loans; staff see anyone's
    pub async fn get_loan(&self, loan_id: i64, principal: &User) -> AppResult<LoanRecord> {
        let record = self.repository.loans.get_by_id(loan_id).await?;
        if !principal.may_act_for(record.borrower_id) {
            return Err(AppError::PermissionDenied(
                "You may only view your own loans".to_string(),
            ));
        }
        Ok(record)
    }

    pub async fn list_loans_for_user(
        &self,
        user_id: i64,
        principal: &User,
    ) -> AppResult<Vec<LoanRecord>> {
        if !principal.may_act_for(user_id) {
            return Err(AppError::PermissionDenied(
                "You may only view your own loans".to_string(),
            ));
        }
        // Verify user exists
        self.repository.users.get_by_id(user_id).await?;
        self.repository.loans.list_for_user(user_id).await
    }

    /// Staff listing across all borrowers, optionally narrowed to a status
    pub async fn list_loans(
        &self,
        principal: &User,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<LoanRecord>> {
        principal.require(Action::ViewAllLoans)?;
        match status {
            Some(status) => self.repository.loans.list_by_status(status).await,
            None => self.repository.loans.list_all().await,
        }
    }

    pub async fn list_overdue(&self, principal: &User) -> AppResult<Vec<LoanRecord>> {
        principal.require(Action::ViewAllLoans)?;
        self.repository.loans.list_by_status(LoanStatus::Overdue).await
    }

    /// Running fine for an unreturned loan, the stored fine otherwise
    pub fn current_fine(&self, record: &LoanRecord) -> Decimal {
        if record.status == LoanStatus::Returned {
            record.late_fine
        } else {
            fine::accrued_fine(record, self.clock.now(), self.policy.daily_fine_rate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    use chrono::{TimeZone, Utc};

    use crate::models::book::CreateBook;
    use crate::models::user::CreateUser;
    use crate::services::clock::FixedClock;
    use crate::services::notifier::MockNotifier;

    fn ledger_with(repository: Repository, notifier: MockNotifier) -> LedgerService {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        LedgerService::new(
            repository,
            Arc::new(notifier),
            Arc::new(FixedClock::at(now)),
            Arc::new(LeaseRegistry::new(StdDuration::from_millis(250))),
            Arc::new(IdGenerator::default()),
            LoanPolicy::default(),
        )
    }

    async fn seed_user(repository: &Repository, email: &str, role: Role) -> User {
        repository
            .users
            .create(
                &CreateUser {
                    email: email.into(),
                    display_name: email.split('@').next().unwrap_or(email).into(),
                    role,
                },
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            )
            .await
            .unwrap()
    }

    async fn seed_book(repository: &Repository, copies: i32) -> i64 {
        repository
            .books
            .create(&CreateBook {
                title: "Planet of Exile".into(),
                author: "Ursula K. Le Guin".into(),
                isbn: None,
                genre: "Science Fiction".into(),
                description: String::new(),
                total_copies: copies,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn request_fans_out_to_staff_and_approve_reaches_the_borrower() {
        let repository = Repository::in_memory();
        let staff = seed_user(&repository, "staff@libris.test", Role::Staff).await;
        let member = seed_user(&repository, "member@libris.test", Role::Member).await;
        let book_id = seed_book(&repository, 1).await;

        let staff_id = staff.id;
        let member_id = member.id;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(move |n| n.kind == NotificationKind::IssueRequest && n.user_id == staff_id)
            .times(1)
            .returning(|_| ());
        notifier
            .expect_notify()
            .withf(move |n| n.kind == NotificationKind::Issued && n.user_id == member_id)
            .times(1)
            .returning(|_| ());

        let ledger = ledger_with(repository, notifier);
        let record = ledger.request_loan(book_id, &member).await.unwrap();
        ledger.approve_loan(record.id, &staff).await.unwrap();
    }

    #[tokio::test]
    async fn request_succeeds_with_an_empty_staff_roster() {
        let repository = Repository::in_memory();
        let member = seed_user(&repository, "member@libris.test", Role::Member).await;
        let book_id = seed_book(&repository, 1).await;

        // No expectations: any notify call would fail the test
        let ledger = ledger_with(repository, MockNotifier::new());
        let record = ledger.request_loan(book_id, &member).await.unwrap();
        assert_eq!(record.status, LoanStatus::Requested);
    }

    #[tokio::test]
    async fn current_fine_tracks_the_running_amount() {
        let repository = Repository::in_memory();
        let staff = seed_user(&repository, "staff@libris.test", Role::Staff).await;
        let member = seed_user(&repository, "member@libris.test", Role::Member).await;
        let book_id = seed_book(&repository, 1).await;

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| ());

        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::at(now));
        let ledger = LedgerService::new(
            repository,
            Arc::new(notifier),
            clock.clone(),
            Arc::new(LeaseRegistry::new(StdDuration::from_millis(250))),
            Arc::new(IdGenerator::default()),
            LoanPolicy::default(),
        );

        let record = ledger.request_loan(book_id, &member).await.unwrap();
        let record = ledger.approve_loan(record.id, &staff).await.unwrap();
        assert_eq!(ledger.current_fine(&record), Decimal::ZERO);

        // Two whole days past due at the default rate of 10 per day
        clock.advance(chrono::Duration::days(16));
        assert_eq!(ledger.current_fine(&record), Decimal::from(20));
    }
}
