//! Dashboard statistics service

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{loan::LoanStatus, user::{Action, Role, User}},
    repository::Repository,
};

/// Library-wide counters shown to staff and admins
#[derive(Debug, Serialize, ToSchema)]
pub struct StaffDashboard {
    pub total_books: i64,
    pub available_books: i64,
    pub total_members: i64,
    pub pending_requests: i64,
    pub issued_loans: i64,
    pub overdue_loans: i64,
}

/// A member's own counters
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberDashboard {
    pub requested: i64,
    pub issued: i64,
    pub returned: i64,
    pub overdue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum Dashboard {
    Staff(StaffDashboard),
    Member(MemberDashboard),
}

pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Staff get the library-wide view, members their own
    pub async fn dashboard(&self, principal: &User) -> AppResult<Dashboard> {
        if principal.role.permits(Action::ViewAllLoans) {
            Ok(Dashboard::Staff(StaffDashboard {
                total_books: self.repository.books.count_all().await?,
                available_books: self.repository.books.count_available().await?,
                total_members: self.repository.users.count_by_role(Role::Member).await?,
                pending_requests: self
                    .repository
                    .loans
                    .count_by_status(LoanStatus::Requested)
                    .await?,
                issued_loans: self
                    .repository
                    .loans
                    .count_by_status(LoanStatus::Issued)
                    .await?,
                overdue_loans: self
                    .repository
                    .loans
                    .count_by_status(LoanStatus::Overdue)
                    .await?,
            }))
        } else {
            let user_id = principal.id;
            Ok(Dashboard::Member(MemberDashboard {
                requested: self
                    .repository
                    .loans
                    .count_for_user_by_status(user_id, LoanStatus::Requested)
                    .await?,
                issued: self
                    .repository
                    .loans
                    .count_for_user_by_status(user_id, LoanStatus::Issued)
                    .await?,
                returned: self
                    .repository
                    .loans
                    .count_for_user_by_status(user_id, LoanStatus::Returned)
                    .await?,
                overdue: self
                    .repository
                    .loans
                    .count_for_user_by_status(user_id, LoanStatus::Overdue)
                    .await?,
            }))
        }
    }
}
