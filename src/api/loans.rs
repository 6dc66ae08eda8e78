//! Loan lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::loan::{LoanRecord, LoanStatus},
    services::ledger::SweepOutcome,
};

use super::CurrentPrincipal;

/// Staff loan listing filter
#[derive(Debug, Deserialize, IntoParams)]
pub struct LoanListQuery {
    /// Narrow the listing to one lifecycle status
    pub status: Option<LoanStatus>,
}

/// Request a loan for the calling member
#[utoipa::path(
    post,
    path = "/books/{id}/request",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Loan requested", body = LoanRecord),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copies available or duplicate active loan")
    )
)]
pub async fn request_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(book_id): Path<i64>,
) -> AppResult<(StatusCode, Json<LoanRecord>)> {
    let record = state.services.ledger.request_loan(book_id, &principal).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Approve a pending request and issue the book (staff only)
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan issued", body = LoanRecord),
        (status = 403, description = "Not staff"),
        (status = 409, description = "No copies available"),
        (status = 422, description = "Loan is not in REQUESTED state")
    )
)]
pub async fn approve_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanRecord>> {
    let record = state.services.ledger.approve_loan(loan_id, &principal).await?;
    Ok(Json(record))
}

/// Reject a pending request (staff only)
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan rejected", body = LoanRecord),
        (status = 403, description = "Not staff"),
        (status = 422, description = "Loan is not in REQUESTED state")
    )
)]
pub async fn reject_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanRecord>> {
    let record = state.services.ledger.reject_loan(loan_id, &principal).await?;
    Ok(Json(record))
}

/// Record a return at the desk (staff only)
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned; any late fine is on the record", body = LoanRecord),
        (status = 403, description = "Not staff"),
        (status = 422, description = "Loan is not issued or overdue")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanRecord>> {
    let record = state.services.ledger.return_loan(loan_id, &principal).await?;
    Ok(Json(record))
}

/// Extend a loan (borrower or staff)
#[utoipa::path(
    post,
    path = "/loans/{id}/reissue",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan reissued with a new due date", body = LoanRecord),
        (status = 403, description = "Not the borrower or staff"),
        (status = 422, description = "Reissue limit reached, loan overdue, or not active")
    )
)]
pub async fn reissue_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanRecord>> {
    let record = state.services.ledger.reissue_loan(loan_id, &principal).await?;
    Ok(Json(record))
}

/// Flag issued loans past their due date as overdue (staff only).
/// Safe to run on a timer; already-flagged records are skipped.
#[utoipa::path(
    post,
    path = "/loans/sweep-overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Per-record sweep outcomes", body = Vec<SweepOutcome>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn sweep_overdue(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Vec<SweepOutcome>>> {
    principal.require(crate::models::user::Action::ValidateLoans)?;
    let outcomes = state.services.ledger.sweep_overdue().await?;
    Ok(Json(outcomes))
}

/// Get a single loan (borrower or staff)
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "The loan", body = LoanRecord),
        (status = 403, description = "Not the borrower or staff"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(loan_id): Path<i64>,
) -> AppResult<Json<LoanRecord>> {
    let record = state.services.ledger.get_loan(loan_id, &principal).await?;
    Ok(Json(record))
}

/// List all loans, optionally by status (staff only)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    params(LoanListQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = Vec<LoanRecord>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Query(query): Query<LoanListQuery>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    let records = state
        .services
        .ledger
        .list_loans(&principal, query.status)
        .await?;
    Ok(Json(records))
}

/// List overdue loans (staff only)
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Overdue loans", body = Vec<LoanRecord>),
        (status = 403, description = "Not staff")
    )
)]
pub async fn list_overdue(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<Vec<LoanRecord>>> {
    let records = state.services.ledger.list_overdue(&principal).await?;
    Ok(Json(records))
}

/// List a user's loans (self or staff)
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "The user's loans", body = Vec<LoanRecord>),
        (status = 403, description = "Not the user or staff"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    let records = state
        .services
        .ledger
        .list_loans_for_user(user_id, &principal)
        .await?;
    Ok(Json(records))
}
