//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans, notifications, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library Loan Management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::me,
        users::list_users,
        users::get_user,
        users::create_user,
        // Loans
        loans::request_loan,
        loans::approve_loan,
        loans::reject_loan,
        loans::return_loan,
        loans::reissue_loan,
        loans::sweep_overdue,
        loans::get_loan,
        loans::list_loans,
        loans::list_overdue,
        loans::get_user_loans,
        // Notifications
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        // Stats
        stats::dashboard,
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::error::ErrorResponse,
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::CreateUser,
            crate::models::loan::LoanRecord,
            crate::models::loan::LoanStatus,
            crate::models::notification::Notification,
            crate::models::notification::NotificationKind,
            crate::services::ledger::SweepOutcome,
            crate::services::stats::Dashboard,
            crate::services::stats::StaffDashboard,
            crate::services::stats::MemberDashboard,
            notifications::MarkAllReadResponse,
        )
    ),
    tags(
        (name = "health", description = "Service health"),
        (name = "books", description = "Catalog management"),
        (name = "users", description = "Membership"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "notifications", description = "Notifications"),
        (name = "stats", description = "Dashboard statistics")
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
