//! User model, roles and permission evaluation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// User roles, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(Role::Member),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// SQLx conversion for Role (stored as text)
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Operations gated by role.
///
/// Every role check in the services goes through [`Role::permits`]; handlers
/// and services never compare role strings directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Approve, reject or take back loans at the desk
    ValidateLoans,
    /// Create, update or delete catalog entries
    ManageCatalog,
    /// Create users and change roles
    ManageUsers,
    /// Browse the member directory
    ViewUsers,
    /// See loans and stats across all borrowers
    ViewAllLoans,
}

impl Role {
    /// Single permission-evaluation point: is `action` allowed for this role?
    pub fn permits(&self, action: Action) -> bool {
        match action {
            Action::ValidateLoans => matches!(self, Role::Staff | Role::Admin),
            Action::ManageCatalog => matches!(self, Role::Staff | Role::Admin),
            Action::ManageUsers => matches!(self, Role::Admin),
            Action::ViewUsers => matches!(self, Role::Staff | Role::Admin),
            Action::ViewAllLoans => matches!(self, Role::Staff | Role::Admin),
        }
    }
}

/// A library user, also the authenticated principal of a request
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn require(&self, action: Action) -> AppResult<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(format!(
                "Role '{}' may not perform this operation",
                self.role
            )))
        }
    }

    /// Members may act on their own records; staff and admins on anyone's
    pub fn may_act_for(&self, user_id: i64) -> bool {
        self.id == user_id || self.role.permits(Action::ViewAllLoans)
    }
}

/// Create user request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: String,
    pub role: Role,
}
