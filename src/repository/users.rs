//! Users repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, User},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<User>;
    async fn list(&self) -> AppResult<Vec<User>>;
    async fn create(&self, user: &CreateUser, now: DateTime<Utc>) -> AppResult<User>;
    /// All users holding one of the given roles (staff fan-out)
    async fn list_by_roles(&self, roles: &[Role]) -> AppResult<Vec<User>>;
    async fn count_by_role(&self, role: Role) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY display_name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn create(&self, user: &CreateUser, now: DateTime<Utc>) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, display_name, role, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("A user with email {} already exists", user.email),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_roles(&self, roles: &[Role]) -> AppResult<Vec<User>> {
        let slugs: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = ANY($1) ORDER BY display_name",
        )
        .bind(&slugs)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_by_role(&self, role: Role) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
