//! Notifications repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::Notification,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> AppResult<Notification>;
    /// Newest first
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>>;
    /// Mark one of the recipient's own notifications as read
    async fn mark_read(&self, id: i64, user_id: i64) -> AppResult<Notification>;
    /// Returns the number of notifications flipped to read
    async fn mark_all_read(&self, user_id: i64) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &Notification) -> AppResult<Notification> {
        let inserted = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, kind, message, loan_id, created_at, is_read)
            VALUES ($1, $2, $3, $4, $5, $6, false)
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.kind)
        .bind(&notification.message)
        .bind(notification.loan_id)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification with id {} not found", id)))
    }

    async fn mark_all_read(&self, user_id: i64) -> AppResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND NOT is_read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
