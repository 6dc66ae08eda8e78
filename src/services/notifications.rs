//! Notification read-state service

use crate::{
    error::AppResult,
    models::{notification::Notification, user::User},
    repository::Repository,
};

pub struct NotificationsService {
    repository: Repository,
}

impl NotificationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// The caller's own notifications, newest first
    pub async fn list_own(&self, principal: &User) -> AppResult<Vec<Notification>> {
        self.repository
            .notifications
            .list_for_user(principal.id)
            .await
    }

    pub async fn mark_read(&self, id: i64, principal: &User) -> AppResult<Notification> {
        self.repository.notifications.mark_read(id, principal.id).await
    }

    pub async fn mark_all_read(&self, principal: &User) -> AppResult<u64> {
        self.repository
            .notifications
            .mark_all_read(principal.id)
            .await
    }
}
