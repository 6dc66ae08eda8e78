//! Notification fan-out collaborator.
//!
//! Notifications are best-effort side effects of ledger operations: a failed
//! delivery is logged and never fails the operation that produced it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    models::notification::{NewNotification, Notification},
    repository::{IdGenerator, NotificationRepository},
    services::clock::Clock,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fire-and-forget delivery; implementations swallow their own failures
    async fn notify(&self, note: NewNotification);
}

/// Notifier that persists notifications for clients to poll
pub struct StoreNotifier {
    notifications: Arc<dyn NotificationRepository>,
    ids: Arc<IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl StoreNotifier {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        ids: Arc<IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notifications,
            ids,
            clock,
        }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn notify(&self, note: NewNotification) {
        let notification = Notification {
            id: self.ids.next(),
            user_id: note.user_id,
            kind: note.kind,
            message: note.message,
            loan_id: note.loan_id,
            created_at: self.clock.now(),
            is_read: false,
        };

        if let Err(e) = self.notifications.insert(&notification).await {
            tracing::warn!(
                user_id = notification.user_id,
                kind = %notification.kind,
                "Failed to store notification: {}",
                e
            );
        }
    }
}
