//! Membership service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{Action, CreateUser, User},
    repository::Repository,
    services::clock::Clock,
};

pub struct MembershipService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl MembershipService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Members see themselves; staff see anyone
    pub async fn get_user(&self, id: i64, principal: &User) -> AppResult<User> {
        if !principal.may_act_for(id) {
            return Err(AppError::PermissionDenied(
                "You may only view your own profile".to_string(),
            ));
        }
        self.repository.users.get_by_id(id).await
    }

    pub async fn list_users(&self, principal: &User) -> AppResult<Vec<User>> {
        principal.require(Action::ViewUsers)?;
        self.repository.users.list().await
    }

    /// Register a user; admin only
    pub async fn create_user(&self, user: CreateUser, principal: &User) -> AppResult<User> {
        principal.require(Action::ManageUsers)?;
        user.validate()?;

        let created = self
            .repository
            .users
            .create(&user, self.clock.now())
            .await?;
        tracing::info!(user_id = created.id, role = %created.role, "User created");
        Ok(created)
    }
}
