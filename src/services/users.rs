//! User management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{CreateUser, User, UserQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Search users with filters
    pub async fn search_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.search(query).await
    }

    /// Create a new user with email uniqueness check
    pub async fn create_user(&self, user: CreateUser) -> AppResult<User> {
        user.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.repository.users.email_exists(&user.email, None).await? {
            return Err(AppError::Conflict(
                "A user with this email already exists".to_string(),
            ));
        }

        self.repository.users.create(&user).await
    }

    /// Delete a user. Refused while the user holds open loans.
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        self.repository.users.get_by_id(id).await?;

        let open = self.repository.loans.count_open_for_user(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(format!(
                "User has {} open loan(s)",
                open
            )));
        }

        self.repository.users.delete(id).await
    }
}
