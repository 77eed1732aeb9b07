//! Business logic services

pub mod catalog;
pub mod lending;
pub mod users;

use crate::{config::LendingConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub lending: lending::LendingService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, lending_config: LendingConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            users: users::UsersService::new(repository.clone()),
            lending: lending::LendingService::new(repository, lending_config),
        }
    }
}
