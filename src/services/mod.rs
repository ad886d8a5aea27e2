//! Business logic services

pub mod catalog;
pub mod covers;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, UploadConfig},
    repository::{
        memory::{MemoryBookStore, MemoryUserStore},
        BookStore, Repository, UserStore,
    },
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
}

impl Services {
    /// Wire services over explicit stores
    pub fn new(
        book_store: Arc<dyn BookStore>,
        user_store: Arc<dyn UserStore>,
        cover_store: Arc<dyn covers::CoverStore>,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            catalog: catalog::CatalogService::new(book_store, cover_store),
            users: users::UsersService::new(user_store, auth_config),
        }
    }

    /// Postgres-backed services with covers on the local filesystem
    pub fn with_repository(
        repository: Repository,
        auth_config: AuthConfig,
        upload_config: &UploadConfig,
    ) -> Self {
        Self::new(
            Arc::new(repository.books),
            Arc::new(repository.users),
            Arc::new(covers::LocalCoverStore::new(upload_config)),
            auth_config,
        )
    }

    /// In-memory services, used when running without a database and in tests
    pub fn in_memory(auth_config: AuthConfig, upload_config: &UploadConfig) -> Self {
        Self::new(
            Arc::new(MemoryBookStore::new()),
            Arc::new(MemoryUserStore::new()),
            Arc::new(covers::LocalCoverStore::new(upload_config)),
            auth_config,
        )
    }
}
