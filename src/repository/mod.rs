//! Repository layer for database operations
//!
//! The catalog and user services talk to storage through the [`BookStore`] and
//! [`UserStore`] traits. The Postgres repositories are the production
//! implementations; [`memory`] holds in-process stores with the same
//! uniqueness guarantees.

pub mod books;
pub mod memory;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookChanges, BookFilter, NewBook, PageRequest},
        user::{NewUser, User},
    },
};

/// Persistence for book rows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a row; the returned record carries the store-assigned id.
    /// An ISBN collision surfaces as `Conflict`.
    async fn insert(&self, book: &NewBook) -> AppResult<Book>;

    /// Point lookup; `NotFound` when no row matches
    async fn get_by_id(&self, id: i64) -> AppResult<Book>;

    /// Filtered, newest-first page plus the total number of matching rows
    async fn query(&self, filter: &BookFilter, page: PageRequest) -> AppResult<(Vec<Book>, i64)>;

    /// Write only the fields present in `changes` and bump `updated_at`.
    /// An empty fieldset is rejected with `Validation`.
    async fn update_partial(&self, id: i64, changes: &BookChanges) -> AppResult<()>;

    /// Bump `updated_at` without changing any field
    async fn touch(&self, id: i64) -> AppResult<()>;

    /// Remove a row. Deleting a missing id is not reported.
    async fn delete(&self, id: i64) -> AppResult<()>;

    /// Whether another row already uses `isbn`, ignoring `excluding_id`
    async fn exists_with_isbn(&self, isbn: &str, excluding_id: Option<i64>) -> AppResult<bool>;
}

/// Persistence for user accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &NewUser) -> AppResult<User>;

    async fn get_by_id(&self, id: i64) -> AppResult<User>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn username_exists(&self, username: &str) -> AppResult<bool>;
}

/// Postgres-backed stores sharing one connection pool
#[derive(Clone)]
pub struct Repository {
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool),
        }
    }
}
