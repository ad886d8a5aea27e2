//! In-memory stores
//!
//! Used to run the router without a database and by the test suites. They
//! enforce the same constraints as the Postgres schema: unique ISBN, unique
//! username and never-reused identifiers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookChanges, BookFilter, NewBook, PageRequest},
        user::{NewUser, User},
    },
};

use super::{BookStore, UserStore};

/// `updated_at` must advance on every mutation, even within one clock tick
fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

#[derive(Default)]
struct BookTable {
    rows: BTreeMap<i64, Book>,
    last_id: i64,
}

impl BookTable {
    fn isbn_taken(&self, isbn: &str, excluding_id: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != excluding_id)
    }
}

#[derive(Default)]
pub struct MemoryBookStore {
    table: RwLock<BookTable>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let mut table = self.table.write().await;
        if table.isbn_taken(&book.isbn, None) {
            return Err(AppError::isbn_conflict());
        }

        table.last_id += 1;
        let now = Utc::now();
        let row = Book {
            id: table.last_id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            year: book.year,
            publisher: book.publisher.clone(),
            author: book.author.clone(),
            cover_image: book.cover_image.clone(),
            synopsis: book.synopsis.clone(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::book_not_found(id))
    }

    async fn query(&self, filter: &BookFilter, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        let table = self.table.read().await;
        let mut matching: Vec<&Book> = table.rows.values().filter(|b| filter.matches(b)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let books = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.limit as usize)
            .cloned()
            .collect();
        Ok((books, total))
    }

    async fn update_partial(&self, id: i64, changes: &BookChanges) -> AppResult<()> {
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let mut table = self.table.write().await;
        if let Some(ref isbn) = changes.isbn {
            if table.isbn_taken(isbn, Some(id)) {
                return Err(AppError::isbn_conflict());
            }
        }

        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::book_not_found(id))?;
        changes.apply_to(row);
        row.updated_at = advance(row.updated_at);
        Ok(())
    }

    async fn touch(&self, id: i64) -> AppResult<()> {
        let mut table = self.table.write().await;
        let row = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::book_not_found(id))?;
        row.updated_at = advance(row.updated_at);
        Ok(())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        self.table.write().await.rows.remove(&id);
        Ok(())
    }

    async fn exists_with_isbn(&self, isbn: &str, excluding_id: Option<i64>) -> AppResult<bool> {
        Ok(self.table.read().await.isbn_taken(isbn, excluding_id))
    }
}

#[derive(Default)]
struct UserTable {
    rows: BTreeMap<i64, User>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryUserStore {
    table: RwLock<UserTable>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &NewUser) -> AppResult<User> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("username already exists".to_string()));
        }

        table.last_id += 1;
        let now = Utc::now();
        let row = User {
            id: table.last_id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
            full_name: user.full_name.clone(),
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.table
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .table
            .read()
            .await
            .rows
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        Ok(self.get_by_username(username).await?.is_some())
    }
}
