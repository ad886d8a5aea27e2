//! Books repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookChanges, BookFilter, NewBook, PageRequest},
};

use super::BookStore;

const BOOK_COLUMNS: &str =
    "id, title, isbn, year, publisher, author, cover_image, synopsis, created_at, updated_at";

/// Escape LIKE wildcards so user input is matched literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// The `books_isbn_key` constraint is the final arbiter of ISBN uniqueness
fn map_write_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::isbn_conflict(),
        _ => AppError::Database(err),
    }
}

/// Append the WHERE clause for `filter`; all filters are ANDed
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    let mut sep = " WHERE ";

    if let Some(ref term) = filter.search {
        let pattern = like_pattern(term);
        builder
            .push(sep)
            .push("(title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR author ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR publisher ILIKE ")
            .push_bind(pattern)
            .push(")");
        sep = " AND ";
    }

    if let Some(year) = filter.year {
        builder.push(sep).push("year = ").push_bind(year);
        sep = " AND ";
    }

    if let Some(ref publisher) = filter.publisher {
        builder
            .push(sep)
            .push("publisher ILIKE ")
            .push_bind(like_pattern(publisher));
        sep = " AND ";
    }

    if let Some(ref author) = filter.author {
        builder
            .push(sep)
            .push("author ILIKE ")
            .push_bind(like_pattern(author));
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookStore for BooksRepository {
    async fn insert(&self, book: &NewBook) -> AppResult<Book> {
        let query = format!(
            r#"
            INSERT INTO books (title, isbn, year, publisher, author, cover_image, synopsis)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        );

        sqlx::query_as::<_, Book>(&query)
            .bind(&book.title)
            .bind(&book.isbn)
            .bind(book.year)
            .bind(&book.publisher)
            .bind(&book.author)
            .bind(&book.cover_image)
            .bind(&book.synopsis)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        let query = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);

        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::book_not_found(id))
    }

    async fn query(&self, filter: &BookFilter, page: PageRequest) -> AppResult<(Vec<Book>, i64)> {
        tracing::debug!("Book query: {:?} page={} limit={}", filter, page.page, page.limit);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let books = select
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    async fn update_partial(&self, id: i64, changes: &BookChanges) -> AppResult<()> {
        if changes.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE books SET ");
        {
            let mut set = builder.separated(", ");
            if let Some(ref title) = changes.title {
                set.push("title = ").push_bind_unseparated(title.clone());
            }
            if let Some(ref isbn) = changes.isbn {
                set.push("isbn = ").push_bind_unseparated(isbn.clone());
            }
            if let Some(year) = changes.year {
                set.push("year = ").push_bind_unseparated(year);
            }
            if let Some(ref publisher) = changes.publisher {
                set.push("publisher = ").push_bind_unseparated(publisher.clone());
            }
            if let Some(ref author) = changes.author {
                set.push("author = ").push_bind_unseparated(author.clone());
            }
            if let Some(ref cover_image) = changes.cover_image {
                set.push("cover_image = ").push_bind_unseparated(cover_image.clone());
            }
            if let Some(ref synopsis) = changes.synopsis {
                set.push("synopsis = ").push_bind_unseparated(synopsis.clone());
            }
            set.push("updated_at = NOW()");
        }
        builder.push(" WHERE id = ").push_bind(id);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::book_not_found(id));
        }
        Ok(())
    }

    async fn touch(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("UPDATE books SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::book_not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn exists_with_isbn(&self, isbn: &str, excluding_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = excluding_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("dune"), "%dune%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_filters_render_conjunctive_where_clause() {
        let filter = BookFilter {
            search: Some("dune".into()),
            year: Some(1965),
            publisher: None,
            author: Some("herbert".into()),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_filters(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM books WHERE (title ILIKE $1 OR author ILIKE $2 OR publisher ILIKE $3) \
             AND year = $4 AND author ILIKE $5"
        );
    }

    #[test]
    fn test_empty_filter_has_no_where_clause() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_filters(&mut builder, &BookFilter::default());
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM books");
    }
}
