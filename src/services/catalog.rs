//! Catalog management service
//!
//! Couples the record store with the cover store. Cover files are written
//! before the row that references them, and compensated (deleted) when the
//! row write fails, so a record never points at a file that failed to save.

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookChanges, BookList, BookQuery, CoverUpload, CreateBook, NewBook, UpdateBook},
    repository::BookStore,
};

use super::covers::CoverStore;

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookStore>,
    covers: Arc<dyn CoverStore>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookStore>, covers: Arc<dyn CoverStore>) -> Self {
        Self { books, covers }
    }

    async fn save_cover(&self, cover: Option<CoverUpload>) -> AppResult<Option<String>> {
        match cover {
            Some(upload) => Ok(Some(
                self.covers.save(&upload.bytes, &upload.file_name).await?,
            )),
            None => Ok(None),
        }
    }

    /// List books with filters and pagination
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<BookList> {
        let page = query.page_request();
        let (books, total) = self.books.query(&query.filter(), page).await?;

        Ok(BookList {
            books,
            total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(total),
        })
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.books.get_by_id(id).await
    }

    /// Create a new book, storing the cover first when one is supplied
    pub async fn create_book(&self, req: CreateBook, cover: Option<CoverUpload>) -> AppResult<Book> {
        req.validate()?;

        if self.books.exists_with_isbn(&req.isbn, None).await? {
            return Err(AppError::isbn_conflict());
        }

        let cover_image = self.save_cover(cover).await?;
        let new_book = NewBook::from_request(req, cover_image);

        match self.books.insert(&new_book).await {
            Ok(book) => {
                tracing::info!("Created book id={} isbn={}", book.id, book.isbn);
                Ok(book)
            }
            Err(e) => {
                if let Some(ref reference) = new_book.cover_image {
                    tracing::warn!("Book insert failed, removing uploaded cover {}", reference);
                    self.covers.delete(reference).await;
                }
                Err(e)
            }
        }
    }

    /// Apply a partial update. Absent fields are left unchanged; an empty
    /// request only advances the modification timestamp.
    pub async fn update_book(
        &self,
        id: i64,
        req: UpdateBook,
        cover: Option<CoverUpload>,
    ) -> AppResult<Book> {
        req.validate()?;

        let existing = self.books.get_by_id(id).await?;

        if let Some(ref isbn) = req.isbn {
            if *isbn != existing.isbn && self.books.exists_with_isbn(isbn, Some(id)).await? {
                return Err(AppError::isbn_conflict());
            }
        }

        let new_cover = self.save_cover(cover).await?;
        let changes = BookChanges::from_request(req, new_cover.clone());

        let result = if changes.is_empty() {
            self.books.touch(id).await
        } else {
            self.books.update_partial(id, &changes).await
        };

        if let Err(e) = result {
            if let Some(ref reference) = new_cover {
                if existing.cover_image.as_ref() != Some(reference) {
                    tracing::warn!("Book {} update failed, removing uploaded cover {}", id, reference);
                    self.covers.delete(reference).await;
                }
            }
            return Err(e);
        }

        // The old cover is only dropped once the row points at the new one
        if let (Some(new), Some(old)) = (&new_cover, &existing.cover_image) {
            if new != old {
                self.covers.delete(old).await;
            }
        }

        tracing::info!("Updated book id={}", id);
        self.books.get_by_id(id).await
    }

    /// Delete a book and, best effort, its cover
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let book = self.books.get_by_id(id).await?;

        self.books.delete(id).await?;

        if let Some(ref reference) = book.cover_image {
            self.covers.delete(reference).await;
        }

        tracing::info!("Deleted book id={}", id);
        Ok(())
    }
}
