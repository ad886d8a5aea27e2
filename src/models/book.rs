//! Book record model and the request/query types around it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Book record as stored and returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub isbn: String,
    pub year: i32,
    pub publisher: String,
    pub author: String,
    /// Public reference to the cover image, e.g. `/images/cover_1700000000000000000_3f2a.png`
    pub cover_image: Option<String>,
    pub synopsis: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create book request. Everything but the synopsis is required.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 32, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(range(min = 1, max = 9999, message = "Year must be between 1 and 9999"))]
    pub year: i32,
    #[validate(length(min = 1, max = 255, message = "Publisher is required"))]
    pub publisher: String,
    #[validate(length(min = 1, max = 255, message = "Author is required"))]
    pub author: String,
    pub synopsis: Option<String>,
}

/// Row handed to the record store on insert
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub isbn: String,
    pub year: i32,
    pub publisher: String,
    pub author: String,
    pub cover_image: Option<String>,
    pub synopsis: Option<String>,
}

impl NewBook {
    pub fn from_request(req: CreateBook, cover_image: Option<String>) -> Self {
        Self {
            title: req.title,
            isbn: req.isbn,
            year: req.year,
            publisher: req.publisher,
            author: req.author,
            cover_image,
            synopsis: req.synopsis.filter(|s| !s.is_empty()),
        }
    }
}

/// Partial update request. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub isbn: Option<String>,
    #[validate(range(min = 1, max = 9999, message = "Year must be between 1 and 9999"))]
    pub year: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    pub publisher: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    pub synopsis: Option<String>,
}

/// Fieldset applied by the record store: only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub author: Option<String>,
    pub cover_image: Option<String>,
    pub synopsis: Option<String>,
}

impl BookChanges {
    pub fn from_request(req: UpdateBook, cover_image: Option<String>) -> Self {
        Self {
            title: req.title,
            isbn: req.isbn,
            year: req.year,
            publisher: req.publisher,
            author: req.author,
            cover_image,
            synopsis: req.synopsis,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.isbn.is_none()
            && self.year.is_none()
            && self.publisher.is_none()
            && self.author.is_none()
            && self.cover_image.is_none()
            && self.synopsis.is_none()
    }

    /// Apply the fieldset to an in-memory record
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref isbn) = self.isbn {
            book.isbn = isbn.clone();
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(ref publisher) = self.publisher {
            book.publisher = publisher.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if let Some(ref cover_image) = self.cover_image {
            book.cover_image = Some(cover_image.clone());
        }
        if let Some(ref synopsis) = self.synopsis {
            book.synopsis = Some(synopsis.clone());
        }
    }
}

/// Book list query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Page size (default: 10, max: 100)
    pub limit: Option<i64>,
    /// Matched against title, author and publisher
    pub search: Option<String>,
    /// Exact publication year
    pub year: Option<i32>,
    /// Publisher substring
    pub publisher: Option<String>,
    /// Author substring
    pub author: Option<String>,
}

impl BookQuery {
    /// Filters that actually constrain the scan; empty/zero values are dropped
    pub fn filter(&self) -> BookFilter {
        fn non_empty(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        BookFilter {
            search: non_empty(&self.search),
            year: self.year.filter(|y| *y > 0),
            publisher: non_empty(&self.publisher),
            author: non_empty(&self.author),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

/// Conjunctive filters for the record store scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub author: Option<String>,
}

impl BookFilter {
    /// In-memory evaluation with the same semantics as the SQL scan:
    /// case-insensitive substring matching, AND across filters
    pub fn matches(&self, book: &Book) -> bool {
        fn contains(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        if let Some(ref term) = self.search {
            if !(contains(&book.title, term)
                || contains(&book.author, term)
                || contains(&book.publisher, term))
            {
                return false;
            }
        }
        if let Some(year) = self.year {
            if book.year != year {
                return false;
            }
        }
        if let Some(ref publisher) = self.publisher {
            if !contains(&book.publisher, publisher) {
                return false;
            }
        }
        if let Some(ref author) = self.author {
            if !contains(&book.author, author) {
                return false;
            }
        }
        true
    }
}

/// Normalized paging window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// page < 1 becomes 1; limit <= 0 becomes the default; limit is capped at the maximum
    pub fn new(page: i64, limit: i64) -> Self {
        let page = page.max(1);
        let limit = if limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit.min(MAX_PAGE_SIZE)
        };
        Self { page, limit }
    }

    /// Rows to skip; saturates so an absurd page number just lands past the end
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// Paginated list envelope payload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookList {
    pub books: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// Cover file received at the boundary
#[derive(Debug, Clone)]
pub struct CoverUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Book {
        let now = Utc::now();
        Book {
            id: 1,
            title: "Dune".into(),
            isbn: "111".into(),
            year: 1965,
            publisher: "Chilton".into(),
            author: "Frank Herbert".into(),
            cover_image: None,
            synopsis: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_page_request_normalization() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(-3, 500), PageRequest { page: 1, limit: 100 });
        assert_eq!(PageRequest::new(2, 5).offset(), 5);
    }

    #[test]
    fn test_offset_saturates_for_huge_pages() {
        assert_eq!(PageRequest::new(i64::MAX, 100).offset(), i64::MAX);
        assert_eq!(PageRequest::new(i64::MAX, 1).offset(), i64::MAX - 1);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PageRequest::new(1, 5);
        assert_eq!(page.total_pages(12), 3);
        assert_eq!(page.total_pages(10), 2);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn test_filter_drops_empty_values() {
        let query = BookQuery {
            search: Some("  ".into()),
            year: Some(0),
            publisher: Some(String::new()),
            author: Some("herb".into()),
            ..Default::default()
        };
        assert_eq!(
            query.filter(),
            BookFilter {
                author: Some("herb".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_filter_search_spans_title_author_publisher() {
        let book = sample();
        let by = |term: &str| BookFilter {
            search: Some(term.into()),
            ..Default::default()
        };
        assert!(by("dun").matches(&book));
        assert!(by("HERBERT").matches(&book));
        assert!(by("chil").matches(&book));
        assert!(!by("asimov").matches(&book));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let book = sample();
        let filter = BookFilter {
            search: Some("dune".into()),
            year: Some(1966),
            ..Default::default()
        };
        assert!(!filter.matches(&book));
    }

    #[test]
    fn test_changes_apply_only_present_fields() {
        let mut book = sample();
        let changes = BookChanges {
            title: Some("Dune Messiah".into()),
            year: Some(1969),
            ..Default::default()
        };
        changes.apply_to(&mut book);
        assert_eq!(book.title, "Dune Messiah");
        assert_eq!(book.year, 1969);
        assert_eq!(book.isbn, "111");
        assert_eq!(book.author, "Frank Herbert");
        assert!(!changes.is_empty());
        assert!(BookChanges::default().is_empty());
    }

    #[test]
    fn test_create_book_validation() {
        let req = CreateBook {
            title: String::new(),
            isbn: "111".into(),
            year: 0,
            publisher: "Chilton".into(),
            author: "Herbert".into(),
            synopsis: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("year"));
        assert!(!fields.contains_key("isbn"));
    }
}
