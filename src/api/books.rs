//! Book (catalog) endpoints

use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use axum_extra::extract::{multipart::MultipartRejection, Multipart};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookList, BookQuery, CoverUpload, CreateBook, UpdateBook},
        response::{ApiResponse, BookEnvelope, BookListEnvelope},
    },
    AppState,
};

use super::{invalid_input, AuthenticatedUser};

/// Multipart field carrying the cover file
pub const COVER_FIELD: &str = "cover_image";

/// Multipart body accepted by create and update
#[derive(ToSchema)]
pub struct BookForm {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub year: Option<i32>,
    pub publisher: Option<String>,
    pub author: Option<String>,
    pub synopsis: Option<String>,
    /// JPG, JPEG or PNG
    #[schema(value_type = Option<String>, format = Binary)]
    pub cover_image: Option<Vec<u8>>,
}

/// Parsed multipart submission: trimmed non-empty text fields plus the optional cover
#[derive(Debug, Default)]
struct FormData {
    fields: HashMap<String, String>,
    cover: Option<CoverUpload>,
}

impl FormData {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> AppResult<Self> {
        let mut multipart = multipart.map_err(|e| invalid_input("Invalid request data", e))?;
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| invalid_input("Invalid request data", e))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == COVER_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| invalid_input("Invalid cover upload", e))?;
                // browsers send an empty part for an untouched file input;
                // a part with content but no name still goes to the cover store to be rejected
                if !bytes.is_empty() {
                    form.cover = Some(CoverUpload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| invalid_input("Invalid request data", e))?;
            let value = value.trim();
            if !value.is_empty() {
                form.fields.insert(name, value.to_string());
            }
        }

        Ok(form)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    fn year(&mut self) -> AppResult<Option<i32>> {
        self.take("year")
            .map(|y| {
                y.parse::<i32>()
                    .map_err(|_| AppError::Validation("Year must be a number".to_string()))
            })
            .transpose()
    }

    fn into_create(mut self) -> AppResult<(CreateBook, Option<CoverUpload>)> {
        let req = CreateBook {
            year: self.year()?.unwrap_or_default(),
            title: self.take("title").unwrap_or_default(),
            isbn: self.take("isbn").unwrap_or_default(),
            publisher: self.take("publisher").unwrap_or_default(),
            author: self.take("author").unwrap_or_default(),
            synopsis: self.take("synopsis"),
        };
        Ok((req, self.cover))
    }

    fn into_update(mut self) -> AppResult<(UpdateBook, Option<CoverUpload>)> {
        let req = UpdateBook {
            year: self.year()?,
            title: self.take("title"),
            isbn: self.take("isbn"),
            publisher: self.take("publisher"),
            author: self.take("author"),
            synopsis: self.take("synopsis"),
        };
        Ok((req, self.cover))
    }
}

fn book_id(path: Result<Path<i64>, PathRejection>) -> AppResult<i64> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::Validation("Book ID must be a number".to_string()))
}

/// List books with search, filters and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Books retrieved successfully", body = BookListEnvelope),
        (status = 400, description = "Invalid query parameters")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    query: Result<Query<BookQuery>, QueryRejection>,
) -> AppResult<Json<ApiResponse<BookList>>> {
    let Query(query) = query.map_err(|e| invalid_input("Invalid query parameters", e))?;

    let list = state.services.catalog.list_books(&query).await?;
    Ok(Json(ApiResponse::ok("Books retrieved successfully", list)))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book retrieved successfully", body = BookEnvelope),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<Book>>> {
    let id = book_id(path)?;

    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(ApiResponse::ok("Book retrieved successfully", book)))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Book created successfully", body = BookEnvelope),
        (status = 400, description = "Invalid request data"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "ISBN already exists"),
        (status = 415, description = "Unsupported cover image type")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Book>>)> {
    let (req, cover) = FormData::read(multipart).await?.into_create()?;

    tracing::debug!("User {} creating book isbn={}", claims.username(), req.isbn);
    let book = state.services.catalog.create_book(req, cover).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Book created successfully", book)),
    ))
}

/// Partially update a book
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body(content = BookForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Book updated successfully", body = BookEnvelope),
        (status = 400, description = "Invalid request data"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<Book>>> {
    let id = book_id(path)?;
    let (req, cover) = FormData::read(multipart).await?.into_update()?;

    tracing::debug!("User {} updating book id={}", claims.username(), id);
    let book = state.services.catalog.update_book(id, req, cover).await?;
    Ok(Json(ApiResponse::ok("Book updated successfully", book)))
}

/// Delete a book and its cover
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book deleted successfully"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    path: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ApiResponse<()>>> {
    let id = book_id(path)?;

    tracing::debug!("User {} deleting book id={}", claims.username(), id);
    state.services.catalog.delete_book(id).await?;
    Ok(Json(ApiResponse::message("Book deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        FormData {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cover: None,
        }
    }

    #[test]
    fn test_create_form_maps_fields() {
        let (req, cover) = form(&[
            ("title", "Dune"),
            ("isbn", "111"),
            ("year", "1965"),
            ("publisher", "Chilton"),
            ("author", "Herbert"),
        ])
        .into_create()
        .unwrap();
        assert_eq!(req.title, "Dune");
        assert_eq!(req.year, 1965);
        assert_eq!(req.synopsis, None);
        assert!(cover.is_none());
    }

    #[test]
    fn test_non_numeric_year_is_rejected() {
        let err = form(&[("year", "nineteen")]).into_update().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_update_form_leaves_absent_fields_unset() {
        let (req, _) = form(&[("author", "Frank Herbert")]).into_update().unwrap();
        assert_eq!(req.author.as_deref(), Some("Frank Herbert"));
        assert!(req.title.is_none());
        assert!(req.year.is_none());
    }
}
