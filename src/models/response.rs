//! Response envelope shared by every endpoint

use serde::Serialize;
use utoipa::ToSchema;

use super::book::{Book, BookList};
use super::user::{LoginResponse, UserInfo};

/// `{success, message, data?, error?}`
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    BookEnvelope = ApiResponse<Book>,
    BookListEnvelope = ApiResponse<BookList>,
    LoginEnvelope = ApiResponse<LoginResponse>,
    UserEnvelope = ApiResponse<UserInfo>
)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable error code, present on failures only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(error.into()),
        }
    }
}
