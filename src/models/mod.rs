//! Data models for eLibrary

pub mod book;
pub mod response;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookChanges, BookFilter, BookList, BookQuery, CoverUpload, PageRequest};
pub use response::ApiResponse;
pub use user::{User, UserClaims, UserInfo};
