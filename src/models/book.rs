//! Book model and catalog request types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Catalog entry.
///
/// Invariant: `0 <= available_copies <= total_copies`. Copy counts are
/// mutated only through the repository's reserve/release guard.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    /// ISBN-13, unique across the catalog when present
    pub isbn: Option<String>,
    pub genre: String,
    pub description: String,
    pub total_copies: i32,
    pub available_copies: i32,
    /// Optimistic-concurrency token, bumped on every write
    #[serde(skip_serializing, default)]
    pub version: i64,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub author: String,
    #[validate(length(min = 10, max = 17))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0))]
    pub total_copies: i32,
}

/// Update book request (bibliographic fields and total copy count)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[validate(length(min = 10, max = 17))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub genre: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub total_copies: Option<i32>,
}

/// Catalog search query
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BookQuery {
    /// Free-text query matched against title, author, genre and description
    pub q: Option<String>,
    /// When set, only books with (or without) available copies
    pub available: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_tracks_copy_count() {
        let mut book = Book {
            id: 1,
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: Some("9780441172719".into()),
            genre: "Science Fiction".into(),
            description: String::new(),
            total_copies: 2,
            available_copies: 1,
            version: 0,
        };
        assert!(book.is_available());
        book.available_copies = 0;
        assert!(!book.is_available());
    }
}
