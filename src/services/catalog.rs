//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        user::{Action, User},
    },
    repository::Repository,
};

pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with relevance ranking and an optional availability filter
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.search(query).await
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Add a book to the catalog. ISBNs must be unique.
    pub async fn create_book(&self, book: CreateBook, principal: &User) -> AppResult<Book> {
        principal.require(Action::ManageCatalog)?;
        book.validate()?;

        if let Some(ref isbn) = book.isbn {
            if self.repository.books.isbn_exists(isbn, None).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, title = %created.title, "Book created");
        Ok(created)
    }

    pub async fn update_book(
        &self,
        id: i64,
        patch: UpdateBook,
        principal: &User,
    ) -> AppResult<Book> {
        principal.require(Action::ManageCatalog)?;
        patch.validate()?;

        // Check if book exists
        self.repository.books.get_by_id(id).await?;

        if let Some(ref isbn) = patch.isbn {
            if self.repository.books.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "A book with ISBN {} already exists",
                    isbn
                )));
            }
        }

        self.repository.books.update(id, &patch).await
    }

    /// Remove a book. Refused while any loan for it is still open.
    pub async fn delete_book(&self, id: i64, principal: &User) -> AppResult<()> {
        principal.require(Action::ManageCatalog)?;

        self.repository.books.get_by_id(id).await?;
        let open = self.repository.loans.count_open_for_book(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(format!(
                "Book {} has {} open loan(s) and cannot be deleted",
                id, open
            )));
        }

        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
