//! Books repository: catalog storage and the copy-count guard

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

/// Catalog storage.
///
/// `reserve_copy` and `release_copy` are the only operations that change
/// `available_copies`; both are atomic check-and-mutate so a concurrent
/// issue can never drive the count negative or past `total_copies`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> AppResult<Book>;
    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>>;
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;
    async fn update(&self, id: i64, patch: &UpdateBook) -> AppResult<Book>;
    async fn delete(&self, id: i64) -> AppResult<()>;
    /// Atomically take one copy; `Unavailable` when none are left
    async fn reserve_copy(&self, id: i64) -> AppResult<Book>;
    /// Atomically give one copy back, capped at `total_copies`
    async fn release_copy(&self, id: i64) -> AppResult<Book>;
    async fn count_all(&self) -> AppResult<i64>;
    async fn count_available(&self) -> AppResult<i64>;
    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i64>) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Weighted search: title > author > genre > description
    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        match &query.q {
            Some(q) if !q.is_empty() => {
                let pattern = format!("%{}%", q);
                let books = sqlx::query_as::<_, Book>(
                    r#"
                    SELECT * FROM (
                        SELECT b.*,
                               (CASE WHEN b.title ILIKE $1 THEN 4 ELSE 0 END
                              + CASE WHEN b.author ILIKE $1 THEN 3 ELSE 0 END
                              + CASE WHEN b.genre ILIKE $1 THEN 2 ELSE 0 END
                              + CASE WHEN b.description ILIKE $1 THEN 1 ELSE 0 END) AS relevance
                        FROM books b
                    ) ranked
                    WHERE relevance > 0
                      AND ($2::boolean IS NULL OR (available_copies > 0) = $2)
                    ORDER BY relevance DESC, title
                    "#,
                )
                .bind(&pattern)
                .bind(query.available)
                .fetch_all(&self.pool)
                .await?;
                Ok(books)
            }
            _ => {
                let books = sqlx::query_as::<_, Book>(
                    r#"
                    SELECT * FROM books
                    WHERE $1::boolean IS NULL OR (available_copies > 0) = $1
                    ORDER BY title
                    "#,
                )
                .bind(query.available)
                .fetch_all(&self.pool)
                .await?;
                Ok(books)
            }
        }
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, genre, description, total_copies, available_copies, version)
            VALUES ($1, $2, $3, $4, $5, $6, $6, 0)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: i64, patch: &UpdateBook) -> AppResult<Book> {
        // Changing total_copies keeps the number of copies currently out on
        // loan constant; the new total may not fall below that number.
        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                genre = COALESCE($5, genre),
                description = COALESCE($6, description),
                available_copies = available_copies + (COALESCE($7, total_copies) - total_copies),
                total_copies = COALESCE($7, total_copies),
                version = version + 1
            WHERE id = $1
              AND available_copies + (COALESCE($7, total_copies) - total_copies) >= 0
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.author)
        .bind(&patch.isbn)
        .bind(&patch.genre)
        .bind(&patch.description)
        .bind(patch.total_copies)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(book) => Ok(book),
            None => {
                // Distinguish a missing book from a copy-count conflict
                self.get_by_id(id).await?;
                Err(AppError::Conflict(
                    "Total copies cannot fall below the number currently on loan".to_string(),
                ))
            }
        }
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }

    async fn reserve_copy(&self, id: i64) -> AppResult<Book> {
        let reserved = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, version = version + 1
            WHERE id = $1 AND available_copies > 0
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match reserved {
            Some(book) => Ok(book),
            None => {
                let book = self.get_by_id(id).await?;
                Err(AppError::Unavailable(format!(
                    "No copies of '{}' available",
                    book.title
                )))
            }
        }
    }

    async fn release_copy(&self, id: i64) -> AppResult<Book> {
        let released = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, version = version + 1
            WHERE id = $1 AND available_copies < total_copies
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match released {
            Some(book) => Ok(book),
            // Already at the cap: a no-op, not an error
            None => self.get_by_id(id).await,
        }
    }

    async fn count_all(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_available(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE available_copies > 0")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::bigint IS NULL OR id != $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}
