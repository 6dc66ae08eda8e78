//! In-memory repository implementations.
//!
//! Reference implementations of the storage traits, behaviorally equivalent
//! to the Postgres ones (same guards, same version checks, same orderings).
//! They back the integration test suites and small single-node deployments.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        loan::{LoanRecord, LoanStatus},
        notification::Notification,
        user::{CreateUser, Role, User},
    },
};

use super::{
    books::BookRepository, loans::LoanRepository, notifications::NotificationRepository,
    users::UserRepository,
};

fn poisoned() -> AppError {
    AppError::Internal("store lock poisoned".to_string())
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBookRepository {
    books: RwLock<BTreeMap<i64, Book>>,
    next_id: AtomicI64,
}

impl MemoryBookRepository {
    fn relevance(book: &Book, q: &str) -> i32 {
        let q = q.to_lowercase();
        let mut score = 0;
        if book.title.to_lowercase().contains(&q) {
            score += 4;
        }
        if book.author.to_lowercase().contains(&q) {
            score += 3;
        }
        if book.genre.to_lowercase().contains(&q) {
            score += 2;
        }
        if book.description.to_lowercase().contains(&q) {
            score += 1;
        }
        score
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        self.books
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let books = self.books.read().map_err(|_| poisoned())?;
        let mut hits: Vec<(i32, Book)> = books
            .values()
            .filter(|b| match query.available {
                Some(wanted) => b.is_available() == wanted,
                None => true,
            })
            .filter_map(|b| match &query.q {
                Some(q) if !q.is_empty() => {
                    let score = Self::relevance(b, q);
                    (score > 0).then(|| (score, b.clone()))
                }
                _ => Some((0, b.clone())),
            })
            .collect();
        hits.sort_by(|(ra, a), (rb, b)| rb.cmp(ra).then_with(|| a.title.cmp(&b.title)));
        Ok(hits.into_iter().map(|(_, b)| b).collect())
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            genre: book.genre.clone(),
            description: book.description.clone(),
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            version: 0,
        };
        books.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i64, patch: &UpdateBook) -> AppResult<Book> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let book = books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if let Some(new_total) = patch.total_copies {
            let delta = new_total - book.total_copies;
            if book.available_copies + delta < 0 {
                return Err(AppError::Conflict(
                    "Total copies cannot fall below the number currently on loan".to_string(),
                ));
            }
            book.available_copies += delta;
            book.total_copies = new_total;
        }
        if let Some(ref title) = patch.title {
            book.title = title.clone();
        }
        if let Some(ref author) = patch.author {
            book.author = author.clone();
        }
        if let Some(ref isbn) = patch.isbn {
            book.isbn = Some(isbn.clone());
        }
        if let Some(ref genre) = patch.genre {
            book.genre = genre.clone();
        }
        if let Some(ref description) = patch.description {
            book.description = description.clone();
        }
        book.version += 1;
        Ok(book.clone())
    }

    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn reserve_copy(&self, id: i64) -> AppResult<Book> {
        // Check and decrement under one write lock
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let book = books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        if book.available_copies == 0 {
            return Err(AppError::Unavailable(format!(
                "No copies of '{}' available",
                book.title
            )));
        }
        book.available_copies -= 1;
        book.version += 1;
        Ok(book.clone())
    }

    async fn release_copy(&self, id: i64) -> AppResult<Book> {
        let mut books = self.books.write().map_err(|_| poisoned())?;
        let book = books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        if book.available_copies < book.total_copies {
            book.available_copies += 1;
            book.version += 1;
        }
        Ok(book.clone())
    }

    async fn count_all(&self) -> AppResult<i64> {
        Ok(self.books.read().map_err(|_| poisoned())?.len() as i64)
    }

    async fn count_available(&self) -> AppResult<i64> {
        Ok(self
            .books
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|b| b.is_available())
            .count() as i64)
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        Ok(self
            .books
            .read()
            .map_err(|_| poisoned())?
            .values()
            .any(|b| b.isbn.as_deref() == Some(isbn) && Some(b.id) != exclude_id))
    }
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLoanRepository {
    loans: RwLock<BTreeMap<i64, LoanRecord>>,
}

#[async_trait]
impl LoanRepository for MemoryLoanRepository {
    async fn insert(&self, record: &LoanRecord) -> AppResult<LoanRecord> {
        let mut loans = self.loans.write().map_err(|_| poisoned())?;
        // Mirrors the partial unique index on open (book, borrower) pairs
        let duplicate = loans
            .values()
            .any(|l| l.book_id == record.book_id && l.borrower_id == record.borrower_id && l.is_open());
        if duplicate {
            return Err(AppError::DuplicateActiveLoan(format!(
                "User {} already has an open loan for book {}",
                record.borrower_id, record.book_id
            )));
        }
        let mut record = record.clone();
        record.version = 0;
        loans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<LoanRecord> {
        self.loans
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn update(&self, record: &LoanRecord) -> AppResult<LoanRecord> {
        let mut loans = self.loans.write().map_err(|_| poisoned())?;
        let stored = loans
            .get_mut(&record.id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", record.id)))?;
        if stored.version != record.version {
            return Err(AppError::Busy(format!(
                "Loan {} was modified concurrently",
                record.id
            )));
        }
        let mut updated = record.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_open(&self, book_id: i64, borrower_id: i64) -> AppResult<Option<LoanRecord>> {
        Ok(self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .find(|l| l.book_id == book_id && l.borrower_id == borrower_id && l.is_open())
            .cloned())
    }

    async fn count_open_for_book(&self, book_id: i64) -> AppResult<i64> {
        Ok(self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.book_id == book_id && l.is_open())
            .count() as i64)
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<LoanRecord>> {
        let mut records: Vec<LoanRecord> = self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.borrower_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(records)
    }

    async fn list_all(&self) -> AppResult<Vec<LoanRecord>> {
        let mut records: Vec<LoanRecord> = self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(records)
    }

    async fn list_by_status(&self, status: LoanStatus) -> AppResult<Vec<LoanRecord>> {
        let mut records: Vec<LoanRecord> = self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.status == status)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(records)
    }

    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanRecord>> {
        let mut records: Vec<LoanRecord> = self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.status == LoanStatus::Issued && l.is_past_due(now))
            .cloned()
            .collect();
        records.sort_by_key(|l| l.due_at);
        Ok(records)
    }

    async fn count_by_status(&self, status: LoanStatus) -> AppResult<i64> {
        Ok(self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.status == status)
            .count() as i64)
    }

    async fn count_for_user_by_status(&self, user_id: i64, status: LoanStatus) -> AppResult<i64> {
        Ok(self
            .loans
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|l| l.borrower_id == user_id && l.status == status)
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        self.users
            .read()
            .map_err(|_| poisoned())?
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .map_err(|_| poisoned())?
            .values()
            .cloned()
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(users)
    }

    async fn create(&self, user: &CreateUser, now: DateTime<Utc>) -> AppResult<User> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = User {
            id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            created_at: now,
        };
        users.insert(id, created.clone());
        Ok(created)
    }

    async fn list_by_roles(&self, roles: &[Role]) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|u| roles.contains(&u.role))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(users)
    }

    async fn count_by_role(&self, role: Role) -> AppResult<i64> {
        Ok(self
            .users
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|u| u.role == role)
            .count() as i64)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryNotificationRepository {
    notifications: RwLock<BTreeMap<i64, Notification>>,
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, notification: &Notification) -> AppResult<Notification> {
        let mut notifications = self.notifications.write().map_err(|_| poisoned())?;
        notifications.insert(notification.id, notification.clone());
        Ok(notification.clone())
    }

    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .read()
            .map_err(|_| poisoned())?
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> AppResult<Notification> {
        let mut notifications = self.notifications.write().map_err(|_| poisoned())?;
        let notification = notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Notification with id {} not found", id)))?;
        notification.is_read = true;
        Ok(notification.clone())
    }

    async fn mark_all_read(&self, user_id: i64) -> AppResult<u64> {
        let mut notifications = self.notifications.write().map_err(|_| poisoned())?;
        let mut flipped = 0;
        for notification in notifications.values_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}
