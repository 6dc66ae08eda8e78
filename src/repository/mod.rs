//! Storage layer: repository traits with Postgres and in-memory backends

pub mod books;
pub mod ids;
pub mod leases;
pub mod loans;
pub mod memory;
pub mod notifications;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use books::BookRepository;
pub use ids::IdGenerator;
pub use leases::{Lease, LeaseRegistry};
pub use loans::LoanRepository;
pub use notifications::NotificationRepository;
pub use users::UserRepository;

/// Main repository struct bundling one store per entity
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Repository {
    /// Stores backed by a Postgres pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::PgBookRepository::new(pool.clone())),
            users: Arc::new(users::PgUserRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoanRepository::new(pool.clone())),
            notifications: Arc::new(notifications::PgNotificationRepository::new(pool)),
        }
    }

    /// In-memory stores with the same semantics; used by the test suites
    pub fn in_memory() -> Self {
        Self {
            books: Arc::new(memory::MemoryBookRepository::default()),
            users: Arc::new(memory::MemoryUserRepository::default()),
            loans: Arc::new(memory::MemoryLoanRepository::default()),
            notifications: Arc::new(memory::MemoryNotificationRepository::default()),
        }
    }
}
