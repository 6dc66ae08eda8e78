//! Business logic services

pub mod catalog;
pub mod clock;
pub mod fine;
pub mod ledger;
pub mod notifications;
pub mod notifier;
pub mod stats;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use crate::{config::LoanPolicy, repository::Repository};

use clock::{Clock, SystemClock};
use notifier::{Notifier, StoreNotifier};

/// Container for all services
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub membership: users::MembershipService,
    pub ledger: ledger::LedgerService,
    pub notifications: notifications::NotificationsService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services on the system clock
    pub fn new(repository: Repository, policy: LoanPolicy) -> Self {
        Self::with_clock(repository, policy, Arc::new(SystemClock))
    }

    /// Create all services with an explicit clock (tests pin time with this)
    pub fn with_clock(repository: Repository, policy: LoanPolicy, clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(crate::repository::IdGenerator::default());
        let leases = Arc::new(crate::repository::LeaseRegistry::new(Duration::from_millis(
            policy.lease_wait_ms,
        )));
        let notifier: Arc<dyn Notifier> = Arc::new(StoreNotifier::new(
            repository.notifications.clone(),
            ids.clone(),
            clock.clone(),
        ));

        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            membership: users::MembershipService::new(repository.clone(), clock.clone()),
            ledger: ledger::LedgerService::new(
                repository.clone(),
                notifier,
                clock,
                leases,
                ids,
                policy,
            ),
            notifications: notifications::NotificationsService::new(repository.clone()),
            stats: stats::StatsService::new(repository),
        }
    }
}
