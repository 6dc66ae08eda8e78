//! Catalog, membership, notification and dashboard tests over the
//! in-memory stores.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use libris_server::{
    config::LoanPolicy,
    error::AppError,
    models::{
        book::{BookQuery, CreateBook, UpdateBook},
        user::{CreateUser, Role, User},
    },
    repository::Repository,
    services::{clock::{Clock, FixedClock}, stats::Dashboard, Services},
};

struct Fixture {
    repository: Repository,
    services: Services,
    admin: User,
    staff: User,
    member: User,
}

async fn fixture() -> Fixture {
    let repository = Repository::in_memory();
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let services = Services::with_clock(repository.clone(), LoanPolicy::default(), clock.clone());

    let now = clock.now();
    let mut users = Vec::new();
    for (email, name, role) in [
        ("admin@libris.test", "Ada Admin", Role::Admin),
        ("staff@libris.test", "Sam Staff", Role::Staff),
        ("member@libris.test", "Mia Member", Role::Member),
    ] {
        users.push(
            repository
                .users
                .create(
                    &CreateUser {
                        email: email.into(),
                        display_name: name.into(),
                        role,
                    },
                    now,
                )
                .await
                .unwrap(),
        );
    }
    let member = users.pop().unwrap();
    let staff = users.pop().unwrap();
    let admin = users.pop().unwrap();

    Fixture {
        repository,
        services,
        admin,
        staff,
        member,
    }
}

fn book(title: &str, author: &str, genre: &str, description: &str, copies: i32) -> CreateBook {
    CreateBook {
        title: title.into(),
        author: author.into(),
        isbn: None,
        genre: genre.into(),
        description: description.into(),
        total_copies: copies,
    }
}

#[tokio::test]
async fn search_ranks_title_over_author_over_genre() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    catalog
        .create_book(
            book("A History of Fantasy", "Jo March", "Reference", "", 1),
            &f.staff,
        )
        .await
        .unwrap();
    catalog
        .create_book(
            book("The Tombs of Atuan", "Fantasy Press Collective", "Fiction", "", 1),
            &f.staff,
        )
        .await
        .unwrap();
    catalog
        .create_book(
            book("Rocannon's World", "Ursula K. Le Guin", "Fantasy", "", 1),
            &f.staff,
        )
        .await
        .unwrap();
    catalog
        .create_book(book("Unrelated", "Nobody", "Poetry", "", 1), &f.staff)
        .await
        .unwrap();

    let hits = catalog
        .search_books(&BookQuery {
            q: Some("fantasy".into()),
            available: None,
        })
        .await
        .unwrap();

    let titles: Vec<&str> = hits.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "A History of Fantasy",   // title match
            "The Tombs of Atuan",     // author match
            "Rocannon's World",       // genre match
        ]
    );
}

#[tokio::test]
async fn search_can_filter_on_availability() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    let in_stock = catalog
        .create_book(book("In Stock", "A", "Fiction", "", 1), &f.staff)
        .await
        .unwrap();
    let out_of_stock = catalog
        .create_book(book("Out of Stock", "B", "Fiction", "", 1), &f.staff)
        .await
        .unwrap();
    f.repository
        .books
        .reserve_copy(out_of_stock.id)
        .await
        .unwrap();

    let hits = catalog
        .search_books(&BookQuery {
            q: None,
            available: Some(true),
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, in_stock.id);
}

#[tokio::test]
async fn catalog_mutations_are_staff_only() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    let err = catalog
        .create_book(book("Denied", "A", "Fiction", "", 1), &f.member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let created = catalog
        .create_book(book("Allowed", "A", "Fiction", "", 1), &f.staff)
        .await
        .unwrap();

    let err = catalog
        .update_book(
            created.id,
            UpdateBook {
                title: Some("Renamed".into()),
                author: None,
                isbn: None,
                genre: None,
                description: None,
                total_copies: None,
            },
            &f.member,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    let err = catalog.delete_book(created.id, &f.member).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn duplicate_isbn_is_a_conflict() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    let mut first = book("First", "A", "Fiction", "", 1);
    first.isbn = Some("9780141187518".into());
    catalog.create_book(first, &f.staff).await.unwrap();

    let mut second = book("Second", "B", "Fiction", "", 1);
    second.isbn = Some("9780141187518".into());
    let err = catalog.create_book(second, &f.staff).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn deleting_a_book_with_open_loans_is_refused() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    let created = catalog
        .create_book(book("Borrowed", "A", "Fiction", "", 1), &f.staff)
        .await
        .unwrap();
    let record = f
        .services
        .ledger
        .request_loan(created.id, &f.member)
        .await
        .unwrap();

    let err = catalog.delete_book(created.id, &f.staff).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    f.services
        .ledger
        .reject_loan(record.id, &f.staff)
        .await
        .unwrap();
    catalog.delete_book(created.id, &f.staff).await.unwrap();
}

#[tokio::test]
async fn shrinking_total_copies_cannot_strand_loans() {
    let f = fixture().await;
    let catalog = &f.services.catalog;

    let created = catalog
        .create_book(book("Popular", "A", "Fiction", "", 2), &f.staff)
        .await
        .unwrap();
    let record = f
        .services
        .ledger
        .request_loan(created.id, &f.member)
        .await
        .unwrap();
    f.services
        .ledger
        .approve_loan(record.id, &f.staff)
        .await
        .unwrap();

    let shrink = |total| UpdateBook {
        title: None,
        author: None,
        isbn: None,
        genre: None,
        description: None,
        total_copies: Some(total),
    };

    // One copy is out on loan: the total cannot drop to zero
    let err = catalog
        .update_book(created.id, shrink(0), &f.staff)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let updated = catalog
        .update_book(created.id, shrink(1), &f.staff)
        .await
        .unwrap();
    assert_eq!(updated.total_copies, 1);
    assert_eq!(updated.available_copies, 0);
}

#[tokio::test]
async fn user_registration_is_admin_only_and_emails_are_unique() {
    let f = fixture().await;
    let membership = &f.services.membership;

    let request = CreateUser {
        email: "new@libris.test".into(),
        display_name: "New Member".into(),
        role: Role::Member,
    };

    let err = membership
        .create_user(
            CreateUser {
                email: request.email.clone(),
                display_name: request.display_name.clone(),
                role: request.role,
            },
            &f.staff,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    membership
        .create_user(
            CreateUser {
                email: request.email.clone(),
                display_name: request.display_name.clone(),
                role: request.role,
            },
            &f.admin,
        )
        .await
        .unwrap();

    let err = membership.create_user(request, &f.admin).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn profile_visibility_is_self_or_staff() {
    let f = fixture().await;
    let membership = &f.services.membership;

    membership.get_user(f.member.id, &f.member).await.unwrap();
    membership.get_user(f.member.id, &f.staff).await.unwrap();
    let err = membership.get_user(f.staff.id, &f.member).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));

    membership.list_users(&f.staff).await.unwrap();
    let err = membership.list_users(&f.member).await.unwrap_err();
    assert!(matches!(err, AppError::PermissionDenied(_)));
}

#[tokio::test]
async fn notifications_flip_to_read_one_by_one_or_all_at_once() {
    let f = fixture().await;

    let created = f
        .services
        .catalog
        .create_book(book("Noisy", "A", "Fiction", "", 2), &f.staff)
        .await
        .unwrap();
    // Two requests, two ISSUE_REQUEST notifications for the staff member
    let first = f
        .services
        .ledger
        .request_loan(created.id, &f.member)
        .await
        .unwrap();
    f.services
        .ledger
        .reject_loan(first.id, &f.staff)
        .await
        .unwrap();
    f.services
        .ledger
        .request_loan(created.id, &f.member)
        .await
        .unwrap();

    let inbox = f.services.notifications.list_own(&f.staff).await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert!(inbox.iter().all(|n| !n.is_read));

    let flipped = f
        .services
        .notifications
        .mark_read(inbox[0].id, &f.staff)
        .await
        .unwrap();
    assert!(flipped.is_read);

    // Another user cannot read someone else's notification
    let err = f
        .services
        .notifications
        .mark_read(inbox[1].id, &f.member)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let marked = f
        .services
        .notifications
        .mark_all_read(&f.staff)
        .await
        .unwrap();
    assert_eq!(marked, 1);
    let inbox = f.services.notifications.list_own(&f.staff).await.unwrap();
    assert!(inbox.iter().all(|n| n.is_read));
}

#[tokio::test]
async fn dashboards_match_the_caller_role() {
    let f = fixture().await;

    let created = f
        .services
        .catalog
        .create_book(book("Tracked", "A", "Fiction", "", 1), &f.staff)
        .await
        .unwrap();
    let record = f
        .services
        .ledger
        .request_loan(created.id, &f.member)
        .await
        .unwrap();
    f.services
        .ledger
        .approve_loan(record.id, &f.staff)
        .await
        .unwrap();

    match f.services.stats.dashboard(&f.staff).await.unwrap() {
        Dashboard::Staff(stats) => {
            assert_eq!(stats.total_books, 1);
            assert_eq!(stats.available_books, 0);
            assert_eq!(stats.total_members, 1);
            assert_eq!(stats.pending_requests, 0);
            assert_eq!(stats.issued_loans, 1);
            assert_eq!(stats.overdue_loans, 0);
        }
        Dashboard::Member(_) => panic!("staff should see the library-wide dashboard"),
    }

    match f.services.stats.dashboard(&f.member).await.unwrap() {
        Dashboard::Member(stats) => {
            assert_eq!(stats.issued, 1);
            assert_eq!(stats.requested, 0);
            assert_eq!(stats.returned, 0);
            assert_eq!(stats.overdue, 0);
        }
        Dashboard::Staff(_) => panic!("members should only see their own counters"),
    }
}
