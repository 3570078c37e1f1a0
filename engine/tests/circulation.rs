//! Circulation scenarios for lablib-engine
//!
//! These tests drive the in-memory Library through complete borrow, return
//! and resize sequences and check the availability invariant after each step.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lablib_engine::{
    CopyKey, Error, ErrorKind, HistoryScope, Library, LoanStatus, Month, NewBook, Role, User,
    UserId,
};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 10, 30, 0).unwrap()
}

fn add_user(library: &mut Library, name: &str) -> UserId {
    let id = Uuid::new_v4();
    library.register_user(User {
        id,
        student_id: format!("{}-id", name),
        name: name.to_string(),
        role: Role::User,
    });
    id
}

fn assert_consistent(library: &Library) {
    let violations = library.consistency_violations();
    assert!(violations.is_empty(), "violations: {:?}", violations);
}

// ============================================================================
// Borrow / Return
// ============================================================================

#[test]
fn borrowing_last_copy_blocks_next_borrow() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let bob = add_user(&mut library, "bob");
    let book = library
        .create_book(NewBook::new("Solo", "Author", 1).with_barcode("SOLO-1"), now())
        .unwrap();
    let key = CopyKey::Barcode("SOLO-1".into());

    library.borrow(&key, alice, now()).unwrap();
    assert_consistent(&library);

    let err = library.borrow(&key, bob, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAvailable);

    let copy_id = library.copies_of(book.id)[0].id;
    let err = library.borrow(&CopyKey::Id(copy_id), bob, now()).unwrap_err();
    assert!(matches!(err, Error::NotAvailable(_)));
    assert_consistent(&library);
}

#[test]
fn returning_never_borrowed_copy_fails() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);

    let err = library.return_copy(&key, alice, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOpenLoan);
    assert_consistent(&library);
}

#[test]
fn returning_someone_elses_loan_fails() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let bob = add_user(&mut library, "bob");
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);

    library.borrow(&key, alice, now()).unwrap();
    let err = library.return_copy(&key, bob, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOpenLoan);
    assert!(!library.copies_of(book.id)[0].is_available);
}

#[test]
fn returning_twice_fails() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);

    library.borrow(&key, alice, now()).unwrap();
    library.return_copy(&key, alice, now()).unwrap();
    let err = library.return_copy(&key, alice, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoOpenLoan);
}

#[test]
fn borrow_return_borrow_produces_two_records() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);

    let first = library.borrow(&key, alice, now()).unwrap();
    library
        .return_copy(&key, alice, now() + Duration::hours(1))
        .unwrap();
    let second = library.borrow(&key, alice, now() + Duration::hours(2)).unwrap();
    assert_ne!(first.loan_id, second.loan_id);

    let history = library.history(HistoryScope::User(alice), now() + Duration::hours(3));
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.loan_id);
    assert_eq!(history[0].status, LoanStatus::Borrowed);
    assert_eq!(history[1].id, first.loan_id);
    assert_eq!(history[1].status, LoanStatus::Returned);
    assert_consistent(&library);
}

// ============================================================================
// Copy pool
// ============================================================================

#[test]
fn resize_down_past_loans_leaves_pool_unchanged() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 3), now()).unwrap();
    let on_loan: Vec<_> = library.copies_of(book.id).iter().take(2).map(|c| c.id).collect();
    for copy in on_loan {
        library.borrow(&CopyKey::Id(copy), alice, now()).unwrap();
    }

    let err = library.resize(book.id, 1, now()).unwrap_err();
    assert_eq!(
        err,
        Error::InsufficientAvailableCopies {
            requested: 2,
            available: 1
        }
    );
    assert_eq!(library.book(book.id).unwrap().total_copies, 3);
    assert_eq!(library.copies_of(book.id).len(), 3);
    assert_consistent(&library);
}

#[test]
fn resize_up_adds_available_copies() {
    let mut library = Library::new();
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();

    library.resize(book.id, 4, now()).unwrap();

    let availability = library.availability(book.id).unwrap();
    assert_eq!(availability.total_copies, 4);
    assert_eq!(availability.available_count, 4);
    assert!(!availability.has_open_loans);
    assert_consistent(&library);
}

#[test]
fn resize_to_same_count_is_noop() {
    let mut library = Library::new();
    let book = library.create_book(NewBook::new("T", "A", 2), now()).unwrap();
    let before: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();

    library.resize(book.id, 2, now()).unwrap();

    let after: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();
    assert_eq!(before, after);
}

#[test]
fn resize_down_removes_returned_copy_with_its_history() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("H", "A", 3), now()).unwrap();
    let copies: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();

    // Every copy has been lent once; only the first is still out.
    for id in &copies {
        library.borrow(&CopyKey::Id(*id), alice, now()).unwrap();
    }
    for id in &copies[1..] {
        library.return_copy(&CopyKey::Id(*id), alice, now()).unwrap();
    }
    assert_eq!(library.history(HistoryScope::User(alice), now()).len(), 3);

    library.resize(book.id, 1, now()).unwrap();

    let remaining: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();
    assert_eq!(remaining, vec![copies[0]]);
    let history = library.history(HistoryScope::User(alice), now());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].book_copy_id, copies[0]);
    assert_eq!(history[0].status, LoanStatus::Borrowed);
    assert_eq!(
        library.book_detail(book.id, now()).unwrap().history.len(),
        1
    );
    assert_eq!(
        library.ranking(Month::of(now()), book.id).unwrap().borrow_count,
        3
    );
    assert_consistent(&library);
}

// ============================================================================
// Rankings
// ============================================================================

#[test]
fn three_borrows_count_three_and_returns_do_not_decrement() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("Hot", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);
    let month = Month::of(now());

    for i in 0..3 {
        let at = now() + Duration::hours(i);
        library.borrow(&key, alice, at).unwrap();
        library.return_copy(&key, alice, at).unwrap();
    }

    assert_eq!(library.ranking(month, book.id).unwrap().borrow_count, 3);
    let top = library.top(month, 10);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].rank, 1);
    assert_eq!(top[0].borrow_count, 3);
    assert_eq!(top[0].title, "Hot");
}

#[test]
fn rankings_are_per_month() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 1), now()).unwrap();
    let key = CopyKey::Id(library.copies_of(book.id)[0].id);

    let april = Utc.with_ymd_and_hms(2024, 4, 30, 23, 0, 0).unwrap();
    let may = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
    library.borrow(&key, alice, april).unwrap();
    library.return_copy(&key, alice, may).unwrap();
    library.borrow(&key, alice, may).unwrap();

    assert_eq!(library.ranking(Month::of(april), book.id).unwrap().borrow_count, 1);
    assert_eq!(library.ranking(Month::of(may), book.id).unwrap().borrow_count, 1);
    assert!(library.top(Month::new(2024, 6).unwrap(), 10).is_empty());
}

// ============================================================================
// End-to-end scenario
// ============================================================================

#[test]
fn two_copy_scenario() {
    let mut library = Library::new();
    let user_a = add_user(&mut library, "a");
    let user_b = add_user(&mut library, "b");
    let month = Month::of(now());

    let book = library.create_book(NewBook::new("X", "Author", 2), now()).unwrap();
    let copies: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();
    assert_eq!(copies.len(), 2);
    assert_eq!(library.available_count(book.id).unwrap(), 2);
    let (copy1, copy2) = (CopyKey::Id(copies[0]), CopyKey::Id(copies[1]));

    let receipt = library.borrow(&copy1, user_a, now()).unwrap();
    assert_eq!(receipt.due_date, now() + Duration::days(14));
    assert!(!library.copy(copies[0]).unwrap().is_available);
    assert_eq!(library.ranking(month, book.id).unwrap().borrow_count, 1);

    library.borrow(&copy2, user_b, now()).unwrap();
    assert_eq!(library.ranking(month, book.id).unwrap().borrow_count, 2);

    let err = library.resize(book.id, 1, now()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    library.return_copy(&copy1, user_a, now()).unwrap();
    assert!(library.copy(copies[0]).unwrap().is_available);

    // copy2 is still on loan, so the only available copy (copy1) goes.
    library.resize(book.id, 1, now()).unwrap();
    let remaining: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();
    assert_eq!(remaining, vec![copies[1]]);
    assert!(library.copy(copies[0]).is_err());
    assert_eq!(library.ranking(month, book.id).unwrap().borrow_count, 2);
    assert_consistent(&library);
}

// ============================================================================
// Contention
// ============================================================================

#[test]
fn ten_parallel_borrowers_one_copy() {
    let mut library = Library::new();
    let users: Vec<UserId> = (0..10)
        .map(|i| add_user(&mut library, &format!("user{}", i)))
        .collect();
    let book = library
        .create_book(NewBook::new("Rare", "A", 1).with_barcode("RARE"), now())
        .unwrap();

    let library = Arc::new(Mutex::new(library));
    let barrier = Arc::new(Barrier::new(users.len()));
    let handles: Vec<_> = users
        .into_iter()
        .map(|user| {
            let library = Arc::clone(&library);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let key = CopyKey::Barcode("RARE".into());
                library.lock().unwrap().borrow(&key, user, now())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let not_available = results
        .iter()
        .filter(|r| matches!(r, Err(Error::NotAvailable(_))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(not_available, 9);

    let library = library.lock().unwrap();
    assert_eq!(library.ranking(Month::of(now()), book.id).unwrap().borrow_count, 1);
    assert_consistent(&library);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn current_loans_and_overdue_flag() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 2), now()).unwrap();
    let copies: Vec<_> = library.copies_of(book.id).iter().map(|c| c.id).collect();

    library.borrow(&CopyKey::Id(copies[0]), alice, now()).unwrap();
    library
        .borrow(&CopyKey::Id(copies[1]), alice, now() + Duration::days(10))
        .unwrap();
    library
        .return_copy(&CopyKey::Id(copies[1]), alice, now() + Duration::days(11))
        .unwrap();

    let later = now() + Duration::days(15);
    let current = library.current_loans(alice, later);
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].book_copy_id, copies[0]);
    assert!(current[0].overdue);

    let history = library.history(HistoryScope::All, later);
    assert_eq!(history.len(), 2);
    assert!(!history[0].overdue);
}

#[test]
fn book_detail_lists_copies_and_history() {
    let mut library = Library::new();
    let alice = add_user(&mut library, "alice");
    let book = library.create_book(NewBook::new("T", "A", 2), now()).unwrap();
    let copy = library.copies_of(book.id)[0].id;
    library.borrow(&CopyKey::Id(copy), alice, now()).unwrap();

    let detail = library.book_detail(book.id, now()).unwrap();
    assert_eq!(detail.copies.len(), 2);
    assert_eq!(detail.summary.available_copies, 1);
    assert!(detail.summary.available);
    assert_eq!(detail.history.len(), 1);
    assert_eq!(detail.history[0].user_name, "alice");
}

#[test]
fn search_orders_by_title() {
    let mut library = Library::new();
    library.create_book(NewBook::new("Zebra", "Q", 1), now()).unwrap();
    library.create_book(NewBook::new("Apple", "Q", 1), now()).unwrap();
    library.create_book(NewBook::new("Mango", "R", 1), now()).unwrap();

    let titles: Vec<_> = library
        .search("q")
        .into_iter()
        .map(|s| s.book.title)
        .collect();
    assert_eq!(titles, vec!["Apple", "Zebra"]);
}
