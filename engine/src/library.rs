//! Library - the in-memory circulation state container.
//!
//! The Library owns books, their copy pools, borrow records and monthly
//! rankings, and executes every circulation operation against them. Each
//! mutating call either applies all of its effects or returns an error having
//! changed nothing. Callers that share a Library across threads wrap it in a
//! lock; the PostgreSQL server applies the same rules with row-level locks.

use std::collections::HashMap;

use crate::{
    error::{Entity, Result},
    plan_resize, rank_entries, sort_history, Availability, Book, BookCopy, BookDetail, BookId,
    BookSummary, BookUpdate, BorrowReceipt, BorrowRecord, CopyId, CopyKey, Error, HistoryScope,
    LoanId, LoanView, Month, MonthlyRanking, NewBook, RankingEntry, ResizePlan, Resolved,
    ReturnReceipt, Timestamp, User, UserId,
};
use uuid::Uuid;

/// In-memory catalog, copy pools, loans and rankings.
#[derive(Debug, Clone, Default)]
pub struct Library {
    books: HashMap<BookId, Book>,
    copies: HashMap<CopyId, BookCopy>,
    loans: HashMap<LoanId, BorrowRecord>,
    rankings: HashMap<(Month, BookId), MonthlyRanking>,
    users: HashMap<UserId, User>,
}

impl Library {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a user known to the library.
    pub fn register_user(&mut self, user: User) {
        self.users.insert(user.id, user);
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Catalog a book and create its initial copy pool.
    pub fn create_book(&mut self, input: NewBook, now: Timestamp) -> Result<Book> {
        input.validate()?;
        let book = Book::new(Uuid::new_v4(), input, now);
        let count = book.total_copies;
        self.books.insert(book.id, book.clone());
        self.create_copies(book.id, count, now)?;
        Ok(book)
    }

    /// Update metadata and resize the copy pool to the new total.
    ///
    /// A resize conflict leaves the metadata untouched.
    pub fn update_book(&mut self, book_id: BookId, update: BookUpdate, now: Timestamp) -> Result<Book> {
        update.validate()?;
        let plan = plan_resize(&self.pool_of(book_id)?, update.total_copies)?;
        self.apply_plan(book_id, &plan, now)?;

        let book = self.book_mut(book_id)?;
        book.apply_update(&update, now);
        Ok(book.clone())
    }

    /// Record (or clear) the cover image reference.
    pub fn set_cover_image(&mut self, book_id: BookId, path: Option<String>, now: Timestamp) -> Result<()> {
        let book = self.book_mut(book_id)?;
        book.image_path = path;
        book.updated_at = now;
        Ok(())
    }

    /// Remove a book together with its copies, closed loans and rankings.
    ///
    /// Refused while any copy is on loan. Returns the removed book so the
    /// caller can clean up its cover image.
    pub fn delete_book(&mut self, book_id: BookId) -> Result<Book> {
        if self.has_open_loans(book_id)? {
            return Err(Error::BookOnLoan(book_id));
        }

        let copy_ids: Vec<CopyId> = self.copies_of(book_id).iter().map(|c| c.id).collect();
        self.loans
            .retain(|_, loan| !copy_ids.contains(&loan.book_copy_id));
        self.rankings.retain(|(_, id), _| *id != book_id);
        for id in &copy_ids {
            self.copies.remove(id);
        }
        self.books
            .remove(&book_id)
            .ok_or_else(|| Error::not_found(Entity::Book, book_id))
    }

    pub fn book(&self, book_id: BookId) -> Result<&Book> {
        self.books
            .get(&book_id)
            .ok_or_else(|| Error::not_found(Entity::Book, book_id))
    }

    fn book_mut(&mut self, book_id: BookId) -> Result<&mut Book> {
        self.books
            .get_mut(&book_id)
            .ok_or_else(|| Error::not_found(Entity::Book, book_id))
    }

    /// Books matching `query`, ordered by title.
    pub fn search(&self, query: &str) -> Vec<BookSummary> {
        let mut hits: Vec<BookSummary> = self
            .books
            .values()
            .filter(|b| b.matches(query))
            .map(|b| BookSummary::new(b.clone(), self.count_available(b.id)))
            .collect();
        hits.sort_by(|a, b| a.book.title.cmp(&b.book.title).then(a.book.id.cmp(&b.book.id)));
        hits
    }

    // ------------------------------------------------------------------
    // Copy pool
    // ------------------------------------------------------------------

    /// Add `n` available copies to a book's pool.
    ///
    /// Does not touch `total_copies`; [`Library::resize`] keeps the two in
    /// step.
    pub fn create_copies(&mut self, book_id: BookId, n: usize, now: Timestamp) -> Result<Vec<CopyId>> {
        let barcode = self.book(book_id)?.copy_barcode();
        let mut created = Vec::with_capacity(n);
        for _ in 0..n {
            let mut copy = BookCopy::new(book_id, barcode.clone(), now);
            while self.serial_in_use(&copy.serial_number) {
                copy = BookCopy::new(book_id, barcode.clone(), now);
            }
            created.push(copy.id);
            self.copies.insert(copy.id, copy);
        }
        Ok(created)
    }

    /// Resize a book's pool to `new_count` copies.
    pub fn resize(&mut self, book_id: BookId, new_count: usize, now: Timestamp) -> Result<ResizePlan> {
        if new_count < 1 {
            return Err(Error::Validation("total copies must be at least 1".into()));
        }
        let plan = plan_resize(&self.pool_of(book_id)?, new_count)?;
        self.apply_plan(book_id, &plan, now)?;

        let book = self.book_mut(book_id)?;
        book.total_copies = new_count;
        book.updated_at = now;
        Ok(plan)
    }

    fn apply_plan(&mut self, book_id: BookId, plan: &ResizePlan, now: Timestamp) -> Result<()> {
        match plan {
            ResizePlan::Unchanged => {}
            ResizePlan::Grow(n) => {
                self.create_copies(book_id, *n, now)?;
            }
            ResizePlan::Shrink(ids) => {
                // Shrink only picks available copies, so their loans are all closed.
                self.loans.retain(|_, loan| !ids.contains(&loan.book_copy_id));
                for id in ids {
                    self.copies.remove(id);
                }
            }
        }
        Ok(())
    }

    /// Number of copies currently on the shelf.
    pub fn available_count(&self, book_id: BookId) -> Result<usize> {
        self.book(book_id)?;
        Ok(self.count_available(book_id))
    }

    pub fn availability(&self, book_id: BookId) -> Result<Availability> {
        let book = self.book(book_id)?;
        Ok(Availability {
            book_id,
            total_copies: book.total_copies,
            available_count: self.count_available(book_id),
            has_open_loans: self.has_open_loans(book_id)?,
        })
    }

    pub fn copy(&self, copy_id: CopyId) -> Result<&BookCopy> {
        self.copies
            .get(&copy_id)
            .ok_or_else(|| Error::not_found(Entity::Copy, copy_id))
    }

    /// Copies of a book ordered by serial number.
    pub fn copies_of(&self, book_id: BookId) -> Vec<&BookCopy> {
        let mut copies: Vec<&BookCopy> = self
            .copies
            .values()
            .filter(|c| c.book_id == book_id)
            .collect();
        copies.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        copies
    }

    fn pool_of(&self, book_id: BookId) -> Result<Vec<BookCopy>> {
        self.book(book_id)?;
        Ok(self.copies_of(book_id).into_iter().cloned().collect())
    }

    fn count_available(&self, book_id: BookId) -> usize {
        self.copies
            .values()
            .filter(|c| c.book_id == book_id && c.is_available)
            .count()
    }

    fn serial_in_use(&self, serial: &str) -> bool {
        self.copies.values().any(|c| c.serial_number == serial)
    }

    // ------------------------------------------------------------------
    // Circulation
    // ------------------------------------------------------------------

    /// Lend the copy identified by `key` to `user_id`.
    ///
    /// A barcode shared by several copies lends the available one with the
    /// lowest serial number.
    pub fn borrow(&mut self, key: &CopyKey, user_id: UserId, now: Timestamp) -> Result<BorrowReceipt> {
        if !self.users.contains_key(&user_id) {
            return Err(Error::not_found(Entity::User, user_id));
        }

        let copy_id = self.find_available(key)?;
        let copy = self
            .copies
            .get_mut(&copy_id)
            .ok_or_else(|| Error::not_found(Entity::Copy, copy_id))?;
        copy.check_out(now)?;
        let book_id = copy.book_id;

        let record = BorrowRecord::open(Uuid::new_v4(), user_id, copy_id, now);
        let receipt = BorrowReceipt {
            loan_id: record.id,
            book_id,
            book_copy_id: copy_id,
            borrowed_at: record.borrowed_at,
            due_date: record.due_date,
        };
        self.loans.insert(record.id, record);
        self.record_borrow(Month::of(now), book_id);

        Ok(receipt)
    }

    fn find_available(&self, key: &CopyKey) -> Result<CopyId> {
        match key {
            CopyKey::Id(id) => {
                let copy = self.copy(*id)?;
                if copy.is_available {
                    Ok(copy.id)
                } else {
                    Err(Error::NotAvailable(key.to_string()))
                }
            }
            CopyKey::Barcode(code) => {
                let mut matching: Vec<&BookCopy> = self
                    .copies
                    .values()
                    .filter(|c| c.barcode.as_deref() == Some(code.as_str()))
                    .collect();
                if matching.is_empty() {
                    return Err(Error::not_found(Entity::Copy, code));
                }
                matching.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
                matching
                    .into_iter()
                    .find(|c| c.is_available)
                    .map(|c| c.id)
                    .ok_or_else(|| Error::NotAvailable(key.to_string()))
            }
        }
    }

    /// Close `user_id`'s open loan on the copy identified by `key`.
    pub fn return_copy(&mut self, key: &CopyKey, user_id: UserId, now: Timestamp) -> Result<ReturnReceipt> {
        let loan_id = self.find_open_loan(key, user_id)?;
        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| Error::not_found(Entity::Loan, loan_id))?;
        let copy = self
            .copies
            .get_mut(&loan.book_copy_id)
            .ok_or_else(|| Error::not_found(Entity::Copy, loan.book_copy_id))?;

        copy.check_in(user_id, now)?;
        loan.close(now)?;

        Ok(ReturnReceipt {
            loan_id,
            book_copy_id: copy.id,
            returned_at: now,
        })
    }

    fn find_open_loan(&self, key: &CopyKey, user_id: UserId) -> Result<LoanId> {
        let copy_ids: Vec<CopyId> = match key {
            CopyKey::Id(id) => vec![self.copy(*id)?.id],
            CopyKey::Barcode(code) => {
                let ids: Vec<CopyId> = self
                    .copies
                    .values()
                    .filter(|c| c.barcode.as_deref() == Some(code.as_str()))
                    .map(|c| c.id)
                    .collect();
                if ids.is_empty() {
                    return Err(Error::not_found(Entity::Copy, code));
                }
                ids
            }
        };

        self.loans
            .values()
            .filter(|l| l.is_open() && l.user_id == user_id && copy_ids.contains(&l.book_copy_id))
            .min_by_key(|l| (l.borrowed_at, l.id))
            .map(|l| l.id)
            .ok_or_else(|| Error::NoOpenLoan {
                copy: key.to_string(),
                user: user_id.to_string(),
            })
    }

    /// Whether any copy of the book is on loan.
    pub fn has_open_loans(&self, book_id: BookId) -> Result<bool> {
        self.book(book_id)?;
        Ok(self.loans.values().any(|l| {
            l.is_open()
                && self
                    .copies
                    .get(&l.book_copy_id)
                    .is_some_and(|c| c.book_id == book_id)
        }))
    }

    // ------------------------------------------------------------------
    // Rankings
    // ------------------------------------------------------------------

    fn record_borrow(&mut self, month: Month, book_id: BookId) {
        self.rankings
            .entry((month, book_id))
            .and_modify(MonthlyRanking::record_borrow)
            .or_insert_with(|| MonthlyRanking::first(month, book_id));
    }

    pub fn ranking(&self, month: Month, book_id: BookId) -> Option<&MonthlyRanking> {
        self.rankings.get(&(month, book_id))
    }

    /// Most borrowed books of `month`.
    pub fn top(&self, month: Month, limit: usize) -> Vec<RankingEntry> {
        let entries = self
            .rankings
            .values()
            .filter(|r| r.month == month)
            .filter_map(|r| {
                let book = self.books.get(&r.book_id)?;
                Some(RankingEntry {
                    rank: 0,
                    month,
                    book_id: book.id,
                    borrow_count: r.borrow_count,
                    title: book.title.clone(),
                    author: book.author.clone(),
                    book_type: book.book_type,
                })
            })
            .collect();
        rank_entries(entries, limit)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Loans visible under `scope`, most recent first.
    pub fn history(&self, scope: HistoryScope, now: Timestamp) -> Vec<LoanView> {
        let user = scope.user();
        self.views(|l| user.map_or(true, |u| l.user_id == u), now)
    }

    /// Open loans of a user, most recent first.
    pub fn current_loans(&self, user_id: UserId, now: Timestamp) -> Vec<LoanView> {
        self.views(|l| l.is_open() && l.user_id == user_id, now)
    }

    pub fn loan_detail(&self, loan_id: LoanId, now: Timestamp) -> Result<LoanView> {
        let loan = self
            .loans
            .get(&loan_id)
            .ok_or_else(|| Error::not_found(Entity::Loan, loan_id))?;
        self.view(loan, now)
            .ok_or_else(|| Error::not_found(Entity::Loan, loan_id))
    }

    pub fn book_detail(&self, book_id: BookId, now: Timestamp) -> Result<BookDetail> {
        let book = self.book(book_id)?;
        let copies: Vec<BookCopy> = self.copies_of(book_id).into_iter().cloned().collect();
        let history = self.views(
            |l| copies.iter().any(|c| c.id == l.book_copy_id),
            now,
        );
        Ok(BookDetail {
            summary: BookSummary::new(book.clone(), self.count_available(book_id)),
            copies,
            history,
        })
    }

    fn views(&self, keep: impl Fn(&BorrowRecord) -> bool, now: Timestamp) -> Vec<LoanView> {
        let mut views: Vec<LoanView> = self
            .loans
            .values()
            .filter(|l| keep(l))
            .filter_map(|l| self.view(l, now))
            .collect();
        sort_history(&mut views);
        views
    }

    fn view(&self, loan: &BorrowRecord, now: Timestamp) -> Option<LoanView> {
        let copy = self.copies.get(&loan.book_copy_id)?;
        let book = self.books.get(&copy.book_id)?;
        let user_name = self
            .users
            .get(&loan.user_id)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        Some(
            LoanView {
                id: loan.id,
                user_id: loan.user_id,
                user_name,
                book_id: book.id,
                book_title: book.title.clone(),
                book_author: book.author.clone(),
                book_type: book.book_type,
                book_copy_id: copy.id,
                serial_number: copy.serial_number.clone(),
                borrowed_at: loan.borrowed_at,
                due_date: loan.due_date,
                returned_at: loan.returned_at,
                status: loan.status,
                overdue: false,
            }
            .at(now),
        )
    }

    /// Resolve a scanned code to a copy or a book.
    pub fn resolve(&self, code: &str) -> Result<Resolved> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::Validation("code is required".into()));
        }
        let as_id = Uuid::parse_str(code).ok();

        let mut copies: Vec<&BookCopy> = self
            .copies
            .values()
            .filter(|c| {
                Some(c.id) == as_id
                    || c.serial_number == code
                    || c.barcode.as_deref() == Some(code)
            })
            .collect();
        copies.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        if let Some(copy) = copies.first() {
            return Ok(Resolved::Copy(copy.id));
        }

        self.books
            .values()
            .find(|b| {
                Some(b.id) == as_id
                    || [&b.isbn, &b.jan, &b.ean13]
                        .into_iter()
                        .flatten()
                        .any(|s| s == code)
            })
            .map(|b| Resolved::Book(b.id))
            .ok_or_else(|| Error::not_found(Entity::Copy, code))
    }

    // ------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------

    /// Describe every broken invariant. Empty when the state is consistent.
    ///
    /// Checked: a copy is unavailable iff it has an open loan, at most one
    /// open loan per copy, every loan points at an existing copy, and each
    /// book's `total_copies` matches its pool.
    pub fn consistency_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for loan in self.loans.values() {
            if !self.copies.contains_key(&loan.book_copy_id) {
                violations.push(format!(
                    "loan {} references missing copy {}",
                    loan.id, loan.book_copy_id
                ));
            }
        }

        for copy in self.copies.values() {
            let open = self
                .loans
                .values()
                .filter(|l| l.is_open() && l.book_copy_id == copy.id)
                .count();
            if open > 1 {
                violations.push(format!("copy {} has {} open loans", copy.id, open));
            }
            if copy.is_available == (open > 0) {
                violations.push(format!(
                    "copy {} is_available={} with {} open loans",
                    copy.id, copy.is_available, open
                ));
            }
        }

        for book in self.books.values() {
            let pool = self.copies.values().filter(|c| c.book_id == book.id).count();
            if pool != book.total_copies {
                violations.push(format!(
                    "book {} total_copies={} but owns {} copies",
                    book.id, book.total_copies, pool
                ));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoanStatus, Role};
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    fn user(lib: &mut Library, name: &str) -> UserId {
        let id = Uuid::new_v4();
        lib.register_user(User {
            id,
            student_id: format!("s-{}", name),
            name: name.into(),
            role: Role::User,
        });
        id
    }

    #[test]
    fn create_book_builds_pool() {
        let mut lib = Library::new();
        let book = lib.create_book(NewBook::new("X", "A", 2), now()).unwrap();

        assert_eq!(lib.copies_of(book.id).len(), 2);
        assert_eq!(lib.available_count(book.id).unwrap(), 2);
        assert!(lib.consistency_violations().is_empty());
    }

    #[test]
    fn create_book_validates() {
        let mut lib = Library::new();
        let err = lib.create_book(NewBook::new("X", "A", 0), now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(lib.search("").is_empty());
    }

    #[test]
    fn borrow_sets_due_date_and_ranking() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let copy_id = lib.copies_of(book.id)[0].id;

        let receipt = lib.borrow(&CopyKey::Id(copy_id), alice, now()).unwrap();

        assert_eq!(receipt.due_date, now() + Duration::days(14));
        assert_eq!(receipt.book_id, book.id);
        assert!(!lib.copy(copy_id).unwrap().is_available);
        assert_eq!(
            lib.ranking(Month::of(now()), book.id).unwrap().borrow_count,
            1
        );
        assert!(lib.consistency_violations().is_empty());
    }

    #[test]
    fn borrow_unknown_user() {
        let mut lib = Library::new();
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let copy_id = lib.copies_of(book.id)[0].id;

        let err = lib
            .borrow(&CopyKey::Id(copy_id), Uuid::new_v4(), now())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                entity: Entity::User,
                ..
            }
        ));
        assert!(lib.copy(copy_id).unwrap().is_available);
    }

    #[test]
    fn borrow_by_barcode_picks_available_copy() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let bob = user(&mut lib, "bob");
        let book = lib
            .create_book(NewBook::new("X", "A", 2).with_isbn("978-0"), now())
            .unwrap();
        let key = CopyKey::Barcode("978-0".into());

        let first = lib.borrow(&key, alice, now()).unwrap();
        let second = lib.borrow(&key, bob, now()).unwrap();
        assert_ne!(first.book_copy_id, second.book_copy_id);

        let err = lib.borrow(&key, alice, now()).unwrap_err();
        assert!(matches!(err, Error::NotAvailable(_)));
        assert_eq!(lib.available_count(book.id).unwrap(), 0);
    }

    #[test]
    fn unknown_barcode_is_not_found() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let err = lib
            .borrow(&CopyKey::Barcode("nope".into()), alice, now())
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[test]
    fn return_by_wrong_user_fails() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let bob = user(&mut lib, "bob");
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let key = CopyKey::Id(lib.copies_of(book.id)[0].id);

        lib.borrow(&key, alice, now()).unwrap();
        let err = lib.return_copy(&key, bob, now()).unwrap_err();
        assert!(matches!(err, Error::NoOpenLoan { .. }));
        assert!(lib.has_open_loans(book.id).unwrap());

        let receipt = lib.return_copy(&key, alice, now()).unwrap();
        assert_eq!(receipt.returned_at, now());
        assert!(!lib.has_open_loans(book.id).unwrap());
    }

    #[test]
    fn return_closes_record() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let key = CopyKey::Id(lib.copies_of(book.id)[0].id);

        let borrowed = lib.borrow(&key, alice, now()).unwrap();
        let later = now() + Duration::days(3);
        lib.return_copy(&key, alice, later).unwrap();

        let view = lib.loan_detail(borrowed.loan_id, later).unwrap();
        assert_eq!(view.status, LoanStatus::Returned);
        assert_eq!(view.returned_at, Some(later));
        assert_eq!(view.user_name, "alice");
    }

    #[test]
    fn update_conflict_keeps_metadata() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let book = lib.create_book(NewBook::new("X", "A", 2), now()).unwrap();
        let first = CopyKey::Id(lib.copies_of(book.id)[0].id);
        let second = CopyKey::Id(lib.copies_of(book.id)[1].id);
        lib.borrow(&first, alice, now()).unwrap();
        lib.borrow(&second, alice, now()).unwrap();

        let update = BookUpdate {
            title: "Renamed".into(),
            author: "A".into(),
            isbn: None,
            location: None,
            total_copies: 1,
        };
        let err = lib.update_book(book.id, update.clone(), now()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
        assert_eq!(lib.book(book.id).unwrap().title, "X");
        assert_eq!(lib.copies_of(book.id).len(), 2);

        lib.return_copy(&first, alice, now()).unwrap();
        let updated = lib.update_book(book.id, update, now()).unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.total_copies, 1);
        assert_eq!(lib.copies_of(book.id).len(), 1);
        assert!(lib.consistency_violations().is_empty());
    }

    #[test]
    fn shrink_purges_closed_loans_of_removed_copies() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let bob = user(&mut lib, "bob");
        let book = lib.create_book(NewBook::new("X", "A", 2), now()).unwrap();
        let kept = CopyKey::Id(lib.copies_of(book.id)[0].id);
        let removed = lib.copies_of(book.id)[1].id;

        let old = lib.borrow(&CopyKey::Id(removed), alice, now()).unwrap();
        lib.return_copy(&CopyKey::Id(removed), alice, now()).unwrap();
        let open = lib.borrow(&kept, bob, now()).unwrap();

        let plan = lib.resize(book.id, 1, now()).unwrap();
        assert_eq!(plan, ResizePlan::Shrink(vec![removed]));

        let history = lib.history(HistoryScope::All, now());
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, open.loan_id);
        assert!(lib.loan_detail(old.loan_id, now()).is_err());
        assert_eq!(
            lib.ranking(Month::of(now()), book.id).unwrap().borrow_count,
            2
        );
        assert!(lib.consistency_violations().is_empty());
    }

    #[test]
    fn dangling_loan_is_a_violation() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let copy_id = lib.copies_of(book.id)[0].id;
        let key = CopyKey::Id(copy_id);
        lib.borrow(&key, alice, now()).unwrap();
        lib.return_copy(&key, alice, now()).unwrap();

        lib.copies.remove(&copy_id);
        let violations = lib.consistency_violations();
        assert!(violations.iter().any(|v| v.contains("references missing copy")));
    }

    #[test]
    fn delete_book_guarded_by_open_loans() {
        let mut lib = Library::new();
        let alice = user(&mut lib, "alice");
        let book = lib.create_book(NewBook::new("X", "A", 1), now()).unwrap();
        let key = CopyKey::Id(lib.copies_of(book.id)[0].id);
        lib.borrow(&key, alice, now()).unwrap();

        let err = lib.delete_book(book.id).unwrap_err();
        assert_eq!(err, Error::BookOnLoan(book.id));

        lib.return_copy(&key, alice, now()).unwrap();
        lib.delete_book(book.id).unwrap();

        assert!(lib.book(book.id).is_err());
        assert!(lib.history(HistoryScope::All, now()).is_empty());
        assert!(lib.ranking(Month::of(now()), book.id).is_none());
    }

    #[test]
    fn resolve_codes() {
        let mut lib = Library::new();
        let book = lib
            .create_book(NewBook::new("X", "A", 1).with_isbn("978-1"), now())
            .unwrap();
        let copy = lib.copies_of(book.id)[0].clone();

        assert_eq!(lib.resolve(&copy.id.to_string()).unwrap(), Resolved::Copy(copy.id));
        assert_eq!(lib.resolve(&copy.serial_number).unwrap(), Resolved::Copy(copy.id));
        assert_eq!(lib.resolve("978-1").unwrap(), Resolved::Copy(copy.id));
        assert_eq!(lib.resolve(&book.id.to_string()).unwrap(), Resolved::Book(book.id));
        assert!(lib.resolve("unknown").is_err());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Borrow { copy: usize, user: usize },
            Return { copy: usize, user: usize },
            Resize { count: usize },
        }

        fn arb_step() -> impl Strategy<Value = Step> {
            prop_oneof![
                (0usize..6, 0usize..3).prop_map(|(copy, user)| Step::Borrow { copy, user }),
                (0usize..6, 0usize..3).prop_map(|(copy, user)| Step::Return { copy, user }),
                (1usize..6).prop_map(|count| Step::Resize { count }),
            ]
        }

        proptest! {
            #[test]
            fn prop_availability_matches_open_loans(steps in prop::collection::vec(arb_step(), 1..40)) {
                let mut lib = Library::new();
                let users: Vec<UserId> = ["a", "b", "c"].iter().map(|n| user(&mut lib, n)).collect();
                let book = lib.create_book(NewBook::new("P", "Q", 3), now()).unwrap();
                let mut borrows = 0u64;

                for step in steps {
                    let copies: Vec<CopyId> = lib.copies_of(book.id).iter().map(|c| c.id).collect();
                    let before = lib.copies_of(book.id).len();
                    match step {
                        Step::Borrow { copy, user } => {
                            if let Some(id) = copies.get(copy) {
                                if lib.borrow(&CopyKey::Id(*id), users[user], now()).is_ok() {
                                    borrows += 1;
                                }
                            }
                        }
                        Step::Return { copy, user } => {
                            if let Some(id) = copies.get(copy) {
                                let _ = lib.return_copy(&CopyKey::Id(*id), users[user], now());
                            }
                        }
                        Step::Resize { count } => {
                            if lib.resize(book.id, count, now()).is_err() {
                                prop_assert_eq!(lib.copies_of(book.id).len(), before);
                            }
                        }
                    }
                    prop_assert!(lib.consistency_violations().is_empty(), "{:?}", lib.consistency_violations());
                }

                let counted = lib.ranking(Month::of(now()), book.id).map_or(0, |r| r.borrow_count);
                prop_assert_eq!(counted, borrows);
            }
        }
    }
}
