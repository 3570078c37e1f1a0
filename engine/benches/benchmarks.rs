//! Performance benchmarks for lablib-engine

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lablib_engine::{plan_resize, CopyKey, Library, Month, NewBook, Role, User, UserId};
use uuid::Uuid;

fn library_with_books(books: usize, copies: usize) -> (Library, UserId, Vec<String>) {
    let mut library = Library::new();
    let user = User {
        id: Uuid::new_v4(),
        student_id: "bench".into(),
        name: "Bench".into(),
        role: Role::User,
    };
    library.register_user(user.clone());

    let mut barcodes = Vec::with_capacity(books);
    for i in 0..books {
        let barcode = format!("BC-{:05}", i);
        library
            .create_book(
                NewBook::new(format!("Title {}", i), "Author", copies).with_barcode(&barcode),
                Utc::now(),
            )
            .unwrap();
        barcodes.push(barcode);
    }
    (library, user.id, barcodes)
}

fn bench_circulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("circulation");

    for books in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("borrow_return", books),
            &books,
            |b, &books| {
                let (mut library, user, barcodes) = library_with_books(books, 2);
                let key = CopyKey::Barcode(barcodes[books / 2].clone());
                b.iter(|| {
                    let now = Utc::now();
                    let receipt = library.borrow(black_box(&key), user, now).unwrap();
                    library
                        .return_copy(&CopyKey::Id(receipt.book_copy_id), user, now)
                        .unwrap()
                })
            },
        );
    }

    group.bench_function("top_rankings", |b| {
        let (mut library, user, barcodes) = library_with_books(200, 1);
        let now = Utc::now();
        for (i, barcode) in barcodes.iter().enumerate() {
            let key = CopyKey::Barcode(barcode.clone());
            for _ in 0..(i % 7) {
                let receipt = library.borrow(&key, user, now).unwrap();
                library
                    .return_copy(&CopyKey::Id(receipt.book_copy_id), user, now)
                    .unwrap();
            }
        }
        let month = Month::of(now);
        b.iter(|| library.top(black_box(month), 10))
    });

    group.finish();
}

fn bench_resize_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("resize_planning");

    for copies in [10, 100, 1000] {
        let (library, _, _) = library_with_books(1, copies);
        let book_id = library.search("")[0].book.id;
        let pool: Vec<_> = library.copies_of(book_id).into_iter().cloned().collect();

        group.bench_with_input(BenchmarkId::new("shrink_half", copies), &pool, |b, pool| {
            b.iter(|| plan_resize(black_box(pool), pool.len() / 2))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_circulation, bench_resize_planning);
criterion_main!(benches);
