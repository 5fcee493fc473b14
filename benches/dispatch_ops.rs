use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};

use criterion::{criterion_group, criterion_main, Criterion};
use greentic_media_bot::inmemory::InMemorySessionStore;
use greentic_media_bot::model::MediaType;
use greentic_media_bot::{Action, Renderer, SearchResult, Session, SessionStore, UserId};

fn bench_results(n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|rank| SearchResult {
            title: format!("Bench Title {rank}"),
            year: "2021-2023".into(),
            external_id: format!("tt{rank:07}"),
            media_type: MediaType::Series,
        })
        .collect()
}

fn codec_benches(c: &mut Criterion) {
    c.bench_function("token_decode_quality", |b| {
        b.iter(|| black_box(Action::decode(black_box("quality:tt1234567:1080"))));
    });

    c.bench_function("token_decode_rejects", |b| {
        b.iter(|| black_box(Action::decode(black_box("select:+12"))));
    });
}

fn store_benches(c: &mut Criterion) {
    let store = InMemorySessionStore::new();

    c.bench_function("inmemory_update", |b| {
        let counter = AtomicU64::new(0);
        b.iter(|| {
            let bucket = counter.fetch_add(1, Ordering::Relaxed) % 16;
            let user = UserId(format!("bench-user-{bucket}"));
            black_box(
                store
                    .update(&user, &mut |session| {
                        session.search_seq += 1;
                        Ok(())
                    })
                    .expect("update"),
            );
        });
    });

    c.bench_function("inmemory_get", |b| {
        let user = UserId::new("bench-get");
        store.get(&user);
        b.iter(|| {
            black_box(store.get(&user));
        });
    });
}

fn render_benches(c: &mut Criterion) {
    let renderer = Renderer::default();
    let mut session = Session::new(UserId::new("bench-render"));
    session.replace_results("Bench Title", bench_results(10));

    c.bench_function("render_results", |b| {
        b.iter(|| black_box(renderer.render(black_box(&session))));
    });
}

criterion_group!(dispatch_ops, codec_benches, store_benches, render_benches);
criterion_main!(dispatch_ops);
