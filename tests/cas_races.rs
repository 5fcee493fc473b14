use greentic_media_bot::inmemory::InMemorySessionStore;
use greentic_media_bot::model::MediaType;
use greentic_media_bot::{SearchResult, SessionStore, UserId};
use std::sync::Arc;
use std::thread;

fn results_for(query: &str, n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|rank| SearchResult {
            title: format!("{query} #{rank}"),
            year: "2023".into(),
            external_id: format!("{query}{rank}"),
            media_type: MediaType::Movie,
        })
        .collect()
}

#[test]
fn same_user_updates_are_serialized() {
    let store = Arc::new(InMemorySessionStore::new());
    let user = UserId::new("counter");

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let user = user.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    store
                        .update(&user, &mut |session| {
                            session.search_seq += 1;
                            Ok(())
                        })
                        .expect("update");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    assert_eq!(store.get(&user).search_seq, 8 * 250, "no lost updates");
}

#[test]
fn search_replacement_is_never_observed_half_applied() {
    let store = Arc::new(InMemorySessionStore::new());
    let user = UserId::new("atomic");

    let writer = {
        let store = Arc::clone(&store);
        let user = user.clone();
        thread::spawn(move || {
            for round in 0..500 {
                let (query, n) = if round % 2 == 0 { ("X", 2) } else { ("Y", 3) };
                store
                    .update(&user, &mut |session| {
                        session.replace_results(query, results_for(query, n));
                        Ok(())
                    })
                    .expect("update");
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let user = user.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let session = store.get(&user);
                    if session.last_query.is_empty() {
                        continue;
                    }
                    assert!(
                        session
                            .results
                            .iter()
                            .all(|r| r.external_id.starts_with(&session.last_query)),
                        "results must belong to `{}`",
                        session.last_query
                    );
                    let expected = if session.last_query == "X" { 2 } else { 3 };
                    assert_eq!(session.results.len(), expected);
                }
            })
        })
        .collect();

    writer.join().expect("writer");
    for reader in readers {
        reader.join().expect("reader");
    }
}

#[test]
fn different_users_progress_independently() {
    let store = Arc::new(InMemorySessionStore::new());
    let workers: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let user = UserId::new(format!("user-{i}"));
                for _ in 0..50 {
                    store
                        .update(&user, &mut |session| {
                            session.search_seq += 1;
                            Ok(())
                        })
                        .expect("update");
                }
                store.get(&user).search_seq
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().expect("worker"), 50);
    }
    assert_eq!(store.len(), 16);
}
