use greentic_media_bot::inmemory::InMemorySessionStore;
use greentic_media_bot::{SessionStore, UserId};
use std::{thread::sleep, time::Duration};

fn remember(store: &InMemorySessionStore, user: &UserId, query: &str) {
    store
        .update(user, &mut |session| {
            session.last_query = query.to_string();
            Ok(())
        })
        .expect("update");
}

#[test]
fn inmemory_update_extends_ttl() {
    let store = InMemorySessionStore::with_ttl(2);
    let user = UserId::new("ttl-touch");

    remember(&store, &user, "first");
    sleep(Duration::from_millis(1200));
    remember(&store, &user, "second");

    sleep(Duration::from_millis(1200));
    assert_eq!(store.get(&user).last_query, "second");

    sleep(Duration::from_millis(2200));
    assert!(store.get(&user).last_query.is_empty(), "idle session expired");
}

#[test]
fn zero_ttl_never_expires() {
    let store = InMemorySessionStore::new();
    let user = UserId::new("ttl-never");
    remember(&store, &user, "kept");
    sleep(Duration::from_millis(1100));
    assert_eq!(store.get(&user).last_query, "kept");
}
