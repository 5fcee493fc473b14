use greentic_media_bot::{create_session_store, BotConfig, SessionBackendConfig, SessionState, UserId};

#[test]
fn factory_returns_inmemory_store() {
    let store = create_session_store(SessionBackendConfig::InMemory { ttl_secs: 0 });
    let user = UserId::new("user-007");

    let committed = store
        .update(&user, &mut |session| {
            session.last_query = "Heat".into();
            Ok(())
        })
        .expect("update succeeds");
    let fetched = store.get(&user);
    assert_eq!(fetched.last_query, committed.last_query);
    assert_eq!(fetched.state, SessionState::Idle);
    assert_eq!(store.len(), 1);
}

#[test]
fn config_selects_backend_ttl() {
    let config = BotConfig::from_json(r#"{"session_ttl_secs": 900}"#).expect("config parses");
    assert_eq!(
        config.session_backend(),
        SessionBackendConfig::InMemory { ttl_secs: 900 }
    );
    assert_eq!(
        BotConfig::default().session_backend(),
        SessionBackendConfig::default()
    );
}
