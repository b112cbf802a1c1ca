//! Integration test: PostgrestEnergyStore and the accumulator against an in-process PostgREST mock.

mod common;

use common::{FakeEnergyTable, MockRest};
use energy::{
    fetch_leaderboard, find_application, submit_application, EnergyStore, NewApplication,
    PostgrestClient, PostgrestEnergyStore, ReconcileOutcome, StoreError, TapAccumulator,
    WalletAddress, WhitelistChoice,
};
use serde_json::json;
use std::sync::Arc;

fn wallet(s: &str) -> WalletAddress {
    WalletAddress::parse(s).expect("wallet")
}

#[tokio::test]
async fn test_requests_carry_key_and_filters() {
    common::init_tracing();
    let mock = MockRest::spawn(|_| (200, json!([{ "energy": 17 }]).to_string()))
        .await
        .expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");

    let energy = store.fetch_energy(&wallet("0xAbC")).await.expect("fetch");
    assert_eq!(energy, Some(17));

    let reqs = mock.requests();
    assert_eq!(reqs.len(), 1);
    let req = &reqs[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/rest/v1/zevru_players");
    assert_eq!(req.query_value("select"), Some("energy"));
    assert_eq!(req.query_value("erc20"), Some("eq.0xAbC"));
    assert_eq!(req.headers.get("apikey").map(String::as_str), Some("anon-test-key"));
    assert_eq!(
        req.headers.get("authorization").map(String::as_str),
        Some("Bearer anon-test-key")
    );
}

#[tokio::test]
async fn test_missing_row_and_null_energy() {
    let table = FakeEnergyTable::default();
    table.seed("0xnull", None);
    let handler = table.clone();
    let mock = MockRest::spawn(move |req| handler.handle(req)).await.expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");

    assert_eq!(store.fetch_energy(&wallet("0xnone")).await.expect("fetch"), None);
    assert_eq!(store.fetch_energy(&wallet("0xnull")).await.expect("fetch"), Some(0));
}

#[tokio::test]
async fn test_numeric_energy_column_decodes() {
    let mock = MockRest::spawn(|_| (200, json!([{ "energy": 12.0 }]).to_string()))
        .await
        .expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");
    assert_eq!(store.fetch_energy(&wallet("0x01")).await.expect("fetch"), Some(12));
}

#[tokio::test]
async fn test_insert_and_update_bodies() {
    let table = FakeEnergyTable::default();
    let handler = table.clone();
    let mock = MockRest::spawn(move |req| handler.handle(req)).await.expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");
    let w = wallet("0x01");

    store.insert_record(&w).await.expect("insert");
    store.set_energy(&w, 33).await.expect("update");
    assert_eq!(table.energy("0x01"), Some(Some(33)));

    let reqs = mock.requests();
    assert_eq!(reqs[0].method, "POST");
    assert_eq!(reqs[0].json(), json!({ "erc20": "0x01", "energy": 0 }));
    assert_eq!(reqs[1].method, "PATCH");
    assert_eq!(reqs[1].query_value("erc20"), Some("eq.0x01"));
    assert_eq!(reqs[1].json(), json!({ "energy": 33 }));
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let mock = MockRest::spawn(|_| (401, json!({ "message": "bad key" }).to_string()))
        .await
        .expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");

    match store.fetch_energy(&wallet("0x01")).await {
        Err(StoreError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("bad key"), "body: {body}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let mock = MockRest::spawn(|_| (200, "{not json".to_string())).await.expect("mock");
    let store = PostgrestEnergyStore::new(&mock.store_config()).expect("store");
    let err = store.fetch_energy(&wallet("0x01")).await.unwrap_err();
    assert!(matches!(err, StoreError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_accumulator_session_over_http() {
    common::init_tracing();
    let table = FakeEnergyTable::default();
    table.seed("0xold", Some(10));
    let handler = table.clone();
    let mock = MockRest::spawn(move |req| handler.handle(req)).await.expect("mock");
    let store = Arc::new(PostgrestEnergyStore::new(&mock.store_config()).expect("store"));
    let acc = TapAccumulator::builder().store(store).build().expect("accumulator");

    let snap = acc.start_session(wallet("0xnew")).await;
    assert_eq!(snap.confirmed_energy, 0);
    assert_eq!(table.energy("0xnew"), Some(Some(0)));

    let snap = acc.start_session(wallet("0xold")).await;
    assert_eq!(snap.confirmed_energy, 10);
    for _ in 0..5 {
        acc.register_tap();
    }
    assert_eq!(
        acc.reconcile().await,
        ReconcileOutcome::Flushed { taps: 5, delta: 10, energy: 20 }
    );
    assert_eq!(table.energy("0xold"), Some(Some(20)));

    *table.fail_updates.lock() = true;
    acc.register_tap();
    assert!(matches!(acc.reconcile().await, ReconcileOutcome::Dropped { taps: 1, .. }));
    *table.fail_updates.lock() = false;
    assert_eq!(acc.end_session().await, Some(ReconcileOutcome::Idle));
    assert_eq!(table.energy("0xold"), Some(Some(20)));
}

#[tokio::test]
async fn test_taps_land_after_session_start_outage() {
    let table = FakeEnergyTable::default();
    let handler = table.clone();
    let mock = MockRest::spawn(move |req| handler.handle(req)).await.expect("mock");
    let store = Arc::new(PostgrestEnergyStore::new(&mock.store_config()).expect("store"));
    let acc = TapAccumulator::builder().store(store).build().expect("accumulator");

    *table.fail_reads.lock() = true;
    acc.start_session(wallet("0xlate")).await;
    assert_eq!(table.energy("0xlate"), None);
    *table.fail_reads.lock() = false;

    for _ in 0..5 {
        acc.register_tap();
    }
    assert_eq!(
        acc.reconcile().await,
        ReconcileOutcome::Flushed { taps: 5, delta: 10, energy: 10 }
    );
    assert_eq!(table.energy("0xlate"), Some(Some(10)));
}

fn application_row() -> serde_json::Value {
    json!({
        "id": 7,
        "twitter": "adazev",
        "discord_username": "ada#0001",
        "erc20": "0xAda",
        "invite_code": "adazev",
        "inviter_code": "bob"
    })
}

#[tokio::test]
async fn test_submit_application_returns_stored_row() {
    let mock = MockRest::spawn(|req| match req.method.as_str() {
        "POST" => (201, json!([application_row()]).to_string()),
        _ => (405, String::new()),
    })
    .await
    .expect("mock");
    let client = PostgrestClient::new(&mock.store_config()).expect("client");

    let form = NewApplication {
        fullname: "Ada Zev".into(),
        twitter: "adazev".into(),
        discord_username: "ada#0001".into(),
        erc20: "0xAda".into(),
        inviter_code: "bob".into(),
        bullish_reason: "taps".into(),
        whitelist_choice: WhitelistChoice::Yes,
    };
    let stored = submit_application(&client, &form).await.expect("submit");
    assert_eq!(stored.id, json!(7));
    assert_eq!(stored.invite_code, "adazev");

    let reqs = mock.requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].path, "/rest/v1/applications");
    assert_eq!(
        reqs[0].headers.get("prefer").map(String::as_str),
        Some("return=representation")
    );
    let body = reqs[0].json();
    assert_eq!(body["invite_code"], "adazev");
    assert_eq!(body["inviter_code"], "bob");
    assert_eq!(body["whitelist_choice"], "yes");
}

#[tokio::test]
async fn test_incomplete_application_is_not_sent() {
    let mock = MockRest::spawn(|_| (201, "[]".to_string())).await.expect("mock");
    let client = PostgrestClient::new(&mock.store_config()).expect("client");

    let form = NewApplication {
        fullname: "Ada Zev".into(),
        ..Default::default()
    };
    let err = submit_application(&client, &form).await.unwrap_err();
    assert_eq!(err.to_string(), "twitter is required");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_find_application_matches_any_identifier() {
    let mock = MockRest::spawn(|req| {
        let hit = req
            .query_value("or")
            .is_some_and(|or| or.contains("twitter.eq.adazev"));
        let rows = if hit { json!([application_row()]) } else { json!([]) };
        (200, rows.to_string())
    })
    .await
    .expect("mock");
    let client = PostgrestClient::new(&mock.store_config()).expect("client");

    let found = find_application(&client, "0xAda", "ada#0001", "adazev")
        .await
        .expect("lookup")
        .expect("application");
    assert_eq!(found.erc20.as_deref(), Some("0xAda"));

    let reqs = mock.requests();
    assert_eq!(
        reqs[0].query_value("or"),
        Some("(erc20.eq.0xAda,discord_username.eq.ada#0001,twitter.eq.adazev)")
    );
    assert_eq!(reqs[0].query_value("limit"), Some("1"));

    let missing = find_application(&client, "", "", "someone").await.expect("lookup");
    assert!(missing.is_none());
    assert_eq!(mock.requests()[1].query_value("or"), Some("(twitter.eq.someone)"));
}

#[tokio::test]
async fn test_leaderboard_from_applications_table() {
    let mock = MockRest::spawn(|req| {
        assert_eq!(req.path, "/rest/v1/applications");
        let rows = json!([
            { "id": 1, "twitter": "@a", "discord_username": "a#1", "erc20": "0xa", "invite_code": "AAA", "inviter_code": null },
            { "id": 2, "twitter": "@b", "discord_username": null, "erc20": "0xb", "invite_code": "bbb", "inviter_code": "aaa" },
            { "id": 3, "twitter": null, "discord_username": null, "erc20": null, "invite_code": "ccc", "inviter_code": "BBB" },
            { "id": 4, "twitter": null, "discord_username": null, "erc20": null, "invite_code": "ddd", "inviter_code": "Aaa" }
        ]);
        (200, rows.to_string())
    })
    .await
    .expect("mock");
    let client = PostgrestClient::new(&mock.store_config()).expect("client");

    let board = fetch_leaderboard(&client, energy::leaderboard::APPLICATIONS_TABLE)
        .await
        .expect("leaderboard");
    let ranked: Vec<(&str, u64)> = board
        .iter()
        .map(|e| (e.invite_code.as_str(), e.referrals))
        .collect();
    assert_eq!(ranked, vec![("AAA", 2), ("bbb", 1), ("ccc", 0), ("ddd", 0)]);
    assert_eq!(
        mock.requests()[0].query_value("select"),
        Some("id,twitter,discord_username,erc20,invite_code,inviter_code")
    );
}
