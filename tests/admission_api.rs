//! Admission checks through `POST /validate-ip`.

use std::sync::Arc;

use faucet_relay::admission::now_millis;
use faucet_relay::store::{is_spent, MemoryStore};
use sdk_rust::SdkError;

mod common;

use common::{spawn_faucet, DownStore, FakeLedger, LedgerMode, HOUR_MS};

const RECORD: &str = "lastWithdrawal:1.2.3.4";

#[tokio::test]
async fn test_first_check_allowed_and_recorded() {
    let store = MemoryStore::new();
    let faucet = spawn_faucet(Arc::new(store.clone()), FakeLedger::new(LedgerMode::Healthy)).await;

    let before = now_millis();
    let reply = faucet.client("1.2.3.4").check_admission().await.unwrap();
    let after = now_millis();

    assert_eq!(reply.status, 200);
    assert!(reply.body.allowed);

    // Stamps are even (unspent), so may round down by 1 ms
    let recorded = store.get(RECORD).expect("grant recorded");
    assert!(recorded + 1 >= before && recorded <= after);
    assert!(!is_spent(recorded));
}

#[tokio::test]
async fn test_recent_grant_denied() {
    let store = MemoryStore::new();
    let seeded = now_millis() - HOUR_MS;
    store.insert(RECORD, seeded);
    let faucet = spawn_faucet(Arc::new(store.clone()), FakeLedger::new(LedgerMode::Healthy)).await;

    let reply = faucet.client("1.2.3.4").check_admission().await.unwrap();
    assert!(!reply.body.allowed);

    // About 23 hours remain
    let retry_after = reply.body.retry_after_secs.unwrap();
    assert!(retry_after > 22 * 3600 && retry_after <= 23 * 3600);

    // A denial does not touch the record
    assert_eq!(store.get(RECORD), Some(seeded));
}

#[tokio::test]
async fn test_expired_grant_allowed_and_updated() {
    let store = MemoryStore::new();
    let seeded = now_millis() - 25 * HOUR_MS;
    store.insert(RECORD, seeded);
    let faucet = spawn_faucet(Arc::new(store.clone()), FakeLedger::new(LedgerMode::Healthy)).await;

    let reply = faucet.client("1.2.3.4").check_admission().await.unwrap();
    assert!(reply.body.allowed);
    assert!(store.get(RECORD).unwrap() > seeded);
}

#[tokio::test]
async fn test_second_check_denied() {
    let faucet = spawn_faucet(Arc::new(MemoryStore::new()), FakeLedger::new(LedgerMode::Healthy)).await;
    let client = faucet.client("5.6.7.8");

    assert!(client.check_admission().await.unwrap().body.allowed);
    assert!(!client.check_admission().await.unwrap().body.allowed);

    // Another identity is unaffected
    assert!(faucet.client("5.6.7.9").check_admission().await.unwrap().body.allowed);
}

#[tokio::test]
async fn test_concurrent_checks_allow_once() {
    let faucet = spawn_faucet(Arc::new(MemoryStore::new()), FakeLedger::new(LedgerMode::Healthy)).await;

    let mut handles = Vec::new();
    for _ in 0..24 {
        let client = faucet.client("9.9.9.9");
        handles.push(tokio::spawn(async move { client.check_admission().await }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().body.allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 1);
}

#[tokio::test]
async fn test_store_failure_is_not_a_denial() {
    let faucet = spawn_faucet(Arc::new(DownStore), FakeLedger::new(LedgerMode::Healthy)).await;

    let err = faucet.client("1.2.3.4").check_admission().await.unwrap_err();
    match err {
        SdkError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body.error_kind.as_deref(), Some("infrastructure"));
            assert!(body.details.unwrap().contains("connection refused"));
        }
        other => panic!("expected an API error, got {other}"),
    }
}
