//! Connection caching, liveness and redial behavior

mod common;

use common::*;
use multichain_swap_agent::chain::ConnectionManager;
use multichain_swap_agent::{ConfigError, Error};
use std::sync::Arc;

fn manager() -> (Arc<MockConnector>, ConnectionManager) {
    let connector = Arc::new(MockConnector::with_chain(Arc::new(MockChain::base())));
    let manager = ConnectionManager::new(connector.clone());
    (connector, manager)
}

#[tokio::test]
async fn healthy_client_is_reused() {
    let (connector, manager) = manager();
    let base = base_chain();

    let first = manager.connect(&base).await.unwrap();
    let second = manager.connect(&base).await.unwrap();

    assert_eq!(connector.dials(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.chain_name(), "Base");
}

#[tokio::test]
async fn unhealthy_client_is_redialed_once() {
    let (connector, manager) = manager();
    let base = base_chain();

    manager.connect(&base).await.unwrap();
    manager.mark_unhealthy("BASE").await;
    manager.connect(&base).await.unwrap();
    manager.connect(&base).await.unwrap();

    assert_eq!(connector.dials(), 2);
}

#[tokio::test]
async fn failed_dial_is_not_cached() {
    let (connector, manager) = manager();
    let mut ethereum = base_chain();
    ethereum.name = "Ethereum".to_string();
    ethereum.chain_id = 1;

    for _ in 0..2 {
        let err = manager.connect(&ethereum).await.err().unwrap();
        assert!(matches!(err, Error::Connectivity { .. }));
    }
    assert_eq!(connector.dials(), 2);
    assert!(!manager.is_cached("Ethereum").await);
}

#[tokio::test]
async fn wrong_chain_id_is_refused() {
    let (_, manager) = manager();
    let mut base = base_chain();
    base.chain_id = 84532;

    let err = manager.connect(&base).await.err().unwrap();
    assert!(matches!(
        err,
        Error::Config(ConfigError::ChainIdMismatch {
            expected: 84532,
            actual: 8453,
            ..
        })
    ));
    assert!(!manager.is_cached("Base").await);
}

#[tokio::test]
async fn evict_forgets_the_client() {
    let (connector, manager) = manager();
    let base = base_chain();

    manager.connect(&base).await.unwrap();
    manager.evict("base").await;
    assert!(!manager.is_cached("Base").await);

    manager.connect(&base).await.unwrap();
    assert_eq!(connector.dials(), 2);
}
