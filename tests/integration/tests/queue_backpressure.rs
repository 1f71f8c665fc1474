//! Integration test: an unserviced registry queue fills up, the registry is
//! suspended, and a mediator polling it brings it back.

use mdip_core::GatekeeperConfig;
use mdip_crypto::KeyPair;
use mdip_integration_tests as support;

fn config() -> GatekeeperConfig {
    GatekeeperConfig {
        registries: vec!["local".into(), "hyperswarm".into(), "TFTC".into()],
        max_queue_size: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_queue_suspends_registry_until_polled() {
    let node = support::node_with(config());

    for _ in 0..2 {
        let kp = KeyPair::generate();
        node.create_did(support::create_agent(&kp, "TFTC"))
            .await
            .expect("create on TFTC");
    }
    assert!(!node.list_registries().await.contains(&"TFTC".to_string()));

    let kp = KeyPair::generate();
    let err = node
        .create_did(support::create_agent(&kp, "TFTC"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid operation: registry TFTC not supported");

    // The fallback channel kept a copy of everything.
    assert_eq!(node.get_queue("hyperswarm").await.unwrap().len(), 2);

    let anchored = support::anchor(&node, "TFTC", 0).await;
    assert_eq!(anchored.len(), 2);
    assert!(node.list_registries().await.contains(&"TFTC".to_string()));

    node.create_did(support::create_agent(&kp, "TFTC"))
        .await
        .expect("create after the queue drained");
}

#[tokio::test]
async fn test_fallback_registry_is_never_suspended() {
    let node = support::node_with(config());

    for _ in 0..4 {
        let kp = KeyPair::generate();
        node.create_did(support::create_agent(&kp, "hyperswarm"))
            .await
            .expect("create on hyperswarm");
    }

    assert!(node.list_registries().await.contains(&"hyperswarm".to_string()));
    assert_eq!(node.get_queue("hyperswarm").await.unwrap().len(), 4);
}
