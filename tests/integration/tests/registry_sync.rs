//! Integration test: DIDs travelling between nodes via export/import and
//! via a registry mediator, including a reorg on the native registry.

use mdip_crypto::KeyPair;
use mdip_gatekeeper::ResolveOptions;
use mdip_integration_tests as support;
use serde_json::json;

#[tokio::test]
async fn test_export_import_between_nodes() {
    let alpha = support::node();
    let beta = support::node();
    let kp = KeyPair::generate();

    let did = alpha
        .create_did(support::create_agent(&kp, "hyperswarm"))
        .await
        .unwrap();
    let doc = support::resolve(&alpha, &did).await;
    let update = support::update_data(&kp, &did, &doc, &did, json!({"bio": "hi"}));
    assert!(alpha.update_did(update).await.unwrap());

    let exported = alpha.export_dids(Some(vec![did.clone()])).await.unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].len(), 2);

    let queued = beta.import_dids(exported.clone()).await.unwrap();
    assert_eq!(queued.queued, 2);
    assert_eq!(queued.rejected, 0);

    let processed = beta.process_events().await;
    assert_eq!(processed.added, 2);
    assert_eq!(processed.pending, 0);

    let source = support::resolve(&alpha, &did).await;
    let copy = support::resolve(&beta, &did).await;
    assert_eq!(copy.did_document_data, Some(json!({"bio": "hi"})));
    assert_eq!(support::version_id(&copy), support::version_id(&source));

    // A second import of the same logs is recognised as already seen.
    let again = beta.import_dids(exported).await.unwrap();
    assert_eq!(again.queued, 0);
    assert_eq!(again.processed, 2);
}

#[tokio::test]
async fn test_mediator_confirms_operations() {
    let origin = support::node();
    let replica = support::node();
    let kp = KeyPair::generate();

    let did = origin
        .create_did(support::create_agent(&kp, "hyperswarm"))
        .await
        .unwrap();
    let doc = support::resolve(&origin, &did).await;
    let update = support::update_data(&kp, &did, &doc, &did, json!({"step": 2}));
    assert!(origin.update_did(update).await.unwrap());

    let pending = support::resolve(&origin, &did).await;
    assert_eq!(pending.metadata().unwrap().confirmed, Some(false));

    let events = support::anchor(&origin, "hyperswarm", 0).await;
    assert_eq!(events.len(), 2);
    assert!(origin.get_queue("hyperswarm").await.unwrap().is_empty());

    for node in [&origin, &replica] {
        node.import_batch(events.clone()).await.unwrap();
        let result = node.process_events().await;
        assert_eq!(result.added, 2);
        assert_eq!(result.pending, 0);
    }

    let confirmed = origin
        .resolve_did(&did, ResolveOptions { confirm: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(confirmed.version(), Some(2));
    assert_eq!(confirmed.metadata().unwrap().confirmed, Some(true));

    let copy = support::resolve(&replica, &did).await;
    assert_eq!(copy.did_document_data, Some(json!({"step": 2})));
    assert_eq!(support::version_id(&copy), support::version_id(&confirmed));

    // The mediator's batch export carries the anchored events.
    let batch = replica.export_batch(None).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|e| e.registry == "hyperswarm"));
}

#[tokio::test]
async fn test_native_registry_resolves_fork() {
    let left = support::node();
    let right = support::node();
    let kp = KeyPair::generate();

    let did = left
        .create_did(support::create_agent(&kp, "hyperswarm"))
        .await
        .unwrap();
    let genesis = support::anchor(&left, "hyperswarm", 0).await;
    for node in [&left, &right] {
        node.import_batch(genesis.clone()).await.unwrap();
        node.process_events().await;
    }

    // Both nodes accept a different local update to the same version.
    let base = support::resolve(&left, &did).await;
    let left_update = support::update_data(&kp, &did, &base, &did, json!({"fork": "left"}));
    let right_update = support::update_data(&kp, &did, &base, &did, json!({"fork": "right"}));
    assert!(left.update_did(left_update).await.unwrap());
    assert!(right.update_did(right_update).await.unwrap());

    // The registry orders the right-hand update first.
    let winner = support::anchor(&right, "hyperswarm", 1).await;
    assert_eq!(winner.len(), 1);
    for node in [&left, &right] {
        node.import_batch(winner.clone()).await.unwrap();
        let result = node.process_events().await;
        assert_eq!(result.added, 1);
    }

    for node in [&left, &right] {
        let doc = support::resolve(node, &did).await;
        assert_eq!(doc.did_document_data, Some(json!({"fork": "right"})));
        assert_eq!(doc.version(), Some(2));
        assert_eq!(doc.metadata().unwrap().confirmed, Some(true));
        assert_eq!(node.export_did(&did).await.unwrap().len(), 2);
    }
}
