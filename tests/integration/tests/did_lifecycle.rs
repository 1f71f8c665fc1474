//! Integration test: agent and asset DIDs through create, update, resolve
//! and delete on a single node.

use mdip_crypto::KeyPair;
use mdip_gatekeeper::{GetDidsOptions, ResolveOptions};
use mdip_integration_tests as support;
use serde_json::json;

#[tokio::test]
async fn test_agent_owns_and_edits_asset() {
    let node = support::node();
    let kp = KeyPair::generate();

    let agent = node
        .create_did(support::create_agent(&kp, "hyperswarm"))
        .await
        .expect("create agent");
    let asset = node
        .create_did(support::create_asset(&kp, &agent, "hyperswarm", json!({"name": "deed"})))
        .await
        .expect("create asset");
    assert_ne!(agent, asset);
    assert!(asset.starts_with("did:test:"));

    let doc = support::resolve(&node, &asset).await;
    assert_eq!(doc.controller(), Some(agent.as_str()));
    assert_eq!(doc.did_document_data, Some(json!({"name": "deed"})));
    assert_eq!(doc.version(), Some(1));

    // The owner's key signs the asset update on its behalf.
    let update = support::update_data(&kp, &asset, &doc, &agent, json!({"name": "deed", "lot": 7}));
    assert!(node.update_did(update).await.expect("update asset"));

    let doc = support::resolve(&node, &asset).await;
    assert_eq!(doc.version(), Some(2));
    assert_eq!(doc.did_document_data, Some(json!({"name": "deed", "lot": 7})));

    // Earlier versions stay addressable.
    let first = node
        .resolve_did(
            &asset,
            ResolveOptions {
                version_sequence: Some(1),
                ..Default::default()
            },
        )
        .await
        .expect("resolve v1");
    assert_eq!(first.did_document_data, Some(json!({"name": "deed"})));

    // A stranger cannot edit it.
    let stranger = KeyPair::generate();
    let forged = support::update_data(&stranger, &asset, &doc, &agent, json!({"stolen": true}));
    assert!(!node.update_did(forged).await.expect("verify forged update"));
}

#[tokio::test]
async fn test_deleted_did_is_deactivated_and_frozen() {
    let node = support::node();
    let kp = KeyPair::generate();
    let did = node
        .create_did(support::create_agent(&kp, "local"))
        .await
        .expect("create agent");
    let doc = support::resolve(&node, &did).await;

    assert!(node
        .delete_did(support::delete(&kp, &did, &doc, &did))
        .await
        .expect("delete"));

    let doc = support::resolve(&node, &did).await;
    assert!(doc.is_deactivated());
    assert_eq!(doc.version(), Some(2));

    let after = support::update_data(&kp, &did, &doc, &did, json!({"back": true}));
    let err = node.update_did(after).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid operation: DID deactivated");
}

#[tokio::test]
async fn test_listing_and_status_report() {
    let node = support::node();
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();

    let a = node
        .create_did(support::create_agent(&alice, "hyperswarm"))
        .await
        .unwrap();
    let b = node
        .create_did(support::create_agent(&bob, "local"))
        .await
        .unwrap();
    node.create_did(support::create_asset(&alice, &a, "hyperswarm", json!({"n": 1})))
        .await
        .unwrap();

    let listed = node
        .get_dids(GetDidsOptions::default())
        .await
        .unwrap()
        .into_dids();
    assert_eq!(listed.len(), 3);
    assert!(listed.contains(&a));
    assert!(listed.contains(&b));

    let report = node.check_dids(None).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.by_type.agents, 2);
    assert_eq!(report.by_type.assets, 1);
    assert_eq!(report.by_registry.get("hyperswarm"), Some(&2));
    assert_eq!(report.by_registry.get("local"), Some(&1));
    assert_eq!(report.by_version.get(&1), Some(&3));

    let verified = node.verify_db().await.unwrap();
    assert_eq!(verified.total, 3);
    assert_eq!(verified.verified, 3);
    assert_eq!(verified.invalid, 0);
}
