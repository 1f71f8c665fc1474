//! Signed operation builders and an in-memory node for the scenario tests.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use mdip_core::{
    GatekeeperConfig, GatekeeperEvent, Mdip, MdipDocument, MdipType, Operation, OperationType,
    Signature,
};
use mdip_crypto::{hash_json, sign_hash, KeyPair};
use mdip_gatekeeper::{Gatekeeper, MemoryCas, MemoryDb, ResolveOptions};
use serde_json::Value;

pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A gatekeeper backed by in-memory stores.
pub fn node() -> Gatekeeper {
    node_with(GatekeeperConfig::default())
}

pub fn node_with(config: GatekeeperConfig) -> Gatekeeper {
    Gatekeeper::new(config, Arc::new(MemoryDb::new()), Arc::new(MemoryCas::new()))
        .expect("valid gatekeeper config")
}

pub fn sign(mut op: Operation, keypair: &KeyPair, signer: Option<&str>) -> Operation {
    op.signature = None;
    let hash = hash_json(&op).expect("hash operation");
    let value = sign_hash(&hash, keypair).expect("sign operation");
    op.signature = Some(Signature {
        signer: signer.map(str::to_string),
        signed: now(),
        hash,
        value,
    });
    op
}

pub fn create_agent(keypair: &KeyPair, registry: &str) -> Operation {
    let mut op = Operation::new(OperationType::Create);
    op.created = Some(now());
    op.mdip = Some(Mdip::new(MdipType::Agent, registry));
    op.public_jwk = Some(keypair.public_jwk());
    sign(op, keypair, None)
}

pub fn create_asset(keypair: &KeyPair, owner: &str, registry: &str, data: Value) -> Operation {
    let mut op = Operation::new(OperationType::Create);
    op.created = Some(now());
    op.mdip = Some(Mdip::new(MdipType::Asset, registry));
    op.controller = Some(owner.to_string());
    op.data = Some(data);
    sign(op, keypair, Some(owner))
}

/// Update `did` to carry `data`, chained onto the version in `doc`.
pub fn update_data(keypair: &KeyPair, did: &str, doc: &MdipDocument, signer: &str, data: Value) -> Operation {
    let mut next = doc.clone();
    next.did_document_data = Some(data);

    let mut op = Operation::new(OperationType::Update);
    op.did = Some(did.to_string());
    op.doc = Some(serde_json::to_value(&next).expect("serialize document"));
    op.previd = version_id(doc);
    sign(op, keypair, Some(signer))
}

pub fn delete(keypair: &KeyPair, did: &str, doc: &MdipDocument, signer: &str) -> Operation {
    let mut op = Operation::new(OperationType::Delete);
    op.did = Some(did.to_string());
    op.previd = version_id(doc);
    sign(op, keypair, Some(signer))
}

pub fn version_id(doc: &MdipDocument) -> Option<String> {
    doc.metadata().and_then(|m| m.version_id.clone())
}

pub async fn resolve(node: &Gatekeeper, did: &str) -> MdipDocument {
    node.resolve_did(did, ResolveOptions::default())
        .await
        .expect("resolve DID")
}

/// What a registry mediator does: drain a queue into ordered registry events.
pub async fn anchor(node: &Gatekeeper, registry: &str, first_ordinal: u64) -> Vec<GatekeeperEvent> {
    let operations = node.get_queue(registry).await.expect("read queue");
    node.clear_queue(registry, &operations)
        .await
        .expect("clear queue");

    operations
        .into_iter()
        .enumerate()
        .map(|(i, operation)| {
            let time = operation
                .signed_time()
                .unwrap_or_default()
                .to_string();
            GatekeeperEvent {
                ordinal: Some(vec![first_ordinal + i as u64]),
                ..GatekeeperEvent::new(registry, time, operation)
            }
        })
        .collect()
}
