//! Signed operation builders for unit tests.

use std::sync::Arc;

use mdip_core::time::now_iso;
use mdip_core::{GatekeeperConfig, Mdip, MdipDocument, MdipType, Operation, OperationType, Signature};
use mdip_crypto::{hash_json, sign_hash, KeyPair};
use serde_json::Value;

use crate::cas::MemoryCas;
use crate::db::MemoryDb;
use crate::gatekeeper::Gatekeeper;

pub fn gatekeeper() -> (Gatekeeper, Arc<MemoryDb>) {
    gatekeeper_with(GatekeeperConfig::default())
}

pub fn gatekeeper_with(config: GatekeeperConfig) -> (Gatekeeper, Arc<MemoryDb>) {
    let db = Arc::new(MemoryDb::new());
    let gk = Gatekeeper::new(config, db.clone(), Arc::new(MemoryCas::new())).unwrap();
    (gk, db)
}

pub fn sign(op: Operation, keypair: &KeyPair, signer: Option<&str>) -> Operation {
    sign_at(op, keypair, signer, &now_iso())
}

pub fn sign_at(mut op: Operation, keypair: &KeyPair, signer: Option<&str>, signed: &str) -> Operation {
    op.signature = None;
    let hash = hash_json(&op).unwrap();
    let value = sign_hash(&hash, keypair).unwrap();
    op.signature = Some(Signature {
        signer: signer.map(str::to_string),
        signed: signed.to_string(),
        hash,
        value,
    });
    op
}

pub fn agent_op(keypair: &KeyPair, registry: &str) -> Operation {
    let mut op = Operation::new(OperationType::Create);
    op.created = Some(now_iso());
    op.mdip = Some(Mdip::new(MdipType::Agent, registry));
    op.public_jwk = Some(keypair.public_jwk());
    sign(op, keypair, None)
}

pub fn asset_op(keypair: &KeyPair, owner: &str, registry: &str, data: Value) -> Operation {
    let mut op = Operation::new(OperationType::Create);
    op.created = Some(now_iso());
    op.mdip = Some(Mdip::new(MdipType::Asset, registry));
    op.controller = Some(owner.to_string());
    op.data = Some(data);
    sign(op, keypair, Some(owner))
}

pub fn update_op(
    keypair: &KeyPair,
    did: &str,
    doc: &MdipDocument,
    signer: &str,
    previd: Option<String>,
) -> Operation {
    update_op_at(keypair, did, doc, signer, previd, &now_iso())
}

pub fn update_op_at(
    keypair: &KeyPair,
    did: &str,
    doc: &MdipDocument,
    signer: &str,
    previd: Option<String>,
    signed: &str,
) -> Operation {
    let mut op = Operation::new(OperationType::Update);
    op.did = Some(did.to_string());
    op.doc = Some(serde_json::to_value(doc).unwrap());
    op.previd = previd;
    sign_at(op, keypair, Some(signer), signed)
}

pub fn delete_op(keypair: &KeyPair, did: &str, signer: &str, previd: Option<String>) -> Operation {
    let mut op = Operation::new(OperationType::Delete);
    op.did = Some(did.to_string());
    op.previd = previd;
    sign(op, keypair, Some(signer))
}
