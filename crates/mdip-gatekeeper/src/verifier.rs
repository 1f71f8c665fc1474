use futures::future::BoxFuture;
use mdip_core::time::parse_time;
use mdip_core::{
    GatekeeperEvent, MdipDocument, MdipError, MdipResult, MdipType, Operation, OperationType,
    Signature, LOCAL_REGISTRY, VALID_REGISTRIES, VALID_VERSIONS,
};
use mdip_crypto::{hash_json, verify_sig};
use serde_json::Value;

use crate::did::is_did_format;
use crate::gatekeeper::Gatekeeper;
use crate::resolver::{update_doc, ResolveOptions};

/// Maximum length of an asset controller chain followed when checking updates.
pub const MAX_CONTROLLER_DEPTH: usize = 8;

fn is_date(time: Option<&str>) -> bool {
    time.and_then(parse_time).is_some()
}

fn is_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_signature_format(signature: Option<&Signature>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    if !is_date(Some(&signature.signed)) || !is_hash(&signature.hash) {
        return false;
    }
    signature.signer.as_deref().map_or(true, is_did_format)
}

impl Gatekeeper {
    fn check_size(&self, operation: &Operation) -> MdipResult<()> {
        let size = serde_json::to_string(operation)?.len();
        if size > self.config.max_op_bytes {
            return Err(MdipError::InvalidOperation("size".into()));
        }
        Ok(())
    }

    /// Validate a create operation and its signature.
    ///
    /// Shape problems are errors; a well-formed operation with a bad
    /// signature yields `Ok(false)`.
    pub async fn verify_create_operation(&self, operation: &Operation) -> MdipResult<bool> {
        self.check_size(operation)?;

        if operation.op_type != OperationType::Create {
            return Err(MdipError::InvalidOperation(format!(
                "type={}",
                operation.op_type
            )));
        }

        if !is_date(operation.created.as_deref()) {
            return Err(MdipError::InvalidOperation(format!(
                "created={}",
                operation.created.as_deref().unwrap_or_default()
            )));
        }

        let mdip = operation
            .mdip
            .as_ref()
            .ok_or_else(|| MdipError::InvalidOperation("mdip".into()))?;

        if !VALID_VERSIONS.contains(&mdip.version) {
            return Err(MdipError::InvalidOperation(format!(
                "mdip.version={}",
                mdip.version
            )));
        }

        if !VALID_REGISTRIES.contains(&mdip.registry.as_str()) {
            return Err(MdipError::InvalidOperation(format!(
                "mdip.registry={}",
                mdip.registry
            )));
        }

        let signature = match operation.signature.as_ref() {
            Some(sig) if is_signature_format(Some(sig)) => sig,
            _ => return Err(MdipError::InvalidOperation("signature".into())),
        };

        if let Some(valid_until) = mdip.valid_until.as_deref() {
            if parse_time(valid_until).is_none() {
                return Err(MdipError::InvalidOperation(format!(
                    "mdip.validUntil={}",
                    valid_until
                )));
            }
        }

        let msg_hash = hash_json(&operation.unsigned())?;

        match mdip.mdip_type {
            MdipType::Agent => {
                let jwk = operation
                    .public_jwk
                    .as_ref()
                    .ok_or_else(|| MdipError::InvalidOperation("publicJwk".into()))?;
                Ok(verify_sig(&msg_hash, &signature.value, jwk))
            }
            MdipType::Asset => {
                let signer = match (&operation.controller, &signature.signer) {
                    (Some(controller), Some(signer)) if controller == signer => signer,
                    _ => {
                        return Err(MdipError::InvalidOperation(
                            "signer is not controller".into(),
                        ))
                    }
                };

                let doc = self
                    .resolve_did(signer, ResolveOptions::confirmed_at(Some(&signature.signed)))
                    .await?;

                let controller_registry = doc.mdip.as_ref().map(|m| m.registry.as_str());
                if controller_registry == Some(LOCAL_REGISTRY) && mdip.registry != LOCAL_REGISTRY {
                    return Err(MdipError::InvalidOperation(format!(
                        "non-local registry={}",
                        mdip.registry
                    )));
                }

                let jwk = doc
                    .did_document
                    .as_ref()
                    .and_then(|d| d.signing_key())
                    .ok_or_else(|| {
                        MdipError::InvalidOperation("didDocument missing verificationMethod".into())
                    })?;
                Ok(verify_sig(&msg_hash, &signature.value, jwk))
            }
        }
    }

    /// Validate an update or delete against the document it applies to.
    ///
    /// Assets are checked against their controller's keys.
    pub async fn verify_update_operation(
        &self,
        operation: &Operation,
        doc: &MdipDocument,
    ) -> MdipResult<bool> {
        self.verify_update_at_depth(operation, doc.clone(), 0).await
    }

    fn verify_update_at_depth<'a>(
        &'a self,
        operation: &'a Operation,
        doc: MdipDocument,
        depth: usize,
    ) -> BoxFuture<'a, MdipResult<bool>> {
        Box::pin(async move {
            self.check_size(operation)?;

            if depth == 0 && operation.op_type == OperationType::Update {
                update_doc(operation)?;
            }

            let signature = match operation.signature.as_ref() {
                Some(sig) if is_signature_format(Some(sig)) => sig,
                _ => return Err(MdipError::InvalidOperation("signature".into())),
            };

            if doc.is_deactivated() {
                return Err(MdipError::InvalidOperation("DID deactivated".into()));
            }

            let did_document = match doc.did_document.as_ref() {
                Some(d) if !d.is_empty() => d,
                _ => return Err(MdipError::InvalidOperation("doc.didDocument".into())),
            };

            if let Some(controller) = did_document.controller.as_deref() {
                if depth >= MAX_CONTROLLER_DEPTH {
                    return Err(MdipError::InvalidOperation("controller depth".into()));
                }
                let controller_doc = self
                    .resolve_did(controller, ResolveOptions::confirmed_at(Some(&signature.signed)))
                    .await?;
                return self
                    .verify_update_at_depth(operation, controller_doc, depth + 1)
                    .await;
            }

            if did_document.verification_method.is_none() {
                return Err(MdipError::InvalidOperation(
                    "doc.didDocument.verificationMethod".into(),
                ));
            }

            let msg_hash = hash_json(&operation.unsigned())?;
            if signature.hash != msg_hash {
                return Ok(false);
            }

            let jwk = did_document.signing_key().ok_or_else(|| {
                MdipError::InvalidOperation("didDocument missing verificationMethod".into())
            })?;
            Ok(verify_sig(&msg_hash, &signature.value, jwk))
        })
    }

    /// Verify any operation, resolving the current document for updates and deletes.
    pub async fn verify_operation(&self, operation: &Operation) -> MdipResult<bool> {
        match operation.op_type {
            OperationType::Create => self.verify_create_operation(operation).await,
            OperationType::Update | OperationType::Delete => {
                let did = operation
                    .did
                    .as_deref()
                    .ok_or_else(|| MdipError::InvalidOperation("missing operation.did".into()))?;
                let doc = self.resolve_did(did, ResolveOptions::default()).await?;
                self.verify_update_operation(operation, &doc).await
            }
        }
    }

    /// Cheap structural check applied to events before they are queued for import.
    pub fn verify_event(&self, event: &GatekeeperEvent) -> bool {
        if event.registry.is_empty() || !is_date(Some(&event.time)) {
            return false;
        }

        let operation = &event.operation;
        if self.check_size(operation).is_err() {
            return false;
        }

        if !is_signature_format(operation.signature.as_ref()) {
            return false;
        }

        match operation.op_type {
            OperationType::Create => {
                let Some(mdip) = operation.mdip.as_ref() else {
                    return false;
                };
                if operation.created.is_none()
                    || !VALID_VERSIONS.contains(&mdip.version)
                    || !VALID_REGISTRIES.contains(&mdip.registry.as_str())
                {
                    return false;
                }
                match mdip.mdip_type {
                    MdipType::Agent => operation.public_jwk.is_some(),
                    MdipType::Asset => {
                        operation.controller.is_some()
                            && operation.controller.as_deref()
                                == operation.signature.as_ref().and_then(|s| s.signer.as_deref())
                    }
                }
            }
            OperationType::Update => {
                let complete = match operation.doc.as_ref() {
                    Some(Value::Object(doc)) => {
                        ["didDocument", "didDocumentMetadata", "didDocumentData", "mdip"]
                            .iter()
                            .all(|key| doc.contains_key(*key))
                    }
                    _ => false,
                };
                complete && operation.did.is_some() && update_doc(operation).is_ok()
            }
            OperationType::Delete => operation.did.is_some(),
        }
    }
}
