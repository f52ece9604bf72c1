use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{FileInfo, Signer, SigningConfig};
use crate::{
    error::Result,
    gateway::SigningGateway,
    jws::{self, header::KEY_ID_KEY, Header, SignatureAlgorithm},
};

/// Signs bundles with a key held by a remote signing gateway.
#[derive(Clone)]
pub struct GatewaySigner {
    gateway: Arc<dyn SigningGateway>,
}

impl GatewaySigner {
    pub fn new(gateway: Arc<dyn SigningGateway>) -> Self {
        GatewaySigner { gateway }
    }
}

#[async_trait]
impl Signer for GatewaySigner {
    async fn generate_signed_token(
        &self,
        files: &[FileInfo],
        sc: &SigningConfig,
        key_id: &str,
    ) -> Result<String> {
        let alg = SignatureAlgorithm::from_identifier(&sc.algorithm)?;
        let payload = generate_payload(files, sc, key_id)?;

        let mut header = Header::with_algorithm(alg);
        if !key_id.is_empty() {
            header.set(KEY_ID_KEY, Value::String(key_id.to_owned()))?;
        }
        let header = header.serialize()?;

        log::debug!(
            "signing {} files with {alg} in project {}",
            files.len(),
            sc.key
        );
        jws::sign_literal(
            &payload,
            alg,
            &sc.key,
            &header,
            sc.hash.as_deref(),
            self.gateway.as_ref(),
        )
        .await
    }
}

/// Builds the JSON payload of a bundle signature.
///
/// Custom claims are merged at the top level when a claims file is configured;
/// otherwise a non-empty `key_id` is written as the deprecated `keyid` claim.
/// A `files` claim never replaces the real file list.
pub fn generate_payload(files: &[FileInfo], sc: &SigningConfig, key_id: &str) -> Result<Vec<u8>> {
    let mut payload = Map::new();
    payload.insert("files".to_owned(), serde_json::to_value(files)?);

    if sc.claims_path().is_some() {
        for (claim, value) in sc.get_claims()? {
            if claim == "files" {
                log::debug!("ignoring 'files' claim from claims file");
                continue;
            }
            payload.insert(claim, value);
        }
    } else if !key_id.is_empty() {
        payload.insert("keyid".to_owned(), Value::String(key_id.to_owned()));
    }

    Ok(serde_json::to_vec(&payload)?)
}
