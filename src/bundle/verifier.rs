use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use super::{keys, DecodedSignature, FileInfo, SignaturesConfig, VerificationConfig, Verifier};
use crate::{
    error::{Error, Result},
    gateway::{self, SigningGateway},
    jws::{self, compact, SignatureAlgorithm},
};

/// Verifies bundle signatures against certificates held by a signing gateway.
#[derive(Clone)]
pub struct GatewayVerifier {
    gateway: Arc<dyn SigningGateway>,
}

impl GatewayVerifier {
    pub fn new(gateway: Arc<dyn SigningGateway>) -> Self {
        GatewayVerifier { gateway }
    }

    /// Verifies one token and returns its payload.
    ///
    /// The algorithm comes from the trusted key configuration, never from the
    /// token header.
    pub async fn verify_jwt_signature(
        &self,
        token: &str,
        bvc: &VerificationConfig,
    ) -> Result<DecodedSignature> {
        let message = compact::parse(token.trim())?;
        let ds = DecodedSignature::from_slice(&message.payload)?;

        let key_id = keys::resolve_key_id(&bvc.key_id, &message.header, &ds.keyid)?;
        let key_config = bvc.get_public_key(key_id)?;
        let alg = SignatureAlgorithm::from_identifier(&key_config.algorithm)?;
        log::debug!("verifying bundle signature with key {key_id} ({alg})");

        let key = gateway::fetch_key_material(self.gateway.as_ref(), key_id).await?;
        jws::verify(
            alg,
            &message.signing_input(),
            &message.signature,
            &key.public_key,
        )?;

        let scope = if bvc.scope.is_empty() {
            &key_config.scope
        } else {
            &bvc.scope
        };
        if &ds.scope != scope {
            return Err(Error::ScopeMismatch {
                expected: scope.clone(),
                found: ds.scope,
            });
        }

        Ok(ds)
    }
}

#[async_trait]
impl Verifier for GatewayVerifier {
    /// Duplicate file names in the payload collapse to the last record.
    async fn verify_bundle_signature(
        &self,
        sc: &SignaturesConfig,
        bvc: &VerificationConfig,
    ) -> Result<HashMap<String, FileInfo>> {
        let token = match sc.signatures.as_slice() {
            [] => return Err(Error::NoSignaturePresent),
            [token] => token,
            _ => return Err(Error::MultipleSignaturesUnsupported),
        };

        let payload = self.verify_jwt_signature(token, bvc).await?;

        let files = payload
            .files
            .into_iter()
            .map(|file| (file.name.clone(), file))
            .collect::<HashMap<_, _>>();
        Ok(files)
    }
}
