use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::{
    pkcs1v15,
    pkcs8::DecodePrivateKey,
    pss,
    signature::{RandomizedSigner, SignatureEncoding, Signer},
    RsaPrivateKey,
};
use sha2::{Sha256, Sha384, Sha512};

use super::{Environment, Mechanism, SignOption, SigningGateway};
use crate::jws::algorithm::DigestAlgorithm;

enum PrivateKey {
    Rsa(RsaPrivateKey),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

struct Project {
    key_id: String,
    certificate_chain: String,
    key: PrivateKey,
}

/// In-memory signing gateway for testing and development.
///
/// Holds one PKCS#8 private key and certificate chain per project. Not persistent.
#[derive(Default)]
pub struct InMemoryGateway {
    projects: HashMap<String, Project>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project from a PEM certificate chain and a PKCS#8 PEM private key.
    ///
    /// The key type (RSA, P-256 or P-384) is detected from the key itself.
    pub fn insert_pem(
        &mut self,
        project: &str,
        certificate_chain: &str,
        private_key: &str,
    ) -> Result<()> {
        let key = if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(private_key) {
            PrivateKey::Rsa(key)
        } else if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(private_key) {
            PrivateKey::P256(key)
        } else if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(private_key) {
            PrivateKey::P384(key)
        } else {
            bail!("unsupported private key for project '{project}'");
        };

        self.projects.insert(
            project.to_owned(),
            Project {
                key_id: format!("{project}-key"),
                certificate_chain: certificate_chain.to_owned(),
                key,
            },
        );
        Ok(())
    }

    /// Builder form of [`InMemoryGateway::insert_pem`].
    pub fn with_pem(
        mut self,
        project: &str,
        certificate_chain: &str,
        private_key: &str,
    ) -> Result<Self> {
        self.insert_pem(project, certificate_chain, private_key)?;
        Ok(self)
    }

    fn project(&self, project: &str) -> Result<&Project> {
        self.projects
            .get(project)
            .ok_or_else(|| anyhow!("project '{project}' not found"))
    }
}

#[async_trait]
impl SigningGateway for InMemoryGateway {
    async fn environment(&self, project: &str) -> Result<Environment> {
        log::trace!("get environment {project}.");

        let project = self.project(project)?;
        Ok(Environment {
            certificate_chain_data: project.certificate_chain.as_bytes().to_vec(),
            key_id: project.key_id.clone(),
        })
    }

    async fn sign(&self, project: &str, option: &SignOption) -> Result<Vec<u8>> {
        log::trace!("sign {project} with {}.", option.mechanism);

        let project = self.project(project)?;
        if option.key_id != project.key_id {
            bail!("unknown key id '{}'", option.key_id);
        }
        if option.raw_flag {
            bail!("pre-hashed payloads are not supported");
        }

        let data = if option.b64_flag {
            BASE64.decode(&option.payload)?
        } else {
            option.payload.clone()
        };

        let sig = match (&project.key, option.mechanism, option.digest_algorithm) {
            (PrivateKey::Rsa(key), Mechanism::RsaPkcs, DigestAlgorithm::Sha256) => {
                pkcs1v15::SigningKey::<Sha256>::new(key.clone()).sign(&data).to_vec()
            }
            (PrivateKey::Rsa(key), Mechanism::RsaPkcs, DigestAlgorithm::Sha384) => {
                pkcs1v15::SigningKey::<Sha384>::new(key.clone()).sign(&data).to_vec()
            }
            (PrivateKey::Rsa(key), Mechanism::RsaPkcs, DigestAlgorithm::Sha512) => {
                pkcs1v15::SigningKey::<Sha512>::new(key.clone()).sign(&data).to_vec()
            }
            (PrivateKey::Rsa(key), Mechanism::RsaPss, DigestAlgorithm::Sha256) => {
                pss::SigningKey::<Sha256>::new(key.clone())
                    .sign_with_rng(&mut OsRng, &data)
                    .to_vec()
            }
            (PrivateKey::Rsa(key), Mechanism::RsaPss, DigestAlgorithm::Sha384) => {
                pss::SigningKey::<Sha384>::new(key.clone())
                    .sign_with_rng(&mut OsRng, &data)
                    .to_vec()
            }
            (PrivateKey::Rsa(key), Mechanism::RsaPss, DigestAlgorithm::Sha512) => {
                pss::SigningKey::<Sha512>::new(key.clone())
                    .sign_with_rng(&mut OsRng, &data)
                    .to_vec()
            }
            (PrivateKey::P256(key), Mechanism::Ecdsa, DigestAlgorithm::Sha256) => {
                let sig: p256::ecdsa::Signature = key.sign(&data);
                sig.to_bytes().to_vec()
            }
            (PrivateKey::P384(key), Mechanism::Ecdsa, DigestAlgorithm::Sha384) => {
                let sig: p384::ecdsa::Signature = key.sign(&data);
                sig.to_bytes().to_vec()
            }
            (_, mechanism, digest) => {
                bail!("mechanism {mechanism} with {digest} is not supported by this key")
            }
        };

        Ok(sig)
    }
}
