/// HTTP connector for a remote signing gateway
#[cfg(feature = "gateway-http")]
pub mod http;
/// In-process gateway backed by PKCS#8 keys
pub mod in_memory;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use x509_cert::{
    der::{Decode, Encode},
    Certificate,
};

#[cfg(feature = "gateway-http")]
pub use http::{GatewayConfig, HttpGateway};
pub use in_memory::InMemoryGateway;

use crate::{
    error::{Error, Result},
    jws::{
        algorithm::{AlgorithmFamily, Curve, DigestAlgorithm, RsaPadding, SignatureAlgorithm},
        verify::VerificationKey,
    },
};

/// Signing environment of a gateway project.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// PEM (one or more `CERTIFICATE` blocks) or a single DER certificate.
    pub certificate_chain_data: Vec<u8>,
    /// Identifier of the private key inside the gateway.
    pub key_id: String,
}

/// Raw signature mechanism the gateway applies.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mechanism {
    Ecdsa,
    RsaPkcs,
    RsaPss,
}

impl Mechanism {
    /// Picks the mechanism from the certificate key, checking it can produce `alg`.
    pub fn select(alg: SignatureAlgorithm, key: &VerificationKey) -> Result<Self> {
        match (key, alg.family()) {
            (VerificationKey::Rsa(_), AlgorithmFamily::Rsa(RsaPadding::Pkcs1v15)) => {
                Ok(Mechanism::RsaPkcs)
            }
            (VerificationKey::Rsa(_), AlgorithmFamily::Rsa(RsaPadding::Pss)) => {
                Ok(Mechanism::RsaPss)
            }
            (VerificationKey::P256(_), AlgorithmFamily::Ecdsa(Curve::P256))
            | (VerificationKey::P384(_), AlgorithmFamily::Ecdsa(Curve::P384)) => {
                Ok(Mechanism::Ecdsa)
            }
            (key, _) => Err(Error::InvalidKeyType(format!(
                "gateway key is {}, which cannot produce {alg}",
                key.kind()
            ))),
        }
    }
}

/// A single request to the gateway to sign data.
#[derive(Debug, Clone, PartialEq)]
pub struct SignOption {
    pub key_id: String,
    pub mechanism: Mechanism,
    pub digest_algorithm: DigestAlgorithm,
    /// Bytes to sign, or their standard base64 text when `b64_flag` is set.
    /// The gateway hashes the decoded bytes unless `raw_flag` is set.
    pub payload: Vec<u8>,
    /// `payload` is standard base64 text.
    pub b64_flag: bool,
    /// The payload is already a digest.
    pub raw_flag: bool,
}

/// Remote custody system holding private keys.
///
/// A project names one signing key and its certificate chain. Implementations
/// must not cache across calls; dropping a returned future abandons the call.
#[async_trait]
pub trait SigningGateway: Send + Sync {
    /// Fetches the certificate chain and key id of a project.
    async fn environment(&self, project: &str) -> anyhow::Result<Environment>;

    /// Signs with the project's private key and returns the raw signature bytes.
    async fn sign(&self, project: &str, option: &SignOption) -> anyhow::Result<Vec<u8>>;
}

/// Public key material of a gateway project.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub key_id: String,
    pub public_key: VerificationKey,
}

/// Parses certificate chain data as PEM, falling back to a single DER certificate.
pub fn parse_certificate_chain(data: &[u8]) -> anyhow::Result<Vec<Certificate>> {
    let trimmed = data.trim_ascii_start();
    let certs = if trimmed.starts_with(b"-----BEGIN") {
        Certificate::load_pem_chain(trimmed)
            .map_err(|e| anyhow!("error loading certificate: {e}"))?
    } else {
        vec![Certificate::from_der(data).map_err(|e| anyhow!("error loading certificate: {e}"))?]
    };

    if certs.is_empty() {
        bail!("certificate chain is empty");
    }
    Ok(certs)
}

/// Extracts the public key of a certificate.
pub fn public_key_from_certificate(cert: &Certificate) -> Result<VerificationKey> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::InvalidKeyType(format!("invalid public key info: {e}")))?;
    VerificationKey::from_spki_der(&spki)
}

/// The public key of the first certificate in a chain.
///
/// Unparseable chain data is `InvalidKeyType`.
pub fn public_key_from_chain(data: &[u8]) -> Result<VerificationKey> {
    let certs = parse_certificate_chain(data)
        .map_err(|e| Error::InvalidKeyType(format!("invalid certificate chain: {e}")))?;
    public_key_from_certificate(&certs[0])
}

/// Looks up the key of `project` in the gateway.
///
/// Network and certificate errors are `KeyLookupFailed`; nothing is retried.
pub async fn fetch_key_material(
    gateway: &dyn SigningGateway,
    project: &str,
) -> Result<KeyMaterial> {
    log::debug!("fetching environment for project {project}");
    let environment = gateway
        .environment(project)
        .await
        .map_err(|e| Error::key_lookup(project, e.context("unable to get environment")))?;

    let certs = parse_certificate_chain(&environment.certificate_chain_data)
        .map_err(|e| Error::key_lookup(project, e))?;
    let public_key = public_key_from_certificate(&certs[0])?;
    log::trace!(
        "project {project} uses gateway key {} ({})",
        environment.key_id,
        public_key.kind()
    );

    Ok(KeyMaterial {
        key_id: environment.key_id,
        public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!("../../testdata/rsa_cert.pem");
    const P256_CERT: &str = include_str!("../../testdata/p256_cert.pem");
    const P384_CERT: &str = include_str!("../../testdata/p384_cert.pem");

    #[test]
    fn parses_pem_and_der_chains() {
        let chain = format!("{RSA_CERT}\n{P256_CERT}");
        let certs = parse_certificate_chain(chain.as_bytes()).unwrap();
        assert_eq!(certs.len(), 2);

        let der = certs[1].to_der().unwrap();
        let certs = parse_certificate_chain(&der).unwrap();
        assert!(matches!(
            public_key_from_certificate(&certs[0]).unwrap(),
            VerificationKey::P256(_)
        ));

        assert!(parse_certificate_chain(b"").is_err());
        assert!(parse_certificate_chain(b"-----BEGIN CERTIFICATE-----\nAAAA").is_err());
    }

    #[test]
    fn chain_uses_first_certificate() {
        let chain = format!("{P384_CERT}{RSA_CERT}");
        assert!(matches!(
            public_key_from_chain(chain.as_bytes()).unwrap(),
            VerificationKey::P384(_)
        ));

        let err = public_key_from_chain(b"not a certificate").unwrap_err();
        assert!(matches!(err, Error::InvalidKeyType(_)), "{err:?}");
        assert!(!err.to_string().contains("''"), "{err}");
    }

    #[test]
    fn mechanism_follows_certificate_key() {
        let rsa = public_key_from_chain(RSA_CERT.as_bytes()).unwrap();
        let p256 = public_key_from_chain(P256_CERT.as_bytes()).unwrap();
        let p384 = public_key_from_chain(P384_CERT.as_bytes()).unwrap();

        assert_eq!(
            Mechanism::select(SignatureAlgorithm::RS512, &rsa).unwrap(),
            Mechanism::RsaPkcs
        );
        assert_eq!(
            Mechanism::select(SignatureAlgorithm::PS256, &rsa).unwrap(),
            Mechanism::RsaPss
        );
        assert_eq!(
            Mechanism::select(SignatureAlgorithm::ES256, &p256).unwrap(),
            Mechanism::Ecdsa
        );
        assert_eq!(
            Mechanism::select(SignatureAlgorithm::ES384, &p384).unwrap(),
            Mechanism::Ecdsa
        );
        assert_eq!(Mechanism::RsaPkcs.to_string(), "rsa-pkcs");

        for (alg, key) in [
            (SignatureAlgorithm::ES256, &rsa),
            (SignatureAlgorithm::RS256, &p256),
            (SignatureAlgorithm::ES384, &p256),
            (SignatureAlgorithm::HS256, &rsa),
        ] {
            let err = Mechanism::select(alg, key).unwrap_err();
            assert!(matches!(err, Error::InvalidKeyType(_)), "{alg}");
        }
    }
}
