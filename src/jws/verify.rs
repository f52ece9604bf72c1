use std::fmt;

use hmac::{digest::KeyInit, Hmac, Mac};
use rsa::{
    pkcs1v15,
    pkcs8::DecodePublicKey,
    pss,
    signature::Verifier,
    RsaPublicKey,
};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::{
    der::Decode,
    spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned},
};

use super::{
    algorithm::{AlgorithmFamily, Curve, DigestAlgorithm, RsaPadding, SignatureAlgorithm},
    compact,
};
use crate::error::{Error, Result};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Key material a signature is checked against.
#[derive(Clone)]
pub enum VerificationKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    /// Shared secret for the HMAC family.
    Secret(Vec<u8>),
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationKey::Secret(_) => write!(f, "Secret(..)"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

impl VerificationKey {
    /// Builds a key from a DER encoded SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let spki = SubjectPublicKeyInfoOwned::from_der(der)
            .map_err(|e| Error::InvalidKeyType(format!("invalid public key info: {e}")))?;

        let oid = spki.algorithm.oid;
        if oid == RSA_ENCRYPTION {
            RsaPublicKey::from_public_key_der(der)
                .map(VerificationKey::Rsa)
                .map_err(|e| Error::InvalidKeyType(format!("invalid RSA public key: {e}")))
        } else if oid == EC_PUBLIC_KEY {
            if let Ok(key) = p256::ecdsa::VerifyingKey::from_public_key_der(der) {
                Ok(VerificationKey::P256(key))
            } else if let Ok(key) = p384::ecdsa::VerifyingKey::from_public_key_der(der) {
                Ok(VerificationKey::P384(key))
            } else {
                Err(Error::InvalidKeyType(
                    "EC public key is not on a supported curve".to_owned(),
                ))
            }
        } else {
            Err(Error::InvalidKeyType(format!(
                "unsupported public key algorithm {oid}"
            )))
        }
    }

    /// Short name of the key family, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationKey::Rsa(_) => "RSA",
            VerificationKey::P256(_) => "EC P-256",
            VerificationKey::P384(_) => "EC P-384",
            VerificationKey::Secret(_) => "secret",
        }
    }
}

/// Checks `signature` over `signing_input` with `key` under `alg`.
///
/// The key must belong to the family (and for ECDSA the curve) the algorithm
/// names; any cryptographic failure is `SignatureMismatch`.
pub fn verify(
    alg: SignatureAlgorithm,
    signing_input: &[u8],
    signature: &[u8],
    key: &VerificationKey,
) -> Result<()> {
    match (alg.family(), key) {
        (AlgorithmFamily::Rsa(padding), VerificationKey::Rsa(key)) => {
            verify_rsa(padding, alg.digest(), key, signing_input, signature)
        }
        (AlgorithmFamily::Ecdsa(Curve::P256), VerificationKey::P256(key)) => {
            let signature = p256::ecdsa::Signature::from_slice(signature)
                .or_else(|_| p256::ecdsa::Signature::from_der(signature))
                .map_err(|_| Error::SignatureMismatch)?;
            key.verify(signing_input, &signature)
                .map_err(|_| Error::SignatureMismatch)
        }
        (AlgorithmFamily::Ecdsa(Curve::P384), VerificationKey::P384(key)) => {
            let signature = p384::ecdsa::Signature::from_slice(signature)
                .or_else(|_| p384::ecdsa::Signature::from_der(signature))
                .map_err(|_| Error::SignatureMismatch)?;
            key.verify(signing_input, &signature)
                .map_err(|_| Error::SignatureMismatch)
        }
        (AlgorithmFamily::Hmac, VerificationKey::Secret(secret)) => {
            verify_hmac(alg.digest(), secret, signing_input, signature)
        }
        (AlgorithmFamily::Rsa(_), other) => Err(Error::InvalidKeyType(format!(
            "{alg} requires an RSA public key, got {}",
            other.kind()
        ))),
        (AlgorithmFamily::Ecdsa(curve), other) => Err(Error::InvalidKeyType(format!(
            "{alg} requires an EC {curve} public key, got {}",
            other.kind()
        ))),
        (AlgorithmFamily::Hmac, other) => Err(Error::InvalidKeyType(format!(
            "{alg} requires a shared secret, got {}",
            other.kind()
        ))),
    }
}

/// Verifies a compact token and returns its decoded payload.
///
/// The signing input is rebuilt from the decoded header and payload bytes.
pub fn verify_token(
    token: &str,
    alg: SignatureAlgorithm,
    key: &VerificationKey,
) -> Result<Vec<u8>> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::MalformedToken("attempt to verify empty buffer".to_owned()));
    }

    let message = compact::parse(token)?;
    verify(alg, &message.signing_input(), &message.signature, key)?;

    Ok(message.payload)
}

fn verify_rsa(
    padding: RsaPadding,
    digest: DigestAlgorithm,
    key: &RsaPublicKey,
    signing_input: &[u8],
    signature: &[u8],
) -> Result<()> {
    let key = key.clone();
    match (padding, digest) {
        (RsaPadding::Pkcs1v15, DigestAlgorithm::Sha256) => check::<pkcs1v15::Signature, _>(
            pkcs1v15::VerifyingKey::<Sha256>::new(key),
            signing_input,
            signature,
        ),
        (RsaPadding::Pkcs1v15, DigestAlgorithm::Sha384) => check::<pkcs1v15::Signature, _>(
            pkcs1v15::VerifyingKey::<Sha384>::new(key),
            signing_input,
            signature,
        ),
        (RsaPadding::Pkcs1v15, DigestAlgorithm::Sha512) => check::<pkcs1v15::Signature, _>(
            pkcs1v15::VerifyingKey::<Sha512>::new(key),
            signing_input,
            signature,
        ),
        (RsaPadding::Pss, DigestAlgorithm::Sha256) => check::<pss::Signature, _>(
            pss::VerifyingKey::<Sha256>::new(key),
            signing_input,
            signature,
        ),
        (RsaPadding::Pss, DigestAlgorithm::Sha384) => check::<pss::Signature, _>(
            pss::VerifyingKey::<Sha384>::new(key),
            signing_input,
            signature,
        ),
        (RsaPadding::Pss, DigestAlgorithm::Sha512) => check::<pss::Signature, _>(
            pss::VerifyingKey::<Sha512>::new(key),
            signing_input,
            signature,
        ),
        (_, DigestAlgorithm::Sha1) => Err(Error::UnsupportedAlgorithm(
            "sha1 is not a signature digest".to_owned(),
        )),
    }
}

fn check<S, V>(verifier: V, signing_input: &[u8], signature: &[u8]) -> Result<()>
where
    V: Verifier<S>,
    S: for<'a> TryFrom<&'a [u8]>,
{
    let signature = S::try_from(signature).map_err(|_| Error::SignatureMismatch)?;
    verifier
        .verify(signing_input, &signature)
        .map_err(|_| Error::SignatureMismatch)
}

fn verify_hmac(
    digest: DigestAlgorithm,
    secret: &[u8],
    signing_input: &[u8],
    signature: &[u8],
) -> Result<()> {
    if secret.is_empty() {
        return Err(Error::InvalidKeyType("HMAC secret is empty".to_owned()));
    }

    match digest {
        DigestAlgorithm::Sha256 => check_mac::<Hmac<Sha256>>(secret, signing_input, signature),
        DigestAlgorithm::Sha384 => check_mac::<Hmac<Sha384>>(secret, signing_input, signature),
        DigestAlgorithm::Sha512 => check_mac::<Hmac<Sha512>>(secret, signing_input, signature),
        DigestAlgorithm::Sha1 => Err(Error::UnsupportedAlgorithm(
            "sha1 is not a signature digest".to_owned(),
        )),
    }
}

fn check_mac<M: Mac + KeyInit>(
    secret: &[u8],
    signing_input: &[u8],
    signature: &[u8],
) -> Result<()> {
    let mut mac = <M as Mac>::new_from_slice(secret)
        .map_err(|e| Error::InvalidKeyType(format!("invalid HMAC secret: {e}")))?;
    mac.update(signing_input);
    mac.verify_slice(signature)
        .map_err(|_| Error::SignatureMismatch)
}
