use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Signature algorithm identifiers accepted in the `alg` header and in key configuration.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
    /// ECDSA on P-256 using SHA-256
    ES256,
    /// ECDSA on P-384 using SHA-384
    ES384,
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    HS512,
}

/// RSA signature padding scheme.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RsaPadding {
    Pkcs1v15,
    Pss,
}

/// Elliptic curves supported for ECDSA.
#[derive(Clone, Copy, PartialEq, Eq, Debug, strum::Display)]
pub enum Curve {
    #[strum(serialize = "P-256")]
    P256,
    #[strum(serialize = "P-384")]
    P384,
}

/// The key family an algorithm requires.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AlgorithmFamily {
    Rsa(RsaPadding),
    Ecdsa(Curve),
    Hmac,
}

impl SignatureAlgorithm {
    /// Parses an algorithm identifier.
    ///
    /// Anything outside the closed set is `UnsupportedAlgorithm`.
    pub fn from_identifier(alg: &str) -> Result<Self> {
        SignatureAlgorithm::from_str(alg).map_err(|_| Error::UnsupportedAlgorithm(alg.to_owned()))
    }

    pub fn family(self) -> AlgorithmFamily {
        use SignatureAlgorithm::*;
        match self {
            RS256 | RS384 | RS512 => AlgorithmFamily::Rsa(RsaPadding::Pkcs1v15),
            PS256 | PS384 | PS512 => AlgorithmFamily::Rsa(RsaPadding::Pss),
            ES256 => AlgorithmFamily::Ecdsa(Curve::P256),
            ES384 => AlgorithmFamily::Ecdsa(Curve::P384),
            HS256 | HS384 | HS512 => AlgorithmFamily::Hmac,
        }
    }

    /// The digest the algorithm is defined over.
    pub fn digest(self) -> DigestAlgorithm {
        use SignatureAlgorithm::*;
        match self {
            RS256 | PS256 | ES256 | HS256 => DigestAlgorithm::Sha256,
            RS384 | PS384 | ES384 | HS384 => DigestAlgorithm::Sha384,
            RS512 | PS512 | HS512 => DigestAlgorithm::Sha512,
        }
    }
}

/// Digest algorithm names understood by the signing gateway.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Debug,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Selects the digest for a signing request.
    ///
    /// Without an explicit `hash` the algorithm's own digest is used, which is
    /// `sha256` for every *256 identifier. An explicit `hash` must name a
    /// supported digest and agree with `alg`, since verifiers derive the digest
    /// from the algorithm alone.
    pub fn select(hash: Option<&str>, alg: SignatureAlgorithm) -> Result<Self> {
        let Some(name) = hash.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(alg.digest());
        };

        let digest = DigestAlgorithm::from_str(name)
            .map_err(|_| Error::UnsupportedAlgorithm(format!("hash '{name}'")))?;
        if digest != alg.digest() {
            return Err(Error::UnsupportedAlgorithm(format!(
                "hash '{name}' cannot be used with {alg}, which requires {}",
                alg.digest()
            )));
        }
        Ok(digest)
    }
}
