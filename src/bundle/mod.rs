//! Bundle signing and verification on top of the compact JWS format.
//!
//! The signed payload lists every file of a bundle with its digest. A bundle
//! carries exactly one signature token.

/// Key identity resolution on the verification side
pub mod keys;
/// Bundle signer backed by a signing gateway
pub mod signer;
/// Bundle verifier backed by a signing gateway
pub mod verifier;

use std::{
    collections::{BTreeMap, HashMap},
    fs,
};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use keys::resolve_key_id;
pub use signer::{generate_payload, GatewaySigner};
pub use verifier::GatewayVerifier;

use crate::error::{Error, Result};

/// A file of the bundle and its content digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    #[serde(default)]
    pub hash: String,
    /// Digest algorithm of `hash`, omitted when unset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    /// Additional metadata such as size.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, hash: impl Into<String>) -> Self {
        FileInfo {
            name: name.into(),
            hash: hash.into(),
            algorithm: String::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// How a bundle is signed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Signature algorithm identifier, e.g. `RS256`.
    pub algorithm: String,
    /// Gateway project holding the private key.
    pub key: String,
    /// JSON file of custom claims merged into the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims_path: Option<String>,
    /// Digest name for the gateway (`sha1`, `sha256`, `sha384`, `sha512`); it
    /// must be the digest of `algorithm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl SigningConfig {
    pub fn new(algorithm: impl Into<String>, key: impl Into<String>) -> Self {
        SigningConfig {
            algorithm: algorithm.into(),
            key: key.into(),
            ..Default::default()
        }
    }

    /// The configured claims path, if it is set and non-empty.
    pub fn claims_path(&self) -> Option<&str> {
        self.claims_path.as_deref().filter(|path| !path.is_empty())
    }

    /// Reads the custom claims file.
    pub fn get_claims(&self) -> Result<Map<String, Value>> {
        let Some(path) = self.claims_path() else {
            return Ok(Map::new());
        };

        let load = || -> anyhow::Result<Map<String, Value>> {
            let contents = fs::read_to_string(path)?;
            match serde_json::from_str::<Value>(&contents)? {
                Value::Object(claims) => Ok(claims),
                other => Err(anyhow!("claims must be a JSON object, got {other}")),
            }
        };

        load().map_err(|source| Error::ClaimsLoadError {
            path: path.to_owned(),
            source,
        })
    }
}

/// The signature tokens shipped with a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignaturesConfig {
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

/// Trusted configuration of one verification key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Algorithm the key verifies with. Authoritative over the token header.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Default expected scope for tokens signed by this key.
    #[serde(default)]
    pub scope: String,
}

fn default_algorithm() -> String {
    "RS256".to_owned()
}

impl Default for KeyConfig {
    fn default() -> Self {
        KeyConfig {
            algorithm: default_algorithm(),
            scope: String::new(),
        }
    }
}

/// How bundle signatures are verified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Trusted keys by key id.
    #[serde(default)]
    pub public_keys: HashMap<String, KeyConfig>,
    /// Key id to use regardless of what the token names.
    #[serde(default)]
    pub key_id: String,
    /// Expected scope; overrides the key's own scope when set.
    #[serde(default)]
    pub scope: String,
}

impl VerificationConfig {
    pub fn get_public_key(&self, key_id: &str) -> Result<&KeyConfig> {
        self.public_keys.get(key_id).ok_or_else(|| {
            Error::key_lookup(
                key_id,
                anyhow!("verification key corresponding to ID {key_id} not found"),
            )
        })
    }
}

/// Payload of a bundle signature token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedSignature {
    pub files: Vec<FileInfo>,
    /// Deprecated key id claim.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub keyid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    /// Custom claims.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl DecodedSignature {
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}

/// Produces the signature token of a bundle.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn generate_signed_token(
        &self,
        files: &[FileInfo],
        sc: &SigningConfig,
        key_id: &str,
    ) -> Result<String>;
}

/// Verifies bundle signatures and returns the signed files by name.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify_bundle_signature(
        &self,
        sc: &SignaturesConfig,
        bvc: &VerificationConfig,
    ) -> Result<HashMap<String, FileInfo>>;
}
