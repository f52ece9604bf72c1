use thiserror::Error;

/// Errors produced while signing or verifying a bundle signature token.
///
/// Every failure is fatal to trust establishment: there is no partial success
/// and nothing is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// The token does not have the `header.payload.signature` structure, or a
    /// segment is not valid base64url.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The protected header is not a JSON object of the recognized shape.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The decoded payload is not a signature payload object.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Unknown or unhandled signature algorithm or digest identifier.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key does not match the family or curve the algorithm requires.
    #[error("invalid key type: {0}")]
    InvalidKeyType(String),

    /// Cryptographic verification did not validate.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// No key identity could be resolved from configuration, header or payload.
    #[error("verification key ID is empty")]
    MissingKeyID,

    /// Key material or key configuration could not be obtained.
    #[error("key lookup failed for '{key_id}'")]
    KeyLookupFailed {
        key_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The remote gateway failed to produce a signature.
    #[error("signing failed for project '{project}'")]
    SigningFailed {
        project: String,
        #[source]
        source: anyhow::Error,
    },

    /// The custom claims file could not be read or parsed.
    #[error("failed to load claims from '{path}'")]
    ClaimsLoadError {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// The signatures file lists no token.
    #[error(".signatures.json: missing JWT (expected exactly one)")]
    NoSignaturePresent,

    /// The signatures file lists more than one token.
    #[error(".signatures.json: multiple JWTs not supported (expected exactly one)")]
    MultipleSignaturesUnsupported,

    /// The payload scope does not equal the expected scope.
    #[error("scope mismatch: expected '{expected}', found '{found}'")]
    ScopeMismatch { expected: String, found: String },

    /// Local JSON serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn key_lookup(key_id: &str, source: impl Into<anyhow::Error>) -> Self {
        Error::KeyLookupFailed {
            key_id: key_id.to_owned(),
            source: source.into(),
        }
    }
}
