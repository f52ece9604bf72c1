//! Compact JWS: header model, codec, signing through a gateway and verification.
//!
//! Signing a payload produces `b64url(header).b64url(payload).b64url(signature)`
//! where the signature covers `b64url(header).b64url(payload)`. Only the
//! single-signature compact serialization is supported.

pub mod algorithm;
pub mod compact;
pub mod header;
pub mod sign;
pub mod verify;

pub use algorithm::{DigestAlgorithm, SignatureAlgorithm};
pub use compact::{assemble, build_signing_input, parse, split, Message};
pub use header::Header;
pub use sign::{sign_literal, sign_with_default_header};
pub use verify::{verify, verify_token, VerificationKey};
