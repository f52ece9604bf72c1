//! Detached-signature tokens for distributable bundles.
//!
//! This crate signs the file manifest of a bundle into a compact JWS token with
//! a key held by a remote signing gateway, and verifies such tokens against the
//! gateway's certificates before the bundle is trusted.

/// Bundle payload model, signer and verifier
pub mod bundle;

/// Error taxonomy shared by signing and verification
pub mod error;

/// Remote signing gateway interface and connectors
pub mod gateway;

/// Compact JWS header, codec, signing and verification
pub mod jws;

pub use error::{Error, Result};
