use base64::engine::{general_purpose::URL_SAFE_NO_PAD as BASE64_URL_NO_PAD, Engine};

use super::header::Header;
use crate::error::{Error, Result};

/// A compact token decoded into its three parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    /// Raw header bytes exactly as carried in the token.
    pub header_bytes: Vec<u8>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Message {
    /// Recomputes the signing input from the decoded header and payload bytes.
    pub fn signing_input(&self) -> Vec<u8> {
        build_signing_input(&self.header_bytes, &self.payload)
    }
}

/// Splits a token into header, payload and signature segments.
///
/// Segments past the third are ignored rather than rejected. This is a tolerance
/// of the reader, writers always produce exactly three.
pub fn split(token: &str) -> Result<[&str; 3]> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature)) => Ok([header, payload, signature]),
        _ => Err(Error::MalformedToken(
            "failed to split compact serialization".to_owned(),
        )),
    }
}

/// `b64url(header) + "." + b64url(payload)`, unpadded.
///
/// Both the sign and the verify path go through this function; a verifier never
/// reuses the encoded segments it was handed.
pub fn build_signing_input(header: &[u8], payload: &[u8]) -> Vec<u8> {
    encode_signing_input(header, payload).into_bytes()
}

fn encode_signing_input(header: &[u8], payload: &[u8]) -> String {
    let mut input = BASE64_URL_NO_PAD.encode(header);
    input.push('.');
    BASE64_URL_NO_PAD.encode_string(payload, &mut input);
    input
}

/// Produces `b64url(header).b64url(payload).b64url(signature)`.
pub fn assemble(header: &[u8], payload: &[u8], signature: &[u8]) -> String {
    let mut token = encode_signing_input(header, payload);
    token.push('.');
    BASE64_URL_NO_PAD.encode_string(signature, &mut token);
    token
}

pub(crate) fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    BASE64_URL_NO_PAD
        .decode(segment)
        .map_err(|e| Error::MalformedToken(format!("failed to decode {what}: {e}")))
}

/// Decodes all three segments of a compact token.
pub fn parse(token: &str) -> Result<Message> {
    let [header, payload, signature] = split(token)?;

    let header_bytes = decode_segment(header, "headers")?;
    let payload = decode_segment(payload, "payload")?;
    let signature = decode_segment(signature, "signature")?;
    let header = Header::deserialize(&header_bytes)?;

    Ok(Message {
        header,
        header_bytes,
        payload,
        signature,
    })
}
