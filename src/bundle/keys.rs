use crate::{
    error::{Error, Result},
    jws::Header,
};

/// Picks the id of the key a token is verified with.
///
/// Precedence: the configured key id, then the header `kid`, then the
/// deprecated `keyid` payload claim. The first non-empty value wins.
pub fn resolve_key_id<'a>(
    configured: &'a str,
    header: &'a Header,
    payload_keyid: &'a str,
) -> Result<&'a str> {
    [configured, header.key_id().unwrap_or_default(), payload_keyid]
        .into_iter()
        .find(|key_id| !key_id.is_empty())
        .ok_or(Error::MissingKeyID)
}
