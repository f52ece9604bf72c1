use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::algorithm::SignatureAlgorithm;
use crate::error::{Error, Result};

/// Header field name of the signature algorithm.
pub const ALGORITHM_KEY: &str = "alg";
/// Header field name of the key identifier.
pub const KEY_ID_KEY: &str = "kid";

/// Protected header of a compact token.
///
/// The fields this crate inspects are typed; any other field is kept as-is so
/// headers written by newer producers survive a parse/serialize cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "alg", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<SignatureAlgorithm>,
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Header {
    /// Creates a header carrying only the algorithm.
    pub fn with_algorithm(alg: SignatureAlgorithm) -> Self {
        Header {
            algorithm: Some(alg),
            ..Default::default()
        }
    }

    /// Sets a header field, validating the recognized ones.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            ALGORITHM_KEY => {
                let alg = value
                    .as_str()
                    .ok_or_else(|| Error::UnsupportedAlgorithm(value.to_string()))?;
                self.algorithm = Some(SignatureAlgorithm::from_identifier(alg)?);
            }
            KEY_ID_KEY => match value {
                Value::String(kid) if !kid.is_empty() => self.key_id = Some(kid),
                other => {
                    return Err(Error::InvalidHeader(format!(
                        "'{KEY_ID_KEY}' must be a non-empty string, got {other}"
                    )))
                }
            },
            _ => {
                self.extra.insert(field.to_owned(), value);
            }
        }
        Ok(())
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ALGORITHM_KEY => self.algorithm.map(|alg| Value::String(alg.to_string())),
            KEY_ID_KEY => self.key_id.clone().map(Value::String),
            _ => self.extra.get(field).cloned(),
        }
    }

    /// The key id, treating an empty string as absent.
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref().filter(|kid| !kid.is_empty())
    }

    /// Canonical JSON bytes of the header. Absent optional fields are omitted.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidHeader(format!("failed to parse JOSE headers: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_only_set_fields() {
        let header = Header::with_algorithm(SignatureAlgorithm::RS256);
        assert_eq!(header.serialize().unwrap(), br#"{"alg":"RS256"}"#.to_vec());

        let mut header = Header::default();
        header.set(ALGORITHM_KEY, json!("ES256")).unwrap();
        header.set(KEY_ID_KEY, json!("proj-1")).unwrap();
        header.set("typ", json!("JWT")).unwrap();
        assert_eq!(
            String::from_utf8(header.serialize().unwrap()).unwrap(),
            r#"{"alg":"ES256","kid":"proj-1","typ":"JWT"}"#
        );
    }

    #[test]
    fn set_validates_recognized_fields() {
        let mut header = Header::default();

        let err = header.set(ALGORITHM_KEY, json!("none")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
        let err = header.set(ALGORITHM_KEY, json!(256)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));

        let err = header.set(KEY_ID_KEY, json!("")).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
        let err = header.set(KEY_ID_KEY, json!(7)).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));

        assert_eq!(header, Header::default());
    }

    #[test]
    fn get_returns_typed_and_opaque_fields() {
        let mut header = Header::with_algorithm(SignatureAlgorithm::HS512);
        header.set("x-custom", json!({"nested": true})).unwrap();

        assert_eq!(header.get(ALGORITHM_KEY), Some(json!("HS512")));
        assert_eq!(header.get(KEY_ID_KEY), None);
        assert_eq!(header.get("x-custom"), Some(json!({"nested": true})));
    }

    #[test]
    fn deserialize_preserves_unknown_fields() {
        let header =
            Header::deserialize(br#"{"alg":"PS384","kid":"k","crit":["b64"],"b64":false}"#)
                .unwrap();
        assert_eq!(header.algorithm, Some(SignatureAlgorithm::PS384));
        assert_eq!(header.key_id(), Some("k"));
        assert_eq!(header.extra.get("b64"), Some(&json!(false)));

        let reparsed = Header::deserialize(&header.serialize().unwrap()).unwrap();
        assert_eq!(reparsed, header);
    }

    #[test]
    fn deserialize_rejects_bad_shapes() {
        for input in [
            &b"not json"[..],
            br#"["alg"]"#,
            br#"{"alg":"none"}"#,
            br#"{"alg":1}"#,
            br#"{"kid":{"id":1}}"#,
        ] {
            let err = Header::deserialize(input).unwrap_err();
            assert!(matches!(err, Error::InvalidHeader(_)), "{err:?}");
        }
    }
}
