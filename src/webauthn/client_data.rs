use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::{CodecError, base64url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CeremonyType {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

/// `CollectedClientData`, serialized in field order `type, challenge, origin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedClientData {
    #[serde(rename = "type")]
    pub ceremony: CeremonyType,
    /// base64url of the relying party's challenge
    pub challenge: String,
    pub origin: String,
}

impl CollectedClientData {
    pub fn new(ceremony: CeremonyType, challenge: &[u8], origin: String) -> Self {
        Self {
            ceremony,
            challenge: base64url::encode(challenge),
            origin,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// SHA-256 of the serialized client data, the second half of the signed payload.
pub fn client_data_hash(client_data_json: &[u8]) -> [u8; 32] {
    Sha256::digest(client_data_json).into()
}

/// Reduce `origin` to `scheme://host[:port]`, dropping path, query and
/// default ports.
pub fn fully_qualified_origin(origin: &Url) -> Result<String, CodecError> {
    let serialized = origin.origin().ascii_serialization();
    if serialized == "null" {
        return Err(CodecError::Origin(format!("{origin} has no tuple origin")));
    }
    Ok(serialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_order_and_type() {
        let cd = CollectedClientData::new(
            CeremonyType::Create,
            &[1, 2, 3],
            "https://example.com".into(),
        );
        let json = String::from_utf8(cd.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"type":"webauthn.create","challenge":"AQID","origin":"https://example.com"}"#
        );
    }

    #[test]
    fn test_get_type() {
        let cd = CollectedClientData::new(CeremonyType::Get, b"c", "https://a.b".into());
        let parsed: serde_json::Value = serde_json::from_slice(&cd.to_json().unwrap()).unwrap();
        assert_eq!(parsed["type"], "webauthn.get");
    }

    #[test]
    fn test_fully_qualified_origin() {
        let url = Url::parse("https://example.com/register/begin?x=1").unwrap();
        assert_eq!(fully_qualified_origin(&url).unwrap(), "https://example.com");

        let url = Url::parse("http://localhost:8090/").unwrap();
        assert_eq!(fully_qualified_origin(&url).unwrap(), "http://localhost:8090");

        let url = Url::parse("https://example.com:443").unwrap();
        assert_eq!(fully_qualified_origin(&url).unwrap(), "https://example.com");

        let url = Url::parse("file:///tmp/x").unwrap();
        assert!(fully_qualified_origin(&url).is_err());
    }
}
