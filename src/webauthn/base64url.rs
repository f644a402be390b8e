//! Unpadded base64url, as WebAuthn puts binary fields into JSON.
//!
//! Use with `#[serde(with = "base64url")]` on `Vec<u8>` fields. Decoding
//! tolerates trailing `=` padding since some servers emit it.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serializer};

pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
}

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_tolerated() {
        assert_eq!(decode("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode("AQI=").unwrap(), vec![1, 2]);
        assert_eq!(encode(&[1, 2]), "AQI");
    }

    #[test]
    fn test_url_alphabet() {
        assert_eq!(encode(&[0xfb, 0xff]), "-_8");
        assert!(decode("+/8").is_err());
    }
}
