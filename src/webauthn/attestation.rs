use ciborium::value::Value;

use super::CodecError;

pub const FORMAT_NONE: &str = "none";

/// Build a "none" attestation object: `{fmt: "none", attStmt: {}, authData}`.
pub fn build_none_attestation_object(auth_data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let map = Value::Map(vec![
        (
            Value::Text("fmt".to_string()),
            Value::Text(FORMAT_NONE.to_string()),
        ),
        (Value::Text("attStmt".to_string()), Value::Map(Vec::new())),
        (
            Value::Text("authData".to_string()),
            Value::Bytes(auth_data.to_vec()),
        ),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf).map_err(|e| CodecError::Cbor(e.to_string()))?;
    Ok(buf)
}
