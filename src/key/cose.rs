use ciborium::value::Value;

use crate::cipher::CryptoError;

/// COSE algorithm identifier for ES256 (ECDSA P-256 with SHA-256).
pub const COSE_ALG_ES256: i64 = -7;
const COSE_KTY_EC2: i64 = 2;
const COSE_CRV_P256: i64 = 1;

/// Encode a P-256 public key as a COSE_Key CBOR map (kty=2, alg=-7, crv=1, x, y).
pub fn encode_cose_key(x: &[u8; 32], y: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let map = Value::Map(vec![
        (Value::Integer(1i64.into()), Value::Integer(COSE_KTY_EC2.into())),
        (Value::Integer(3i64.into()), Value::Integer(COSE_ALG_ES256.into())),
        (Value::Integer((-1i64).into()), Value::Integer(COSE_CRV_P256.into())),
        (Value::Integer((-2i64).into()), Value::Bytes(x.to_vec())),
        (Value::Integer((-3i64).into()), Value::Bytes(y.to_vec())),
    ]);
    let mut buf = Vec::new();
    ciborium::into_writer(&map, &mut buf)
        .map_err(|e| CryptoError::KeyMaterial(format!("COSE key encoding: {e}")))?;
    Ok(buf)
}

/// Extract (x, y) from a COSE_Key produced by [`encode_cose_key`].
pub fn decode_cose_key(bytes: &[u8]) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| CryptoError::KeyMaterial(format!("COSE key decoding: {e}")))?;
    let Value::Map(map) = value else {
        return Err(CryptoError::KeyMaterial("COSE key is not a map".into()));
    };
    let coord = |label: i64| -> Result<[u8; 32], CryptoError> {
        let target = Value::Integer(label.into());
        map.iter()
            .find(|(k, _)| k == &target)
            .and_then(|(_, v)| v.as_bytes())
            .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
            .ok_or_else(|| CryptoError::KeyMaterial(format!("COSE key label {label} missing")))
    };
    Ok((coord(-2)?, coord(-3)?))
}
