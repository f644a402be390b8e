use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rand::rngs::OsRng;

use super::{CREDENTIAL_ID_LEN, KeyHandle, cose};
use crate::cipher::CryptoError;

/// ES256 key pair held in process memory.
pub struct SoftKeyHandle {
    id: Vec<u8>,
    signing_key: SigningKey,
}

impl SoftKeyHandle {
    /// Fresh random credential ID and key pair.
    pub fn generate() -> Self {
        let mut id = vec![0u8; CREDENTIAL_ID_LEN];
        rand::thread_rng().fill_bytes(&mut id);
        Self {
            id,
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub(crate) fn from_secret(id: Vec<u8>, secret: &[u8]) -> Result<Self, CryptoError> {
        let signing_key = SigningKey::from_slice(secret)
            .map_err(|e| CryptoError::KeyMaterial(format!("invalid P-256 scalar: {e}")))?;
        Ok(Self { id, signing_key })
    }

    /// Private scalar, for sealing into the enclave only.
    pub(crate) fn secret_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    fn public_coords(&self) -> Result<([u8; 32], [u8; 32]), CryptoError> {
        let point = self.verifying_key().to_encoded_point(false);
        let coord = |c: Option<&p256::FieldBytes>| -> Result<[u8; 32], CryptoError> {
            c.and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
                .ok_or_else(|| CryptoError::KeyMaterial("public key is the identity point".into()))
        };
        Ok((coord(point.x())?, coord(point.y())?))
    }
}

impl std::fmt::Debug for SoftKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftKeyHandle")
            .field("id", &hex::encode(&self.id))
            .finish_non_exhaustive()
    }
}

impl KeyHandle for SoftKeyHandle {
    fn id(&self) -> &[u8] {
        &self.id
    }

    fn cbor_public_key(&self) -> Result<Vec<u8>, CryptoError> {
        let (x, y) = self.public_coords()?;
        cose::encode_cose_key(&x, &y)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let signature: Signature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::EncodedPoint;
    use p256::ecdsa::signature::Verifier;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SoftKeyHandle::generate();
        let b = SoftKeyHandle::generate();
        assert_eq!(a.id().len(), CREDENTIAL_ID_LEN);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_signature_verifies_against_cose_key() {
        let handle = SoftKeyHandle::generate();
        let der = handle.sign(b"authenticator data").unwrap();
        assert_eq!(der[0], 0x30, "DER signature must start with SEQUENCE");

        let (x, y) = cose::decode_cose_key(&handle.cbor_public_key().unwrap()).unwrap();
        let point = EncodedPoint::from_affine_coordinates(&x.into(), &y.into(), false);
        let vk = VerifyingKey::from_encoded_point(&point).unwrap();
        let sig = Signature::from_der(&der).unwrap();
        assert!(vk.verify(b"authenticator data", &sig).is_ok());
        assert!(vk.verify(b"something else", &sig).is_err());
    }

    #[test]
    fn test_secret_restores_same_key() {
        let handle = SoftKeyHandle::generate();
        let restored =
            SoftKeyHandle::from_secret(handle.id().to_vec(), &handle.secret_bytes()).unwrap();
        assert_eq!(restored.id(), handle.id());
        assert_eq!(
            restored.cbor_public_key().unwrap(),
            handle.cbor_public_key().unwrap()
        );
    }

    #[test]
    fn test_invalid_secret_rejected() {
        assert!(SoftKeyHandle::from_secret(vec![1], &[0u8; 32]).is_err());
        assert!(SoftKeyHandle::from_secret(vec![1], &[1u8; 7]).is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let handle = SoftKeyHandle::generate();
        let dbg = format!("{handle:?}");
        assert!(!dbg.contains(&hex::encode(handle.secret_bytes())));
    }
}
