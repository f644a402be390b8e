use sha2::{Digest, Sha256};

use super::CodecError;

/// Authenticator data flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const USER_PRESENT: Flags = Flags(0x01);
    pub const USER_VERIFIED: Flags = Flags(0x04);
    pub const ATTESTED_CREDENTIAL_DATA: Flags = Flags(0x40);
    pub const EXTENSION_DATA: Flags = Flags(0x80);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    const fn with(self, other: Flags, on: bool) -> Flags {
        if on {
            Flags(self.0 | other.0)
        } else {
            Flags(self.0 & !other.0)
        }
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    /// CBOR-encoded COSE_Key.
    pub public_key: Vec<u8>,
}

/// Authenticator data block. Relying parties verify signatures over the
/// exact bytes produced by [`AuthenticatorData::to_bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: Flags,
    pub sign_count: u32,
    pub attested: Option<AttestedCredentialData>,
    /// Pre-encoded CBOR extensions map.
    pub extensions: Option<Vec<u8>>,
}

/// SHA-256 of the relying party identifier.
pub fn rp_id_hash(rp_id: &str) -> [u8; 32] {
    Sha256::digest(rp_id.as_bytes()).into()
}

impl AuthenticatorData {
    pub fn new(rp_id: &str, flags: Flags, sign_count: u32) -> Self {
        Self {
            rp_id_hash: rp_id_hash(rp_id),
            flags,
            sign_count,
            attested: None,
            extensions: None,
        }
    }

    pub fn with_attested(mut self, attested: AttestedCredentialData) -> Self {
        self.attested = Some(attested);
        self
    }

    /// Flags as written: AT and ED follow the presence of their blocks.
    pub fn effective_flags(&self) -> Flags {
        self.flags
            .with(Flags::ATTESTED_CREDENTIAL_DATA, self.attested.is_some())
            .with(Flags::EXTENSION_DATA, self.extensions.is_some())
    }

    /// Layout (big-endian, no padding):
    /// `rpIdHash(32) | flags(1) | signCount(4) | [aaguid(16) | credIdLen(2) | credId | coseKey] | [extensions]`
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut data = Vec::with_capacity(37);
        data.extend_from_slice(&self.rp_id_hash);
        data.push(self.effective_flags().bits());
        data.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some(att) = &self.attested {
            let cred_id_len = u16::try_from(att.credential_id.len()).map_err(|_| {
                CodecError::Layout(format!(
                    "credential ID too long: {} bytes",
                    att.credential_id.len()
                ))
            })?;
            data.extend_from_slice(&att.aaguid);
            data.extend_from_slice(&cred_id_len.to_be_bytes());
            data.extend_from_slice(&att.credential_id);
            data.extend_from_slice(&att.public_key);
        }
        if let Some(ext) = &self.extensions {
            data.extend_from_slice(ext);
        }
        Ok(data)
    }
}
