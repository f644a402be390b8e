use std::io::Read;

use super::{CeremonyError, encode_response, signed_payload};
use crate::config::CeremonyConfig;
use crate::key::{KeyHandle, KeyStore};
use crate::webauthn::client_data::fully_qualified_origin;
use crate::webauthn::types::{
    AuthenticatorAssertionResponse, CredentialAssertion, CredentialAssertionResponse,
    PUBLIC_KEY_TYPE,
};
use crate::webauthn::{
    AttestedCredentialData, AuthenticatorData, CeremonyType, CollectedClientData, Flags, base64url,
};

/// Read credential assertion options JSON from `input` and return the
/// serialized assertion response.
pub fn login<S: KeyStore, R: Read>(
    store: &S,
    cfg: &CeremonyConfig,
    input: R,
) -> Result<Vec<u8>, CeremonyError> {
    let assertion: CredentialAssertion =
        serde_json::from_reader(input).map_err(CeremonyError::Request)?;
    let response = build_assertion_response(store, cfg, &assertion)?;
    encode_response(&response)
}

/// Sign the relying party's challenge with the first allowed credential
/// this authenticator owns.
///
/// Unlike most authenticators, the assertion's authenticator data also
/// carries the attested credential data block with the AT flag set. The
/// signature covers these bytes as-is.
pub fn build_assertion_response<S: KeyStore>(
    store: &S,
    cfg: &CeremonyConfig,
    assertion: &CredentialAssertion,
) -> Result<CredentialAssertionResponse, CeremonyError> {
    let opts = &assertion.public_key;
    if opts.challenge.is_empty() {
        return Err(CeremonyError::Validation("challenge missing".into()));
    }
    if opts.rp_id.is_empty() {
        return Err(CeremonyError::Validation("relying party ID missing".into()));
    }
    let origin = fully_qualified_origin(&cfg.origin)?;

    // 1. First allowed credential we own
    let mut found = None;
    for allowed in &opts.allow_credentials {
        if let Some(handle) = store.key_handle(&allowed.id)? {
            found = Some(handle);
            break;
        }
    }
    let Some(key_handle) = found else {
        tracing::warn!(
            rp_id = %opts.rp_id,
            allowed = opts.allow_credentials.len(),
            "No allowed credential belongs to this authenticator"
        );
        return Err(CeremonyError::AuthenticatorNotFound);
    };
    let cred_id = key_handle.id().to_vec();

    // 2. Client data
    let client_data_json =
        CollectedClientData::new(CeremonyType::Get, &opts.challenge, origin).to_json()?;

    // 3. Authenticator data
    let flags = Flags::USER_PRESENT | Flags::USER_VERIFIED | Flags::ATTESTED_CREDENTIAL_DATA;
    let authenticator_data = AuthenticatorData::new(&opts.rp_id, flags, cfg.counter)
        .with_attested(AttestedCredentialData {
            aaguid: *cfg.aaguid.as_bytes(),
            credential_id: cred_id.clone(),
            public_key: key_handle.cbor_public_key()?,
        })
        .to_bytes()?;

    // 4. Sign authData || SHA-256(clientDataJSON)
    let signature = key_handle.sign(&signed_payload(&authenticator_data, &client_data_json))?;

    tracing::info!(
        cred_id = %hex::encode(&cred_id),
        rp_id = %opts.rp_id,
        counter = cfg.counter,
        "Assertion signed"
    );

    Ok(CredentialAssertionResponse {
        id: base64url::encode(&cred_id),
        raw_id: cred_id,
        kind: PUBLIC_KEY_TYPE.to_string(),
        response: AuthenticatorAssertionResponse {
            client_data_json,
            authenticator_data,
            signature,
        },
    })
}
