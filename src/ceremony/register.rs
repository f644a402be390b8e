use std::io::Read;

use super::{CeremonyError, encode_response};
use crate::config::CeremonyConfig;
use crate::key::cose::COSE_ALG_ES256;
use crate::key::{KeyHandle, KeyStore};
use crate::webauthn::attestation::build_none_attestation_object;
use crate::webauthn::client_data::fully_qualified_origin;
use crate::webauthn::types::{
    AuthenticatorAttestationResponse, CredentialCreation, CredentialCreationResponse,
    PUBLIC_KEY_TYPE, PublicKeyCredentialCreationOptions,
};
use crate::webauthn::{
    AttestedCredentialData, AuthenticatorData, CeremonyType, CollectedClientData, Flags, base64url,
};

/// Read credential creation options JSON from `input` and return the
/// serialized creation response.
pub fn register<S: KeyStore, R: Read>(
    store: &S,
    cfg: &CeremonyConfig,
    input: R,
) -> Result<Vec<u8>, CeremonyError> {
    let creation: CredentialCreation =
        serde_json::from_reader(input).map_err(CeremonyError::Request)?;
    let response = build_creation_response(store, cfg, &creation)?;
    encode_response(&response)
}

fn validate(opts: &PublicKeyCredentialCreationOptions) -> Result<(), CeremonyError> {
    if opts.challenge.is_empty() {
        return Err(CeremonyError::Validation("challenge missing".into()));
    }
    if opts.rp.id.is_empty() {
        return Err(CeremonyError::Validation("relying party ID missing".into()));
    }
    let es256_offered = opts
        .pub_key_cred_params
        .iter()
        .any(|p| p.kind == PUBLIC_KEY_TYPE && p.alg == COSE_ALG_ES256);
    if !opts.pub_key_cred_params.is_empty() && !es256_offered {
        return Err(CeremonyError::Validation(
            "no supported algorithm offered (need ES256)".into(),
        ));
    }
    Ok(())
}

/// Create and persist a new credential and build its attestation response.
pub fn build_creation_response<S: KeyStore>(
    store: &S,
    cfg: &CeremonyConfig,
    creation: &CredentialCreation,
) -> Result<CredentialCreationResponse, CeremonyError> {
    let opts = &creation.public_key;

    // 1. Validate before touching any key material
    validate(opts)?;
    let origin = fully_qualified_origin(&cfg.origin)?;
    for excluded in &opts.exclude_credentials {
        if store.is_owned(&excluded.id)? {
            return Err(CeremonyError::CredentialExcluded(hex::encode(&excluded.id)));
        }
    }

    // 2. New key handle, held in memory until the response is complete
    let key_handle = store.new_key_handle()?;
    let cred_id = key_handle.id().to_vec();

    // 3. Client data
    let client_data_json =
        CollectedClientData::new(CeremonyType::Create, &opts.challenge, origin).to_json()?;

    // 4. Authenticator data with attested credential data
    let flags = Flags::USER_PRESENT | Flags::USER_VERIFIED | Flags::ATTESTED_CREDENTIAL_DATA;
    let auth_data = AuthenticatorData::new(&opts.rp.id, flags, cfg.counter)
        .with_attested(AttestedCredentialData {
            aaguid: *cfg.aaguid.as_bytes(),
            credential_id: cred_id.clone(),
            public_key: key_handle.cbor_public_key()?,
        })
        .to_bytes()?;

    // 5. "none" attestation object
    let attestation_object = build_none_attestation_object(&auth_data)?;

    let response = CredentialCreationResponse {
        id: base64url::encode(&cred_id),
        raw_id: cred_id,
        kind: PUBLIC_KEY_TYPE.to_string(),
        response: AuthenticatorAttestationResponse {
            client_data_json,
            attestation_object,
        },
    };

    // id and rawId must name the same bytes
    if base64url::decode(&response.id).ok().as_deref() != Some(response.raw_id.as_slice()) {
        return Err(CeremonyError::Internal(format!(
            "credential id {} does not match raw id",
            response.id
        )));
    }

    // 6. Persist the key and the user link together, only once nothing else can fail
    let user = (!opts.user.name.is_empty()).then(|| (opts.user.name.as_str(), opts.user.id.as_slice()));
    store.store_credential(&key_handle, user)?;

    tracing::info!(
        cred_id = %hex::encode(&response.raw_id),
        rp_id = %opts.rp.id,
        "Credential registered"
    );
    if tracing::enabled!(tracing::Level::TRACE) {
        if let Ok(json) = serde_json::to_string_pretty(&response) {
            tracing::trace!("creation response:\n{json}");
        }
    }
    Ok(response)
}
