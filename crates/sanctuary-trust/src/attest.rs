use chrono::{DateTime, Duration, Utc};
use sanctuary_crypto::{keccak256, Address};
use sanctuary_storage::AttestationRepository;
use sanctuary_types::{Attestation, AttestationLedger, LedgerTxStatus, ATTESTATION_COOLDOWN_DAYS};

use crate::error::TrustError;

/// `attest(from, about, note)` (§4.6). The note is content-addressed and
/// stored once; repeated identical notes from anyone collapse onto the same
/// row.
pub async fn attest<S, L>(
    storage: &S,
    ledger: &L,
    from: Address,
    about: Address,
    note_text: String,
    now: DateTime<Utc>,
) -> Result<Attestation, TrustError>
where
    S: AttestationRepository,
    L: AttestationLedger,
{
    if from == about {
        return Err(TrustError::SelfAttestation);
    }

    let since = now - Duration::days(ATTESTATION_COOLDOWN_DAYS);
    if storage.exists_since(&from, &about, since).await? {
        return Err(TrustError::CooldownActive);
    }

    let note_hash = keccak256(note_text.as_bytes());
    storage.insert_note_if_absent(note_hash, note_text).await?;

    let (tx_handle, status) = ledger
        .submit(note_hash.to_vec())
        .await
        .map_err(|e| TrustError::Ledger(e.to_string()))?;

    let attestation = Attestation {
        from,
        about,
        note_hash,
        tx_handle,
        simulated: status == LedgerTxStatus::Simulated,
        status,
        created_at: now,
    };
    storage.insert(attestation.clone()).await?;
    Ok(attestation)
}
