//! Input signing and verification.
//!
//! Signing is a separate step from assembling inputs and outputs, so the
//! builder can be exercised with alternate signers (hardware, remote) that
//! implement [`Signer`]. The default [`Ed25519Signer`] signs each input's
//! [`sighash`](super::sighash) digest with the spending key.

use crate::config::SIGHASH_ALL_FORKID;
use crate::crypto::keys::{PublicKey, SpendKey};
use crate::error::{SpendError, SpendResult};
use crate::script::Script;
use crate::utxo::UnspentOutput;

use super::sighash::signature_hash_all;
use super::types::Transaction;

/// A signature over one input plus the key that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignature {
    /// 64-byte Ed25519 signature.
    pub signature: [u8; 64],
    /// Sighash type appended to the signature in the unlocking script.
    pub sighash_type: u8,
    pub public_key: PublicKey,
}

impl InputSignature {
    /// `<signature ‖ sighash byte> <public key>`.
    pub fn to_unlocking_script(&self) -> Script {
        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(&self.signature);
        sig.push(self.sighash_type);
        Script::pay_to_key_hash_unlock(&sig, self.public_key.as_bytes())
    }
}

/// Produces input signatures.
pub trait Signer: Send + Sync {
    /// Sign input `input_index` of `tx`, which spends `spent`.
    ///
    /// Fails with `AuthorizationFailure` if `key` does not control
    /// `spent.script`.
    fn sign(
        &self,
        tx: &Transaction,
        input_index: usize,
        spent: &UnspentOutput,
        key: &SpendKey,
    ) -> SpendResult<InputSignature>;
}

/// Default signer: Ed25519 over the FORKID sighash digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl Signer for Ed25519Signer {
    fn sign(
        &self,
        tx: &Transaction,
        input_index: usize,
        spent: &UnspentOutput,
        key: &SpendKey,
    ) -> SpendResult<InputSignature> {
        ensure_key_controls(key, &spent.script)?;
        let digest = signature_hash_all(tx, input_index, &spent.script, spent.value)?;
        Ok(InputSignature {
            signature: key.sign(&digest),
            sighash_type: SIGHASH_ALL_FORKID as u8,
            public_key: key.public_key(),
        })
    }
}

/// Checks that `script` is a pay-to-key-hash script for `key`.
pub fn ensure_key_controls(key: &SpendKey, script: &Script) -> SpendResult<()> {
    match script.pay_to_key_hash_target() {
        Some(target) if target == key.pk_hash() => Ok(()),
        Some(target) => Err(SpendError::AuthorizationFailure(format!(
            "key {} cannot spend output locked to {}",
            key.pk_hash(),
            target
        ))),
        None => Err(SpendError::AuthorizationFailure(
            "output is not pay-to-key-hash".into(),
        )),
    }
}

/// Verifies the unlocking script of input `input_index` against the output
/// it spends.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    spent: &UnspentOutput,
) -> SpendResult<()> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        SpendError::InvalidTransaction(format!("no input at index {input_index}"))
    })?;
    if input.previous_output != spent.outpoint {
        return Err(SpendError::InvalidTransaction(format!(
            "input {} spends {}, not {}",
            input_index, input.previous_output, spent.outpoint
        )));
    }

    let (sig, pubkey) = input.unlocking_script.unlock_parts()?;
    let public_key = PublicKey::try_from_slice(&pubkey)
        .map_err(|e| SpendError::AuthorizationFailure(e.to_string()))?;

    let target = spent.script.pay_to_key_hash_target().ok_or_else(|| {
        SpendError::AuthorizationFailure("spent output is not pay-to-key-hash".into())
    })?;
    if public_key.pk_hash() != target {
        return Err(SpendError::AuthorizationFailure(format!(
            "public key hashes to {}, script expects {}",
            public_key.pk_hash(),
            target
        )));
    }

    let Some((&sighash_byte, signature)) = sig.split_last() else {
        return Err(SpendError::AuthorizationFailure("empty signature".into()));
    };
    if u32::from(sighash_byte) != SIGHASH_ALL_FORKID {
        return Err(SpendError::AuthorizationFailure(format!(
            "input {input_index}: unsupported sighash type {sighash_byte:#04x}"
        )));
    }
    let digest = signature_hash_all(tx, input_index, &spent.script, spent.value)?;
    if !public_key.verify(&digest, signature) {
        return Err(SpendError::AuthorizationFailure(format!(
            "signature on input {input_index} does not verify"
        )));
    }
    Ok(())
}

/// Verifies every input. `spent[i]` must be the output spent by input `i`.
pub fn verify_transaction(tx: &Transaction, spent: &[UnspentOutput]) -> SpendResult<()> {
    if spent.len() != tx.inputs.len() {
        return Err(SpendError::InvalidTransaction(format!(
            "{} spent outputs supplied for {} inputs",
            spent.len(),
            tx.inputs.len()
        )));
    }
    for (index, output) in spent.iter().enumerate() {
        verify_input(tx, index, output)?;
    }
    Ok(())
}
