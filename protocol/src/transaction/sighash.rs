//! Signature hash computation.
//!
//! The digest signed to authorize spending one input. It follows the
//! BIP-143 layout used by the FORKID chains, which commits to the value of
//! the output being spent.
//!
//! Only `SIGHASH_ALL | SIGHASH_FORKID` is produced by this crate, but the
//! flag is part of the preimage and is passed explicitly.

use crate::config::SIGHASH_ALL_FORKID;
use crate::crypto::hash::double_sha256;
use crate::error::{SpendError, SpendResult};
use crate::script::Script;

use super::types::{write_var_bytes, Transaction};

/// Compute the 32-byte digest for `input_index`.
///
/// * `prev_script` - the locking script of the output being spent.
/// * `prev_value`  - the value of the output being spent.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_script: &Script,
    prev_value: u64,
    sighash_type: u32,
) -> SpendResult<[u8; 32]> {
    let preimage = preimage(tx, input_index, prev_script, prev_value, sighash_type)?;
    Ok(double_sha256(&preimage))
}

/// Digest with the default sighash type.
pub fn signature_hash_all(
    tx: &Transaction,
    input_index: usize,
    prev_script: &Script,
    prev_value: u64,
) -> SpendResult<[u8; 32]> {
    signature_hash(tx, input_index, prev_script, prev_value, SIGHASH_ALL_FORKID)
}

/// The preimage bytes before double hashing:
///
/// 1. version (4 LE)
/// 2. hashPrevouts (32)
/// 3. hashSequence (32)
/// 4. outpoint being spent (36)
/// 5. scriptCode (var bytes)
/// 6. value being spent (8 LE)
/// 7. nSequence of this input (4 LE)
/// 8. hashOutputs (32)
/// 9. lock_time (4 LE)
/// 10. sighash type (4 LE)
pub fn preimage(
    tx: &Transaction,
    input_index: usize,
    prev_script: &Script,
    prev_value: u64,
    sighash_type: u32,
) -> SpendResult<Vec<u8>> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        SpendError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        ))
    })?;

    let mut buf = Vec::with_capacity(160 + prev_script.len());
    buf.extend_from_slice(&tx.version.to_le_bytes());
    buf.extend_from_slice(&prevouts_hash(tx));
    buf.extend_from_slice(&sequence_hash(tx));
    input.previous_output.write_to(&mut buf);
    write_var_bytes(&mut buf, prev_script.as_bytes());
    buf.extend_from_slice(&prev_value.to_le_bytes());
    buf.extend_from_slice(&input.sequence.to_le_bytes());
    buf.extend_from_slice(&outputs_hash(tx));
    buf.extend_from_slice(&tx.lock_time.to_le_bytes());
    buf.extend_from_slice(&sighash_type.to_le_bytes());
    Ok(buf)
}

fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        input.previous_output.write_to(&mut buf);
    }
    double_sha256(&buf)
}

fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    double_sha256(&buf)
}

fn outputs_hash(tx: &Transaction) -> [u8; 32] {
    let mut buf = Vec::new();
    for output in &tx.outputs {
        output.write_to(&mut buf);
    }
    double_sha256(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PkHash;
    use crate::transaction::types::{OutPoint, TxId, TxIn, TxOut};

    fn two_input_tx() -> (Transaction, Script) {
        let script = Script::pay_to_key_hash(&PkHash::from_bytes([3u8; 20]));
        let mut tx = Transaction::new();
        tx.inputs
            .push(TxIn::unsigned(OutPoint::new(TxId::from_bytes([1u8; 32]), 0)));
        tx.inputs
            .push(TxIn::unsigned(OutPoint::new(TxId::from_bytes([1u8; 32]), 1)));
        tx.outputs.push(TxOut {
            value: 900,
            locking_script: script.clone(),
        });
        (tx, script)
    }

    #[test]
    fn preimage_has_fixed_layout() {
        let (tx, script) = two_input_tx();
        let pre = preimage(&tx, 0, &script, 1_000, SIGHASH_ALL_FORKID).unwrap();
        assert_eq!(pre.len(), 4 + 32 + 32 + 36 + 1 + 25 + 8 + 4 + 32 + 4 + 4);
        assert_eq!(&pre[pre.len() - 4..], &SIGHASH_ALL_FORKID.to_le_bytes());
    }

    #[test]
    fn digest_differs_per_input() {
        let (tx, script) = two_input_tx();
        let a = signature_hash_all(&tx, 0, &script, 1_000).unwrap();
        let b = signature_hash_all(&tx, 1, &script, 1_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_commits_to_spent_value() {
        let (tx, script) = two_input_tx();
        let a = signature_hash_all(&tx, 0, &script, 1_000).unwrap();
        let b = signature_hash_all(&tx, 0, &script, 1_001).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_ignores_unlocking_scripts() {
        let (mut tx, script) = two_input_tx();
        let before = signature_hash_all(&tx, 0, &script, 1_000).unwrap();
        tx.inputs[1].unlocking_script = Script::from_bytes(vec![0x01, 0xFF]);
        let after = signature_hash_all(&tx, 0, &script, 1_000).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn out_of_range_index_rejected() {
        let (tx, script) = two_input_tx();
        assert!(matches!(
            signature_hash_all(&tx, 2, &script, 1_000),
            Err(SpendError::InvalidTransaction(_))
        ));
    }
}
