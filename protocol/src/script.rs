//! # Scripts
//!
//! The three script shapes the spend core reads or writes:
//!
//! ```text
//! pay-to-key-hash lock   OP_DUP OP_HASH160 <20-byte pk-hash> OP_EQUALVERIFY OP_CHECKSIG
//! data-embed lock        OP_RETURN <payload>
//! pay-to-key-hash unlock <signature ‖ sighash byte> <public key>
//! ```
//!
//! There is no interpreter here. Inputs are authorized by
//! [`crate::transaction::signing::verify_input`], which recognizes the
//! pay-to-key-hash template directly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::keys::PkHash;
use crate::error::{SpendError, SpendResult};

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_0: u8 = 0x00;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;

/// Byte length of a pay-to-key-hash locking script.
pub const P2PKH_SCRIPT_LENGTH: usize = 25;

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Raw script bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `OP_DUP OP_HASH160 <pk_hash> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn pay_to_key_hash(pk_hash: &PkHash) -> Self {
        let mut bytes = Vec::with_capacity(P2PKH_SCRIPT_LENGTH);
        bytes.push(OP_DUP);
        bytes.push(OP_HASH160);
        bytes.push(OP_DATA_20);
        bytes.extend_from_slice(pk_hash.as_bytes());
        bytes.push(OP_EQUALVERIFY);
        bytes.push(OP_CHECKSIG);
        Self(bytes)
    }

    /// `OP_RETURN <payload>`. Provably unspendable; carries the payload
    /// verbatim.
    pub fn data_embed(payload: &[u8]) -> Self {
        let mut script = Self(vec![OP_RETURN]);
        script.push_data(payload);
        script
    }

    /// Unlocking script for a pay-to-key-hash input.
    pub fn pay_to_key_hash_unlock(signature: &[u8], public_key: &[u8]) -> Self {
        let mut script = Self::new();
        script.push_data(signature);
        script.push_data(public_key);
        script
    }

    /// Appends a minimal push of `data`.
    pub fn push_data(&mut self, data: &[u8]) {
        let len = data.len();
        if len == 0 {
            self.0.push(OP_0);
            return;
        }
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= u8::MAX as usize {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else if len <= u16::MAX as usize {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.0.push(OP_PUSHDATA4);
            self.0.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.0.extend_from_slice(data);
    }

    /// The pk-hash this script locks to, if it is a pay-to-key-hash script.
    pub fn pay_to_key_hash_target(&self) -> Option<PkHash> {
        let b = &self.0;
        if b.len() == P2PKH_SCRIPT_LENGTH
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            PkHash::try_from_slice(&b[3..23])
        } else {
            None
        }
    }

    pub fn is_data_embed(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }

    /// Payload carried by a data-embed script.
    pub fn data_embed_payload(&self) -> Option<Vec<u8>> {
        if !self.is_data_embed() {
            return None;
        }
        let pushes = parse_pushes(&self.0[1..]).ok()?;
        match pushes.as_slice() {
            [payload] => Some(payload.clone()),
            _ => None,
        }
    }

    /// Splits a pay-to-key-hash unlocking script into `(signature, public key)`.
    pub fn unlock_parts(&self) -> SpendResult<(Vec<u8>, Vec<u8>)> {
        let mut pushes = parse_pushes(&self.0)?;
        if pushes.len() != 2 {
            return Err(SpendError::InvalidTransaction(format!(
                "unlocking script has {} pushes, expected 2",
                pushes.len()
            )));
        }
        let public_key = pushes.pop().unwrap_or_default();
        let signature = pushes.pop().unwrap_or_default();
        Ok((signature, public_key))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

/// Parses a script consisting only of data pushes.
fn parse_pushes(bytes: &[u8]) -> SpendResult<Vec<Vec<u8>>> {
    let truncated = || SpendError::InvalidTransaction("truncated script push".into());
    let mut pushes = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let opcode = bytes[pos];
        pos += 1;
        let len = match opcode {
            OP_0 => 0,
            1..=0x4b => opcode as usize,
            OP_PUSHDATA1 => {
                let n = *bytes.get(pos).ok_or_else(truncated)? as usize;
                pos += 1;
                n
            }
            OP_PUSHDATA2 => {
                let raw = bytes.get(pos..pos + 2).ok_or_else(truncated)?;
                pos += 2;
                u16::from_le_bytes([raw[0], raw[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let raw = bytes.get(pos..pos + 4).ok_or_else(truncated)?;
                pos += 4;
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            }
            other => {
                return Err(SpendError::InvalidTransaction(format!(
                    "unexpected opcode 0x{other:02x} in push-only script"
                )))
            }
        };
        let data = bytes.get(pos..pos + len).ok_or_else(truncated)?;
        pushes.push(data.to_vec());
        pos += len;
    }
    Ok(pushes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk_hash() -> PkHash {
        PkHash::from_bytes([0x42; 20])
    }

    #[test]
    fn p2pkh_layout() {
        let script = Script::pay_to_key_hash(&pk_hash());
        assert_eq!(script.len(), P2PKH_SCRIPT_LENGTH);
        assert_eq!(
            hex::encode(script.as_bytes()),
            format!("76a914{}88ac", "42".repeat(20))
        );
        assert_eq!(script.pay_to_key_hash_target(), Some(pk_hash()));
    }

    #[test]
    fn data_embed_is_not_p2pkh() {
        let script = Script::data_embed(b"https://i.imgur.com/xSSV7Sg.jpg");
        assert!(script.is_data_embed());
        assert_eq!(script.pay_to_key_hash_target(), None);
        assert_eq!(
            script.data_embed_payload().unwrap(),
            b"https://i.imgur.com/xSSV7Sg.jpg".to_vec()
        );
    }

    #[test]
    fn push_data_uses_pushdata1_above_75_bytes() {
        let payload = vec![0xEE; 200];
        let script = Script::data_embed(&payload);
        assert_eq!(&script.as_bytes()[..3], &[OP_RETURN, OP_PUSHDATA1, 200]);
        assert_eq!(script.len(), 3 + 200);
        assert_eq!(script.data_embed_payload().unwrap(), payload);
    }

    #[test]
    fn push_data_boundary_at_75_bytes() {
        let script = Script::data_embed(&[1u8; 75]);
        assert_eq!(script.as_bytes()[1], 75);
        let script = Script::data_embed(&[1u8; 76]);
        assert_eq!(script.as_bytes()[1], OP_PUSHDATA1);
    }

    #[test]
    fn unlock_parts_roundtrip() {
        let sig = vec![0x11; 65];
        let pubkey = vec![0x22; 32];
        let script = Script::pay_to_key_hash_unlock(&sig, &pubkey);
        let (s, p) = script.unlock_parts().unwrap();
        assert_eq!(s, sig);
        assert_eq!(p, pubkey);
    }

    #[test]
    fn truncated_unlock_script_rejected() {
        let script = Script::from_bytes(vec![0x41, 0x00, 0x01]);
        assert!(matches!(
            script.unlock_parts(),
            Err(SpendError::InvalidTransaction(_))
        ));
    }
}
