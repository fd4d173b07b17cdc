//! Core transaction types.
//!
//! A [`Transaction`] is an ordered list of inputs (each referencing a prior
//! output by [`OutPoint`]) and an ordered list of outputs. The wire format
//! is the familiar Bitcoin one: little-endian integers and CompactSize
//! length prefixes. The [`TxId`] is the double SHA-256 of that encoding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::{DEFAULT_LOCK_TIME, DEFAULT_SEQUENCE, TXID_LENGTH, TX_VERSION};
use crate::crypto::address::Address;
use crate::crypto::hash::double_sha256;
use crate::error::SpendError;
use crate::script::Script;

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// Content-addressed transaction identifier.
///
/// Stored in internal byte order (the raw digest) and displayed reversed,
/// matching what block explorers show.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId([u8; TXID_LENGTH]);

impl TxId {
    pub const fn from_bytes(bytes: [u8; TXID_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TXID_LENGTH] {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({self})")
    }
}

impl FromStr for TxId {
    type Err = SpendError;

    /// Parses the displayed (byte-reversed) hex form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| SpendError::InvalidTransaction(e.to_string()))?;
        let mut raw: [u8; TXID_LENGTH] = bytes
            .try_into()
            .map_err(|_| SpendError::InvalidTransaction("txid must be 32 bytes".into()))?;
        raw.reverse();
        Ok(Self(raw))
    }
}

// ---------------------------------------------------------------------------
// OutPoint
// ---------------------------------------------------------------------------

/// Reference to output `vout` of transaction `txid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// 36-byte wire encoding: txid then little-endian index.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.txid.as_bytes());
        buf.extend_from_slice(&self.vout.to_le_bytes());
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

// ---------------------------------------------------------------------------
// TxIn / TxOut
// ---------------------------------------------------------------------------

/// A transaction input. `unlocking_script` is empty until signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub unlocking_script: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn unsigned(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            unlocking_script: Script::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }
}

/// A transaction output: value plus locking script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: u64,
    pub locking_script: Script,
}

impl TxOut {
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        write_var_bytes(buf, self.locking_script.as_bytes());
    }
}

// ---------------------------------------------------------------------------
// SpendOutput
// ---------------------------------------------------------------------------

/// An output the caller asks the builder to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendOutput {
    /// Transfer `amount` to `address`.
    PayToKeyHash { address: Address, amount: u64 },
    /// Record `payload` on-chain in an unspendable zero-value output.
    DataEmbed { payload: Vec<u8> },
}

impl SpendOutput {
    /// Value this output moves out of the inputs.
    pub fn amount(&self) -> u64 {
        match self {
            Self::PayToKeyHash { amount, .. } => *amount,
            Self::DataEmbed { .. } => 0,
        }
    }

    /// Payload length counted by the fee model.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::PayToKeyHash { .. } => 0,
            Self::DataEmbed { payload } => payload.len(),
        }
    }

    pub fn to_tx_out(&self) -> TxOut {
        match self {
            Self::PayToKeyHash { address, amount } => TxOut {
                value: *amount,
                locking_script: Script::pay_to_key_hash(&address.pk_hash()),
            },
            Self::DataEmbed { payload } => TxOut {
                value: 0,
                locking_script: Script::data_embed(payload),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// An empty transaction with the default version and lock time.
    pub fn new() -> Self {
        Self {
            version: TX_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: DEFAULT_LOCK_TIME,
        }
    }

    /// Canonical wire encoding.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_var_int(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            input.previous_output.write_to(&mut buf);
            write_var_bytes(&mut buf, input.unlocking_script.as_bytes());
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }
        write_var_int(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// `double_sha256(serialize())`.
    pub fn txid(&self) -> TxId {
        TxId(double_sha256(&self.serialize()))
    }

    /// Raw transaction hex, the form relays accept.
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Whether every input carries an unlocking script.
    pub fn is_signed(&self) -> bool {
        !self.inputs.is_empty() && self.inputs.iter().all(|i| !i.unlocking_script.is_empty())
    }

    /// One-line human readable description for logs.
    pub fn summary(&self) -> String {
        let outputs: Vec<String> = self
            .outputs
            .iter()
            .map(|o| {
                if let Some(pk_hash) = o.locking_script.pay_to_key_hash_target() {
                    format!("{}->p2pkh:{}", o.value, pk_hash)
                } else if o.locking_script.is_data_embed() {
                    format!("{}->data:{}B", o.value, o.locking_script.len())
                } else {
                    format!("{}->script", o.value)
                }
            })
            .collect();
        format!(
            "txid={} inputs={} outputs=[{}] size={}B",
            self.txid(),
            self.inputs.len(),
            outputs.join(", "),
            self.serialize().len()
        )
    }

    fn estimated_size(&self) -> usize {
        10 + self.inputs.len() * 148 + self.outputs.len() * 34
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// CompactSize unsigned integer.
pub(crate) fn write_var_int(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xFC => buf.push(n as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

pub(crate) fn write_var_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PkHash;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.inputs
            .push(TxIn::unsigned(OutPoint::new(TxId::from_bytes([1u8; 32]), 0)));
        tx.outputs.push(
            SpendOutput::PayToKeyHash {
                address: Address::new(0, PkHash::from_bytes([2u8; 20])),
                amount: 5_000,
            }
            .to_tx_out(),
        );
        tx
    }

    #[test]
    fn var_int_boundaries() {
        let mut buf = Vec::new();
        write_var_int(&mut buf, 0xFC);
        assert_eq!(buf, vec![0xFC]);

        buf.clear();
        write_var_int(&mut buf, 0xFD);
        assert_eq!(buf, vec![0xFD, 0xFD, 0x00]);

        buf.clear();
        write_var_int(&mut buf, 0x1_0000);
        assert_eq!(buf, vec![0xFE, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn serialized_layout_of_unsigned_tx() {
        let bytes = sample_tx().serialize();
        // version(4) + n_in(1) + outpoint(36) + empty script(1) + seq(4)
        // + n_out(1) + value(8) + script(1 + 25) + lock_time(4)
        assert_eq!(bytes.len(), 4 + 1 + 36 + 1 + 4 + 1 + 8 + 26 + 4);
        assert_eq!(&bytes[..4], &TX_VERSION.to_le_bytes());
    }

    #[test]
    fn txid_changes_with_content() {
        let a = sample_tx();
        let mut b = sample_tx();
        b.outputs[0].value += 1;
        assert_ne!(a.txid(), b.txid());
        assert_eq!(a.txid(), sample_tx().txid());
    }

    #[test]
    fn txid_display_parse_roundtrip() {
        let txid = sample_tx().txid();
        let parsed: TxId = txid.to_string().parse().unwrap();
        assert_eq!(parsed, txid);
    }

    #[test]
    fn txid_display_is_byte_reversed() {
        let mut raw = [0u8; 32];
        raw[0] = 0xAB;
        let shown = TxId::from_bytes(raw).to_string();
        assert!(shown.ends_with("ab"));
        assert!(shown.starts_with("00"));
    }

    #[test]
    fn data_embed_output_has_zero_value() {
        let out = SpendOutput::DataEmbed {
            payload: b"hello".to_vec(),
        };
        assert_eq!(out.amount(), 0);
        assert_eq!(out.payload_len(), 5);
        assert_eq!(out.to_tx_out().value, 0);
    }

    #[test]
    fn unsigned_tx_reports_unsigned() {
        assert!(!sample_tx().is_signed());
        assert!(!Transaction::new().is_signed());
    }

    #[test]
    fn summary_mentions_outputs() {
        let summary = sample_tx().summary();
        assert!(summary.contains("inputs=1"));
        assert!(summary.contains("5000->p2pkh:"));
    }

    #[test]
    fn transaction_json_roundtrip() {
        let tx = sample_tx();
        let json = serde_json::to_string(&tx).unwrap();
        let recovered: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, recovered);
    }
}
