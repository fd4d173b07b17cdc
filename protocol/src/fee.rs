//! # Fee Calculation
//!
//! Fees are not charged per byte. An action transaction has a flat ceiling,
//! `max_fee`, sized for a transaction carrying a full `max_payload_size`
//! payload; shorter payloads get the unused bytes back:
//!
//! ```text
//! fee = max_fee - max_payload_size + payload_len
//! ```
//!
//! The formula assumes one data-embed output dominates the transaction
//! size. That assumption lives here, behind [`FeeModel`], and nowhere else.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_MAX_TX_FEE, DUST_MINIMUM_OUTPUT};
use crate::error::{SpendError, SpendResult};
use crate::transaction::SpendOutput;

/// A pluggable fee model.
pub trait FeeModel: Send + Sync {
    /// Fee for a transaction whose data-embed payloads total `payload_len` bytes.
    fn fee(&self, payload_len: usize) -> u64;

    /// Smallest change output worth creating.
    fn dust_minimum(&self) -> u64;

    /// Largest payload a single data-embed output may carry.
    fn max_payload_size(&self) -> usize;
}

/// Flat-rate-minus-savings fee policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub max_fee: u64,
    pub max_payload_size: usize,
    pub dust_minimum: u64,
}

impl FeePolicy {
    /// Validating constructor. `max_payload_size` may not exceed `max_fee`,
    /// otherwise an empty payload would have a negative fee.
    pub fn new(max_fee: u64, max_payload_size: usize, dust_minimum: u64) -> SpendResult<Self> {
        if max_payload_size as u64 > max_fee {
            return Err(SpendError::InvalidTransaction(format!(
                "fee policy discount {max_payload_size} exceeds max fee {max_fee}"
            )));
        }
        Ok(Self {
            max_fee,
            max_payload_size,
            dust_minimum,
        })
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            max_fee: DEFAULT_MAX_TX_FEE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            dust_minimum: DUST_MINIMUM_OUTPUT,
        }
    }
}

impl FeeModel for FeePolicy {
    fn fee(&self, payload_len: usize) -> u64 {
        self.max_fee
            .saturating_sub(self.max_payload_size as u64)
            .saturating_add(payload_len as u64)
    }

    fn dust_minimum(&self) -> u64 {
        self.dust_minimum
    }

    fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

// ---------------------------------------------------------------------------
// Request-level helpers
// ---------------------------------------------------------------------------

/// Rejects any data-embed output over the model's payload limit.
pub fn check_payloads(model: &dyn FeeModel, outputs: &[SpendOutput]) -> SpendResult<()> {
    let max = model.max_payload_size();
    for output in outputs {
        let size = output.payload_len();
        if size > max {
            return Err(SpendError::PayloadTooLarge { size, max });
        }
    }
    Ok(())
}

/// Sum of all data-embed payload lengths in a request.
pub fn payload_len(outputs: &[SpendOutput]) -> usize {
    outputs.iter().map(SpendOutput::payload_len).sum()
}

/// Sum of all requested output values.
pub fn outputs_total(outputs: &[SpendOutput]) -> SpendResult<u64> {
    outputs.iter().try_fold(0u64, |acc, o| {
        acc.checked_add(o.amount())
            .ok_or_else(|| SpendError::InvalidTransaction("output total overflows u64".into()))
    })
}

/// Minimum input value a request needs.
///
/// `outputs + fee`. A request with no outputs at all is a pure self-send
/// and also needs room for a change output, so it adds the dust minimum.
pub fn minimum_input(model: &dyn FeeModel, outputs: &[SpendOutput]) -> SpendResult<u64> {
    let fee = model.fee(payload_len(outputs));
    let mut required = outputs_total(outputs)?
        .checked_add(fee)
        .ok_or_else(|| SpendError::InvalidTransaction("required input overflows u64".into()))?;
    if outputs.is_empty() {
        required = required.saturating_add(model.dust_minimum());
    }
    Ok(required)
}
