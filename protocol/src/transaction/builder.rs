//! Transaction construction.
//!
//! [`TransactionBuilder`] turns a set of inputs, the key that controls them,
//! and the caller's requested outputs into a fully signed [`Transaction`].
//! It does not touch the store or the relay queue; what it returns is
//! complete but not yet broadcast.
//!
//! ## Output Layout
//!
//! ```text
//! [requested outputs, in request order] [change -> sender, if >= dust]
//! ```

use tracing::debug;

use crate::crypto::keys::SpendKey;
use crate::error::{SpendError, SpendResult};
use crate::fee::{self, FeeModel};
use crate::script::Script;
use crate::utxo::UnspentOutput;

use super::signing::{ensure_key_controls, Ed25519Signer, Signer};
use super::types::{SpendOutput, Transaction, TxIn, TxOut};

static DEFAULT_SIGNER: Ed25519Signer = Ed25519Signer;

/// A signed transaction plus the accounting that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    /// Fee actually paid, including any change folded in as dust.
    pub fee: u64,
    /// Change returned to the sender, if an output was created for it.
    pub change: Option<u64>,
    /// Sum of the spent inputs.
    pub input_total: u64,
    /// The outputs spent, in input order.
    pub spent: Vec<UnspentOutput>,
}

/// Builds and signs transactions under a fee model.
pub struct TransactionBuilder<'a> {
    fee_model: &'a dyn FeeModel,
    signer: &'a dyn Signer,
}

impl<'a> TransactionBuilder<'a> {
    /// A builder that signs with [`Ed25519Signer`].
    pub fn new(fee_model: &'a dyn FeeModel) -> Self {
        Self {
            fee_model,
            signer: &DEFAULT_SIGNER,
        }
    }

    pub fn with_signer(mut self, signer: &'a dyn Signer) -> Self {
        self.signer = signer;
        self
    }

    /// Builds a transaction spending all of `inputs`.
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` if any data-embed payload exceeds the model's
    ///   limit. Checked before anything else.
    /// - `InsufficientFunds` if `inputs` is empty or does not cover the
    ///   outputs plus the fee.
    /// - `AuthorizationFailure` if `key` does not control every input.
    pub fn build(
        &self,
        inputs: Vec<UnspentOutput>,
        key: &SpendKey,
        outputs: &[SpendOutput],
    ) -> SpendResult<BuiltTransaction> {
        fee::check_payloads(self.fee_model, outputs)?;

        let required = fee::minimum_input(self.fee_model, outputs)?;
        let input_total = inputs.iter().try_fold(0u64, |acc, o| {
            acc.checked_add(o.value)
                .ok_or_else(|| SpendError::InvalidTransaction("input total overflows u64".into()))
        })?;
        if inputs.is_empty() || input_total < required {
            return Err(SpendError::InsufficientFunds {
                required,
                available: input_total,
            });
        }

        for input in &inputs {
            ensure_key_controls(key, &input.script)?;
        }

        let outputs_total = fee::outputs_total(outputs)?;
        let base_fee = self.fee_model.fee(fee::payload_len(outputs));
        // required >= outputs_total + base_fee, so this cannot underflow.
        let remainder = input_total - outputs_total - base_fee;

        let mut tx = Transaction::new();
        tx.inputs = inputs.iter().map(|u| TxIn::unsigned(u.outpoint)).collect();
        tx.outputs = outputs.iter().map(SpendOutput::to_tx_out).collect();

        let change = if remainder >= self.fee_model.dust_minimum() {
            tx.outputs.push(TxOut {
                value: remainder,
                locking_script: Script::pay_to_key_hash(&key.pk_hash()),
            });
            Some(remainder)
        } else {
            None
        };
        let fee = base_fee + change.map_or(remainder, |_| 0);

        let signatures = inputs
            .iter()
            .enumerate()
            .map(|(index, spent)| self.signer.sign(&tx, index, spent, key))
            .collect::<SpendResult<Vec<_>>>()?;
        for (input, signature) in tx.inputs.iter_mut().zip(&signatures) {
            input.unlocking_script = signature.to_unlocking_script();
        }

        debug!(
            inputs = inputs.len(),
            input_total,
            outputs_total,
            fee,
            change = change.unwrap_or(0),
            "transaction built"
        );

        Ok(BuiltTransaction {
            transaction: tx,
            fee,
            change,
            input_total,
            spent: inputs,
        })
    }
}
