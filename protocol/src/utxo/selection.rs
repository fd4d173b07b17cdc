//! Input selection.
//!
//! The store hands back every spendable output for a key; the policy here
//! decides which of them the builder spends. `All` consolidates the whole
//! set into one change output, which keeps the per-key output count at one
//! after each action.

use serde::{Deserialize, Serialize};

use super::{total_value, UnspentOutput};
use crate::error::{SpendError, SpendResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Spend every spendable output.
    #[default]
    All,
    /// Largest values first, stopping once `target` is covered.
    LargestFirst,
    /// Lowest confirmation height first (unconfirmed last), stopping once
    /// `target` is covered.
    OldestFirst,
}

impl SelectionPolicy {
    /// Chooses inputs covering `target`.
    ///
    /// Ordering within equal keys falls back to outpoint order so the result
    /// is deterministic for a given set.
    pub fn select(
        &self,
        mut outputs: Vec<UnspentOutput>,
        target: u64,
    ) -> SpendResult<Vec<UnspentOutput>> {
        let available = total_value(&outputs);
        if available < target {
            return Err(SpendError::InsufficientFunds {
                required: target,
                available,
            });
        }

        match self {
            Self::All => return Ok(outputs),
            Self::LargestFirst => {
                outputs.sort_by(|a, b| b.value.cmp(&a.value).then(a.outpoint.cmp(&b.outpoint)))
            }
            Self::OldestFirst => outputs.sort_by(|a, b| {
                let ha = a.height.unwrap_or(u32::MAX);
                let hb = b.height.unwrap_or(u32::MAX);
                ha.cmp(&hb).then(a.outpoint.cmp(&b.outpoint))
            }),
        }

        let mut selected = Vec::new();
        let mut total = 0u64;
        for output in outputs {
            if total >= target && !selected.is_empty() {
                break;
            }
            total = total.saturating_add(output.value);
            selected.push(output);
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PkHash;
    use crate::script::Script;
    use crate::transaction::{OutPoint, TxId};

    fn utxo(n: u8, value: u64, height: Option<u32>) -> UnspentOutput {
        UnspentOutput {
            outpoint: OutPoint::new(TxId::from_bytes([n; 32]), 0),
            value,
            script: Script::pay_to_key_hash(&PkHash::from_bytes([1u8; 20])),
            height,
        }
    }

    fn set() -> Vec<UnspentOutput> {
        vec![
            utxo(1, 1_000, Some(30)),
            utxo(2, 5_000, None),
            utxo(3, 2_000, Some(10)),
        ]
    }

    #[test]
    fn all_spends_everything() {
        let selected = SelectionPolicy::All.select(set(), 100).unwrap();
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn largest_first_stops_when_covered() {
        let selected = SelectionPolicy::LargestFirst.select(set(), 4_000).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].value, 5_000);

        let selected = SelectionPolicy::LargestFirst.select(set(), 6_500).unwrap();
        let values: Vec<u64> = selected.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![5_000, 2_000]);
    }

    #[test]
    fn oldest_first_puts_unconfirmed_last() {
        let selected = SelectionPolicy::OldestFirst.select(set(), 2_500).unwrap();
        let heights: Vec<Option<u32>> = selected.iter().map(|o| o.height).collect();
        assert_eq!(heights, vec![Some(10), Some(30)]);
    }

    #[test]
    fn zero_target_still_selects_one_input() {
        let selected = SelectionPolicy::LargestFirst.select(set(), 0).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn shortfall_is_insufficient_funds() {
        assert_eq!(
            SelectionPolicy::OldestFirst.select(set(), 9_000),
            Err(SpendError::InsufficientFunds {
                required: 9_000,
                available: 8_000
            })
        );
    }

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&SelectionPolicy::LargestFirst).unwrap();
        assert_eq!(json, "\"largest_first\"");
    }
}
