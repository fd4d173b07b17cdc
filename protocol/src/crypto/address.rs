//! Base58check pay-to-key-hash addresses.
//!
//! Layout: `version(1) ‖ pk_hash(20) ‖ checksum(4)`, where the checksum is
//! the first four bytes of `double_sha256(version ‖ pk_hash)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::hash::double_sha256;
use super::keys::PkHash;
use crate::config::PK_HASH_LENGTH;
use crate::error::SpendError;

/// A decoded pay-to-key-hash address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    version: u8,
    pk_hash: PkHash,
}

impl Address {
    pub fn new(version: u8, pk_hash: PkHash) -> Self {
        Self { version, pk_hash }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn pk_hash(&self) -> PkHash {
        self.pk_hash
    }

    fn payload(&self) -> [u8; PK_HASH_LENGTH + 1] {
        let mut payload = [0u8; PK_HASH_LENGTH + 1];
        payload[0] = self.version;
        payload[1..].copy_from_slice(self.pk_hash.as_bytes());
        payload
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = self.payload();
        let checksum = double_sha256(&payload);
        let mut bytes = Vec::with_capacity(payload.len() + 4);
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(&checksum[..4]);
        write!(f, "{}", bs58::encode(bytes).into_string())
    }
}

impl FromStr for Address {
    type Err = SpendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| SpendError::InvalidAddress(e.to_string()))?;
        if bytes.len() != PK_HASH_LENGTH + 5 {
            return Err(SpendError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                PK_HASH_LENGTH + 5,
                bytes.len()
            )));
        }
        let (payload, checksum) = bytes.split_at(PK_HASH_LENGTH + 1);
        if double_sha256(payload)[..4] != *checksum {
            return Err(SpendError::InvalidAddress("checksum mismatch".into()));
        }
        let pk_hash = PkHash::try_from_slice(&payload[1..])
            .ok_or_else(|| SpendError::InvalidAddress("bad pk-hash length".into()))?;
        Ok(Self::new(payload[0], pk_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ADDRESS_VERSION_MAINNET, ADDRESS_VERSION_TESTNET};

    #[test]
    fn zero_hash_encodes_to_burn_address() {
        let address = Address::new(ADDRESS_VERSION_MAINNET, PkHash::from_bytes([0u8; 20]));
        assert_eq!(address.to_string(), "1111111111111111111114oLvT2");
    }

    #[test]
    fn parse_roundtrip() {
        let address = Address::new(ADDRESS_VERSION_TESTNET, PkHash::from_bytes([0xAB; 20]));
        let parsed: Address = address.to_string().parse().unwrap();
        assert_eq!(parsed, address);
        assert_eq!(parsed.version(), ADDRESS_VERSION_TESTNET);
    }

    #[test]
    fn corrupted_checksum_rejected() {
        let mut encoded = Address::new(0, PkHash::from_bytes([9u8; 20])).to_string();
        let last = encoded.pop().unwrap();
        encoded.push(if last == '2' { '3' } else { '2' });
        assert!(matches!(
            encoded.parse::<Address>(),
            Err(SpendError::InvalidAddress(_))
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!("1111".parse::<Address>().is_err());
        assert!("not-base58-0OIl".parse::<Address>().is_err());
    }
}
