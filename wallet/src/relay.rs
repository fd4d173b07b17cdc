//! Relay that appends raw transaction hex to a log file, one per line.
//!
//! An external submitter tails the file and pushes each line to a node.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use memo_protocol::broadcast::Relay;
use memo_protocol::transaction::Transaction;
use memo_protocol::{SpendError, SpendResult};

#[derive(Debug, Clone)]
pub struct FileRelay {
    path: PathBuf,
}

impl FileRelay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Relay for FileRelay {
    async fn relay(&self, tx: &Transaction) -> SpendResult<()> {
        let unavailable = |e: std::io::Error| {
            SpendError::RelayUnavailable(format!("{}: {e}", self.path.display()))
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        let mut line = tx.to_hex();
        line.push('\n');
        file.write_all(line.as_bytes()).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_protocol::transaction::{OutPoint, TxId, TxIn};

    #[tokio::test]
    async fn appends_one_hex_line_per_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let relay = FileRelay::new(dir.path().join("relay.log"));

        let mut tx = Transaction::new();
        tx.inputs
            .push(TxIn::unsigned(OutPoint::new(TxId::from_bytes([1u8; 32]), 0)));
        relay.relay(&tx).await.unwrap();
        relay.relay(&tx).await.unwrap();

        let contents = std::fs::read_to_string(relay.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![tx.to_hex().as_str(), tx.to_hex().as_str()]);
    }

    #[tokio::test]
    async fn missing_directory_is_relay_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let relay = FileRelay::new(dir.path().join("nope").join("relay.log"));
        assert!(matches!(
            relay.relay(&Transaction::new()).await,
            Err(SpendError::RelayUnavailable(_))
        ));
    }
}
