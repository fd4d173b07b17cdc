//! # Memo Wallet
//!
//! Entry point for the `memo-wallet` binary. Parses CLI arguments,
//! initializes logging, opens the local output index, and runs one wallet
//! operation.
//!
//! - `keygen`  - generate a spending key
//! - `fund`    - credit a development output to a key
//! - `balance` - show spendable balance
//! - `send`    - pay an address
//! - `set-pic` - set the profile picture URL
//! - `post`    - publish a post

mod cli;
mod logging;
mod relay;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use memo_protocol::broadcast::{BroadcastConfig, BroadcastQueue};
use memo_protocol::config::{SpendConfig, ADDRESS_VERSION_MAINNET, ADDRESS_VERSION_TESTNET};
use memo_protocol::crypto::{Address, SpendKey};
use memo_protocol::memo::MemoAction;
use memo_protocol::script::Script;
use memo_protocol::transaction::{OutPoint, SpendOutput, TxId};
use memo_protocol::utxo::{SledOutputStore, SpendableOutputStore, UnspentOutput};
use memo_protocol::SpendCoordinator;

use cli::{Commands, KeyArgs, MemoWalletCli};
use logging::LogFormat;
use relay::FileRelay;

const OUTPUTS_DIR: &str = "outputs";
const RELAY_LOG: &str = "relay.log";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MemoWalletCli::parse();
    logging::init_logging(
        "memo_wallet=info,memo_protocol=info",
        LogFormat::from_str_lossy(&cli.log_format),
    );

    match cli.command {
        Commands::Keygen(args) => keygen(args.testnet),
        Commands::Fund(args) => fund(&cli.data_dir, args).await,
        Commands::Balance(args) => balance(&cli.data_dir, args).await,
        Commands::Send(args) => {
            let to: Address = args
                .to
                .parse()
                .with_context(|| format!("invalid recipient address {}", args.to))?;
            let outputs = vec![SpendOutput::PayToKeyHash {
                address: to,
                amount: args.amount,
            }];
            spend(&cli.data_dir, &args.key, outputs).await
        }
        Commands::SetPic(args) => {
            let output = MemoAction::SetProfilePic(args.url)
                .to_output()
                .context("invalid profile picture")?;
            spend(&cli.data_dir, &args.key, vec![output]).await
        }
        Commands::Post(args) => {
            let output = MemoAction::Post(args.text).to_output()?;
            spend(&cli.data_dir, &args.key, vec![output]).await
        }
    }
}

fn address_version(testnet: bool) -> u8 {
    if testnet {
        ADDRESS_VERSION_TESTNET
    } else {
        ADDRESS_VERSION_MAINNET
    }
}

fn load_key(args: &KeyArgs) -> Result<SpendKey> {
    let key = SpendKey::from_hex(args.key.trim()).context("failed to parse spending key")?;
    Ok(key.with_address_version(address_version(args.testnet)))
}

fn open_store(data_dir: &Path) -> Result<SledOutputStore> {
    let path = data_dir.join(OUTPUTS_DIR);
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create data directory: {}", path.display()))?;
    SledOutputStore::open(&path)
        .with_context(|| format!("failed to open output index at {}", path.display()))
}

fn keygen(testnet: bool) -> Result<()> {
    let key = SpendKey::generate().with_address_version(address_version(testnet));
    let out = serde_json::json!({
        "secret_key": key.secret_hex(),
        "public_key": key.public_key().to_hex(),
        "pk_hash": key.pk_hash().to_hex(),
        "address": key.address().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn fund(data_dir: &Path, args: cli::FundArgs) -> Result<()> {
    let key = load_key(&args.key)?;
    let store = open_store(data_dir)?;

    let txid = match &args.txid {
        Some(hex_txid) => hex_txid
            .parse::<TxId>()
            .with_context(|| format!("invalid funding txid {hex_txid}"))?,
        None => TxId::from_bytes(rand::random()),
    };
    let output = UnspentOutput {
        outpoint: OutPoint::new(txid, args.vout),
        value: args.amount,
        script: Script::pay_to_key_hash(&key.pk_hash()),
        height: args.height,
    };
    store
        .insert(&key.pk_hash(), output.clone())
        .await
        .context("failed to record funding output")?;

    tracing::info!(
        address = %key.address(),
        outpoint = %output.outpoint,
        value = output.value,
        "funded"
    );
    println!("{}", output.outpoint);
    Ok(())
}

async fn balance(data_dir: &Path, args: KeyArgs) -> Result<()> {
    let key = load_key(&args)?;
    let store = open_store(data_dir)?;
    let outputs = store
        .get_spendable(&key.pk_hash(), 0)
        .await
        .context("failed to read output index")?;

    let out = serde_json::json!({
        "address": key.address().to_string(),
        "balance": memo_protocol::utxo::total_value(&outputs),
        "outputs": outputs.len(),
        "unconfirmed": outputs.iter().filter(|o| o.height.is_none()).count(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Builds, reserves, and relays one transaction, then drains the relay
/// worker before returning. A transaction the relay refused has its
/// reservation released.
async fn spend(data_dir: &Path, key_args: &KeyArgs, outputs: Vec<SpendOutput>) -> Result<()> {
    let key = load_key(key_args)?;
    let store = Arc::new(open_store(data_dir)?);
    let relay = Arc::new(FileRelay::new(data_dir.join(RELAY_LOG)));
    let (queue, worker) = BroadcastQueue::spawn(relay, BroadcastConfig::default());

    let config = SpendConfig {
        address_version: key.address().version(),
        ..SpendConfig::default()
    };
    let coordinator = SpendCoordinator::new(store, queue.clone(), config);

    let pk_hash = key.pk_hash();
    if !coordinator
        .has_spendable_funds(&pk_hash)
        .await
        .context("failed to read output index")?
    {
        bail!(
            "no spendable funds for {}; credit the address first with `memo-wallet fund`",
            key.address()
        );
    }

    let txid = coordinator
        .create_and_queue_transaction(&key, outputs)
        .await
        .context("transaction was not created")?;

    queue.shutdown();
    let stats = worker.await.context("relay worker panicked")?;
    if !stats.failed.is_empty() {
        for tx in stats.failed.iter().rev() {
            coordinator
                .release_unrelayed(&pk_hash, tx)
                .await
                .with_context(|| format!("failed to release reservation of {}", tx.txid()))?;
        }
        bail!(
            "transaction {txid} could not be written to {}; its inputs are spendable again",
            data_dir.join(RELAY_LOG).display()
        );
    }

    println!("{txid}");
    Ok(())
}
