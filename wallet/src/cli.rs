//! # CLI Interface
//!
//! Command-line structure for `memo-wallet`, via `clap` derive. Global
//! flags select the data directory and log format; each subcommand is one
//! wallet operation.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Memo wallet.
///
/// Keeps a local index of spendable outputs, builds and signs Memo action
/// transactions, and appends them to a relay log for submission.
#[derive(Parser, Debug)]
#[command(
    name = "memo-wallet",
    about = "Memo action wallet",
    version,
    propagate_version = true
)]
pub struct MemoWalletCli {
    /// Directory holding the output index and relay log.
    #[arg(
        long,
        short = 'd',
        env = "MEMO_WALLET_DATA_DIR",
        default_value = ".memo-wallet",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "MEMO_WALLET_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh spending key and print it with its address.
    Keygen(KeygenArgs),
    /// Credit an output to the key in the local index (development funding).
    Fund(FundArgs),
    /// Show the key's spendable balance.
    Balance(KeyArgs),
    /// Pay an amount to an address.
    Send(SendArgs),
    /// Set the profile picture URL.
    SetPic(SetPicArgs),
    /// Publish a post.
    Post(PostArgs),
}

/// The spending key, shared by every subcommand that signs or looks up.
#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Hex-encoded 32-byte secret key.
    #[arg(long, env = "MEMO_WALLET_KEY", hide_env_values = true)]
    pub key: String,

    /// Render addresses with the testnet version byte.
    #[arg(long)]
    pub testnet: bool,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Render the address with the testnet version byte.
    #[arg(long)]
    pub testnet: bool,
}

#[derive(Args, Debug)]
pub struct FundArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Output value in satoshis.
    #[arg(long)]
    pub amount: u64,

    /// Funding transaction id (displayed hex). Random when omitted.
    #[arg(long)]
    pub txid: Option<String>,

    /// Output index within the funding transaction.
    #[arg(long, default_value_t = 0)]
    pub vout: u32,

    /// Confirmation height of the funding transaction.
    #[arg(long)]
    pub height: Option<u32>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Recipient base58check address.
    #[arg(long)]
    pub to: String,

    /// Amount in satoshis.
    #[arg(long)]
    pub amount: u64,
}

#[derive(Args, Debug)]
pub struct SetPicArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Image URL (http or https).
    #[arg(long)]
    pub url: String,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Message text.
    #[arg(long)]
    pub text: String,
}
