//! Card EVM Signer CLI Example
//!
//! This example drives the full signing flow against a real JSON-RPC node,
//! with the card replaced by an in-process emulator. The emulator behaves like
//! a hash-only card: it signs the digests it is given and returns `r || s` as
//! hex, dropping the recovery id. Everything downstream (recovery-id
//! resolution, verification, broadcast) runs exactly as it would with
//! hardware.
//!
//! # Quick Start
//!
//! ```bash
//! # Start a local dev node, e.g. anvil (chain id 31337)
//! anvil
//!
//! # Address of the emulated card wallet
//! cargo run --example card-send -- address 0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80
//!
//! # Build and sign without broadcasting
//! cargo run --example card-send -- sign <SECRET> 0x70997970C51812dc3A010C7d01b50e0d17dc79C8
//!
//! # Build, sign and broadcast a call with calldata
//! cargo run --example card-send -- send <SECRET> <TO> 0xa9059cbb...
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `address <secret>` | Print the card wallet's public key and address |
//! | `sign <secret> <to> [data]` | Sign a zero-value call and print the raw transaction |
//! | `send <secret> <to> [data]` | Sign and broadcast, print the transaction id |
//!
//! # Configuration
//!
//! The node endpoint and fee floor come from the JSON file named by
//! `CARD_SIGNER_CONFIG`; without it, the defaults (`http://127.0.0.1:8545`)
//! apply. Log verbosity follows `RUST_LOG`, e.g. `RUST_LOG=debug`.

#![expect(unused_crate_dependencies, reason = "needed for CLI example")]

use std::env;
use std::process::ExitCode;

use async_trait::async_trait;
use card_evm_signer_core::{
    Address, B256, Bytes, CardHashSigner, CardSession, Curve, PublicKey, Result, SignerConfig,
    SigningPipeline, address::derive_address,
};
use k256::ecdsa::SigningKey;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the JSON configuration file.
const CONFIG_ENV: &str = "CARD_SIGNER_CONFIG";

/// A software stand-in for a card session.
struct EmulatedCard {
    key: SigningKey,
}

impl EmulatedCard {
    fn from_hex(secret: &str) -> std::result::Result<Self, String> {
        let bytes = hex::decode(secret.strip_prefix("0x").unwrap_or(secret))
            .map_err(|e| format!("invalid secret hex: {e}"))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| format!("invalid secret: {e}"))?;
        Ok(Self { key })
    }

    fn wallet_public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(true);
        PublicKey::new(point.as_bytes().to_vec(), Curve::Secp256k1)
    }
}

#[async_trait]
impl CardSession for EmulatedCard {
    async fn sign_hashes(&self, hashes: &[B256], _wallet_public_key: &[u8]) -> Result<Vec<String>> {
        hashes
            .iter()
            .map(|hash| {
                let (signature, _recovery_id) = self
                    .key
                    .sign_prehash_recoverable(hash.as_slice())
                    .map_err(|e| card_evm_signer_core::Error::SigningFailed(e.to_string()))?;
                Ok(hex::encode(signature.to_bytes()))
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return ExitCode::SUCCESS;
    }

    let outcome = match args[1].as_str() {
        "address" => cmd_address(&args[2..]),
        "sign" => cmd_sign(&args[2..], false).await,
        "send" => cmd_sign(&args[2..], true).await,
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        _ => Err(format!("Unknown command: {}", args[1])),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!(
        r#"Card EVM Signer CLI

USAGE:
    card-send <COMMAND>

COMMANDS:
    address <secret>              Print the emulated card wallet address
    sign <secret> <to> [data]     Sign a zero-value call, print the raw transaction
    send <secret> <to> [data]     Sign and broadcast, print the transaction id
    help                          Print this help message

ENVIRONMENT:
    {CONFIG_ENV}    Path to a JSON config file (rpc_url, request_timeout_ms, priority_fee_floor)
    RUST_LOG              Log filter, e.g. debug"#
    );
}

fn cmd_address(args: &[String]) -> std::result::Result<(), String> {
    let secret = args.first().ok_or("Usage: card-send address <secret>")?;
    let card = EmulatedCard::from_hex(secret)?;
    let public_key = card.wallet_public_key();
    let address = derive_address(&public_key).map_err(|e| e.to_string())?;

    println!("Public key: 0x{}", hex::encode(public_key.as_bytes()));
    println!("Address:    {address}");
    Ok(())
}

async fn cmd_sign(args: &[String], broadcast: bool) -> std::result::Result<(), String> {
    let [secret, to, rest @ ..] = args else {
        return Err("Usage: card-send sign|send <secret> <to> [data]".to_string());
    };

    let recipient = Address::from_hex(to).map_err(|e| e.to_string())?;
    let payload = match rest.first() {
        Some(data) => hex::decode(data.strip_prefix("0x").unwrap_or(data))
            .map(Bytes::from)
            .map_err(|e| format!("invalid calldata hex: {e}"))?,
        None => Bytes::new(),
    };

    let config = match env::var(CONFIG_ENV) {
        Ok(path) => SignerConfig::from_file(path).map_err(|e| e.to_string())?,
        Err(_) => SignerConfig::default(),
    };

    let card = EmulatedCard::from_hex(secret)?;
    let wallet = card.wallet_public_key();
    let transport = config.http_transport().map_err(|e| e.to_string())?;
    let pipeline = SigningPipeline::from_config(&config, transport, CardHashSigner::new(card));

    if broadcast {
        let tx_id = pipeline
            .send(&wallet, recipient, payload)
            .await
            .map_err(|e| format!("[{:?}] {e}", e.category()))?;
        println!("Transaction id: {tx_id}");
    } else {
        let signed = pipeline
            .sign(&wallet, recipient, payload)
            .await
            .map_err(|e| format!("[{:?}] {e}", e.category()))?;
        let tx = signed.tx();

        println!("Transaction Details:");
        println!("  Chain ID:     {}", tx.chain_id);
        println!("  Nonce:        {}", tx.nonce);
        println!("  Gas Limit:    {}", tx.gas_limit);
        println!("  Max Fee:      {} wei", tx.max_fee_per_gas);
        println!("  Priority Fee: {} wei", tx.max_priority_fee_per_gas);
        println!("  Recovery ID:  {}", signed.signature().recovery_id());
        println!();
        println!("Raw transaction: 0x{}", hex::encode(signed.encoded()));
        println!("Hash:            {}", signed.tx_hash());
    }

    Ok(())
}
