#![forbid(unsafe_code)]
//! Command line utility for naivechain keys and blocks

use clap::{Parser, Subcommand};
use colored::*;
use naivechain::blockchain::{Block, PROOF_OF_WORK_DIFFICULTY};
use naivechain::crypto::{BlockSigner, KeyPair};
use naivechain::miner::{is_valid, leading_zero_bits};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "CLI utility for naivechain keys and blocks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Software version number
    Version,
    /// Generate a P-256 ECDSA key to sign blocks with
    GenerateKey {
        /// Also write the key as PKCS#8 PEM to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Decode a hex encoded block and report its proof-of-work
    Inspect {
        /// 187-byte block, hex encoded
        block_hex: String,
        #[arg(long, default_value_t = PROOF_OF_WORK_DIFFICULTY)]
        difficulty: u32,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("naivechain {}", env!("CARGO_PKG_VERSION"));
            println!("{}", "This is a naive implementation, do not use it.".yellow());
        }
        Commands::GenerateKey { out } => generate_key(out)?,
        Commands::Inspect {
            block_hex,
            difficulty,
        } => inspect(&block_hex, difficulty)?,
    }
    Ok(())
}

fn generate_key(out: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let keypair = KeyPair::generate();
    let key = keypair.to_pkcs8_der()?;
    let owner = keypair.public_key_der()?;

    println!("key: {}  (len={})", hex::encode(&key), key.len());
    println!("owner: {}  (len={})", hex::encode(&owner), owner.len());

    if let Some(path) = out {
        std::fs::write(&path, keypair.to_pkcs8_pem()?)?;
        println!("{} {}", "Key written to".bright_green(), path.display());
    }
    Ok(())
}

fn inspect(block_hex: &str, difficulty: u32) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = hex::decode(block_hex.trim())?;
    let block = Block::decode(&bytes)?;
    let hash = block.hash();

    println!("hash:       {}", hex::encode(hash));
    println!("prev:       {}", hex::encode(block.header.prev));
    println!("nonce:      {}", hex::encode(block.header.nonce));
    println!("root:       {}", hex::encode(block.header.root));
    println!("zero bits:  {}", leading_zero_bits(&hash));
    if is_valid(&block, difficulty) {
        println!("{}", format!("meets difficulty {}", difficulty).bright_green());
    } else {
        println!("{}", format!("does not meet difficulty {}", difficulty).red());
    }
    Ok(())
}
