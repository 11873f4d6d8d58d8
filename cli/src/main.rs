mod demo;
mod wallet;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use shroud_config::ShroudConfig;
use shroud_privacy::{FinalizedTransaction, Note, ProposedTransaction, PublicAddress};

/// Shroud CLI - shielded transaction tool
#[derive(Parser, Debug)]
#[command(name = "shroud", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new key bundle
    Genkey {
        /// Output file (default: wallet.key_path from config)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Derive every key and the public address from a spending key
    Address {
        /// Hex-encoded spending key
        #[arg(long, env = "SHROUD_SPENDING_KEY")]
        spending_key: String,
    },
    /// Mint a note as a miner's-fee transaction
    Mint {
        /// Recipient public address (hex)
        #[arg(long)]
        to: String,
        /// Note value
        #[arg(long)]
        value: u64,
        /// Memo text (default: transaction.default_memo from config)
        #[arg(long)]
        memo: Option<String>,
        /// Key bundle of the minter (default: wallet.key_path from config)
        #[arg(long)]
        keys: Option<PathBuf>,
        /// Where to write the serialized transaction
        #[arg(long)]
        out: PathBuf,
    },
    /// Print a transaction's public data as JSON
    Inspect { file: PathBuf },
    /// Check every proof and signature in a transaction
    Verify { file: PathBuf },
    /// Decrypt the outputs of a transaction as owner and as sender
    Decrypt {
        file: PathBuf,
        /// Key bundle (default: wallet.key_path from config)
        #[arg(long)]
        keys: Option<PathBuf>,
    },
    /// Mint, spend, verify and decrypt in memory
    Demo,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = ShroudConfig::global();

    let result = match cli.command {
        Command::Genkey { out } => wallet::genkey(out, config),
        Command::Address { spending_key } => wallet::address(&spending_key),
        Command::Mint {
            to,
            value,
            memo,
            keys,
            out,
        } => mint(&to, value, memo, keys, &out, config),
        Command::Inspect { file } => inspect(&file),
        Command::Verify { file } => verify(&file, config),
        Command::Decrypt { file, keys } => decrypt(&file, keys, config),
        Command::Demo => demo::run(config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn read_transaction(path: &Path) -> anyhow::Result<FinalizedTransaction> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    FinalizedTransaction::from_bytes(&bytes)
        .with_context(|| format!("decoding transaction in {}", path.display()))
}

fn mint(
    to: &str,
    value: u64,
    memo: Option<String>,
    keys: Option<PathBuf>,
    out: &Path,
    config: &ShroudConfig,
) -> anyhow::Result<()> {
    let minter = wallet::load_keys(keys, config)?;
    let owner = PublicAddress::from_hex(to).context("parsing recipient address")?;
    let memo = memo.unwrap_or_else(|| config.transaction.default_memo.clone());

    let mut proposal = ProposedTransaction::new(minter.spending_key.clone());
    proposal.receive(Note::new(owner, value, memo.as_str())?)?;

    println!("⛏️  Minting {} to {}...", value, owner);
    let posted = proposal.post_miners_fee()?;
    fs::write(out, posted.to_bytes()).with_context(|| format!("writing {}", out.display()))?;

    println!("✅ Wrote transaction to {}", out.display());
    println!("🔗 Hash: {}", hex::encode(posted.transaction_hash()));
    Ok(())
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let tx = read_transaction(file)?;

    let spends = (0..tx.spends_len())
        .map(|i| tx.get_spend(i))
        .collect::<Result<Vec<_>, _>>()?;
    let notes: Vec<_> = tx
        .notes()
        .iter()
        .map(|note| {
            serde_json::json!({
                "note_commitment": hex::encode(note.note_commitment().as_bytes()),
                "value_commitment": hex::encode(note.value_commitment()),
            })
        })
        .collect();

    let summary = serde_json::json!({
        "hash": hex::encode(tx.transaction_hash()),
        "fee": tx.fee(),
        "miners_fee": tx.is_miners_fee(),
        "spends": spends,
        "notes": notes,
        "binding_signature": hex::encode(tx.transaction_signature().as_bytes()),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn verify(file: &Path, config: &ShroudConfig) -> anyhow::Result<()> {
    if config.verifier.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.verifier.threads)
            .build_global()
            .context("building verifier thread pool")?;
    }

    let tx = read_transaction(file)?;
    if !tx.verify() {
        anyhow::bail!("transaction {} is invalid", hex::encode(tx.transaction_hash()));
    }

    println!("✅ Transaction {} is valid", hex::encode(tx.transaction_hash()));
    for nullifier in tx.nullifiers() {
        println!("   spends {}", hex::encode(nullifier.as_bytes()));
    }
    Ok(())
}

fn decrypt(file: &Path, keys: Option<PathBuf>, config: &ShroudConfig) -> anyhow::Result<()> {
    let bundle = wallet::load_keys(keys, config)?;
    let tx = read_transaction(file)?;

    let mut found = 0;
    for (index, encrypted) in tx.notes().iter().enumerate() {
        if let Some(note) = encrypted.decrypt_note_for_owner(&bundle.incoming_view_key)? {
            println!("📥 note {}: received {} ({:?})", index, note.value(), note.memo().to_text());
            found += 1;
        }
        if let Some(note) = encrypted.decrypt_note_for_spender(&bundle.outgoing_view_key)? {
            println!(
                "📤 note {}: sent {} to {} ({:?})",
                index,
                note.value(),
                note.owner(),
                note.memo().to_text()
            );
            found += 1;
        }
    }

    if found == 0 {
        println!("No notes in this transaction belong to {}", bundle.public_address);
    }
    Ok(())
}
