//! Key bundle files

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use shroud_config::ShroudConfig;
use shroud_privacy::{ExportedKeys, ShieldedKeyBundle, generate_key, generate_public_address};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn key_path(path: Option<PathBuf>, config: &ShroudConfig) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from(&config.wallet.key_path))
}

pub fn genkey(out: Option<PathBuf>, config: &ShroudConfig) -> anyhow::Result<()> {
    let key_path = key_path(out, config);

    if let Some(dir) = key_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty() && !d.exists())
    {
        fs::create_dir_all(dir)?;
        println!("📁 Created directory: {}", dir.display());
    }

    if key_path.exists() {
        anyhow::bail!(
            "File {} already exists. Remove it first or use a different filename.",
            key_path.display()
        );
    }

    println!("🔐 Generating new key bundle...");
    let keys = generate_key();
    let json = serde_json::to_string_pretty(&keys)?;

    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&key_path)
        .with_context(|| format!("creating {}", key_path.display()))?;

    #[cfg(unix)]
    {
        // chmod 600 (rw-------)
        let mut perms = f.metadata()?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&key_path, perms)?;
    }

    f.write_all(json.as_bytes())?;

    println!("✅ Wrote new key bundle to {}", key_path.display());
    println!("🔑 Public address: {}", keys.public_address);
    Ok(())
}

pub fn address(spending_key: &str) -> anyhow::Result<()> {
    let keys = generate_public_address(spending_key).context("deriving keys")?;
    println!("{}", serde_json::to_string_pretty(&keys)?);
    Ok(())
}

pub fn load_keys(path: Option<PathBuf>, config: &ShroudConfig) -> anyhow::Result<ShieldedKeyBundle> {
    let key_path = key_path(path, config);
    log::debug!("loading keys from {}", key_path.display());

    let json = fs::read_to_string(&key_path)
        .with_context(|| format!("reading {} (run `shroud genkey` first?)", key_path.display()))?;
    let keys: ExportedKeys = serde_json::from_str(&json)
        .with_context(|| format!("parsing {}", key_path.display()))?;
    Ok(keys.to_bundle()?)
}
