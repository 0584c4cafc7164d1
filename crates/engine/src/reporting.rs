//! Read-only views derived from the wallet store

use crate::wallet::WalletRecord;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;

/// Aggregate claim statistics across all wallets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletStats {
    pub wallet_count: usize,
    pub total_claimed: f64,
    pub total_claims: u64,
    pub average_per_wallet: f64,
}

pub fn compute_stats(wallets: &[WalletRecord]) -> WalletStats {
    let total_claimed: f64 = wallets.iter().map(|w| w.total_claimed()).sum();
    let total_claims = wallets.iter().map(|w| w.claim_count()).sum();
    let average_per_wallet = if wallets.is_empty() {
        0.0
    } else {
        total_claimed / wallets.len() as f64
    };

    WalletStats {
        wallet_count: wallets.len(),
        total_claimed,
        total_claims,
        average_per_wallet,
    }
}

/// Plaintext listing of every address and private key.
pub fn render_export(wallets: &[WalletRecord]) -> String {
    let mut out = String::from("PRIVATE KEYS - STORE SECURELY, NEVER SHARE\n\n");
    for (i, wallet) in wallets.iter().enumerate() {
        out.push_str(&format!(
            "{}. Address: {}\n   Private Key: {}\n   Total: {:.2}\n\n",
            i + 1,
            wallet.address(),
            wallet.secret(),
            wallet.total_claimed()
        ));
    }
    out
}

/// A transient export file, deleted when this handle drops
#[derive(Debug)]
pub struct SecretExport {
    path: TempPath,
    wallet_count: usize,
}

impl SecretExport {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn wallet_count(&self) -> usize {
        self.wallet_count
    }

    /// Delete the file now, reporting any I/O error.
    pub fn remove(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Write the export into `dir` as `wallets_export_<millis>*.txt`.
pub fn write_export(dir: &Path, wallets: &[WalletRecord]) -> std::io::Result<SecretExport> {
    let prefix = format!("wallets_export_{}", chrono::Utc::now().timestamp_millis());
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".txt")
        .tempfile_in(dir)?;

    file.write_all(render_export(wallets).as_bytes())?;
    file.as_file().sync_all()?;

    Ok(SecretExport {
        path: file.into_temp_path(),
        wallet_count: wallets.len(),
    })
}
