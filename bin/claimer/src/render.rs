//! Plain-text rendering of engine results for the terminal

use claimer_engine::{BatchReport, ClaimResult, FaucetStatus, WalletRecord, WalletStats};
use std::fmt::Write;

pub fn created(created: &[WalletRecord], total: usize) -> String {
    format!("Created {} wallets ({} total)", created.len(), total)
}

pub fn wallet_list(wallets: &[WalletRecord]) -> String {
    if wallets.is_empty() {
        return "No wallets yet. Use `create` to generate some.".to_string();
    }

    let mut out = format!("Wallets ({}):\n", wallets.len());
    for (i, wallet) in wallets.iter().enumerate() {
        let last = wallet
            .last_claim_at()
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        let _ = writeln!(
            out,
            "{:>3}. {}  {:.2} ({}x, last {})",
            i + 1,
            wallet.address(),
            wallet.total_claimed(),
            wallet.claim_count(),
            last
        );
    }
    out
}

pub fn deleted(wallet: &WalletRecord) -> String {
    format!(
        "Deleted {} (total claimed {:.2})",
        wallet.short_address(20),
        wallet.total_claimed()
    )
}

pub fn stats(stats: &WalletStats) -> String {
    format!(
        "Wallets:        {}\nTotal claimed:  {:.2}\nTotal claims:   {}\nAvg per wallet: {:.2}",
        stats.wallet_count, stats.total_claimed, stats.total_claims, stats.average_per_wallet
    )
}

pub fn faucet_info(status: &FaucetStatus) -> String {
    format!(
        "Balance:    {:.2}\nCan claim:  {}\nNext claim: {}h\nAddresses:  {}",
        status.balance,
        if status.claimable_now { "yes" } else { "no" },
        status.hours_until_next,
        status.known_addresses.len()
    )
}

pub fn batch(report: &BatchReport) -> String {
    match report {
        BatchReport::Skipped { hours_until_next } => {
            format!("Faucet not claimable yet, try again in {}h", hours_until_next)
        }
        BatchReport::Completed { succeeded, failed, total, outcomes } => {
            let mut out = String::new();
            for outcome in outcomes {
                let line = match &outcome.result {
                    ClaimResult::Succeeded { amount, tx_ref } => format!(
                        "ok   {} +{} tx {}",
                        outcome.address,
                        amount,
                        tx_ref.as_deref().unwrap_or("-")
                    ),
                    ClaimResult::Failed(failure) => format!("fail {} {}", outcome.address, failure),
                };
                let _ = writeln!(out, "{}", line);
            }
            let _ = write!(
                out,
                "Batch finished: {} succeeded, {} failed, {} wallets",
                succeeded, failed, total
            );
            out
        }
    }
}
