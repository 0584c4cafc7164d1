//! Claim orchestration
//!
//! The engine owns the wallet store and drives the per-wallet claim
//! protocol: fetch challenge, solve, submit, record. Batch runs walk every
//! wallet in store order with a fixed pause between wallets and never run
//! concurrently with each other.

use crate::captcha::CaptchaSolver;
use crate::client::{FaucetApi, FaucetStatus, HttpFaucetClient};
use crate::config::ClaimerConfig;
use crate::error::{EngineError, EngineResult};
use crate::metrics::ClaimMetrics;
use crate::reporting::{self, SecretExport, WalletStats};
use crate::store::WalletStore;
use crate::wallet::{is_valid_claim_amount, WalletRecord};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Most wallets a single create request may ask for
pub const MAX_WALLETS_PER_REQUEST: usize = 50;

/// Why a single claim did not succeed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClaimFailure {
    /// Transport failure or timeout talking to the faucet
    Network(String),
    /// The faucet answered but declined the claim
    Rejected(String),
    /// The faucet paid out but the store could not record it
    Storage(String),
}

impl ClaimFailure {
    pub fn label(&self) -> &'static str {
        match self {
            ClaimFailure::Network(_) => "network",
            ClaimFailure::Rejected(_) => "rejected",
            ClaimFailure::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for ClaimFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClaimFailure::Network(msg) => write!(f, "network error: {}", msg),
            ClaimFailure::Rejected(reason) => write!(f, "rejected: {}", reason),
            ClaimFailure::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

/// Outcome of one claim attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClaimResult {
    Succeeded { amount: f64, tx_ref: Option<String> },
    Failed(ClaimFailure),
}

impl ClaimResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ClaimResult::Succeeded { .. })
    }
}

/// Per-wallet line of a batch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletOutcome {
    pub address: String,
    pub result: ClaimResult,
}

/// Result of a batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BatchReport {
    /// Faucet was in cooldown; no wallet was attempted
    Skipped { hours_until_next: f64 },
    Completed {
        succeeded: usize,
        failed: usize,
        total: usize,
        outcomes: Vec<WalletOutcome>,
    },
}

/// Something that can run one batch without overlapping another
#[async_trait]
pub trait BatchRunner: Send + Sync {
    /// Run a batch now, or fail with `BatchInProgress` if one is running.
    async fn try_run_batch(&self) -> EngineResult<BatchReport>;
}

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Pause between consecutive wallets in a batch
    pub pacing: Duration,
    /// Where transient secret exports are written
    pub export_dir: PathBuf,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            pacing: Duration::from_millis(5000),
            export_dir: PathBuf::from("."),
        }
    }
}

/// The claim engine. Construct once and share behind an `Arc`.
pub struct ClaimEngine {
    store: Mutex<WalletStore>,
    faucet: Arc<dyn FaucetApi>,
    solver: Box<dyn CaptchaSolver>,
    metrics: Arc<ClaimMetrics>,
    batch_gate: Mutex<()>,
    options: EngineOptions,
}

impl ClaimEngine {
    pub fn new(
        store: WalletStore,
        faucet: Arc<dyn FaucetApi>,
        solver: Box<dyn CaptchaSolver>,
        options: EngineOptions,
    ) -> EngineResult<Self> {
        let metrics = Arc::new(ClaimMetrics::new()?);
        metrics.wallets.set(store.len() as i64);

        Ok(Self {
            store: Mutex::new(store),
            faucet,
            solver,
            metrics,
            batch_gate: Mutex::new(()),
            options,
        })
    }

    /// Open the store and wire up the HTTP client and solver from `config`.
    pub fn from_config(config: &ClaimerConfig) -> EngineResult<Self> {
        let store = WalletStore::open(&config.wallets_file)?;
        let faucet = HttpFaucetClient::new(config.faucet_api.clone(), config.request_timeout())?;
        let solver = config.solver.build();

        info!(
            "Claim engine ready: {} wallets, faucet {}, solver {}",
            store.len(),
            faucet.base_url(),
            solver.name()
        );

        Self::new(
            store,
            Arc::new(faucet),
            solver,
            EngineOptions {
                pacing: config.claim_delay(),
                export_dir: config.export_dir.clone(),
            },
        )
    }

    pub fn metrics(&self) -> Arc<ClaimMetrics> {
        self.metrics.clone()
    }

    /// Generate and persist `count` new wallets.
    pub async fn create_wallets(&self, count: usize) -> EngineResult<Vec<WalletRecord>> {
        if count == 0 || count > MAX_WALLETS_PER_REQUEST {
            return Err(EngineError::InvalidRequest(format!(
                "wallet count must be between 1 and {}, got {}",
                MAX_WALLETS_PER_REQUEST, count
            )));
        }

        let mut store = self.store.lock().await;
        let created = store.create(count).await?;
        self.metrics.wallets.set(store.len() as i64);

        info!("Created {} wallets, {} total", created.len(), store.len());
        Ok(created)
    }

    /// Snapshot of all wallets in creation order.
    pub async fn list_wallets(&self) -> Vec<WalletRecord> {
        self.store.lock().await.list().to_vec()
    }

    /// Delete the wallet at 0-based `index`.
    pub async fn delete_wallet(&self, index: usize) -> EngineResult<WalletRecord> {
        let mut store = self.store.lock().await;
        let removed = store.delete(index).await?;
        self.metrics.wallets.set(store.len() as i64);
        Ok(removed)
    }

    /// Aggregate claim statistics.
    pub async fn stats(&self) -> WalletStats {
        reporting::compute_stats(self.store.lock().await.list())
    }

    /// Write all addresses and secrets to a transient file. The file is
    /// removed when the returned handle is dropped.
    pub async fn export_secrets(&self) -> EngineResult<SecretExport> {
        let store = self.store.lock().await;
        let export = reporting::write_export(&self.options.export_dir, store.list())
            .map_err(crate::error::StoreError::Storage)?;

        info!("Exported {} wallets to {}", store.len(), export.path().display());
        Ok(export)
    }

    /// Current faucet status, fetched fresh.
    pub async fn faucet_info(&self) -> EngineResult<FaucetStatus> {
        Ok(self.faucet.fetch_status().await?)
    }

    /// One challenge/submit round for `wallet`. Never retried; a failure
    /// leaves the wallet untouched.
    #[instrument(skip_all, fields(wallet = %wallet.short_address(10)))]
    pub async fn claim_one(&self, wallet: &WalletRecord) -> ClaimResult {
        let result = self.attempt_claim(wallet.address()).await;

        match &result {
            ClaimResult::Succeeded { amount, tx_ref } => {
                self.metrics.claims_succeeded_total.inc();
                info!("Claim succeeded: {} (tx {})", amount, tx_ref.as_deref().unwrap_or("-"));
            }
            ClaimResult::Failed(failure) => {
                self.metrics.record_failure(failure.label());
                match failure {
                    ClaimFailure::Network(_) => warn!("Claim failed: {}", failure),
                    ClaimFailure::Rejected(_) => info!("Claim {}", failure),
                    ClaimFailure::Storage(_) => error!("Claim paid out but not recorded: {}", failure),
                }
            }
        }

        result
    }

    async fn attempt_claim(&self, address: &str) -> ClaimResult {
        let challenge = match self.faucet.fetch_challenge().await {
            Ok(challenge) => challenge,
            Err(e) => return ClaimResult::Failed(ClaimFailure::Network(e.to_string())),
        };

        let answer = self.solver.solve(&challenge.payload);
        debug!("Solved challenge {} with {} via {}", challenge.challenge_id, answer, self.solver.name());

        let submission = match self
            .faucet
            .submit_claim(address, &challenge.challenge_id, &answer)
            .await
        {
            Ok(submission) => submission,
            Err(e) => return ClaimResult::Failed(ClaimFailure::Network(e.to_string())),
        };

        if !submission.accepted {
            let reason = submission.reason.unwrap_or_else(|| "no reason given".to_string());
            return ClaimResult::Failed(ClaimFailure::Rejected(reason));
        }

        // an unusable amount is treated like an undecodable reply
        let amount = match submission.amount {
            Some(amount) if is_valid_claim_amount(amount) => amount,
            other => {
                return ClaimResult::Failed(ClaimFailure::Network(format!(
                    "Invalid response: accepted claim reported amount {:?}",
                    other
                )))
            }
        };

        let mut store = self.store.lock().await;
        match store
            .record_claim_success(address, amount, submission.tx_ref.clone())
            .await
        {
            Ok(_) => ClaimResult::Succeeded {
                amount,
                tx_ref: submission.tx_ref,
            },
            Err(e) => ClaimResult::Failed(ClaimFailure::Storage(e.to_string())),
        }
    }

    /// Run a batch, waiting for any batch already in flight.
    pub async fn claim_all(&self) -> EngineResult<BatchReport> {
        let _gate = self.batch_gate.lock().await;
        self.run_batch().await
    }

    /// Run a batch, or fail with `BatchInProgress` if one is in flight.
    pub async fn try_claim_all(&self) -> EngineResult<BatchReport> {
        let _gate = self
            .batch_gate
            .try_lock()
            .map_err(|_| EngineError::BatchInProgress)?;
        self.run_batch().await
    }

    /// Whether a batch is currently running.
    pub fn batch_in_progress(&self) -> bool {
        self.batch_gate.try_lock().is_err()
    }

    async fn run_batch(&self) -> EngineResult<BatchReport> {
        let status = self.faucet.fetch_status().await?;
        if !status.claimable_now {
            self.metrics.batches_skipped_total.inc();
            info!(
                "Faucet not claimable yet, next window in {}h; skipping batch",
                status.hours_until_next
            );
            return Ok(BatchReport::Skipped {
                hours_until_next: status.hours_until_next,
            });
        }

        let _timer = self.metrics.batch_duration.start_timer();
        self.metrics.batches_total.inc();

        let wallets = self.list_wallets().await;
        let total = wallets.len();
        info!("Starting batch claim for {} wallets", total);

        let mut succeeded = 0;
        let mut failed = 0;
        let mut outcomes = Vec::with_capacity(total);

        for (i, wallet) in wallets.iter().enumerate() {
            let result = self.claim_one(wallet).await;
            if result.is_success() {
                succeeded += 1;
            } else {
                failed += 1;
            }
            outcomes.push(WalletOutcome {
                address: wallet.address().to_string(),
                result,
            });

            if i + 1 < total {
                tokio::time::sleep(self.options.pacing).await;
            }
        }

        info!("Batch claim finished: {} succeeded, {} failed, {} total", succeeded, failed, total);
        Ok(BatchReport::Completed {
            succeeded,
            failed,
            total,
            outcomes,
        })
    }
}

#[async_trait]
impl BatchRunner for ClaimEngine {
    async fn try_run_batch(&self) -> EngineResult<BatchReport> {
        self.try_claim_all().await
    }
}
