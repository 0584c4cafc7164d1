//! Claim engine behaviour against a scripted faucet

use async_trait::async_trait;
use claimer_common::utils::logging::init_test_logging;
use claimer_engine::{
    BatchReport, Challenge, ClaimEngine, ClaimFailure, ClaimResult, ClaimSubmission, EngineError,
    EngineOptions, FaucetApi, FaucetError, FaucetResult, FaucetStatus, RandomGuessSolver,
    WalletStore,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

#[derive(Default)]
struct ScriptedFaucet {
    closed_for_hours: Option<f64>,
    amount: f64,
    challenge_down: bool,
    transport_failures: HashSet<String>,
    rejections: HashSet<String>,
    submitted: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
    hold: Option<(Notify, Notify)>,
}

impl ScriptedFaucet {
    fn paying(amount: f64) -> Self {
        Self {
            amount,
            ..Default::default()
        }
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaucetApi for ScriptedFaucet {
    async fn fetch_challenge(&self) -> FaucetResult<Challenge> {
        if self.challenge_down {
            return Err(FaucetError::Network("connection reset".to_string()));
        }
        Ok(Challenge {
            challenge_id: "challenge-1".to_string(),
            payload: r##"<svg><path fill="#111" d="M0 0Z"/></svg>"##.to_string(),
        })
    }

    async fn fetch_status(&self) -> FaucetResult<FaucetStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FaucetStatus {
            claimable_now: self.closed_for_hours.is_none(),
            hours_until_next: self.closed_for_hours.unwrap_or(0.0),
            balance: 1000.0,
            known_addresses: vec!["0xfaucet".to_string()],
        })
    }

    async fn submit_claim(
        &self,
        address: &str,
        _challenge_id: &str,
        _answer: &str,
    ) -> FaucetResult<ClaimSubmission> {
        self.submitted.lock().unwrap().push(address.to_string());

        if let Some((entered, release)) = &self.hold {
            entered.notify_one();
            release.notified().await;
        }

        if self.transport_failures.contains(address) {
            return Err(FaucetError::Network("timed out".to_string()));
        }
        if self.rejections.contains(address) {
            return Ok(ClaimSubmission::rejected("Invalid captcha"));
        }
        Ok(ClaimSubmission::accepted(self.amount, format!("0xtx-{}", address)))
    }
}

fn build_engine(dir: &TempDir, faucet: Arc<ScriptedFaucet>, pacing: Duration) -> Arc<ClaimEngine> {
    init_test_logging();
    let store = WalletStore::open(dir.path().join("wallets.json")).unwrap();
    Arc::new(
        ClaimEngine::new(
            store,
            faucet,
            Box::new(RandomGuessSolver),
            EngineOptions {
                pacing,
                export_dir: dir.path().to_path_buf(),
            },
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_create_then_single_claim_scenario() {
    let dir = TempDir::new().unwrap();
    let faucet = Arc::new(ScriptedFaucet::paying(1.5));
    let engine = build_engine(&dir, faucet.clone(), Duration::ZERO);

    engine.create_wallets(3).await.unwrap();
    let wallets = engine.list_wallets().await;
    assert_eq!(wallets.len(), 3);
    assert!(wallets.iter().all(|w| w.claim_count() == 0));

    let result = engine.claim_one(&wallets[0]).await;
    assert!(result.is_success());

    let after = engine.list_wallets().await;
    assert_eq!(after[0].claim_count(), 1);
    assert_eq!(after[0].total_claimed(), 1.5);
    assert!(after[0].last_claim_at().is_some());
    assert_eq!(after[1], wallets[1]);
    assert_eq!(after[2], wallets[2]);
}

#[tokio::test]
async fn test_failed_claims_mutate_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(1.0)), Duration::ZERO);
    let wallets = engine.create_wallets(2).await.unwrap();

    let mut faucet = ScriptedFaucet::paying(1.0);
    faucet.transport_failures.insert(wallets[0].address().to_string());
    faucet.rejections.insert(wallets[1].address().to_string());
    drop(engine);

    let engine = build_engine(&dir, Arc::new(faucet), Duration::ZERO);

    let network = engine.claim_one(&wallets[0]).await;
    assert!(matches!(network, ClaimResult::Failed(ClaimFailure::Network(_))));

    let rejected = engine.claim_one(&wallets[1]).await;
    assert_eq!(
        rejected,
        ClaimResult::Failed(ClaimFailure::Rejected("Invalid captcha".to_string()))
    );

    assert_eq!(engine.list_wallets().await, wallets);
}

#[tokio::test]
async fn test_challenge_failure_never_submits() {
    let dir = TempDir::new().unwrap();
    let faucet = Arc::new(ScriptedFaucet {
        challenge_down: true,
        ..ScriptedFaucet::paying(1.0)
    });
    let engine = build_engine(&dir, faucet.clone(), Duration::ZERO);
    let wallet = engine.create_wallets(1).await.unwrap().remove(0);

    let result = engine.claim_one(&wallet).await;
    assert!(matches!(result, ClaimResult::Failed(ClaimFailure::Network(_))));
    assert!(faucet.submitted().is_empty());
}

#[tokio::test]
async fn test_cooldown_skips_whole_batch() {
    let dir = TempDir::new().unwrap();
    let faucet = Arc::new(ScriptedFaucet {
        closed_for_hours: Some(6.0),
        ..ScriptedFaucet::paying(1.0)
    });
    let engine = build_engine(&dir, faucet.clone(), Duration::ZERO);
    engine.create_wallets(4).await.unwrap();
    let before = engine.list_wallets().await;

    let report = engine.claim_all().await.unwrap();
    assert_eq!(report, BatchReport::Skipped { hours_until_next: 6.0 });
    assert!(faucet.submitted().is_empty());
    assert_eq!(faucet.status_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.list_wallets().await, before);
    assert_eq!(engine.metrics().batches_skipped_total.get(), 1);
}

#[tokio::test]
async fn test_batch_isolates_failing_wallet() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(2.0)), Duration::ZERO);
    let wallets = engine.create_wallets(5).await.unwrap();
    drop(engine);

    let mut faucet = ScriptedFaucet::paying(2.0);
    faucet.transport_failures.insert(wallets[2].address().to_string());
    let faucet = Arc::new(faucet);
    let engine = build_engine(&dir, faucet.clone(), Duration::ZERO);

    let report = engine.claim_all().await.unwrap();
    match report {
        BatchReport::Completed { succeeded, failed, total, outcomes } => {
            assert_eq!((succeeded, failed, total), (4, 1, 5));
            let order: Vec<&str> = outcomes.iter().map(|o| o.address.as_str()).collect();
            let expected: Vec<&str> = wallets.iter().map(|w| w.address()).collect();
            assert_eq!(order, expected);
            assert!(!outcomes[2].result.is_success());
        }
        other => panic!("expected completed batch, got {:?}", other),
    }

    // every wallet was attempted, in store order
    assert_eq!(faucet.submitted().len(), 5);

    let after = engine.list_wallets().await;
    for (i, wallet) in after.iter().enumerate() {
        let expected = if i == 2 { 0 } else { 1 };
        assert_eq!(wallet.claim_count(), expected, "wallet {}", i);
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.claims_succeeded_total.get(), 4);
    assert_eq!(metrics.claims_failed_total.with_label_values(&["network"]).get(), 1);
}

#[tokio::test]
async fn test_claims_survive_reload() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(0.75)), Duration::ZERO);
    engine.create_wallets(3).await.unwrap();
    engine.claim_all().await.unwrap();
    engine.claim_all().await.unwrap();
    let expected = engine.list_wallets().await;
    drop(engine);

    let reloaded = WalletStore::open(dir.path().join("wallets.json")).unwrap();
    assert_eq!(reloaded.list(), expected.as_slice());
    assert!(reloaded.list().iter().all(|w| w.claim_count() == 2 && w.total_claimed() == 1.5));
}

#[tokio::test]
async fn test_garbage_payout_keeps_store_loadable() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(f64::NAN)), Duration::ZERO);
    let wallets = engine.create_wallets(2).await.unwrap();

    let report = engine.claim_all().await.unwrap();
    assert!(matches!(report, BatchReport::Completed { succeeded: 0, failed: 2, .. }));
    drop(engine);

    let reloaded = WalletStore::open(dir.path().join("wallets.json")).unwrap();
    assert_eq!(reloaded.list(), wallets.as_slice());
}

#[tokio::test]
async fn test_second_engine_on_same_file_is_refused() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(1.0)), Duration::ZERO);
    engine.create_wallets(1).await.unwrap();

    assert!(WalletStore::open(dir.path().join("wallets.json")).is_err());
    assert_eq!(engine.list_wallets().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_paces_between_wallets() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(1.0)), Duration::from_secs(5));
    engine.create_wallets(3).await.unwrap();

    let started = tokio::time::Instant::now();
    engine.claim_all().await.unwrap();
    let elapsed = started.elapsed();

    // two gaps for three wallets, none after the last
    assert!(elapsed >= Duration::from_secs(10), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(15), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_manual_trigger_rejected_while_batch_runs() {
    let dir = TempDir::new().unwrap();
    let faucet = Arc::new(ScriptedFaucet {
        hold: Some((Notify::new(), Notify::new())),
        ..ScriptedFaucet::paying(1.0)
    });
    let engine = build_engine(&dir, faucet.clone(), Duration::ZERO);
    engine.create_wallets(1).await.unwrap();

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.claim_all().await })
    };

    let (entered, release) = faucet.hold.as_ref().unwrap();
    entered.notified().await;

    assert!(engine.batch_in_progress());
    assert!(matches!(engine.try_claim_all().await, Err(EngineError::BatchInProgress)));

    release.notify_one();
    let report = background.await.unwrap().unwrap();
    assert!(matches!(report, BatchReport::Completed { succeeded: 1, .. }));
    assert!(!engine.batch_in_progress());
    assert_eq!(faucet.submitted().len(), 1);
}

#[tokio::test]
async fn test_stats_and_export() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(&dir, Arc::new(ScriptedFaucet::paying(1.5)), Duration::ZERO);
    let wallets = engine.create_wallets(2).await.unwrap();
    engine.claim_one(&wallets[0]).await;

    let stats = engine.stats().await;
    assert_eq!(stats.wallet_count, 2);
    assert_eq!(stats.total_claims, 1);
    assert_eq!(stats.total_claimed, 1.5);
    assert_eq!(stats.average_per_wallet, 0.75);

    let export = engine.export_secrets().await.unwrap();
    let path = export.path().to_path_buf();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains(wallets[0].secret()));
    assert!(contents.contains(wallets[1].address()));

    export.remove().unwrap();
    assert!(!path.exists());
}
