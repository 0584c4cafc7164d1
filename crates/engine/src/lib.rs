//! Claim orchestration engine for a rate-limited, CAPTCHA-gated token faucet.
//!
//! The engine keeps a durable set of managed wallets and claims from the
//! faucet on their behalf:
//! - Wallet store with snapshot persistence and rollback on write failure
//! - Faucet HTTP client (challenge, status, claim)
//! - Pluggable CAPTCHA solvers
//! - Sequential, paced batch claims with per-wallet failure isolation
//! - Two-phase scheduler that never overlaps batch runs
//! - Statistics, transient secret export and Prometheus metrics

pub mod captcha;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod reporting;
pub mod scheduler;
pub mod store;
pub mod wallet;

pub use captcha::{CaptchaSolver, RandomGuessSolver, SolverKind, SvgPatternSolver};
pub use client::{Challenge, ClaimSubmission, FaucetApi, FaucetStatus, HttpFaucetClient};
pub use config::ClaimerConfig;
pub use engine::{
    BatchReport, BatchRunner, ClaimEngine, ClaimFailure, ClaimResult, EngineOptions, WalletOutcome,
    MAX_WALLETS_PER_REQUEST,
};
pub use error::{ConfigError, EngineError, EngineResult, FaucetError, FaucetResult, StoreError, StoreResult};
pub use metrics::ClaimMetrics;
pub use reporting::{SecretExport, WalletStats};
pub use scheduler::{Scheduler, SchedulerPhase};
pub use store::WalletStore;
pub use wallet::WalletRecord;
