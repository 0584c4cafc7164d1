use anyhow::{Context, Result};
use claimer_common::utils::config::load_config;
use claimer_engine::ClaimerConfig;

use crate::cli::Cli;

/// File (optional) < environment < command line, then validate.
pub fn load_claimer_config(args: &Cli) -> Result<ClaimerConfig> {
    let mut config: ClaimerConfig = match &args.config {
        Some(path) => load_config(path)?,
        None => ClaimerConfig::default(),
    };

    config
        .apply_vars(|key| std::env::var(key).ok())
        .context("Invalid environment configuration")?;

    if let Some(path) = &args.wallets_file {
        config.wallets_file = path.clone();
    }

    if let Some(url) = &args.faucet_api {
        config.faucet_api = url.clone();
    }

    config.validate()?;
    Ok(config)
}
