//! Shared plumbing for the faucet claimer: logging bootstrap and
//! configuration-file loading.

pub mod utils;
