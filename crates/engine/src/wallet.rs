//! Managed wallet records and key generation

use chrono::{DateTime, Utc};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One managed wallet.
///
/// Fields are read-only outside this crate; the wallet store is the only
/// writer, so `claim_count == 0`, `last_claim_at == None` and
/// `total_claimed == 0` always hold together.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    address: String,
    #[serde(rename = "privateKey")]
    secret: String,
    created_at: DateTime<Utc>,
    #[serde(rename = "lastClaim")]
    last_claim_at: Option<DateTime<Utc>>,
    total_claimed: f64,
    claim_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_tx_hash: Option<String>,
}

impl WalletRecord {
    pub(crate) fn new(address: String, secret: String) -> Self {
        Self {
            address,
            secret,
            created_at: Utc::now(),
            last_claim_at: None,
            total_claimed: 0.0,
            claim_count: 0,
            last_tx_hash: None,
        }
    }

    /// Freshly generated wallet with zeroed claim history.
    pub fn generate() -> Self {
        let keys = generate_keypair();
        Self::new(keys.address, keys.secret)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Private key material. Never log this.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_claim_at(&self) -> Option<DateTime<Utc>> {
        self.last_claim_at
    }

    pub fn total_claimed(&self) -> f64 {
        self.total_claimed
    }

    pub fn claim_count(&self) -> u64 {
        self.claim_count
    }

    pub fn last_tx_hash(&self) -> Option<&str> {
        self.last_tx_hash.as_deref()
    }

    /// Shortened address for display, e.g. `0x1234567890...abcd`.
    pub fn short_address(&self, prefix: usize) -> String {
        let len = self.address.len();
        if len <= prefix + 4 {
            return self.address.clone();
        }
        match (self.address.get(..prefix), self.address.get(len - 4..)) {
            (Some(head), Some(tail)) => format!("{}...{}", head, tail),
            _ => self.address.clone(),
        }
    }

    pub(crate) fn apply_claim(&mut self, amount: f64, tx_ref: Option<String>, at: DateTime<Utc>) {
        self.last_claim_at = Some(at);
        self.total_claimed += amount;
        self.claim_count += 1;
        if tx_ref.is_some() {
            self.last_tx_hash = tx_ref;
        }
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("last_claim_at", &self.last_claim_at)
            .field("total_claimed", &self.total_claimed)
            .field("claim_count", &self.claim_count)
            .field("last_tx_hash", &self.last_tx_hash)
            .finish()
    }
}

/// A payout the store will accept: finite and strictly positive.
pub fn is_valid_claim_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

/// A generated address and its private key, both `0x`-prefixed hex.
pub struct GeneratedKeys {
    pub address: String,
    pub secret: String,
}

/// Generate a fresh secp256k1 keypair and its EIP-55 checksummed address.
pub fn generate_keypair() -> GeneratedKeys {
    let signing_key = SigningKey::random(&mut OsRng);
    keys_from_signing_key(&signing_key)
}

fn keys_from_signing_key(signing_key: &SigningKey) -> GeneratedKeys {
    let public_key = signing_key.verifying_key();
    let pub_key_bytes = public_key.to_encoded_point(false);
    let hash = keccak_hash::keccak(&pub_key_bytes.as_bytes()[1..]); // Skip first byte

    GeneratedKeys {
        address: to_checksum_address(&hash.0[12..]),
        secret: format!("0x{}", hex::encode(signing_key.to_bytes())),
    }
}

/// EIP-55 mixed-case encoding of a 20-byte address.
pub fn to_checksum_address(addr_bytes: &[u8]) -> String {
    let lower = hex::encode(addr_bytes);
    let hash = keccak_hash::keccak(lower.as_bytes());

    let mut out = String::with_capacity(2 + lower.len());
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash.0[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_vectors() {
        let cases = [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ];
        for expected in cases {
            let bytes = hex::decode(expected[2..].to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&bytes), expected);
        }
    }

    #[test]
    fn test_address_from_known_key() {
        let mut key = [0u8; 32];
        key[31] = 1;
        let signing_key = SigningKey::from_slice(&key).unwrap();
        let keys = keys_from_signing_key(&signing_key);

        assert_eq!(keys.address, "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
        assert_eq!(
            keys.secret,
            "0x0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_generated_wallet_is_fresh() {
        let wallet = WalletRecord::generate();
        assert_eq!(wallet.address().len(), 42);
        assert_eq!(wallet.secret().len(), 66);
        assert_eq!(wallet.claim_count(), 0);
        assert_eq!(wallet.total_claimed(), 0.0);
        assert!(wallet.last_claim_at().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let wallet = WalletRecord::generate();
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&wallet.secret()[2..]));
    }

    #[test]
    fn test_reads_legacy_json_layout() {
        let json = r#"{
            "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "privateKey": "0x01",
            "createdAt": "2024-05-01T10:00:00.000Z",
            "lastClaim": null,
            "totalClaimed": 0,
            "claimCount": 0
        }"#;
        let wallet: WalletRecord = serde_json::from_str(json).unwrap();
        assert_eq!(wallet.claim_count(), 0);
        assert!(wallet.last_tx_hash().is_none());
    }

    #[test]
    fn test_short_address() {
        let wallet = WalletRecord::new(
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
            "0x01".to_string(),
        );
        assert_eq!(wallet.short_address(10), "0x5aAeb605...eAed");

        let short = WalletRecord::new("0x1234".to_string(), "0x01".to_string());
        assert_eq!(short.short_address(10), "0x1234");
    }

    #[test]
    fn test_short_address_non_ascii_does_not_panic() {
        // hand-edited store file, multi-byte char straddling the cut
        let head = WalletRecord::new("0x1234567éabcdefghijkl".to_string(), "0x01".to_string());
        assert_eq!(head.short_address(10), head.address());

        let tail = WalletRecord::new("0x1234567890abcdefé123".to_string(), "0x01".to_string());
        assert_eq!(tail.short_address(10), tail.address());
    }

    #[test]
    fn test_claim_amount_validity() {
        assert!(is_valid_claim_amount(1.5));
        assert!(is_valid_claim_amount(1e-9));
        assert!(!is_valid_claim_amount(0.0));
        assert!(!is_valid_claim_amount(-3.0));
        assert!(!is_valid_claim_amount(f64::NAN));
        assert!(!is_valid_claim_amount(f64::INFINITY));
        assert!(!is_valid_claim_amount(f64::NEG_INFINITY));
    }

    #[test]
    fn test_apply_claim_updates_history() {
        let mut wallet = WalletRecord::generate();
        wallet.apply_claim(1.5, Some("0xabc".to_string()), Utc::now());
        wallet.apply_claim(0.5, None, Utc::now());

        assert_eq!(wallet.claim_count(), 2);
        assert_eq!(wallet.total_claimed(), 2.0);
        assert!(wallet.last_claim_at().is_some());
        assert_eq!(wallet.last_tx_hash(), Some("0xabc"));
    }
}
