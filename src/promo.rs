//! Promo codes with usage limits and per-account exactly-once redemption.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    /// Stored normalized: trimmed and uppercased.
    pub code: String,
    pub reward: u64,
    pub usage_limit: u32,
    pub used_count: u32,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

impl PromoCode {
    /// Codes are case- and whitespace-insensitive at the edge.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_uppercase()
    }

    pub fn key(code: &str) -> Vec<u8> {
        format!("promo:code:{}", code).into_bytes()
    }

    /// Marker key whose existence records that the account already redeemed
    /// this code.
    pub fn used_key(code: &str, account_id: u64) -> Vec<u8> {
        format!("promo:used:{}:{:020}", code, account_id).into_bytes()
    }
}

/// Value stored under the usage marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoUse {
    pub account_id: u64,
    pub at: i64,
}
