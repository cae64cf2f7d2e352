//! Diamond-to-gift exchange requests.
//!
//! The cost is debited when the request is created. Completion is an
//! administrative action with no ledger effect; rejection refunds the
//! debit. Each request resolves at most once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub id: u64,
    pub account_id: u64,
    pub gift_code: String,
    pub gift_name: String,
    pub stars_amount: u64,
    pub diamonds_cost: u64,
    pub status: ExchangeStatus,
    pub admin_id: Option<u64>,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl ExchangeRequest {
    pub fn key(id: u64) -> Vec<u8> {
        format!("exchange:req:{:020}", id).into_bytes()
    }

    pub const PREFIX: &'static [u8] = b"exchange:req:";
    pub const SEQ_KEY: &'static [u8] = b"exchange:seq";
}
