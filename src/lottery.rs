//! Weekly lottery: tickets are sold against the upcoming Sunday draw,
//! numbered densely from 1 via a per-draw sequence row that is updated in
//! the same write batch as the ticket insert.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Upcoming Sunday, never today: buying on a Sunday targets the next week's
/// draw.
pub fn next_draw_date(today: NaiveDate) -> NaiveDate {
    let until_sunday = 7 - today.weekday().num_days_from_sunday() as i64;
    today + Duration::days(until_sunday)
}

/// Total prize for a draw with `tickets` sold at `price` each.
pub fn jackpot(tickets: u64, price: u64) -> u64 {
    tickets * price * 2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryTicket {
    pub number: u64,
    pub account_id: u64,
    pub draw_date: String,
    pub purchased_at: i64,
}

impl LotteryTicket {
    pub fn key(draw_date: &str, number: u64) -> Vec<u8> {
        format!("lottery:ticket:{}:{:010}", draw_date, number).into_bytes()
    }

    pub fn prefix(draw_date: &str) -> Vec<u8> {
        format!("lottery:ticket:{}:", draw_date).into_bytes()
    }
}

/// Per-draw ticket counter; holds the highest number issued so far.
pub fn seq_key(draw_date: &str) -> Vec<u8> {
    format!("lottery:seq:{}", draw_date).into_bytes()
}

/// Result of a resolved draw. Its existence makes resolution idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawRecord {
    pub draw_date: String,
    pub winner_id: u64,
    pub prize: u64,
    pub ticket_count: u64,
    pub at: i64,
}

impl DrawRecord {
    pub fn key(draw_date: &str) -> Vec<u8> {
        format!("lottery:history:{}", draw_date).into_bytes()
    }
}
