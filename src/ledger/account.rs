use serde::{Deserialize, Serialize};

/// One player account. Balance is kept in lockstep with the journal: every
/// mutation writes the new balance and the matching entry in one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub display_name: String,
    pub balance: u64,
    pub free_cases: u32,
    pub referrer_id: Option<u64>,
    pub referral_count: u32,
    pub cases_opened: u64,
    pub wins: u64,
    pub losses: u64,
    pub daily_streak: u32,
    /// Unix timestamp of the last daily claim, 0 if never claimed.
    pub last_daily_claim: i64,
    pub total_wagered: u64,
    pub created_at: i64,
    /// Sequence of the most recent journal entry for this account.
    pub journal_seq: u64,
}

impl Account {
    pub fn new(id: u64, display_name: &str, now: i64, free_cases: u32) -> Self {
        Self {
            id,
            display_name: display_name.to_string(),
            balance: 0,
            free_cases,
            referrer_id: None,
            referral_count: 0,
            cases_opened: 0,
            wins: 0,
            losses: 0,
            daily_streak: 0,
            last_daily_claim: 0,
            total_wagered: 0,
            created_at: now,
            journal_seq: 0,
        }
    }

    pub fn key(id: u64) -> Vec<u8> {
        format!("account:{:020}", id).into_bytes()
    }

    pub const PREFIX: &'static [u8] = b"account:";
}

/// Which statistic a leaderboard ranks by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    Balance,
    Wins,
    CasesOpened,
    Referrals,
    Level,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub account_id: u64,
    pub display_name: String,
    pub value: u64,
}

/// Administrative ban. Existence of the record is the ban; balance-affecting
/// operations check it up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanRecord {
    pub account_id: u64,
    pub reason: String,
    pub admin_id: Option<u64>,
    pub at: i64,
}

impl BanRecord {
    pub fn key(account_id: u64) -> Vec<u8> {
        format!("ban:{:020}", account_id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_keys_sort_by_id() {
        assert!(Account::key(9) < Account::key(10));
        assert!(Account::key(10) < Account::key(11_000_000));
    }

    #[test]
    fn test_new_account_starts_empty() {
        let account = Account::new(42, "miner", 1000, 1);
        assert_eq!(account.balance, 0);
        assert_eq!(account.free_cases, 1);
        assert_eq!(account.journal_seq, 0);
        assert!(account.referrer_id.is_none());
    }
}
