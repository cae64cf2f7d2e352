//! Per-account activity tracking and one-shot engagement bonuses.

use serde::{Deserialize, Serialize};

/// Bonus for having played at least one game.
pub const FIRST_GAME_BONUS: u64 = 15;

/// Diamonds paid for the best streak tier the account has reached, if any.
pub fn streak_bonus(streak: u32) -> Option<u64> {
    match streak {
        s if s >= 30 => Some(500),
        s if s >= 14 => Some(200),
        s if s >= 7 => Some(100),
        s if s >= 3 => Some(30),
        _ => None,
    }
}

/// Minimum streak that unlocks any bonus tier.
pub const STREAK_BONUS_MIN: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub account_id: u64,
    pub last_active: i64,
    pub login_count: u64,
    /// One-way flags; the bonuses can be claimed once per account.
    pub streak_bonus_claimed: bool,
    pub first_game_bonus_claimed: bool,
}

impl Activity {
    pub fn new(account_id: u64) -> Self {
        Self {
            account_id,
            last_active: 0,
            login_count: 0,
            streak_bonus_claimed: false,
            first_game_bonus_claimed: false,
        }
    }

    pub fn key(account_id: u64) -> Vec<u8> {
        format!("activity:{:020}", account_id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streak_tiers() {
        assert_eq!(streak_bonus(2), None);
        assert_eq!(streak_bonus(3), Some(30));
        assert_eq!(streak_bonus(7), Some(100));
        assert_eq!(streak_bonus(13), Some(100));
        assert_eq!(streak_bonus(14), Some(200));
        assert_eq!(streak_bonus(30), Some(500));
        assert_eq!(streak_bonus(365), Some(500));
    }
}
