use serde::{Deserialize, Serialize};

use crate::games::{CaseTier, GameKind};
use crate::payments::PaymentProviderKind;
use crate::progression::QuestId;

/// Why a balance changed. Tagged so journal rows stay self-describing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxKind {
    CaseOpen { tier: CaseTier },
    CaseReward { tier: CaseTier },
    FreeCaseReward,
    GameWin { game: GameKind },
    GameLoss { game: GameKind },
    GameDraw { game: GameKind },
    DailyBonus,
    StreakBonus,
    FirstGameBonus,
    ReferralBonus,
    ReferralWelcome,
    PromoReward { code: String },
    QuestReward { quest: QuestId },
    LevelUpReward { level: u32 },
    Payment { provider: PaymentProviderKind },
    LotteryTicket { draw_date: String },
    LotteryPrize { draw_date: String },
    ExchangeDebit { request_id: u64 },
    ExchangeRefund { request_id: u64 },
    AdminAdjust,
}

/// Append-only record of one balance mutation.
///
/// `amount` is signed; summing every entry for an account reproduces its
/// current balance exactly. `balance_after` is the balance the batch
/// committed alongside this entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub account_id: u64,
    #[serde(flatten)]
    pub kind: TxKind,
    pub amount: i64,
    pub balance_after: u64,
    pub at: i64,
}

impl JournalEntry {
    pub fn key(account_id: u64, seq: u64) -> Vec<u8> {
        format!("journal:{:020}:{:020}", account_id, seq).into_bytes()
    }

    pub fn prefix(account_id: u64) -> Vec<u8> {
        format!("journal:{:020}:", account_id).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_keys_sort_by_seq() {
        assert!(JournalEntry::key(1, 9) < JournalEntry::key(1, 10));
        assert!(JournalEntry::key(1, 999) < JournalEntry::key(2, 1));
    }

    #[test]
    fn test_tx_kind_serializes_flat() {
        let entry = JournalEntry {
            seq: 3,
            account_id: 7,
            kind: TxKind::GameWin {
                game: GameKind::Dice,
            },
            amount: 30,
            balance_after: 130,
            at: 1000,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "game_win");
        assert_eq!(json["game"], "dice");
        assert_eq!(json["amount"], 30);
    }
}
