use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported table games
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Roulette,
    Dice,
    Rps,
    Slot,
    Blackjack,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Roulette => write!(f, "roulette"),
            GameKind::Dice => write!(f, "dice"),
            GameKind::Rps => write!(f, "rps"),
            GameKind::Slot => write!(f, "slot"),
            GameKind::Blackjack => write!(f, "blackjack"),
        }
    }
}

/// Rock-paper-scissors move
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RpsChoice {
    Stone,
    Paper,
    Scissors,
}

impl RpsChoice {
    /// Standard beats-relation.
    pub fn beats(self, other: RpsChoice) -> bool {
        matches!(
            (self, other),
            (RpsChoice::Stone, RpsChoice::Scissors)
                | (RpsChoice::Paper, RpsChoice::Stone)
                | (RpsChoice::Scissors, RpsChoice::Paper)
        )
    }
}

/// Slot reel symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotSymbol {
    Cherry,
    Lemon,
    Bell,
    Diamond,
    Star,
    Seven,
}

impl SlotSymbol {
    /// Three-of-a-kind multiplier.
    pub fn triple_multiplier(self) -> u64 {
        match self {
            SlotSymbol::Seven => 8,
            SlotSymbol::Diamond => 6,
            SlotSymbol::Star => 4,
            SlotSymbol::Bell => 3,
            SlotSymbol::Cherry | SlotSymbol::Lemon => 2,
        }
    }
}

/// How a round ended for the player
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundOutcome {
    Win,
    Loss,
    Draw,
}

/// Result of one game round.
///
/// `payout` is the total returned to the player: `2 * stake` for an even-money
/// win, `stake` for a draw (refund), `0` for a loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub outcome: RoundOutcome,
    pub payout: u64,
    #[serde(flatten)]
    pub detail: RoundDetail,
}

/// Game-specific data (discriminated union)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum RoundDetail {
    Roulette,
    Dice {
        roll: u8,
    },
    Rps {
        player: RpsChoice,
        opponent: RpsChoice,
    },
    Slot {
        reels: [SlotSymbol; 3],
    },
    Blackjack {
        player_cards: Vec<u8>,
        dealer_cards: Vec<u8>,
    },
}
