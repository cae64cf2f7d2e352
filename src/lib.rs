//! GemVault: a virtual-currency ledger and chance-based game engine.
//!
//! Diamonds live in a RocksDB-backed ledger where every balance change
//! commits atomically with its journal entry. On top of the ledger sit the
//! game engines (cases, roulette, dice, rock-paper-scissors, slots,
//! blackjack), experience levels, weekly quests, the Sunday lottery,
//! promo codes, idempotent payment reconciliation, and diamond-to-gift
//! exchange requests.
//!
//! [`service::Vault`] is the entry point; everything else is plumbing it
//! wires together.

pub mod activity;
pub mod clock;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod games;
pub mod ledger;
pub mod lottery;
pub mod payments;
pub mod progression;
pub mod promo;
pub mod service;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigLoader, VaultConfig};
pub use errors::{VaultError, VaultResult};
pub use games::{CaseTier, GameKind, RoundOutcome, RpsChoice};
pub use ledger::{Account, LeaderboardKind, TxKind};
pub use payments::{
    spawn_reconciler, NoopNotifier, PaymentProvider, PaymentReceipt, ReconcilerHandle,
};
pub use service::Vault;

/// Install the global tracing subscriber. Filter via `RUST_LOG`, default
/// `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
