//! Chance-based reward engines.
//!
//! Every engine is a pure function of an injected random source, so payout
//! distributions are reproducible under seeded generators.

pub mod cases;
pub mod engine;
pub mod types;

pub use cases::{CaseSpec, CaseTier};
pub use types::{GameKind, Round, RoundDetail, RoundOutcome, RpsChoice, SlotSymbol};
