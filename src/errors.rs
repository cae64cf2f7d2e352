//! Error types for the GemVault ledger and game engine.
//!
//! Validation failures (insufficient balance, expired promo, ...) are typed
//! variants the presentation layer can match on; store-level failures abort
//! the whole operation and surface as transient `Storage` errors.

use std::error::Error as StdError;
use std::fmt;

use crate::payments::ProviderError;

/// Root error type for all GemVault operations
#[derive(Debug)]
pub enum VaultError {
    /// Balance too low to cover a debit
    InsufficientBalance { required: u64, available: u64 },

    /// Stake below the configured table minimum
    BetTooSmall { minimum: u64 },

    /// Free-case counter is at zero
    NoFreeCases,

    /// Referenced entity does not exist
    NotFound(NotFoundKind),

    /// Idempotent operation was already applied; nothing was changed
    AlreadyProcessed,

    /// One-shot reward was already claimed
    AlreadyClaimed { retry_in_secs: Option<i64> },

    /// Promo code or invoice past its expiry
    Expired,

    /// Promo code redemption limit reached
    UsageLimitExceeded,

    /// Quest reward claimed before the goal was met
    QuestIncomplete { progress: u64, goal: u64 },

    /// Account is banned from balance-affecting operations
    Banned,

    /// Durable store failure; the operation had no effect and may be retried
    Storage(StorageError),

    /// Payment provider call failed or timed out; not retried inline
    Provider(ProviderError),

    /// Configuration errors
    Config(ConfigError),
}

/// What a `NotFound` refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Account,
    Payment,
    Promo,
    ExchangeRequest,
    Gift,
    Quest,
    LotteryTickets,
}

/// Storage system errors
#[derive(Debug)]
pub enum StorageError {
    DatabaseOpenFailed(String),
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigError {
    LoadFailed(String),
    SaveFailed(String),
    MissingRequired(String),
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::InsufficientBalance {
                required,
                available,
            } => write!(
                f,
                "Insufficient balance: need {} diamonds, have {}",
                required, available
            ),
            VaultError::BetTooSmall { minimum } => {
                write!(f, "Bet below table minimum of {} diamonds", minimum)
            }
            VaultError::NoFreeCases => write!(f, "No free cases available"),
            VaultError::NotFound(kind) => write!(f, "{} not found", kind),
            VaultError::AlreadyProcessed => write!(f, "Already processed"),
            VaultError::AlreadyClaimed { retry_in_secs } => match retry_in_secs {
                Some(secs) => write!(f, "Already claimed, retry in {}s", secs),
                None => write!(f, "Already claimed"),
            },
            VaultError::Expired => write!(f, "Expired"),
            VaultError::UsageLimitExceeded => write!(f, "Usage limit exceeded"),
            VaultError::QuestIncomplete { progress, goal } => {
                write!(f, "Quest incomplete: {}/{}", progress, goal)
            }
            VaultError::Banned => write!(f, "Account is banned"),
            VaultError::Storage(e) => write!(f, "Storage error: {}", e),
            VaultError::Provider(e) => write!(f, "Payment provider error: {}", e),
            VaultError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Account => write!(f, "Account"),
            NotFoundKind::Payment => write!(f, "Payment"),
            NotFoundKind::Promo => write!(f, "Promo code"),
            NotFoundKind::ExchangeRequest => write!(f, "Exchange request"),
            NotFoundKind::Gift => write!(f, "Gift"),
            NotFoundKind::Quest => write!(f, "Quest"),
            NotFoundKind::LotteryTickets => write!(f, "Lottery tickets"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseOpenFailed(msg) => write!(f, "Database open failed: {}", msg),
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
            ConfigError::SaveFailed(msg) => write!(f, "Failed to save configuration: {}", msg),
            ConfigError::MissingRequired(field) => write!(f, "Missing required field: {}", field),
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => write!(f, "Invalid value for {}: '{}' ({})", field, value, reason),
        }
    }
}

impl StdError for VaultError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            VaultError::Storage(e) => Some(e),
            VaultError::Provider(e) => Some(e),
            VaultError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl StdError for StorageError {}
impl StdError for ConfigError {}

impl From<StorageError> for VaultError {
    fn from(e: StorageError) -> Self {
        VaultError::Storage(e)
    }
}

impl From<ProviderError> for VaultError {
    fn from(e: ProviderError) -> Self {
        VaultError::Provider(e)
    }
}

impl From<ConfigError> for VaultError {
    fn from(e: ConfigError) -> Self {
        VaultError::Config(e)
    }
}

// External error conversions
impl From<rocksdb::Error> for VaultError {
    fn from(e: rocksdb::Error) -> Self {
        VaultError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

/// Convenience type alias for Results
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Stable machine-readable code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InsufficientBalance { .. } => "insufficient_balance",
            VaultError::BetTooSmall { .. } => "bet_too_small",
            VaultError::NoFreeCases => "no_free_cases",
            VaultError::NotFound(_) => "not_found",
            VaultError::AlreadyProcessed => "already_processed",
            VaultError::AlreadyClaimed { .. } => "already_claimed",
            VaultError::Expired => "expired",
            VaultError::UsageLimitExceeded => "usage_limit_exceeded",
            VaultError::QuestIncomplete { .. } => "quest_incomplete",
            VaultError::Banned => "banned",
            VaultError::Storage(_) => "store_unavailable",
            VaultError::Provider(_) => "provider_unavailable",
            VaultError::Config(_) => "config_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::InsufficientBalance {
            required: 50,
            available: 20,
        };
        assert!(err.to_string().contains("need 50"));
        assert!(err.to_string().contains("have 20"));
    }

    #[test]
    fn test_error_conversion() {
        let storage = StorageError::ReadFailed("disk".to_string());
        let err: VaultError = storage.into();
        match err {
            VaultError::Storage(_) => {}
            _ => panic!("Expected storage error"),
        }
    }

    #[test]
    fn test_error_source() {
        let err = VaultError::Storage(StorageError::WriteFailed("x".to_string()));
        assert!(err.source().is_some());
        assert!(VaultError::AlreadyProcessed.source().is_none());
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(VaultError::AlreadyProcessed.code(), "already_processed");
        assert_eq!(
            VaultError::Storage(StorageError::ReadFailed(String::new())).code(),
            "store_unavailable"
        );
    }
}
