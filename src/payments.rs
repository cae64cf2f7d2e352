//! Payment intake and reconciliation.
//!
//! Every incoming payment is keyed by its provider-issued external
//! reference. That reference is the idempotency key: a payment moves from
//! Pending to Paid exactly once, no matter how many confirmation paths race
//! for it (direct callback, manual check, background sweep). The background
//! [`Reconciler`] sweeps Pending invoices on an interval and pushes Paid
//! ones through the same confirmation path as everyone else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::service::Vault;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProviderKind {
    /// External crypto invoice, settled by polling the provider.
    Crypto,
    /// Platform-native stars, settled by a transport callback.
    Stars,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// One registered payment awaiting (or past) confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayment {
    pub id: String,
    pub account_id: u64,
    pub provider: PaymentProviderKind,
    /// Diamonds to credit on confirmation.
    pub amount: u64,
    pub external_reference: String,
    pub status: PaymentStatus,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

impl PendingPayment {
    pub fn key(reference: &str) -> Vec<u8> {
        format!("payment:ref:{}", reference).into_bytes()
    }

    pub const PREFIX: &'static [u8] = b"payment:ref:";
}

/// Outcome of a confirmation attempt. A repeat confirmation is a success
/// with `credited: false, idempotent: true`, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub credited: bool,
    pub idempotent: bool,
    pub amount: u64,
    pub new_balance: u64,
}

/// Invoice handed back by the provider on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub external_reference: String,
    pub pay_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    /// Provider-specific status we do not act on (expired, cancelled, ...).
    Other(String),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("Payment provider call timed out")]
    Timeout,

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// External payment backend. Implementations wrap the provider's HTTP API;
/// tests substitute a scripted one.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_invoice(&self, amount: u64, description: &str)
        -> Result<Invoice, ProviderError>;

    async fn check_invoice(&self, reference: &str) -> Result<InvoiceStatus, ProviderError>;
}

/// Outbound notification seam for credited payments.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payment_credited(&self, account_id: u64, amount: u64, new_balance: u64);
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn payment_credited(&self, _account_id: u64, _amount: u64, _new_balance: u64) {}
}

/// Handle to the background sweep task.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn the periodic reconciliation sweep over pending crypto invoices.
pub fn spawn_reconciler(vault: Arc<Vault>) -> ReconcilerHandle {
    let (tx, mut rx) = watch::channel(false);
    let interval = Duration::from_secs(vault.config().sweep.interval_secs);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_secs = interval.as_secs(), "payment reconciler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = sweep_once(&vault).await {
                        warn!(error = %e, "reconciliation sweep failed");
                    }
                }
                changed = rx.changed() => {
                    // A closed channel means the handle was dropped without
                    // an explicit shutdown; stop either way.
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("payment reconciler stopped");
    });

    ReconcilerHandle { shutdown: tx, task }
}

/// One pass over every pending crypto invoice. Provider failures skip the
/// invoice and leave it for the next pass; they are never retried inline.
pub async fn sweep_once(vault: &Vault) -> crate::errors::VaultResult<()> {
    let timeout = Duration::from_secs(vault.config().sweep.provider_timeout_secs);

    for payment in vault.pending_payments()? {
        if payment.provider != PaymentProviderKind::Crypto {
            continue;
        }
        let reference = payment.external_reference.as_str();

        let status = match tokio::time::timeout(
            timeout,
            vault.provider().check_invoice(reference),
        )
        .await
        {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(reference, error = %e, "invoice check failed");
                continue;
            }
            Err(_) => {
                warn!(reference, "invoice check timed out");
                continue;
            }
        };

        if status != InvoiceStatus::Paid {
            continue;
        }
        match vault.confirm_payment(reference).await {
            Ok(receipt) if receipt.credited => {
                info!(
                    reference,
                    account_id = payment.account_id,
                    amount = receipt.amount,
                    "payment credited by sweep"
                );
            }
            // Lost the race to a direct confirmation; nothing to do.
            Ok(_) => {}
            Err(e) => warn!(reference, error = %e, "sweep confirmation failed"),
        }
    }
    Ok(())
}
