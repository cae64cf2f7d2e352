mod common;

use common::{build_vault, ConstRng, MockProvider, TestClock, WEDNESDAY};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use gemvault::errors::VaultError;
use gemvault::payments::{self, spawn_reconciler};
use gemvault::service::Vault;

fn payment_vault(dir: &TempDir, provider: Arc<MockProvider>) -> Vault {
    build_vault(
        dir,
        TestClock::new(WEDNESDAY),
        provider,
        Box::new(ConstRng(0)),
    )
}

#[tokio::test]
async fn stars_payment_confirms_exactly_once() {
    let dir = TempDir::new().unwrap();
    let vault = payment_vault(&dir, MockProvider::new());
    vault.create_account(1, "alice", None).unwrap();

    let payment = vault.register_stars_payment(1, 10).unwrap();
    assert_eq!(payment.amount, 90);
    assert!(payment.external_reference.starts_with("stars_1_"));

    let receipt = vault
        .confirm_payment(&payment.external_reference)
        .await
        .unwrap();
    assert!(receipt.credited);
    assert!(!receipt.idempotent);
    assert_eq!(receipt.new_balance, 90);

    // A repeat confirmation is a success that credits nothing.
    let repeat = vault
        .confirm_payment(&payment.external_reference)
        .await
        .unwrap();
    assert!(!repeat.credited);
    assert!(repeat.idempotent);
    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 90);
    assert_eq!(vault.ledger().journal_sum(1).unwrap(), 90);
}

#[tokio::test]
async fn confirm_unknown_reference_fails() {
    let dir = TempDir::new().unwrap();
    let vault = payment_vault(&dir, MockProvider::new());

    let err = vault.confirm_payment("inv_missing").await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound(_)));
}

#[tokio::test]
async fn sweep_credits_paid_invoices_only() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let vault = payment_vault(&dir, provider.clone());
    vault.create_account(1, "alice", None).unwrap();

    let invoice = vault
        .create_crypto_invoice(1, 200, "diamond topup")
        .await
        .unwrap();
    assert_eq!(vault.pending_payments().unwrap().len(), 1);

    // Invoice still pending at the provider.
    payments::sweep_once(&vault).await.unwrap();
    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 0);

    provider.mark_paid(&invoice.external_reference);
    payments::sweep_once(&vault).await.unwrap();
    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 200);
    assert!(vault.pending_payments().unwrap().is_empty());

    // Second sweep finds nothing to do.
    payments::sweep_once(&vault).await.unwrap();
    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 200);
    assert_eq!(vault.ledger().journal_sum(1).unwrap(), 200);
}

#[tokio::test]
async fn manual_check_polls_the_provider() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let vault = payment_vault(&dir, provider.clone());
    vault.create_account(1, "alice", None).unwrap();

    let invoice = vault
        .create_crypto_invoice(1, 150, "diamond topup")
        .await
        .unwrap();

    assert!(vault
        .check_crypto_payment(&invoice.external_reference)
        .await
        .unwrap()
        .is_none());

    provider.mark_paid(&invoice.external_reference);
    let receipt = vault
        .check_crypto_payment(&invoice.external_reference)
        .await
        .unwrap()
        .unwrap();
    assert!(receipt.credited);
    assert_eq!(receipt.new_balance, 150);
}

#[tokio::test]
async fn reconciler_task_sweeps_and_shuts_down() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let mut config = gemvault::config::VaultConfig::default();
    config.storage.data_dir = dir.path().to_string_lossy().to_string();
    config.sweep.interval_secs = 1;

    let vault = Arc::new(
        Vault::with_rng(
            config,
            TestClock::new(WEDNESDAY),
            provider.clone(),
            Arc::new(gemvault::payments::NoopNotifier),
            Box::new(ConstRng(0)),
        )
        .unwrap(),
    );
    vault.create_account(1, "alice", None).unwrap();
    let invoice = vault
        .create_crypto_invoice(1, 75, "diamond topup")
        .await
        .unwrap();
    provider.mark_paid(&invoice.external_reference);

    let handle = spawn_reconciler(vault.clone());
    // The first sweep runs immediately on spawn.
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown().await;

    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 75);
}

#[tokio::test]
async fn dropped_handle_stops_the_reconciler() {
    let dir = TempDir::new().unwrap();
    let provider = MockProvider::new();
    let mut config = gemvault::config::VaultConfig::default();
    config.storage.data_dir = dir.path().to_string_lossy().to_string();
    config.sweep.interval_secs = 1;

    let vault = Arc::new(
        Vault::with_rng(
            config,
            TestClock::new(WEDNESDAY),
            provider.clone(),
            Arc::new(gemvault::payments::NoopNotifier),
            Box::new(ConstRng(0)),
        )
        .unwrap(),
    );
    vault.create_account(1, "alice", None).unwrap();
    let invoice = vault
        .create_crypto_invoice(1, 75, "diamond topup")
        .await
        .unwrap();

    // Dropping the handle closes the shutdown channel; the task must exit
    // instead of spinning and sweeping on.
    drop(spawn_reconciler(vault.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    provider.mark_paid(&invoice.external_reference);
    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(vault.get_account(1).unwrap().unwrap().balance, 0);
    assert_eq!(vault.pending_payments().unwrap().len(), 1);
}
