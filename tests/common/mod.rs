#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::RngCore;
use tempfile::TempDir;

use gemvault::clock::Clock;
use gemvault::config::VaultConfig;
use gemvault::payments::{Invoice, InvoiceStatus, NoopNotifier, PaymentProvider, ProviderError};
use gemvault::service::Vault;

/// 2024-03-06T00:00:00Z, a Wednesday.
pub const WEDNESDAY: i64 = 1_709_683_200;
/// 2024-03-10T00:00:00Z, the following Sunday.
pub const SUNDAY: i64 = 1_710_028_800;

/// Settable clock shared between the test and the vault.
pub struct TestClock(AtomicI64);

impl TestClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scripted payment backend: invoices start Pending and flip to Paid only
/// when the test says so.
pub struct MockProvider {
    statuses: Mutex<HashMap<String, InvoiceStatus>>,
    counter: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }

    pub fn mark_paid(&self, reference: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(reference.to_string(), InvoiceStatus::Paid);
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_invoice(
        &self,
        _amount: u64,
        _description: &str,
    ) -> Result<Invoice, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let reference = format!("inv_{}", n);
        self.statuses
            .lock()
            .unwrap()
            .insert(reference.clone(), InvoiceStatus::Pending);
        Ok(Invoice {
            pay_url: format!("https://pay.example/{}", reference),
            external_reference: reference,
        })
    }

    async fn check_invoice(&self, reference: &str) -> Result<InvoiceStatus, ProviderError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or(InvoiceStatus::Other("unknown".to_string())))
    }
}

/// Replays one fixed word forever. Zero forces the "below every threshold"
/// branch of each engine.
pub struct ConstRng(pub u64);

impl RngCore for ConstRng {
    fn next_u32(&mut self) -> u32 {
        self.0 as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let bytes = self.0.to_le_bytes();
        for chunk in dest.chunks_mut(8) {
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

pub fn build_vault(
    dir: &TempDir,
    clock: Arc<TestClock>,
    provider: Arc<MockProvider>,
    rng: Box<dyn RngCore + Send>,
) -> Vault {
    let mut config = VaultConfig::default();
    config.storage.data_dir = dir.path().to_string_lossy().to_string();
    Vault::with_rng(config, clock, provider, Arc::new(NoopNotifier), rng).unwrap()
}
