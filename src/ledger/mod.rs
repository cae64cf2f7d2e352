//! Balance ledger with an append-only journal.
//!
//! Every mutation runs under the owning account's lock and commits through
//! one write batch: balance, journal entries, stats, quest rows, and level
//! rows land together or not at all. Summing an account's journal always
//! reproduces its balance.

pub mod account;
pub mod journal;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

pub use account::{Account, BanRecord, LeaderboardKind, LeaderboardRow};
pub use journal::{JournalEntry, TxKind};

use crate::errors::{NotFoundKind, StorageError, VaultError, VaultResult};
use crate::progression::{advance, week_number, LevelState, LevelUp, QuestId, QuestProgress};
use crate::store::{LockTable, Store};

pub struct Ledger {
    store: Store,
    locks: Arc<LockTable>,
}

/// What a committed transaction produced.
pub struct TxnReport<T> {
    pub value: T,
    pub balance: u64,
    pub level_ups: Vec<LevelUp>,
}

impl Ledger {
    pub fn new(store: Store, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Create an account with its level row. Returns false if the account
    /// already exists; nothing is overwritten in that case.
    pub fn create_account(
        &self,
        id: u64,
        display_name: &str,
        now: i64,
        free_cases: u32,
    ) -> VaultResult<bool> {
        let lock = self.locks.account(id);
        let _guard = lock.guard();

        if self.store.get(&Account::key(id))?.is_some() {
            return Ok(false);
        }

        let account = Account::new(id, display_name, now, free_cases);
        let level = LevelState::new(id);
        self.store.batch_write(&[
            (Account::key(id), serde_json::to_vec(&account)?),
            (LevelState::key(id), serde_json::to_vec(&level)?),
        ])?;
        info!(account_id = id, "account created");
        Ok(true)
    }

    pub fn get_account(&self, id: u64) -> VaultResult<Option<Account>> {
        self.store.get_json(&Account::key(id))
    }

    pub fn require_account(&self, id: u64) -> VaultResult<Account> {
        self.get_account(id)?
            .ok_or(VaultError::NotFound(NotFoundKind::Account))
    }

    /// Run `f` against the account under its lock and commit everything the
    /// transaction accumulated in one batch.
    ///
    /// The commit also applies two standing side effects: diamonds spent
    /// advance the spend quest, and granted experience is rolled through the
    /// level table with each level-up paying its reward into the same batch.
    pub fn with_account<T>(
        &self,
        id: u64,
        now: i64,
        f: impl FnOnce(&mut AccountTxn) -> VaultResult<T>,
    ) -> VaultResult<TxnReport<T>> {
        let lock = self.locks.account(id);
        let _guard = lock.guard();

        let account = self.require_account(id)?;
        let mut txn = AccountTxn {
            now,
            account,
            entries: Vec::new(),
            batch: Vec::new(),
            spent: 0,
            exp: 0,
            quests: Vec::new(),
            store: self.store.clone(),
        };

        let value = f(&mut txn)?;
        let level_ups = self.commit(&mut txn)?;
        Ok(TxnReport {
            value,
            balance: txn.account.balance,
            level_ups,
        })
    }

    fn commit(&self, txn: &mut AccountTxn) -> VaultResult<Vec<LevelUp>> {
        let account_id = txn.account.id;

        if txn.spent > 0 {
            txn.quests.push((QuestId::SpendDiamonds, txn.spent));
        }
        let mut merged: HashMap<QuestId, u64> = HashMap::new();
        for (quest, delta) in txn.quests.drain(..) {
            *merged.entry(quest).or_default() += delta;
        }
        let week = week_number(txn.now);
        for (quest, delta) in merged {
            let key = quest.key(account_id, week);
            let mut row: QuestProgress = self.store.get_json(&key)?.unwrap_or_default();
            row.progress += delta;
            txn.batch.push((key, serde_json::to_vec(&row)?));
        }

        let mut level_ups = Vec::new();
        if txn.exp > 0 {
            let level_key = LevelState::key(account_id);
            let mut state = self
                .store
                .get_json(&level_key)?
                .unwrap_or_else(|| LevelState::new(account_id));
            level_ups = advance(&mut state, txn.exp, txn.now);
            for up in &level_ups {
                txn.account.balance += up.reward;
                txn.push_entry(
                    TxKind::LevelUpReward {
                        level: up.new_level,
                    },
                    up.reward as i64,
                );
            }
            txn.batch.push((level_key, serde_json::to_vec(&state)?));
        }

        for entry in &txn.entries {
            txn.batch.push((
                JournalEntry::key(account_id, entry.seq),
                serde_json::to_vec(entry)?,
            ));
        }
        txn.batch
            .push((Account::key(account_id), serde_json::to_vec(&txn.account)?));

        self.store.batch_write(&txn.batch)?;
        debug!(
            account_id,
            entries = txn.entries.len(),
            balance = txn.account.balance,
            "account batch committed"
        );
        Ok(level_ups)
    }

    /// Apply a signed balance change. Negative deltas that would overdraw
    /// the account are rejected; nothing is written in that case.
    pub fn apply_delta(&self, id: u64, amount: i64, kind: TxKind, now: i64) -> VaultResult<u64> {
        let report = self.with_account(id, now, |txn| {
            if amount >= 0 {
                txn.credit(amount as u64, kind);
            } else {
                txn.debit(amount.unsigned_abs(), kind)?;
            }
            Ok(())
        })?;
        Ok(report.balance)
    }

    /// Sum of every journal entry for the account. Equals the stored
    /// balance whenever the store is consistent.
    pub fn journal_sum(&self, id: u64) -> VaultResult<i64> {
        let mut sum: i64 = 0;
        for (key, value) in self.store.scan_prefix(&JournalEntry::prefix(id)) {
            let entry: JournalEntry = serde_json::from_slice(&value).map_err(|e| {
                StorageError::CorruptedData(format!(
                    "journal entry {}: {}",
                    String::from_utf8_lossy(&key),
                    e
                ))
            })?;
            sum += entry.amount;
        }
        Ok(sum)
    }

    /// Latest `limit` journal entries, newest first.
    pub fn recent_journal(&self, id: u64, limit: usize) -> VaultResult<Vec<JournalEntry>> {
        let rows = self.store.scan_prefix(&JournalEntry::prefix(id));
        let mut entries = Vec::with_capacity(limit.min(rows.len()));
        for (_, value) in rows.iter().rev().take(limit) {
            let entry: JournalEntry = serde_json::from_slice(value)
                .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Top accounts by the given statistic. Ties break toward the older
    /// (lower) account id; level ties additionally prefer higher total
    /// experience.
    pub fn leaderboard(
        &self,
        kind: LeaderboardKind,
        offset: usize,
        limit: usize,
    ) -> VaultResult<Vec<LeaderboardRow>> {
        if kind == LeaderboardKind::Level {
            return self.level_leaderboard(offset, limit);
        }

        let mut accounts = self.all_accounts()?;
        let value = |a: &Account| -> u64 {
            match kind {
                LeaderboardKind::Balance => a.balance,
                LeaderboardKind::Wins => a.wins,
                LeaderboardKind::CasesOpened => a.cases_opened,
                LeaderboardKind::Referrals => a.referral_count as u64,
                LeaderboardKind::Level => unreachable!(),
            }
        };
        accounts.sort_by(|a, b| value(b).cmp(&value(a)).then(a.id.cmp(&b.id)));

        Ok(accounts
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|a| LeaderboardRow {
                account_id: a.id,
                value: value(&a),
                display_name: a.display_name,
            })
            .collect())
    }

    fn level_leaderboard(&self, offset: usize, limit: usize) -> VaultResult<Vec<LeaderboardRow>> {
        let mut states: Vec<LevelState> = Vec::new();
        for (_, value) in self.store.scan_prefix(b"level:") {
            let state: LevelState = serde_json::from_slice(&value)
                .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
            states.push(state);
        }
        states.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(b.total_exp.cmp(&a.total_exp))
                .then(a.account_id.cmp(&b.account_id))
        });

        let mut rows = Vec::new();
        for state in states.into_iter().skip(offset).take(limit) {
            let Some(account) = self.get_account(state.account_id)? else {
                continue;
            };
            rows.push(LeaderboardRow {
                account_id: state.account_id,
                display_name: account.display_name,
                value: state.level as u64,
            });
        }
        Ok(rows)
    }

    fn all_accounts(&self) -> VaultResult<Vec<Account>> {
        let mut accounts = Vec::new();
        for (_, value) in self.store.scan_prefix(Account::PREFIX) {
            let account: Account = serde_json::from_slice(&value)
                .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
            accounts.push(account);
        }
        Ok(accounts)
    }

    /// Aggregate counters over every account.
    pub fn stats(&self) -> VaultResult<LedgerStats> {
        let accounts = self.all_accounts()?;
        Ok(LedgerStats {
            accounts: accounts.len() as u64,
            total_balance: accounts.iter().map(|a| a.balance).sum(),
            total_wagered: accounts.iter().map(|a| a.total_wagered).sum(),
        })
    }

    pub fn ban(&self, id: u64, reason: &str, admin_id: Option<u64>, now: i64) -> VaultResult<()> {
        self.require_account(id)?;
        let record = BanRecord {
            account_id: id,
            reason: reason.to_string(),
            admin_id,
            at: now,
        };
        self.store
            .put(&BanRecord::key(id), &serde_json::to_vec(&record)?)?;
        info!(account_id = id, reason, "account banned");
        Ok(())
    }

    pub fn unban(&self, id: u64) -> VaultResult<()> {
        self.store.delete(&BanRecord::key(id))?;
        info!(account_id = id, "account unbanned");
        Ok(())
    }

    pub fn is_banned(&self, id: u64) -> VaultResult<bool> {
        Ok(self.store.get(&BanRecord::key(id))?.is_some())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub accounts: u64,
    pub total_balance: u64,
    pub total_wagered: u64,
}

/// Accumulates one account mutation before the atomic commit.
pub struct AccountTxn {
    pub now: i64,
    account: Account,
    entries: Vec<JournalEntry>,
    batch: Vec<(Vec<u8>, Vec<u8>)>,
    spent: u64,
    exp: u64,
    quests: Vec<(QuestId, u64)>,
    store: Store,
}

impl AccountTxn {
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    /// Reads against the store while the account lock is held. Writes must
    /// go through the batch.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn credit(&mut self, amount: u64, kind: TxKind) {
        self.account.balance += amount;
        self.push_entry(kind, amount as i64);
    }

    pub fn debit(&mut self, amount: u64, kind: TxKind) -> VaultResult<()> {
        if self.account.balance < amount {
            return Err(VaultError::InsufficientBalance {
                required: amount,
                available: self.account.balance,
            });
        }
        self.account.balance -= amount;
        self.spent += amount;
        self.push_entry(kind, -(amount as i64));
        Ok(())
    }

    /// Zero-amount journal entry, used to record refunded rounds.
    pub fn note(&mut self, kind: TxKind) {
        self.push_entry(kind, 0);
    }

    /// Stage an arbitrary record into the commit batch.
    pub fn put_json<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> VaultResult<()> {
        self.batch.push((key, serde_json::to_vec(value)?));
        Ok(())
    }

    pub fn grant_exp(&mut self, amount: u64) {
        self.exp += amount;
    }

    pub fn advance_quest(&mut self, quest: QuestId, delta: u64) {
        self.quests.push((quest, delta));
    }

    fn push_entry(&mut self, kind: TxKind, amount: i64) {
        let seq = self.account.journal_seq + 1;
        self.account.journal_seq = seq;
        self.entries.push(JournalEntry {
            seq,
            account_id: self.account.id,
            kind,
            amount,
            balance_after: self.account.balance,
            at: self.now,
        });
    }
}
