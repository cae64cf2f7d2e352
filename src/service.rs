//! The `Vault` facade: every externally callable operation of the ledger
//! and game engine, wired over one store, one lock table, one clock, and
//! one outcome generator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::activity::{self, Activity};
use crate::clock::Clock;
use crate::config::VaultConfig;
use crate::errors::{NotFoundKind, VaultError, VaultResult};
use crate::exchange::{ExchangeRequest, ExchangeStatus};
use crate::games::{cases, engine, CaseTier, GameKind, Round, RoundOutcome, RpsChoice};
use crate::ledger::{
    Account, JournalEntry, LeaderboardKind, LeaderboardRow, Ledger, LedgerStats, TxKind,
};
use crate::lottery::{self, DrawRecord, LotteryTicket};
use crate::payments::{
    Invoice, InvoiceStatus, Notifier, PaymentProvider, PaymentProviderKind, PaymentReceipt,
    PaymentStatus, PendingPayment, ProviderError,
};
use crate::progression::{exp_grants, week_number, LevelUp, QuestId, QuestProgress};
use crate::promo::{PromoCode, PromoUse};
use crate::store::{LockTable, Store};

const DAY_SECS: i64 = 86_400;

pub struct Vault {
    config: VaultConfig,
    store: Store,
    locks: Arc<LockTable>,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
}

/// Settled game round plus its ledger effect.
#[derive(Debug, Clone, Serialize)]
pub struct GameReport {
    pub round: Round,
    pub new_balance: u64,
    pub level_ups: Vec<LevelUp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub reward: u64,
    pub new_balance: u64,
    pub level_ups: Vec<LevelUp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub bonus: u64,
    pub streak: u32,
    pub free_cases: u32,
    pub new_balance: u64,
    pub level_ups: Vec<LevelUp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewardReport {
    pub reward: u64,
    pub new_balance: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketReport {
    pub number: u64,
    pub draw_date: String,
    pub new_balance: u64,
}

/// Current-week quest row joined with its static definition.
#[derive(Debug, Clone, Serialize)]
pub struct QuestView {
    pub quest: QuestId,
    pub progress: u64,
    pub goal: u64,
    pub reward: u64,
    pub completed: bool,
    pub claimed: bool,
}

impl Vault {
    pub fn new(
        config: VaultConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> VaultResult<Self> {
        let rng: Box<dyn RngCore + Send> = match config.rng_seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self::with_rng(config, clock, provider, notifier, rng)
    }

    /// Construct with an explicit outcome generator. Tests script it to
    /// force specific rounds.
    pub fn with_rng(
        config: VaultConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
        rng: Box<dyn RngCore + Send>,
    ) -> VaultResult<Self> {
        let store = Store::open(&config.storage.data_dir)?;
        let locks = Arc::new(LockTable::new());
        let ledger = Ledger::new(store.clone(), locks.clone());
        info!(data_dir = %config.storage.data_dir, "vault opened");
        Ok(Self {
            config,
            store,
            locks,
            ledger,
            clock,
            rng: Mutex::new(rng),
            provider,
            notifier,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn PaymentProvider {
        self.provider.as_ref()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run `f` with exclusive access to the outcome generator.
    fn draw<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut guard = match self.rng.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(guard.as_mut())
    }

    fn ensure_not_banned(&self, account_id: u64) -> VaultResult<()> {
        if self.ledger.is_banned(account_id)? {
            return Err(VaultError::Banned);
        }
        Ok(())
    }

    // ---- accounts ----

    /// Register an account, optionally crediting a referrer. Returns false
    /// if the account already existed; the referrer attach still runs in
    /// that case so late attachment works.
    ///
    /// An unknown referrer id skips the referral and never fails the
    /// signup: the account row is already committed by then, and retries
    /// would keep hitting the same dead reference.
    pub fn create_account(
        &self,
        id: u64,
        display_name: &str,
        referrer_id: Option<u64>,
    ) -> VaultResult<bool> {
        let now = self.clock.now();
        let created = self.ledger.create_account(
            id,
            display_name,
            now,
            self.config.economy.free_cases_on_signup,
        )?;
        if let Some(referrer) = referrer_id {
            match self.attach_referrer(id, referrer) {
                Ok(_) => {}
                Err(VaultError::NotFound(NotFoundKind::Account)) => {
                    warn!(account_id = id, referrer_id = referrer, "referrer unknown, skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    /// Link `referrer_id` as the account's referrer and pay both sides.
    /// A no-op (false) if already attached or self-referring.
    pub fn attach_referrer(&self, id: u64, referrer_id: u64) -> VaultResult<bool> {
        if id == referrer_id {
            return Ok(false);
        }
        if self.ledger.get_account(referrer_id)?.is_none() {
            return Err(VaultError::NotFound(NotFoundKind::Account));
        }

        let now = self.clock.now();
        let attached = self
            .ledger
            .with_account(id, now, |txn| {
                if txn.account().referrer_id.is_some() {
                    return Ok(false);
                }
                txn.account_mut().referrer_id = Some(referrer_id);
                txn.credit(self.config.economy.referral_welcome, TxKind::ReferralWelcome);
                txn.grant_exp(exp_grants::REFERRED);
                Ok(true)
            })?
            .value;
        if !attached {
            return Ok(false);
        }

        self.ledger.with_account(referrer_id, now, |txn| {
            txn.account_mut().free_cases += 1;
            txn.account_mut().referral_count += 1;
            txn.credit(self.config.economy.referral_bonus, TxKind::ReferralBonus);
            txn.grant_exp(exp_grants::REFERRER);
            txn.advance_quest(QuestId::InviteFriends, 1);
            Ok(())
        })?;
        info!(account_id = id, referrer_id, "referral attached");
        Ok(true)
    }

    pub fn get_account(&self, id: u64) -> VaultResult<Option<Account>> {
        self.ledger.get_account(id)
    }

    /// Signed balance change with an explicit reason tag. Works on banned
    /// accounts so admins can zero them out.
    pub fn apply_balance_delta(&self, id: u64, amount: i64, kind: TxKind) -> VaultResult<u64> {
        self.ledger.apply_delta(id, amount, kind, self.clock.now())
    }

    pub fn recent_journal(&self, id: u64, limit: usize) -> VaultResult<Vec<JournalEntry>> {
        self.ledger.recent_journal(id, limit)
    }

    pub fn leaderboard(
        &self,
        kind: LeaderboardKind,
        offset: usize,
        limit: usize,
    ) -> VaultResult<Vec<LeaderboardRow>> {
        self.ledger.leaderboard(kind, offset, limit)
    }

    pub fn stats(&self) -> VaultResult<LedgerStats> {
        self.ledger.stats()
    }

    pub fn ban_account(&self, id: u64, reason: &str, admin_id: Option<u64>) -> VaultResult<()> {
        self.ledger.ban(id, reason, admin_id, self.clock.now())
    }

    pub fn unban_account(&self, id: u64) -> VaultResult<()> {
        self.ledger.unban(id)
    }

    pub fn is_banned(&self, id: u64) -> VaultResult<bool> {
        self.ledger.is_banned(id)
    }

    /// Record that the account was seen; updates the activity row only.
    pub fn touch_activity(&self, id: u64) -> VaultResult<()> {
        let lock = self.locks.account(id);
        let _guard = lock.guard();
        let key = Activity::key(id);
        let mut row: Activity = self
            .store
            .get_json(&key)?
            .unwrap_or_else(|| Activity::new(id));
        row.last_active = self.clock.now();
        row.login_count += 1;
        self.store.put(&key, &serde_json::to_vec(&row)?)
    }

    // ---- games ----

    /// Play one round. The stake, outcome, journal entries, win/loss stats,
    /// quest progress, and experience all settle in a single batch.
    pub fn play_game(
        &self,
        id: u64,
        kind: GameKind,
        stake: u64,
        choice: Option<RpsChoice>,
    ) -> VaultResult<GameReport> {
        self.ensure_not_banned(id)?;
        let min_bet = self.config.economy.min_bet;
        let now = self.clock.now();

        let report = self.ledger.with_account(id, now, |txn| {
            if stake < min_bet {
                return Err(VaultError::BetTooSmall { minimum: min_bet });
            }
            if txn.account().balance < stake {
                return Err(VaultError::InsufficientBalance {
                    required: stake,
                    available: txn.account().balance,
                });
            }

            let round = self.draw(|rng| engine::play(rng, kind, stake, choice));
            match round.outcome {
                RoundOutcome::Win => {
                    txn.credit(round.payout - stake, TxKind::GameWin { game: kind });
                    txn.account_mut().wins += 1;
                    txn.advance_quest(QuestId::WinGames, 1);
                }
                RoundOutcome::Loss => {
                    txn.debit(stake, TxKind::GameLoss { game: kind })?;
                    txn.account_mut().losses += 1;
                }
                RoundOutcome::Draw => {
                    txn.note(TxKind::GameDraw { game: kind });
                }
            }
            txn.account_mut().total_wagered += stake;
            match kind {
                GameKind::Slot => txn.advance_quest(QuestId::PlaySlot, 1),
                GameKind::Blackjack => txn.advance_quest(QuestId::PlayBlackjack, 1),
                _ => {}
            }
            txn.grant_exp(exp_grants::TABLE_GAME);
            Ok(round)
        })?;

        Ok(GameReport {
            round: report.value,
            new_balance: report.balance,
            level_ups: report.level_ups,
        })
    }

    pub fn open_case(&self, id: u64, tier: CaseTier) -> VaultResult<CaseReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();
        let spec = tier.spec();

        let report = self.ledger.with_account(id, now, |txn| {
            txn.debit(spec.price, TxKind::CaseOpen { tier })?;
            let reward = self.draw(|rng| spec.draw_reward(rng));
            if reward > 0 {
                txn.credit(reward, TxKind::CaseReward { tier });
                txn.account_mut().wins += 1;
            } else {
                txn.account_mut().losses += 1;
            }
            txn.account_mut().cases_opened += 1;
            txn.account_mut().total_wagered += reward;
            txn.advance_quest(QuestId::OpenCases, 1);
            txn.grant_exp(exp_grants::PAID_CASE);
            Ok(reward)
        })?;

        Ok(CaseReport {
            reward: report.value,
            new_balance: report.balance,
            level_ups: report.level_ups,
        })
    }

    /// Open a free case (wooden reward table, no price).
    pub fn open_free_case(&self, id: u64) -> VaultResult<CaseReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();

        let report = self.ledger.with_account(id, now, |txn| {
            if txn.account().free_cases == 0 {
                return Err(VaultError::NoFreeCases);
            }
            txn.account_mut().free_cases -= 1;
            let reward = self.draw(|rng| cases::draw_free_reward(rng));
            if reward > 0 {
                txn.credit(reward, TxKind::FreeCaseReward);
                txn.account_mut().wins += 1;
            } else {
                txn.account_mut().losses += 1;
            }
            txn.account_mut().cases_opened += 1;
            txn.account_mut().total_wagered += reward;
            txn.advance_quest(QuestId::OpenCases, 1);
            txn.grant_exp(exp_grants::FREE_CASE);
            Ok(reward)
        })?;

        Ok(CaseReport {
            reward: report.value,
            new_balance: report.balance,
            level_ups: report.level_ups,
        })
    }

    // ---- daily / activity bonuses ----

    /// One claim per 24h. The streak continues while claims stay less than
    /// 48h apart, otherwise it resets to 1.
    pub fn claim_daily(&self, id: u64) -> VaultResult<DailyReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();
        let base = self.config.economy.daily_bonus_base;
        let step = self.config.economy.daily_streak_step;

        let report = self.ledger.with_account(id, now, |txn| {
            let last = txn.account().last_daily_claim;
            if last > 0 && now - last < DAY_SECS {
                return Err(VaultError::AlreadyClaimed {
                    retry_in_secs: Some(DAY_SECS - (now - last)),
                });
            }
            let streak = if last > 0 && now - last < 2 * DAY_SECS {
                txn.account().daily_streak + 1
            } else {
                1
            };
            let bonus = base + step * streak as u64;

            txn.credit(bonus, TxKind::DailyBonus);
            txn.account_mut().daily_streak = streak;
            txn.account_mut().last_daily_claim = now;
            txn.account_mut().free_cases += 1;
            txn.advance_quest(QuestId::DailyLogin, 1);
            txn.grant_exp(exp_grants::DAILY_CLAIM);

            let akey = Activity::key(id);
            let mut row: Activity = txn
                .store()
                .get_json(&akey)?
                .unwrap_or_else(|| Activity::new(id));
            row.last_active = now;
            row.login_count += 1;
            txn.put_json(akey, &row)?;

            Ok((bonus, streak, txn.account().free_cases))
        })?;

        let (bonus, streak, free_cases) = report.value;
        Ok(DailyReport {
            bonus,
            streak,
            free_cases,
            new_balance: report.balance,
            level_ups: report.level_ups,
        })
    }

    /// One-shot bonus for the best daily-streak tier reached so far.
    pub fn claim_streak_bonus(&self, id: u64) -> VaultResult<RewardReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();

        let report = self.ledger.with_account(id, now, |txn| {
            let akey = Activity::key(id);
            let mut row: Activity = txn
                .store()
                .get_json(&akey)?
                .unwrap_or_else(|| Activity::new(id));
            if row.streak_bonus_claimed {
                return Err(VaultError::AlreadyClaimed {
                    retry_in_secs: None,
                });
            }
            let streak = txn.account().daily_streak;
            let Some(bonus) = activity::streak_bonus(streak) else {
                return Err(VaultError::QuestIncomplete {
                    progress: streak as u64,
                    goal: activity::STREAK_BONUS_MIN as u64,
                });
            };
            txn.credit(bonus, TxKind::StreakBonus);
            row.streak_bonus_claimed = true;
            txn.put_json(akey, &row)?;
            Ok(bonus)
        })?;

        Ok(RewardReport {
            reward: report.value,
            new_balance: report.balance,
        })
    }

    /// One-shot bonus once the account has played anything at all.
    pub fn claim_first_game_bonus(&self, id: u64) -> VaultResult<RewardReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();

        let report = self.ledger.with_account(id, now, |txn| {
            let akey = Activity::key(id);
            let mut row: Activity = txn
                .store()
                .get_json(&akey)?
                .unwrap_or_else(|| Activity::new(id));
            if row.first_game_bonus_claimed {
                return Err(VaultError::AlreadyClaimed {
                    retry_in_secs: None,
                });
            }
            let account = txn.account();
            if account.wins + account.losses + account.cases_opened == 0 {
                return Err(VaultError::QuestIncomplete {
                    progress: 0,
                    goal: 1,
                });
            }
            txn.credit(activity::FIRST_GAME_BONUS, TxKind::FirstGameBonus);
            row.first_game_bonus_claimed = true;
            txn.put_json(akey, &row)?;
            Ok(activity::FIRST_GAME_BONUS)
        })?;

        Ok(RewardReport {
            reward: report.value,
            new_balance: report.balance,
        })
    }

    // ---- promo codes ----

    pub fn create_promo(
        &self,
        code: &str,
        reward: u64,
        usage_limit: u32,
        expires_at: Option<i64>,
    ) -> VaultResult<PromoCode> {
        let code = PromoCode::normalize(code);
        let promo = PromoCode {
            code: code.clone(),
            reward,
            usage_limit,
            used_count: 0,
            created_at: self.clock.now(),
            expires_at,
        };
        self.store
            .put(&PromoCode::key(&code), &serde_json::to_vec(&promo)?)?;
        info!(code, reward, usage_limit, "promo code created");
        Ok(promo)
    }

    /// Redeem a promo code, at most once per account. The usage counter,
    /// the per-account marker, and the credit commit in one batch.
    pub fn redeem_promo(&self, id: u64, raw_code: &str) -> VaultResult<RewardReport> {
        self.ensure_not_banned(id)?;
        let code = PromoCode::normalize(raw_code);
        let now = self.clock.now();

        let lock = self.locks.named(&format!("promo:{}", code));
        let _guard = lock.guard();

        let mut promo: PromoCode = self
            .store
            .get_json(&PromoCode::key(&code))?
            .ok_or(VaultError::NotFound(NotFoundKind::Promo))?;
        if promo.expires_at.is_some_and(|exp| now >= exp) {
            return Err(VaultError::Expired);
        }
        if promo.used_count >= promo.usage_limit {
            return Err(VaultError::UsageLimitExceeded);
        }
        if self.store.get(&PromoCode::used_key(&code, id))?.is_some() {
            return Err(VaultError::AlreadyClaimed {
                retry_in_secs: None,
            });
        }

        promo.used_count += 1;
        let report = self.ledger.with_account(id, now, |txn| {
            txn.credit(promo.reward, TxKind::PromoReward { code: code.clone() });
            txn.put_json(PromoCode::key(&code), &promo)?;
            txn.put_json(
                PromoCode::used_key(&code, id),
                &PromoUse { account_id: id, at: now },
            )?;
            Ok(promo.reward)
        })?;

        Ok(RewardReport {
            reward: report.value,
            new_balance: report.balance,
        })
    }

    // ---- quests ----

    pub fn quests_for(&self, id: u64) -> VaultResult<Vec<QuestView>> {
        self.ledger.require_account(id)?;
        let week = week_number(self.clock.now());
        let mut views = Vec::with_capacity(QuestId::ALL.len());
        for quest in QuestId::ALL {
            let row: QuestProgress = self
                .store
                .get_json(&quest.key(id, week))?
                .unwrap_or_default();
            let def = quest.def();
            views.push(QuestView {
                quest,
                progress: row.progress,
                goal: def.goal,
                reward: def.reward,
                completed: row.completed(quest),
                claimed: row.claimed,
            });
        }
        Ok(views)
    }

    /// Claim a completed quest's reward, once per week.
    pub fn claim_quest(&self, id: u64, quest: QuestId) -> VaultResult<RewardReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();
        let week = week_number(now);
        let def = quest.def();

        let report = self.ledger.with_account(id, now, |txn| {
            let key = quest.key(id, week);
            let mut row: QuestProgress = txn.store().get_json(&key)?.unwrap_or_default();
            if row.claimed {
                return Err(VaultError::AlreadyClaimed {
                    retry_in_secs: None,
                });
            }
            if !row.completed(quest) {
                return Err(VaultError::QuestIncomplete {
                    progress: row.progress,
                    goal: def.goal,
                });
            }
            row.claimed = true;
            txn.put_json(key, &row)?;
            txn.credit(def.reward, TxKind::QuestReward { quest });
            Ok(def.reward)
        })?;

        Ok(RewardReport {
            reward: report.value,
            new_balance: report.balance,
        })
    }

    // ---- lottery ----

    pub fn next_draw_date(&self) -> String {
        lottery::next_draw_date(self.clock.today()).to_string()
    }

    /// Buy one ticket for the upcoming draw. The ticket and the per-draw
    /// sequence row update in the same batch as the debit, so numbers stay
    /// dense and gapless.
    pub fn buy_lottery_ticket(&self, id: u64) -> VaultResult<TicketReport> {
        self.ensure_not_banned(id)?;
        let now = self.clock.now();
        let draw_date = self.next_draw_date();
        let price = self.config.economy.lottery_ticket_price;

        let lock = self.locks.named(&format!("lottery:{}", draw_date));
        let _guard = lock.guard();

        let report = self.ledger.with_account(id, now, |txn| {
            txn.debit(
                price,
                TxKind::LotteryTicket {
                    draw_date: draw_date.clone(),
                },
            )?;
            let seq_key = lottery::seq_key(&draw_date);
            let number: u64 = txn.store().get_json(&seq_key)?.unwrap_or(0) + 1;
            txn.put_json(seq_key, &number)?;
            txn.put_json(
                LotteryTicket::key(&draw_date, number),
                &LotteryTicket {
                    number,
                    account_id: id,
                    draw_date: draw_date.clone(),
                    purchased_at: now,
                },
            )?;
            Ok(number)
        })?;

        Ok(TicketReport {
            number: report.value,
            draw_date,
            new_balance: report.balance,
        })
    }

    pub fn lottery_ticket_count(&self, draw_date: &str) -> VaultResult<u64> {
        Ok(self
            .store
            .get_json(&lottery::seq_key(draw_date))?
            .unwrap_or(0))
    }

    /// Resolve a draw: pick a uniform winning ticket and credit twice the
    /// pot. Re-resolving returns the recorded result unchanged.
    pub fn resolve_lottery_draw(&self, draw_date: &str) -> VaultResult<DrawRecord> {
        let now = self.clock.now();
        let lock = self.locks.named(&format!("lottery:{}", draw_date));
        let _guard = lock.guard();

        if let Some(record) = self.store.get_json::<DrawRecord>(&DrawRecord::key(draw_date))? {
            return Ok(record);
        }

        let mut tickets = Vec::new();
        for (_, value) in self.store.scan_prefix(&LotteryTicket::prefix(draw_date)) {
            let ticket: LotteryTicket = serde_json::from_slice(&value)?;
            tickets.push(ticket);
        }
        if tickets.is_empty() {
            return Err(VaultError::NotFound(NotFoundKind::LotteryTickets));
        }

        let prize = lottery::jackpot(
            tickets.len() as u64,
            self.config.economy.lottery_ticket_price,
        );
        let winner = &tickets[self.draw(|rng| rng.gen_range(0..tickets.len()))];
        let record = DrawRecord {
            draw_date: draw_date.to_string(),
            winner_id: winner.account_id,
            prize,
            ticket_count: tickets.len() as u64,
            at: now,
        };

        self.ledger.with_account(winner.account_id, now, |txn| {
            txn.credit(
                prize,
                TxKind::LotteryPrize {
                    draw_date: draw_date.to_string(),
                },
            );
            txn.put_json(DrawRecord::key(draw_date), &record)?;
            Ok(())
        })?;
        info!(
            draw_date,
            winner_id = winner.account_id,
            prize,
            tickets = record.ticket_count,
            "lottery draw resolved"
        );
        Ok(record)
    }

    // ---- payments ----

    /// Create a provider invoice and register the pending payment under its
    /// reference.
    pub async fn create_crypto_invoice(
        &self,
        id: u64,
        amount: u64,
        description: &str,
    ) -> VaultResult<Invoice> {
        self.ledger.require_account(id)?;
        self.ensure_not_banned(id)?;
        let timeout = Duration::from_secs(self.config.sweep.provider_timeout_secs);

        let invoice = tokio::time::timeout(
            timeout,
            self.provider.create_invoice(amount, description),
        )
        .await
        .map_err(|_| ProviderError::Timeout)??;

        self.register_payment(
            id,
            PaymentProviderKind::Crypto,
            amount,
            &invoice.external_reference,
        )?;
        Ok(invoice)
    }

    /// Register a platform-stars payment with a generated reference. The
    /// caller confirms it later through `confirm_payment` once the platform
    /// reports success.
    pub fn register_stars_payment(&self, id: u64, stars: u64) -> VaultResult<PendingPayment> {
        self.ledger.require_account(id)?;
        self.ensure_not_banned(id)?;
        let reference = format!("stars_{}_{}_{}", id, self.clock.now(), Uuid::new_v4());
        let amount = stars * self.config.economy.diamonds_per_star;
        self.register_payment(id, PaymentProviderKind::Stars, amount, &reference)
    }

    fn register_payment(
        &self,
        id: u64,
        provider: PaymentProviderKind,
        amount: u64,
        reference: &str,
    ) -> VaultResult<PendingPayment> {
        let lock = self.locks.named(&format!("payment:{}", reference));
        let _guard = lock.guard();

        let key = PendingPayment::key(reference);
        if self.store.get(&key)?.is_some() {
            return Err(VaultError::AlreadyProcessed);
        }
        let payment = PendingPayment {
            id: Uuid::new_v4().to_string(),
            account_id: id,
            provider,
            amount,
            external_reference: reference.to_string(),
            status: PaymentStatus::Pending,
            created_at: self.clock.now(),
            completed_at: None,
        };
        self.store.put(&key, &serde_json::to_vec(&payment)?)?;
        info!(reference, account_id = id, amount, "payment registered");
        Ok(payment)
    }

    /// Move a payment from Pending to Paid and credit the account, exactly
    /// once. Every confirmation path funnels through here; the reference
    /// lock plus the status check decide races.
    pub async fn confirm_payment(&self, reference: &str) -> VaultResult<PaymentReceipt> {
        let (receipt, account_id) = {
            let lock = self.locks.named(&format!("payment:{}", reference));
            let _guard = lock.guard();

            let key = PendingPayment::key(reference);
            let mut payment: PendingPayment = self
                .store
                .get_json(&key)?
                .ok_or(VaultError::NotFound(NotFoundKind::Payment))?;

            if payment.status == PaymentStatus::Paid {
                let balance = self
                    .ledger
                    .get_account(payment.account_id)?
                    .map(|a| a.balance)
                    .unwrap_or(0);
                return Ok(PaymentReceipt {
                    credited: false,
                    idempotent: true,
                    amount: payment.amount,
                    new_balance: balance,
                });
            }

            let now = self.clock.now();
            payment.status = PaymentStatus::Paid;
            payment.completed_at = Some(now);
            let provider = payment.provider;
            let amount = payment.amount;
            let account_id = payment.account_id;

            let report = self.ledger.with_account(account_id, now, |txn| {
                txn.credit(amount, TxKind::Payment { provider });
                txn.put_json(key, &payment)?;
                Ok(())
            })?;
            info!(reference, account_id, amount, "payment confirmed");
            (
                PaymentReceipt {
                    credited: true,
                    idempotent: false,
                    amount,
                    new_balance: report.balance,
                },
                account_id,
            )
        };

        self.notifier
            .payment_credited(account_id, receipt.amount, receipt.new_balance)
            .await;
        Ok(receipt)
    }

    /// Poll the provider for one invoice and confirm it if paid. `None`
    /// means the invoice is still pending.
    pub async fn check_crypto_payment(
        &self,
        reference: &str,
    ) -> VaultResult<Option<PaymentReceipt>> {
        let timeout = Duration::from_secs(self.config.sweep.provider_timeout_secs);
        let status = tokio::time::timeout(timeout, self.provider.check_invoice(reference))
            .await
            .map_err(|_| ProviderError::Timeout)??;
        match status {
            InvoiceStatus::Paid => Ok(Some(self.confirm_payment(reference).await?)),
            _ => Ok(None),
        }
    }

    pub fn pending_payments(&self) -> VaultResult<Vec<PendingPayment>> {
        let mut pending = Vec::new();
        for (_, value) in self.store.scan_prefix(PendingPayment::PREFIX) {
            let payment: PendingPayment = serde_json::from_slice(&value)?;
            if payment.status == PaymentStatus::Pending {
                pending.push(payment);
            }
        }
        Ok(pending)
    }

    // ---- exchange ----

    /// Reserve a gift from the catalog. The diamond cost is debited now and
    /// refunded only if the request is rejected.
    pub fn create_exchange_request(&self, id: u64, gift_code: &str) -> VaultResult<ExchangeRequest> {
        self.ensure_not_banned(id)?;
        let gift = self
            .config
            .gift(gift_code)
            .ok_or(VaultError::NotFound(NotFoundKind::Gift))?
            .clone();
        let now = self.clock.now();

        let lock = self.locks.named("exchange:seq");
        let _guard = lock.guard();
        let request_id: u64 = self.store.get_json(ExchangeRequest::SEQ_KEY)?.unwrap_or(0) + 1;

        let request = ExchangeRequest {
            id: request_id,
            account_id: id,
            gift_code: gift.code.clone(),
            gift_name: gift.name.clone(),
            stars_amount: gift.stars,
            diamonds_cost: gift.diamonds,
            status: ExchangeStatus::Pending,
            admin_id: None,
            created_at: now,
            completed_at: None,
        };

        self.ledger.with_account(id, now, |txn| {
            txn.debit(gift.diamonds, TxKind::ExchangeDebit { request_id })?;
            txn.put_json(ExchangeRequest::SEQ_KEY.to_vec(), &request_id)?;
            txn.put_json(ExchangeRequest::key(request_id), &request)?;
            Ok(())
        })?;
        info!(request_id, account_id = id, gift = %gift.code, "exchange request created");
        Ok(request)
    }

    /// Approve or reject a pending request. Approval has no ledger effect;
    /// rejection refunds the original debit. Resolving twice fails with
    /// AlreadyProcessed.
    pub fn resolve_exchange_request(
        &self,
        request_id: u64,
        approve: bool,
        admin_id: u64,
    ) -> VaultResult<ExchangeRequest> {
        let now = self.clock.now();
        let lock = self.locks.named(&format!("exchange:req:{}", request_id));
        let _guard = lock.guard();

        let key = ExchangeRequest::key(request_id);
        let mut request: ExchangeRequest = self
            .store
            .get_json(&key)?
            .ok_or(VaultError::NotFound(NotFoundKind::ExchangeRequest))?;
        if request.status != ExchangeStatus::Pending {
            return Err(VaultError::AlreadyProcessed);
        }

        request.admin_id = Some(admin_id);
        request.completed_at = Some(now);
        if approve {
            request.status = ExchangeStatus::Completed;
            self.store.put(&key, &serde_json::to_vec(&request)?)?;
        } else {
            request.status = ExchangeStatus::Rejected;
            let refund = request.diamonds_cost;
            let request_ref = &request;
            self.ledger.with_account(request.account_id, now, |txn| {
                txn.credit(refund, TxKind::ExchangeRefund { request_id });
                txn.put_json(key.clone(), request_ref)?;
                Ok(())
            })?;
        }
        info!(
            request_id,
            approved = approve,
            admin_id,
            "exchange request resolved"
        );
        Ok(request)
    }

    pub fn pending_exchange_requests(&self) -> VaultResult<Vec<ExchangeRequest>> {
        let mut pending = Vec::new();
        for (_, value) in self.store.scan_prefix(ExchangeRequest::PREFIX) {
            let request: ExchangeRequest = serde_json::from_slice(&value)?;
            if request.status == ExchangeStatus::Pending {
                pending.push(request);
            }
        }
        Ok(pending)
    }
}
