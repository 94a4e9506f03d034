//! In-memory account and bet store
//!
//! Implements [`BetStore`] over a single async lock, so a settlement commit
//! (balance deltas plus bet clear) is applied all-or-nothing. Failure
//! switches let tests exercise the persistence error paths.

use crate::common::traits::BetStore;
use crate::common::types::{PlayerAccount, PlayerId, RoundScope};
use crate::errors::StoreError;
use crate::games::settlement::SettlementEntry;
use crate::games::types::Bet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct StoreState {
    accounts: HashMap<PlayerId, PlayerAccount>,
    bets: HashMap<RoundScope, Vec<Bet>>,
}

impl StoreState {
    fn account_mut(&mut self, player: PlayerId) -> Result<&mut PlayerAccount, StoreError> {
        self.accounts
            .get_mut(&player)
            .ok_or(StoreError::UnknownPlayer(player.0))
    }

    fn release(&mut self, bets: &[Bet]) {
        for bet in bets {
            if let Some(account) = self.accounts.get_mut(&bet.owner) {
                account.reserved = (account.reserved - bet.stake).max(0);
            }
        }
    }

    fn apply(&mut self, deltas: &[SettlementEntry]) -> Result<(), StoreError> {
        // Validate every target first so a bad entry leaves nothing applied
        if let Some(missing) = deltas
            .iter()
            .find(|d| !self.accounts.contains_key(&d.player_id))
        {
            return Err(StoreError::BalanceUpdateFailed(format!(
                "no account for player {}",
                missing.player_id
            )));
        }
        for delta in deltas {
            self.account_mut(delta.player_id)?.balance += delta.signed_amount;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    fail_balance_updates: AtomicBool,
    fail_clears: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every balance update fail until switched off
    pub fn set_fail_balance_updates(&self, fail: bool) {
        self.fail_balance_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every bet clear fail until switched off
    pub fn set_fail_clears(&self, fail: bool) {
        self.fail_clears.store(fail, Ordering::SeqCst);
    }

    /// Make bet reads fail until switched off
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of bets held in `scope`
    pub async fn bet_count(&self, scope: RoundScope) -> usize {
        self.state
            .read()
            .await
            .bets
            .get(&scope)
            .map_or(0, |bets| bets.len())
    }

    /// Scopes that still hold bets
    pub async fn scopes(&self) -> Vec<RoundScope> {
        let mut scopes: Vec<RoundScope> = self.state.read().await.bets.keys().copied().collect();
        scopes.sort();
        scopes
    }

    fn check(&self, flag: &AtomicBool, error: impl FnOnce() -> StoreError) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BetStore for MemoryStore {
    async fn ensure_player(
        &self,
        player: PlayerId,
        name: &str,
        default_balance: i64,
    ) -> Result<(PlayerAccount, bool), StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.accounts.get(&player) {
            return Ok((existing.clone(), false));
        }

        let account = PlayerAccount {
            player_id: player,
            name: name.to_string(),
            balance: default_balance,
            reserved: 0,
        };
        state.accounts.insert(player, account.clone());
        tracing::debug!(player_id = %player, balance = default_balance, "Account created");
        Ok((account, true))
    }

    async fn player_account(&self, player: PlayerId) -> Result<PlayerAccount, StoreError> {
        self.state
            .read()
            .await
            .accounts
            .get(&player)
            .cloned()
            .ok_or(StoreError::UnknownPlayer(player.0))
    }

    async fn accounts(&self) -> Result<Vec<PlayerAccount>, StoreError> {
        Ok(self.state.read().await.accounts.values().cloned().collect())
    }

    async fn place_bet(&self, scope: RoundScope, bet: &Bet) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let account = state.account_mut(bet.owner)?;
        if account.available() < bet.stake {
            return Err(StoreError::InsufficientFunds {
                available: account.available(),
                requested: bet.stake,
            });
        }
        account.reserved += bet.stake;
        state.bets.entry(scope).or_default().push(bet.clone());
        Ok(())
    }

    async fn open_bets(&self, scope: RoundScope) -> Result<Vec<Bet>, StoreError> {
        self.check(&self.fail_reads, || StoreError::Unavailable("read refused".to_string()))?;
        Ok(self
            .state
            .read()
            .await
            .bets
            .get(&scope)
            .cloned()
            .unwrap_or_default())
    }

    async fn withdraw_bets(
        &self,
        scope: RoundScope,
        player: PlayerId,
    ) -> Result<Vec<Bet>, StoreError> {
        let mut state = self.state.write().await;
        let withdrawn = match state.bets.get_mut(&scope) {
            Some(bets) => {
                let (withdrawn, kept): (Vec<Bet>, Vec<Bet>) =
                    std::mem::take(bets).into_iter().partition(|b| b.owner == player);
                *bets = kept;
                withdrawn
            }
            None => Vec::new(),
        };
        state.release(&withdrawn);
        Ok(withdrawn)
    }

    async fn apply_balance_deltas(&self, deltas: &[SettlementEntry]) -> Result<(), StoreError> {
        self.check(&self.fail_balance_updates, || {
            StoreError::BalanceUpdateFailed("write refused".to_string())
        })?;
        self.state.write().await.apply(deltas)
    }

    async fn clear_bets(&self, scope: RoundScope) -> Result<(), StoreError> {
        self.check(&self.fail_clears, || StoreError::ClearFailed("write refused".to_string()))?;
        let mut state = self.state.write().await;
        if let Some(bets) = state.bets.remove(&scope) {
            state.release(&bets);
        }
        Ok(())
    }

    async fn commit_settlement(
        &self,
        scope: RoundScope,
        deltas: &[SettlementEntry],
    ) -> Result<(), StoreError> {
        self.check(&self.fail_balance_updates, || {
            StoreError::BalanceUpdateFailed("write refused".to_string())
        })?;
        self.check(&self.fail_clears, || StoreError::ClearFailed("write refused".to_string()))?;

        let mut state = self.state.write().await;
        state.apply(deltas)?;
        if let Some(bets) = state.bets.remove(&scope) {
            state.release(&bets);
        }
        Ok(())
    }
}
