//! Table registry and the command surface used by the chat layer

use crate::common::traits::{BetStore, ChatTransport};
use crate::common::types::{ChatId, IssueId, PlayerAccount, PlayerId};
use crate::config::DiceConfig;
use crate::dispatcher::ResilientDispatcher;
use crate::errors::{AdmissionError, DiceResult};
use crate::games::parser::parse_bet;
use crate::games::types::{Bet, BetKind};
use crate::issue::IssueSequence;
use crate::metrics::{MetricsSnapshot, RoundMetrics};
use crate::round::table::{Table, TableContext};
use dashmap::DashMap;
use std::sync::Arc;

/// Owns one [`Table`] per chat
pub struct TableManager {
    tables: DashMap<ChatId, Arc<Table>>,
    ctx: TableContext,
}

impl TableManager {
    /// Build from config; the issue counter is file-backed when configured
    pub fn new(
        config: DiceConfig,
        store: Arc<dyn BetStore>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let issues = match config.storage.issue_counter_path {
            Some(ref path) => IssueSequence::persisted(path),
            None => IssueSequence::in_memory(),
        };
        Self::with_issues(config, store, transport, issues)
    }

    pub fn with_issues(
        config: DiceConfig,
        store: Arc<dyn BetStore>,
        transport: Arc<dyn ChatTransport>,
        issues: IssueSequence,
    ) -> Self {
        let metrics = Arc::new(RoundMetrics::new());
        let dispatcher = ResilientDispatcher::new(transport, config.dispatch.clone(), metrics.clone());
        Self {
            tables: DashMap::new(),
            ctx: TableContext {
                config: Arc::new(config),
                store,
                dispatcher,
                issues: Arc::new(issues),
                metrics,
            },
        }
    }

    pub fn config(&self) -> &DiceConfig {
        &self.ctx.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// The chat's table, created on first use
    pub fn table(&self, chat: ChatId) -> Arc<Table> {
        self.tables
            .entry(chat)
            .or_insert_with(|| Arc::new(Table::new(chat, self.ctx.clone())))
            .value()
            .clone()
    }

    fn existing(&self, chat: ChatId) -> Result<Arc<Table>, AdmissionError> {
        self.tables
            .get(&chat)
            .map(|t| t.value().clone())
            .ok_or(AdmissionError::NotRunning)
    }

    pub async fn start_round(&self, chat: ChatId) -> DiceResult<IssueId> {
        self.table(chat).start().await
    }

    pub async fn stop_round(&self, chat: ChatId) -> DiceResult<()> {
        self.existing(chat)?.stop().await?;
        Ok(())
    }

    pub async fn submit_bet(
        &self,
        chat: ChatId,
        player: PlayerId,
        kind: BetKind,
        stake: i64,
    ) -> DiceResult<Bet> {
        Ok(self.existing(chat)?.submit_bet(player, kind, stake).await?)
    }

    /// Parse chat text and admit it, registering unknown players on the way
    pub async fn submit_bet_text(
        &self,
        chat: ChatId,
        player: PlayerId,
        name: &str,
        text: &str,
    ) -> DiceResult<Bet> {
        let slip = parse_bet(text)?;
        let table = self.existing(chat)?;
        self.register_player(player, name).await?;
        Ok(table.submit_bet(player, slip.kind, slip.stake).await?)
    }

    pub async fn submit_die_face(&self, chat: ChatId, player: PlayerId, face: u8) -> DiceResult<usize> {
        Ok(self.existing(chat)?.submit_die_face(player, face).await?)
    }

    /// Create the account with the default balance; true if it was new
    pub async fn register_player(&self, player: PlayerId, name: &str) -> DiceResult<(PlayerAccount, bool)> {
        let (account, created) = self
            .ctx
            .store
            .ensure_player(player, name, self.ctx.config.economy.default_balance)
            .await?;
        if created {
            tracing::info!(player_id = %player, balance = account.balance, "Player registered");
        }
        Ok((account, created))
    }

    pub async fn balance(&self, player: PlayerId) -> DiceResult<PlayerAccount> {
        Ok(self.ctx.store.player_account(player).await?)
    }

    pub async fn cancel_bets(&self, chat: ChatId, player: PlayerId) -> DiceResult<i64> {
        Ok(self.existing(chat)?.cancel_bets(player).await?)
    }

    pub async fn player_bets(&self, chat: ChatId, player: PlayerId) -> DiceResult<Vec<Bet>> {
        match self.tables.get(&chat).map(|t| t.value().clone()) {
            Some(table) => table.player_bets(player).await,
            None => Ok(Vec::new()),
        }
    }

    /// Per-player total stake in the chat's current round, largest first
    pub async fn roster(&self, chat: ChatId) -> DiceResult<Vec<(PlayerId, i64)>> {
        match self.tables.get(&chat).map(|t| t.value().clone()) {
            Some(table) => Ok(table.roster().await),
            None => Ok(Vec::new()),
        }
    }

    /// Every account, richest first
    pub async fn balances(&self) -> DiceResult<Vec<PlayerAccount>> {
        let mut accounts = self.ctx.store.accounts().await?;
        accounts.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.player_id.cmp(&b.player_id)));
        Ok(accounts)
    }

    /// Stop every running table
    pub async fn shutdown(&self) {
        let tables: Vec<Arc<Table>> = self.tables.iter().map(|t| t.value().clone()).collect();
        for table in tables {
            if table.is_running().await {
                if let Err(e) = table.stop().await {
                    tracing::warn!(chat_id = %table.chat(), error = %e, "Stop during shutdown failed");
                }
            }
        }
    }
}
