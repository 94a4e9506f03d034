//! One chat's dice table
//!
//! A [`Table`] owns its [`Round`] behind an async mutex and runs a single
//! driver task that walks the round through its phases:
//!
//! ```text
//! Idle -> BettingOpen -> Resolving -> Settling -> BettingOpen -> ...
//! ```
//!
//! Bet admission holds the round lock across the store write, so closing the
//! window waits for in-flight admissions and no bet lands after it. Dice
//! submission is a check-and-append under the same lock. Stopping the table
//! signals the driver over a watch channel; every wait in the driver except
//! the settlement commit races against that signal.

use crate::common::traits::BetStore;
use crate::common::types::{ChatId, IssueId, PlayerId, RoundScope};
use crate::config::DiceConfig;
use crate::dispatcher::ResilientDispatcher;
use crate::errors::{AdmissionError, DiceResult};
use crate::games::arbiter::{pick_roller, stake_totals, RollerDecision};
use crate::games::settlement::{self, Settlement};
use crate::games::types::{Bet, BetKind, DieTriple};
use crate::history::TrendBoard;
use crate::issue::IssueSequence;
use crate::metrics::RoundMetrics;
use crate::round::state::{Phase, Round, DICE_PER_ROUND};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

/// Services shared by every table
#[derive(Clone)]
pub struct TableContext {
    pub config: Arc<DiceConfig>,
    pub store: Arc<dyn BetStore>,
    pub dispatcher: ResilientDispatcher,
    /// Template each table derives its own issue counter from
    pub issues: Arc<IssueSequence>,
    pub metrics: Arc<RoundMetrics>,
}

struct Driver {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Driver {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Read-only view of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableStatus {
    pub issue: IssueId,
    pub phase: Phase,
    pub bets: usize,
    pub highest_bettor: Option<PlayerId>,
    pub collected_dice: Vec<u8>,
}

pub struct Table {
    chat: ChatId,
    ctx: TableContext,
    issues: IssueSequence,
    round: Mutex<Round>,
    trend: Mutex<TrendBoard>,
    dice_ready: Notify,
    // Held for the whole of start and stop so they never interleave
    driver: Mutex<Option<Driver>>,
}

/// Run `fut` unless the stop signal fires first
async fn or_stop<F: Future>(stop: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    if *stop.borrow() {
        return None;
    }
    tokio::select! {
        out = fut => Some(out),
        _ = stop.changed() => None,
    }
}

impl Table {
    pub fn new(chat: ChatId, ctx: TableContext) -> Self {
        Self {
            chat,
            issues: ctx.issues.for_chat(chat),
            ctx,
            round: Mutex::new(Round::idle()),
            trend: Mutex::new(TrendBoard::new()),
            dice_ready: Notify::new(),
            driver: Mutex::new(None),
        }
    }

    pub fn chat(&self) -> ChatId {
        self.chat
    }

    pub async fn status(&self) -> TableStatus {
        let round = self.round.lock().await;
        TableStatus {
            issue: round.issue,
            phase: round.phase,
            bets: round.ledger.len(),
            highest_bettor: round.highest_bettor,
            collected_dice: round.collected_dice.clone(),
        }
    }

    pub async fn trend(&self) -> TrendBoard {
        self.trend.lock().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.driver.lock().await.as_ref().map_or(false, Driver::is_live)
    }

    /// Open the first round and hand the table to its driver task
    pub async fn start(self: &Arc<Self>) -> DiceResult<IssueId> {
        let mut slot = self.driver.lock().await;
        if slot.as_ref().map_or(false, Driver::is_live) {
            return Err(AdmissionError::AlreadyRunning.into());
        }

        let issue = self.open_round().await?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let table = Arc::clone(self);
        let handle = tokio::spawn(async move {
            table.drive(stop_rx).await;
        });
        *slot = Some(Driver {
            stop: stop_tx,
            handle,
        });

        tracing::info!(chat_id = %self.chat, issue = %issue, "Table started");
        Ok(issue)
    }

    /// Cancel the driver and discard the current round's uncommitted state
    pub async fn stop(&self) -> Result<(), AdmissionError> {
        let mut slot = self.driver.lock().await;
        let Some(driver) = slot.take() else {
            return Err(AdmissionError::NotRunning);
        };

        let _ = driver.stop.send(true);
        if let Err(e) = driver.handle.await {
            tracing::error!(chat_id = %self.chat, error = %e, "Round driver ended abnormally");
        }

        let discard = {
            let mut round = self.round.lock().await;
            let uncommitted = matches!(round.phase, Phase::BettingOpen | Phase::Resolving);
            let scope = round.scope(self.chat);
            let dropped = round.ledger.len();
            *round = Round {
                issue: round.issue,
                ..Round::idle()
            };
            uncommitted.then_some((scope, dropped))
        };

        if let Some((scope, dropped)) = discard {
            if let Err(e) = self.ctx.store.clear_bets(scope).await {
                tracing::error!(scope = %scope, error = %e, "Failed to discard bets of stopped round");
            }
            tracing::info!(scope = %scope, dropped_bets = dropped, "Round cancelled");
        }

        self.ctx
            .dispatcher
            .announce(self.chat, "⏹ The table is closed. No further rounds until restarted.")
            .await;
        tracing::info!(chat_id = %self.chat, "Table stopped");
        Ok(())
    }

    /// Admit a bet while the window is open
    pub async fn submit_bet(
        &self,
        player: PlayerId,
        kind: BetKind,
        stake: i64,
    ) -> Result<Bet, AdmissionError> {
        let result = self.admit(player, kind, stake).await;
        match &result {
            Ok(bet) => {
                self.ctx.metrics.record_bet_admitted();
                tracing::debug!(chat_id = %self.chat, player_id = %player, kind = %bet.kind, stake, "Bet admitted");
            }
            Err(e) => {
                self.ctx.metrics.record_bet_rejected();
                tracing::debug!(chat_id = %self.chat, player_id = %player, error = %e, "Bet rejected");
            }
        }
        result
    }

    async fn admit(&self, player: PlayerId, kind: BetKind, stake: i64) -> Result<Bet, AdmissionError> {
        let bet = Bet::new(player, kind, stake)?;
        let mut round = self.round.lock().await;
        match round.phase {
            Phase::BettingOpen => {}
            Phase::Idle => return Err(AdmissionError::NotRunning),
            _ => return Err(AdmissionError::BettingClosed),
        }

        // Lock stays held so the window cannot close between store and ledger
        self.ctx.store.place_bet(round.scope(self.chat), &bet).await?;
        round.ledger.record(bet.clone());
        Ok(bet)
    }

    /// Withdraw a player's bets from the open round; returns the released stake
    pub async fn cancel_bets(&self, player: PlayerId) -> Result<i64, AdmissionError> {
        let mut round = self.round.lock().await;
        match round.phase {
            Phase::BettingOpen => {}
            Phase::Idle => return Err(AdmissionError::NotRunning),
            _ => return Err(AdmissionError::BettingClosed),
        }

        let withdrawn = self
            .ctx
            .store
            .withdraw_bets(round.scope(self.chat), player)
            .await?;
        round.ledger.withdraw(player);

        let refunded = withdrawn.iter().map(|b| b.stake).sum();
        tracing::info!(chat_id = %self.chat, player_id = %player, refunded, "Bets cancelled");
        Ok(refunded)
    }

    /// Record a face thrown by the privileged roller
    pub async fn submit_die_face(&self, player: PlayerId, face: u8) -> Result<usize, AdmissionError> {
        let collected = self.round.lock().await.accept_die(Some(player), face)?;
        tracing::info!(chat_id = %self.chat, player_id = %player, face, collected, "Manual die accepted");
        self.dice_ready.notify_one();
        Ok(collected)
    }

    /// Open bets of one player in the current round, as the store holds them
    pub async fn player_bets(&self, player: PlayerId) -> DiceResult<Vec<Bet>> {
        let scope = {
            let round = self.round.lock().await;
            if round.phase == Phase::Idle {
                return Ok(Vec::new());
            }
            round.scope(self.chat)
        };
        let bets = self.ctx.store.open_bets(scope).await?;
        Ok(bets.into_iter().filter(|b| b.owner == player).collect())
    }

    /// Total stake per player in the current round, largest first
    pub async fn roster(&self) -> Vec<(PlayerId, i64)> {
        let round = self.round.lock().await;
        let mut roster: Vec<(PlayerId, i64)> = stake_totals(round.ledger.bets()).into_iter().collect();
        roster.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        roster
    }

    async fn open_round(&self) -> DiceResult<IssueId> {
        let issue = self.issues.next_issue().await?;
        *self.round.lock().await = Round::open(issue);
        self.ctx.metrics.record_round_opened();
        tracing::info!(chat_id = %self.chat, issue = %issue, "Round opened");
        Ok(issue)
    }

    async fn announce_opening(&self, issue: IssueId) {
        let config = &self.ctx.config;
        let text = format!(
            "🔔 Round {} is open! Place your bets within {} seconds.",
            issue, config.round.betting_window_secs
        );
        match config.round.opening_animation {
            Some(ref file) => {
                if let Err(e) = self.ctx.dispatcher.send_animation(self.chat, file, &text).await {
                    tracing::warn!(chat_id = %self.chat, error = %e, "Opening animation not delivered");
                }
            }
            None => self.ctx.dispatcher.announce(self.chat, &text).await,
        }
    }

    async fn drive(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        loop {
            let issue = self.round.lock().await.issue;
            if or_stop(&mut stop, self.announce_opening(issue)).await.is_none() {
                return;
            }
            if or_stop(&mut stop, tokio::time::sleep(self.ctx.config.betting_window()))
                .await
                .is_none()
            {
                return;
            }

            let (scope, decision, roster) = self.close_betting().await;
            if or_stop(&mut stop, self.announce_closing(&decision, &roster))
                .await
                .is_none()
            {
                return;
            }

            if decision == RollerDecision::NoBets {
                self.ctx.metrics.record_empty_round();
                tracing::info!(scope = %scope, "No bets, rolling over");
            } else {
                let Some(outcome) = self.collect_dice(&decision, &mut stop).await else {
                    return;
                };
                self.settle(scope, outcome).await;
                if or_stop(&mut stop, tokio::time::sleep(self.ctx.config.result_pause()))
                    .await
                    .is_none()
                {
                    return;
                }
            }

            if *stop.borrow() {
                return;
            }
            if let Err(e) = self.open_round().await {
                tracing::error!(chat_id = %self.chat, error = %e, "Could not open next round, table halted");
                self.round.lock().await.phase = Phase::Idle;
                return;
            }
        }
    }

    async fn close_betting(&self) -> (RoundScope, RollerDecision, Vec<(PlayerId, i64)>) {
        let mut round = self.round.lock().await;
        let decision = pick_roller(round.ledger.bets());
        round.close_betting(&decision);

        let mut roster: Vec<(PlayerId, i64)> = stake_totals(round.ledger.bets()).into_iter().collect();
        roster.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        tracing::info!(
            scope = %round.scope(self.chat),
            bets = round.ledger.len(),
            roller = ?decision.privileged(),
            "Betting closed"
        );
        (round.scope(self.chat), decision, roster)
    }

    async fn announce_closing(&self, decision: &RollerDecision, roster: &[(PlayerId, i64)]) {
        let unit = &self.ctx.config.economy.currency_unit;
        let mut text = String::from("⏰ Betting is closed!");
        for (player, total) in roster {
            text.push_str(&format!("\n• {}: {} {}", player, total, unit));
        }
        let tail = match decision {
            RollerDecision::Privileged { player, total_stake } => format!(
                "\n🎲 Player {} staked the most ({} {}) and has {} seconds to roll {} dice.",
                player, total_stake, unit, self.ctx.config.round.roll_window_secs, DICE_PER_ROUND
            ),
            RollerDecision::Tie { .. } => "\n🎲 Top stakes are tied, the house rolls.".to_string(),
            RollerDecision::NoBets => "\nNo bets this round.".to_string(),
        };
        text.push_str(&tail);
        self.ctx.dispatcher.announce(self.chat, &text).await;
    }

    /// Gather three faces: manual ones from the privileged roller within the
    /// roll window, then automated throws for whatever is missing.
    /// Returns `None` if the table was stopped.
    async fn collect_dice(
        &self,
        decision: &RollerDecision,
        stop: &mut watch::Receiver<bool>,
    ) -> Option<DieTriple> {
        if decision.privileged().is_some() {
            let deadline = tokio::time::Instant::now() + self.ctx.config.roll_window();
            loop {
                if self.round.lock().await.dice_complete() {
                    break;
                }
                let woke = or_stop(stop, async {
                    tokio::select! {
                        _ = self.dice_ready.notified() => true,
                        _ = tokio::time::sleep_until(deadline) => false,
                    }
                })
                .await?;
                if !woke {
                    break;
                }
            }

            let mut round = self.round.lock().await;
            round.close_manual_window();
            if !round.dice_complete() {
                tracing::info!(
                    chat_id = %self.chat,
                    collected = round.collected_dice.len(),
                    "Roll window expired, house completes the dice"
                );
            }
        }

        let mut first_auto = true;
        loop {
            if let Some(outcome) = self.round.lock().await.outcome() {
                return Some(outcome);
            }
            if !first_auto {
                or_stop(stop, tokio::time::sleep(self.ctx.config.auto_die_interval())).await?;
            }
            first_auto = false;

            let rolled = or_stop(stop, self.ctx.dispatcher.roll_or_fallback(self.chat)).await?;
            if rolled.fallback {
                self.ctx
                    .dispatcher
                    .announce(self.chat, &format!("🎲 The house rolled {}", rolled.face))
                    .await;
            }
            if let Err(e) = self.round.lock().await.accept_die(None, rolled.face) {
                tracing::warn!(chat_id = %self.chat, error = %e, "Automated die not recorded");
            }
        }
    }

    /// Score and persist the round. Never cancelled and never fails the
    /// driver: persistence errors are logged and results still announced.
    async fn settle(&self, scope: RoundScope, outcome: DieTriple) {
        let settlement = {
            let mut round = self.round.lock().await;
            round.phase = Phase::Settling;
            let settlement = round.ledger.settle_all(outcome, &self.ctx.config.odds);
            round.ledger.clear();
            settlement
        };

        match settlement::commit(self.ctx.store.as_ref(), scope, &settlement).await {
            Ok(()) => self.ctx.metrics.record_round_settled(),
            Err(e) => {
                self.ctx.metrics.record_settlement_failure();
                tracing::error!(
                    scope = %scope,
                    error = %e,
                    players = settlement.entries.len(),
                    "Settlement could not be persisted; bets left in store for reconciliation"
                );
            }
        }

        for voided in settlement.voided() {
            let bet = voided.bet();
            tracing::warn!(scope = %scope, player_id = %bet.owner, kind = %bet.kind, "Bet voided");
        }
        self.trend.lock().await.push(outcome.sum());
        let text = self.results_text(scope, &settlement);
        self.ctx.dispatcher.announce(self.chat, &text).await;
    }

    fn results_text(&self, scope: RoundScope, settlement: &Settlement) -> String {
        let outcome = settlement.outcome;
        let unit = &self.ctx.config.economy.currency_unit;
        let mut text = format!("🎲 Round {} result: {}", scope.issue, outcome);
        for entry in &settlement.entries {
            let line = match entry.signed_amount {
                0 => format!("\n• {} broke even", entry.player_id),
                won if won > 0 => format!("\n• {} won {} {}", entry.player_id, won, unit),
                lost => format!("\n• {} lost {} {}", entry.player_id, -lost, unit),
            };
            text.push_str(&line);
        }
        let voided = settlement.voided().count();
        if voided > 0 {
            text.push_str(&format!("\n{} bet(s) could not be evaluated and were voided", voided));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::transport::RecordingTransport;

    fn table() -> (Arc<Table>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(RoundMetrics::new());
        let config = DiceConfig::fast_testing();
        let ctx = TableContext {
            dispatcher: ResilientDispatcher::new(
                Arc::new(RecordingTransport::new()),
                config.dispatch.clone(),
                metrics.clone(),
            ),
            config: Arc::new(config),
            store: store.clone(),
            issues: Arc::new(IssueSequence::in_memory()),
            metrics,
        };
        (Arc::new(Table::new(ChatId(-5), ctx)), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_bets_rejected_before_start() {
        let (table, _) = table();
        let result = table.submit_bet(PlayerId(1), BetKind::Pair, 10).await;
        assert_eq!(result, Err(AdmissionError::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_refused() {
        let (table, _) = table();
        table.start().await.unwrap();
        assert!(table.start().await.is_err());
        table.stop().await.unwrap();
        assert!(table.stop().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_reservation() {
        let (table, store) = table();
        store.ensure_player(PlayerId(1), "ann", 100).await.unwrap();
        table.start().await.unwrap();

        table.submit_bet(PlayerId(1), BetKind::Pair, 30).await.unwrap();
        table.submit_bet(PlayerId(1), BetKind::Straight, 20).await.unwrap();
        assert_eq!(table.roster().await, vec![(PlayerId(1), 50)]);
        assert_eq!(table.player_bets(PlayerId(1)).await.unwrap().len(), 2);

        assert_eq!(table.cancel_bets(PlayerId(1)).await, Ok(50));
        assert_eq!(store.player_account(PlayerId(1)).await.unwrap().available(), 100);
        assert!(table.roster().await.is_empty());
        table.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_funds_is_rejected() {
        let (table, store) = table();
        store.ensure_player(PlayerId(1), "ann", 40).await.unwrap();
        table.start().await.unwrap();

        let result = table.submit_bet(PlayerId(1), BetKind::Pair, 50).await;
        assert!(matches!(
            result,
            Err(AdmissionError::Store(crate::errors::StoreError::InsufficientFunds { .. }))
        ));
        assert_eq!(table.status().await.bets, 0);
        table.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_results_text_reports_break_even() {
        use crate::games::settlement::SettlementEntry;

        let (table, _) = table();
        let settlement = Settlement {
            outcome: DieTriple::new(2, 3, 4).unwrap(),
            bets: Vec::new(),
            entries: vec![
                SettlementEntry { player_id: PlayerId(1), signed_amount: 0 },
                SettlementEntry { player_id: PlayerId(2), signed_amount: 50 },
                SettlementEntry { player_id: PlayerId(3), signed_amount: -20 },
            ],
        };
        let scope = RoundScope::new(ChatId(-5), IssueId(4));

        let text = table.results_text(scope, &settlement);
        assert!(text.contains("• 1 broke even"));
        assert!(!text.contains("won 0"));
        assert!(text.contains("• 2 won 50 coins"));
        assert!(text.contains("• 3 lost 20 coins"));
    }
}
