//! Bet ledger
//!
//! The in-round list of admitted bets. Settling the ledger scores every bet
//! and folds the results into one net delta per player.

use crate::common::types::PlayerId;
use crate::games::odds::{settlement_amount, OddsTable};
use crate::games::settlement::{BetOutcome, Settlement, SettlementEntry};
use crate::games::types::{Bet, DieTriple};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct BetLedger {
    bets: Vec<Bet>,
}

impl BetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an admitted bet. Solvency is the caller's concern.
    pub fn record(&mut self, bet: Bet) {
        self.bets.push(bet);
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    /// Remove and return every bet owned by `player`
    pub fn withdraw(&mut self, player: PlayerId) -> Vec<Bet> {
        let (withdrawn, kept) = std::mem::take(&mut self.bets)
            .into_iter()
            .partition(|b| b.owner == player);
        self.bets = kept;
        withdrawn
    }

    /// Drop all bets; calling it twice is harmless
    pub fn clear(&mut self) {
        self.bets.clear();
    }

    /// Score every bet against `outcome` and aggregate per player.
    ///
    /// A bet the evaluator refuses is voided (no delta) and the rest still settle.
    pub fn settle_all(&self, outcome: DieTriple, odds: &OddsTable) -> Settlement {
        let mut per_player: BTreeMap<PlayerId, i64> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(self.bets.len());

        for bet in &self.bets {
            match odds.evaluate(&bet.kind, &outcome) {
                Ok(evaluation) => {
                    let amount = settlement_amount(bet, &evaluation);
                    *per_player.entry(bet.owner).or_insert(0) += amount;
                    outcomes.push(BetOutcome::Scored {
                        bet: bet.clone(),
                        evaluation,
                        amount,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        player_id = %bet.owner,
                        kind = %bet.kind,
                        error = %e,
                        "Voiding bet that could not be evaluated"
                    );
                    outcomes.push(BetOutcome::Voided {
                        bet: bet.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let entries = per_player
            .into_iter()
            .map(|(player_id, signed_amount)| SettlementEntry {
                player_id,
                signed_amount,
            })
            .collect();

        Settlement {
            outcome,
            bets: outcomes,
            entries,
        }
    }
}
