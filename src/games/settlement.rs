//! Settlement records and persistence
//!
//! A [`Settlement`] is the scored result of one round's ledger. Committing it
//! applies the net balance deltas and clears the round's bets as one logical
//! transaction through the [`BetStore`].

use crate::common::traits::BetStore;
use crate::common::types::{PlayerId, RoundScope};
use crate::errors::StoreError;
use crate::games::odds::Evaluation;
use crate::games::types::{Bet, DieTriple};
use serde::Serialize;

/// Net signed balance change for one player in one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementEntry {
    pub player_id: PlayerId,
    pub signed_amount: i64,
}

/// What happened to a single bet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BetOutcome {
    Scored {
        bet: Bet,
        evaluation: Evaluation,
        amount: i64,
    },
    Voided {
        bet: Bet,
        reason: String,
    },
}

impl BetOutcome {
    pub fn bet(&self) -> &Bet {
        match self {
            BetOutcome::Scored { bet, .. } | BetOutcome::Voided { bet, .. } => bet,
        }
    }
}

/// Scored round, ready to persist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub outcome: DieTriple,
    pub bets: Vec<BetOutcome>,
    /// One entry per player, ordered by player id
    pub entries: Vec<SettlementEntry>,
}

impl Settlement {
    pub fn total_credited(&self) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.signed_amount > 0)
            .map(|e| e.signed_amount)
            .sum()
    }

    pub fn total_debited(&self) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.signed_amount < 0)
            .map(|e| -e.signed_amount)
            .sum()
    }

    /// Credited minus debited across all players
    pub fn net(&self) -> i64 {
        self.entries.iter().map(|e| e.signed_amount).sum()
    }

    pub fn voided(&self) -> impl Iterator<Item = &BetOutcome> {
        self.bets
            .iter()
            .filter(|o| matches!(o, BetOutcome::Voided { .. }))
    }

    pub fn entry_for(&self, player: PlayerId) -> Option<&SettlementEntry> {
        self.entries.iter().find(|e| e.player_id == player)
    }
}

/// Persist a settlement: balance deltas first, then the bet clear.
///
/// An empty entry list touches nothing but still clears the scope. If the
/// balance update fails the bets are left in place.
pub async fn commit(
    store: &dyn BetStore,
    scope: RoundScope,
    settlement: &Settlement,
) -> Result<(), StoreError> {
    if settlement.entries.is_empty() {
        tracing::debug!(scope = %scope, "No deltas to apply, clearing bets only");
        return store.clear_bets(scope).await;
    }

    store.commit_settlement(scope, &settlement.entries).await?;
    tracing::info!(
        scope = %scope,
        players = settlement.entries.len(),
        credited = settlement.total_credited(),
        debited = settlement.total_debited(),
        "Settlement committed"
    );
    Ok(())
}
