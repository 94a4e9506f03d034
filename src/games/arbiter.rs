//! Highest-stake arbiter
//!
//! Decides which player, if any, may roll the round's dice by hand.

use crate::common::types::PlayerId;
use crate::games::types::Bet;
use serde::Serialize;
use std::collections::BTreeMap;

/// Who supplies the dice for a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RollerDecision {
    /// Exactly one player staked the most
    Privileged { player: PlayerId, total_stake: i64 },
    /// Several players share the top total; dice are rolled automatically
    Tie { players: Vec<PlayerId>, total_stake: i64 },
    /// Nobody bet
    NoBets,
}

impl RollerDecision {
    pub fn privileged(&self) -> Option<PlayerId> {
        match self {
            RollerDecision::Privileged { player, .. } => Some(*player),
            _ => None,
        }
    }
}

/// Total stake per player, ordered by player id
pub fn stake_totals(bets: &[Bet]) -> BTreeMap<PlayerId, i64> {
    let mut totals = BTreeMap::new();
    for bet in bets {
        *totals.entry(bet.owner).or_insert(0i64) += bet.stake;
    }
    totals
}

/// Sum stakes per player and pick the unique maximum
pub fn pick_roller(bets: &[Bet]) -> RollerDecision {
    let totals = stake_totals(bets);
    let Some(&max) = totals.values().max() else {
        return RollerDecision::NoBets;
    };

    let leaders: Vec<PlayerId> = totals
        .iter()
        .filter(|&(_, &total)| total == max)
        .map(|(&player, _)| player)
        .collect();

    match leaders.as_slice() {
        [player] => RollerDecision::Privileged {
            player: *player,
            total_stake: max,
        },
        _ => RollerDecision::Tie {
            players: leaders,
            total_stake: max,
        },
    }
}
