//! Per-chat round value
//!
//! A [`Round`] holds everything one betting cycle needs. It is owned by its
//! table and only mutated under the table's lock.

use crate::common::types::{current_timestamp_ms, ChatId, IssueId, PlayerId, RoundScope};
use crate::errors::AdmissionError;
use crate::games::arbiter::RollerDecision;
use crate::games::ledger::BetLedger;
use crate::games::types::{DieTriple, MAX_FACE, MIN_FACE};
use serde::Serialize;
use std::fmt;

pub const DICE_PER_ROUND: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    BettingOpen,
    Resolving,
    Settling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::BettingOpen => "betting_open",
            Phase::Resolving => "resolving",
            Phase::Settling => "settling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Round {
    pub issue: IssueId,
    pub phase: Phase,
    pub opened_at: u64,
    pub highest_bettor: Option<PlayerId>,
    pub collected_dice: Vec<u8>,
    pub ledger: BetLedger,
    /// Whether the highest bettor may still submit faces
    pub manual_open: bool,
}

impl Default for Round {
    fn default() -> Self {
        Self::idle()
    }
}

impl Round {
    pub fn idle() -> Self {
        Self {
            issue: IssueId(0),
            phase: Phase::Idle,
            opened_at: 0,
            highest_bettor: None,
            collected_dice: Vec::with_capacity(DICE_PER_ROUND),
            ledger: BetLedger::new(),
            manual_open: false,
        }
    }

    /// Fresh round accepting bets
    pub fn open(issue: IssueId) -> Self {
        Self {
            issue,
            phase: Phase::BettingOpen,
            opened_at: current_timestamp_ms(),
            ..Self::idle()
        }
    }

    pub fn scope(&self, chat: ChatId) -> RoundScope {
        RoundScope::new(chat, self.issue)
    }

    /// Stop taking bets and record who, if anyone, rolls by hand
    pub fn close_betting(&mut self, decision: &RollerDecision) {
        self.phase = Phase::Resolving;
        self.highest_bettor = decision.privileged();
        self.manual_open = self.highest_bettor.is_some();
    }

    /// Shut the manual window; remaining faces come from the dispatcher
    pub fn close_manual_window(&mut self) {
        self.manual_open = false;
    }

    /// Check and append one face. `roller` is the submitting player, or
    /// `None` for automated dice. Returns how many faces are now collected.
    pub fn accept_die(&mut self, roller: Option<PlayerId>, face: u8) -> Result<usize, AdmissionError> {
        if !(MIN_FACE..=MAX_FACE).contains(&face) {
            return Err(AdmissionError::InvalidFace(face));
        }
        match self.phase {
            Phase::Resolving => {}
            Phase::Idle => return Err(AdmissionError::NotRunning),
            _ => return Err(AdmissionError::NotResolving),
        }
        if let Some(player) = roller {
            if self.highest_bettor != Some(player) {
                return Err(AdmissionError::NotPrivilegedRoller(player.0));
            }
            if !self.manual_open {
                return Err(AdmissionError::RollWindowClosed);
            }
        }
        if self.collected_dice.len() >= DICE_PER_ROUND {
            return Err(AdmissionError::DiceComplete);
        }

        self.collected_dice.push(face);
        Ok(self.collected_dice.len())
    }

    pub fn dice_complete(&self) -> bool {
        self.collected_dice.len() >= DICE_PER_ROUND
    }

    /// The resolved triple once all three faces are in
    pub fn outcome(&self) -> Option<DieTriple> {
        match self.collected_dice.as_slice() {
            [a, b, c] => DieTriple::new(*a, *b, *c),
            _ => None,
        }
    }
}
