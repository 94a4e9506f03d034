//! Bet kinds, odds, parsing and settlement

pub mod types;
pub mod odds;
pub mod parser;
pub mod arbiter;
pub mod ledger;
pub mod settlement;

pub use types::*;
pub use odds::{Evaluation, Odds, OddsTable};
pub use parser::{parse_bet, BetSlip};
pub use arbiter::{pick_roller, RollerDecision};
pub use ledger::BetLedger;
pub use settlement::{BetOutcome, Settlement, SettlementEntry};
