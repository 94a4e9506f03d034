//! Dice Table - timed sic-bo style betting rounds for group chats
//!
//! Each chat gets a table that opens a betting window, lets the biggest
//! bettor throw the dice (or throws them itself), settles every bet against
//! the odds table and rolls straight into the next round.
//!
//! The chat service and the account database sit behind the
//! [`ChatTransport`] and [`BetStore`] traits.

pub mod common;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod games;
pub mod history;
pub mod issue;
pub mod metrics;
pub mod round;
pub mod storage;
pub mod transport;

pub use common::traits::{BetStore, ChatTransport};
pub use common::types::{ChatId, IssueId, PlayerAccount, PlayerId, RoundScope};
pub use config::{ConfigLoader, DiceConfig};
pub use dispatcher::{ResilientDispatcher, RolledDie};
pub use errors::{
    AdmissionError, ConfigurationError, DiceError, DiceResult, DispatchError, ParseError,
    StoreError, TransportError,
};
pub use games::{
    parse_bet, pick_roller, Bet, BetKind, BetLedger, DieTriple, OddsTable, RollerDecision,
    Settlement, SettlementEntry,
};
pub use history::TrendBoard;
pub use issue::IssueSequence;
pub use metrics::{MetricsSnapshot, RoundMetrics};
pub use round::{Phase, Table, TableManager, TableStatus};
pub use storage::MemoryStore;
pub use transport::{ConsoleTransport, RecordingTransport};
