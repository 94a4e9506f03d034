//! Error types for the dice table
//!
//! One enum per concern, rolled up into [`DiceError`] with `From` conversions
//! so callers can propagate with `?`.

use std::time::Duration;

/// Root error type for all dice table operations
#[derive(Debug, thiserror::Error)]
pub enum DiceError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Chat transport errors that survived the dispatcher
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Bet or dice submission rejected by the round
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// Bet notation could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Issue counter could not be read or advanced
    #[error("Issue counter error: {0}")]
    Issue(String),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

/// Failure reported by a single transport call
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The chat service asked us to slow down
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Timeout or connection failure
    #[error("Network failure: {0}")]
    Network(String),

    /// Permanent refusal (bad chat id, blocked bot); never retried
    #[error("Rejected by transport: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether the dispatcher should try again after this failure
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::Rejected(_))
    }
}

/// Outcome of a dispatch that never succeeded
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: TransportError },

    #[error("Permanent failure on attempt {attempt}: {error}")]
    Permanent { attempt: u32, error: TransportError },
}

impl DispatchError {
    /// Number of transport calls made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            DispatchError::Exhausted { attempts, .. } => *attempts,
            DispatchError::Permanent { attempt, .. } => *attempt,
        }
    }
}

/// Persistent store errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown player: {0}")]
    UnknownPlayer(u64),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Balance update failed: {0}")]
    BalanceUpdateFailed(String),

    #[error("Bet clear failed: {0}")]
    ClearFailed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a bet, cancellation or die submission is refused
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("No round is running for this chat")]
    NotRunning,

    #[error("Betting is closed for this round")]
    BettingClosed,

    #[error("Stake must be positive")]
    NonPositiveStake,

    #[error("Dice are not being collected")]
    NotResolving,

    #[error("Player {0} is not the privileged roller")]
    NotPrivilegedRoller(u64),

    #[error("The manual roll window has closed")]
    RollWindowClosed,

    #[error("All three dice have already been collected")]
    DiceComplete,

    #[error("Invalid die face: {0}")]
    InvalidFace(u8),

    #[error("A round is already running for this chat")]
    AlreadyRunning,

    #[error("Store refused the bet: {0}")]
    Store(#[from] StoreError),
}

/// Bet notation parse errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty bet")]
    Empty,

    #[error("Unknown bet keyword: {0}")]
    UnknownKeyword(String),

    #[error("Invalid stake: {0}")]
    InvalidStake(String),

    #[error("Invalid {what}: {value}")]
    InvalidArgument { what: &'static str, value: String },

    #[error("Wrong number of arguments for {keyword}")]
    Arity { keyword: String },
}

/// Convenience type alias for Results
pub type DiceResult<T> = Result<T, DiceError>;
