//! Round state machine
//!
//! - `state`: the per-chat [`Round`] value and its phase rules
//! - `table`: the driver task that runs rounds for one chat
//! - `manager`: one table per chat plus the player commands

pub mod manager;
pub mod state;
pub mod table;

pub use manager::TableManager;
pub use state::{Phase, Round};
pub use table::{Table, TableContext, TableStatus};
