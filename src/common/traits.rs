//! Interfaces to the external collaborators
//!
//! The round engine never talks to a chat service or a database directly;
//! it goes through these two traits so each can be swapped or mocked.

use crate::common::types::{ChatId, PlayerAccount, PlayerId, RoundScope};
use crate::errors::{StoreError, TransportError};
use crate::games::settlement::SettlementEntry;
use crate::games::types::Bet;
use async_trait::async_trait;

/// Outbound side of the chat service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a text message to a chat
    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    /// Post an animation (GIF/video by file id or URL) with a caption
    async fn send_animation(
        &self,
        chat: ChatId,
        file: &str,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Throw a die in the chat and report the face it landed on
    async fn send_die(&self, chat: ChatId) -> Result<u8, TransportError>;
}

/// Persistent accounts and open bets
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Create the account with `default_balance` if it does not exist.
    /// Returns the account and whether it was newly created.
    async fn ensure_player(
        &self,
        player: PlayerId,
        name: &str,
        default_balance: i64,
    ) -> Result<(PlayerAccount, bool), StoreError>;

    async fn player_account(&self, player: PlayerId) -> Result<PlayerAccount, StoreError>;

    async fn player_balance(&self, player: PlayerId) -> Result<i64, StoreError> {
        Ok(self.player_account(player).await?.balance)
    }

    /// All accounts, in no particular order
    async fn accounts(&self) -> Result<Vec<PlayerAccount>, StoreError>;

    /// Persist a bet, reserving its stake against the owner's available balance
    async fn place_bet(&self, scope: RoundScope, bet: &Bet) -> Result<(), StoreError>;

    async fn open_bets(&self, scope: RoundScope) -> Result<Vec<Bet>, StoreError>;

    /// Remove and return a player's bets in `scope`, releasing their reservation
    async fn withdraw_bets(&self, scope: RoundScope, player: PlayerId)
        -> Result<Vec<Bet>, StoreError>;

    async fn apply_balance_deltas(&self, deltas: &[SettlementEntry]) -> Result<(), StoreError>;

    /// Drop every bet in `scope`; clearing an empty scope succeeds
    async fn clear_bets(&self, scope: RoundScope) -> Result<(), StoreError>;

    /// Apply deltas then clear the scope as one logical transaction.
    ///
    /// Stores with real transactions should override this. The default
    /// compensates a failed clear by applying the negated deltas.
    async fn commit_settlement(
        &self,
        scope: RoundScope,
        deltas: &[SettlementEntry],
    ) -> Result<(), StoreError> {
        self.apply_balance_deltas(deltas).await?;

        if let Err(clear_error) = self.clear_bets(scope).await {
            let reversal: Vec<SettlementEntry> = deltas
                .iter()
                .map(|d| SettlementEntry {
                    player_id: d.player_id,
                    signed_amount: -d.signed_amount,
                })
                .collect();
            if let Err(rollback_error) = self.apply_balance_deltas(&reversal).await {
                tracing::error!(
                    scope = %scope,
                    error = %rollback_error,
                    "Rollback of balance deltas failed; balances and bets are out of step"
                );
            }
            return Err(clear_error);
        }

        Ok(())
    }
}
