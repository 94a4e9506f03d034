//! End-to-end round tests in virtual time
//!
//! Timings come from `DiceConfig::fast_testing()`: 5s betting window, 5s roll
//! window, 1s result pause and 100ms between automated dice.

use dice_table::{
    AdmissionError, BetKind, BetStore, ChatId, DiceConfig, DiceError, IssueId, IssueSequence,
    MemoryStore, Phase, PlayerId, RecordingTransport, RoundScope, TableManager,
};
use dice_table::games::types::SizeChoice;
use dice_table::transport::Sent;
use std::sync::Arc;
use std::time::Duration;

const CHAT: ChatId = ChatId(-42);
const ANN: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);

struct Harness {
    manager: TableManager,
    store: Arc<MemoryStore>,
    transport: Arc<RecordingTransport>,
}

fn harness_with(config: DiceConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::new());
    let manager = TableManager::new(config, store.clone(), transport.clone());
    Harness {
        manager,
        store,
        transport,
    }
}

/// Harness whose issue counter lives in a file, so opening a round yields
async fn persisted_harness(dir: &tempfile::TempDir) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::new());
    let manager = TableManager::with_issues(
        DiceConfig::fast_testing(),
        store.clone(),
        transport.clone(),
        IssueSequence::persisted(dir.path().join("issue_counter")),
    );
    manager.register_player(ANN, "ann").await.unwrap();
    manager.register_player(BOB, "bob").await.unwrap();
    Harness {
        manager,
        store,
        transport,
    }
}

async fn harness() -> Harness {
    let h = harness_with(DiceConfig::fast_testing());
    h.manager.register_player(ANN, "ann").await.unwrap();
    h.manager.register_player(BOB, "bob").await.unwrap();
    h
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

fn big() -> BetKind {
    BetKind::Size {
        choice: SizeChoice::Big,
    }
}

fn small() -> BetKind {
    BetKind::Size {
        choice: SizeChoice::Small,
    }
}

impl Harness {
    async fn balance(&self, player: PlayerId) -> (i64, i64) {
        let account = self.manager.balance(player).await.unwrap();
        (account.balance, account.reserved)
    }

    fn said(&self, needle: &str) -> bool {
        self.transport.texts(CHAT).iter().any(|t| t.contains(needle))
    }
}

#[tokio::test(start_paused = true)]
async fn tied_round_uses_house_dice_settles_and_reopens() {
    let h = harness().await;
    h.transport.script_faces([4, 4, 4]);

    assert_eq!(h.manager.start_round(CHAT).await.unwrap(), IssueId(1));
    h.manager.submit_bet(CHAT, ANN, big(), 100).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 100).await.unwrap();
    assert_eq!(h.balance(ANN).await, (1000, 100));

    advance(7_000).await;

    assert_eq!(h.transport.dice(CHAT), vec![4, 4, 4]);
    // 100 x 0.95 on big, stake lost on small
    assert_eq!(h.balance(ANN).await, (1095, 0));
    assert_eq!(h.balance(BOB).await, (900, 0));

    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.issue, IssueId(2));
    assert_eq!(status.phase, Phase::BettingOpen);
    assert_eq!(status.bets, 0);

    assert!(h.said("tied"));
    assert!(h.said("result"));
    let trend = h.manager.table(CHAT).trend().await;
    assert_eq!(trend.latest(), Some(12));

    let metrics = h.manager.metrics();
    assert_eq!(metrics.rounds_opened, 2);
    assert_eq!(metrics.rounds_settled, 1);
    assert_eq!(metrics.bets_admitted, 2);

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_round_rolls_over_without_dice() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();

    advance(6_000).await;

    assert!(h.transport.dice(CHAT).is_empty());
    assert_eq!(h.transport.die_attempts(), 0);
    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.issue, IssueId(2));
    assert_eq!(status.phase, Phase::BettingOpen);
    assert!(h.manager.table(CHAT).trend().await.is_empty());

    let metrics = h.manager.metrics();
    assert_eq!(metrics.empty_rounds, 1);
    assert_eq!(metrics.rounds_settled, 0);

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn privileged_roller_supplies_all_three_dice() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, BetKind::Pair, 80).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 50).await.unwrap();

    advance(5_500).await;
    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.phase, Phase::Resolving);
    assert_eq!(status.highest_bettor, Some(ANN));

    let refused = h.manager.submit_die_face(CHAT, BOB, 2).await;
    assert!(matches!(
        refused,
        Err(DiceError::Admission(AdmissionError::NotPrivilegedRoller(2)))
    ));
    assert!(h.manager.table(CHAT).status().await.collected_dice.is_empty());

    assert_eq!(h.manager.submit_die_face(CHAT, ANN, 6).await.unwrap(), 1);
    assert_eq!(h.manager.submit_die_face(CHAT, ANN, 6).await.unwrap(), 2);
    assert_eq!(h.manager.submit_die_face(CHAT, ANN, 5).await.unwrap(), 3);

    advance(2_000).await;

    assert!(h.transport.dice(CHAT).is_empty());
    // pair pays 11x; 6+6+5 = 17 is big
    assert_eq!(h.balance(ANN).await, (1880, 0));
    assert_eq!(h.balance(BOB).await, (950, 0));
    assert_eq!(h.manager.table(CHAT).status().await.issue, IssueId(2));

    let late = h.manager.submit_die_face(CHAT, ANN, 1).await;
    assert!(matches!(late, Err(DiceError::Admission(AdmissionError::NotResolving))));

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn roll_window_timeout_falls_back_to_house_dice() {
    let h = harness().await;
    h.transport.script_faces([1, 2]);
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, BetKind::Straight, 10).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 5).await.unwrap();

    advance(6_000).await;
    h.manager.submit_die_face(CHAT, ANN, 3).await.unwrap();

    advance(3_000).await;
    // still inside the roll window
    assert_eq!(h.manager.table(CHAT).status().await.collected_dice, vec![3]);
    assert!(h.transport.dice(CHAT).is_empty());

    advance(3_000).await;

    assert_eq!(h.transport.dice(CHAT), vec![1, 2]);
    let refused = h.manager.submit_die_face(CHAT, ANN, 4).await;
    assert!(refused.is_err());
    // 3,1,2 is a straight (30x); sum 6 is small, 5 x 0.95 floors to 4
    assert_eq!(h.balance(ANN).await, (1300, 0));
    assert_eq!(h.balance(BOB).await, (1004, 0));
    assert_eq!(h.manager.table(CHAT).status().await.issue, IssueId(2));

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_bets_are_rejected_once_resolving() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, big(), 30).await.unwrap();

    advance(6_000).await;

    let late = h.manager.submit_bet(CHAT, BOB, big(), 10).await;
    assert!(matches!(late, Err(DiceError::Admission(AdmissionError::BettingClosed))));
    let cancel = h.manager.cancel_bets(CHAT, ANN).await;
    assert!(matches!(cancel, Err(DiceError::Admission(AdmissionError::BettingClosed))));
    assert_eq!(h.manager.table(CHAT).status().await.bets, 1);
    assert_eq!(h.balance(BOB).await, (1000, 0));
    assert_eq!(h.manager.metrics().bets_rejected, 1);

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_during_betting_discards_bets() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, big(), 30).await.unwrap();

    advance(2_000).await;
    h.manager.stop_round(CHAT).await.unwrap();
    let sent_at_stop = h.transport.sent().len();

    assert_eq!(h.balance(ANN).await, (1000, 0));
    assert!(h.store.scopes().await.is_empty());
    assert_eq!(h.manager.table(CHAT).status().await.phase, Phase::Idle);

    advance(30_000).await;
    assert_eq!(h.transport.sent().len(), sent_at_stop);
    assert!(h.transport.dice(CHAT).is_empty());

    let after = h.manager.submit_bet(CHAT, ANN, big(), 10).await;
    assert!(matches!(after, Err(DiceError::Admission(AdmissionError::NotRunning))));
}

#[tokio::test(start_paused = true)]
async fn stop_during_resolving_discards_partial_dice() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, big(), 40).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, big(), 10).await.unwrap();

    advance(6_000).await;
    h.manager.submit_die_face(CHAT, ANN, 5).await.unwrap();
    h.manager.stop_round(CHAT).await.unwrap();

    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.phase, Phase::Idle);
    assert!(status.collected_dice.is_empty());
    assert_eq!(h.balance(ANN).await, (1000, 0));
    assert_eq!(h.balance(BOB).await, (1000, 0));
    assert_eq!(h.manager.metrics().rounds_settled, 0);

    // A restart opens a fresh issue
    assert_eq!(h.manager.start_round(CHAT).await.unwrap(), IssueId(2));
    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_still_announces_and_rolls_over() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, big(), 100).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 100).await.unwrap();
    h.store.set_fail_balance_updates(true);

    advance(7_000).await;

    assert!(h.said("result"));
    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.issue, IssueId(2));
    assert_eq!(status.phase, Phase::BettingOpen);
    assert_eq!(h.manager.metrics().settlement_failures, 1);

    // Balances untouched, first round's bets kept for reconciliation
    assert_eq!(h.balance(ANN).await, (1000, 100));
    assert_eq!(h.balance(BOB).await, (1000, 100));
    let first_round = RoundScope::new(CHAT, IssueId(1));
    assert_eq!(h.store.open_bets(first_round).await.unwrap().len(), 2);

    h.store.set_fail_balance_updates(false);
    h.manager.submit_bet(CHAT, ANN, big(), 900).await.unwrap();
    let over = h.manager.submit_bet(CHAT, ANN, big(), 1).await;
    assert!(over.is_err());

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn opening_uses_configured_animation() {
    let mut config = DiceConfig::fast_testing();
    config.round.opening_animation = Some("intro.gif".to_string());
    let h = harness_with(config);

    h.manager.start_round(CHAT).await.unwrap();
    advance(100).await;

    let first = h.transport.sent().into_iter().next();
    assert!(matches!(
        first,
        Some(Sent::Animation { ref file, .. }) if file == "intro.gif"
    ));
    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn chats_run_independent_rounds() {
    let h = harness().await;
    let other = ChatId(-7);
    // issue numbers are per chat
    assert_eq!(h.manager.start_round(CHAT).await.unwrap(), IssueId(1));
    assert_eq!(h.manager.start_round(other).await.unwrap(), IssueId(1));
    h.manager.submit_bet(CHAT, ANN, big(), 10).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 10).await.unwrap();

    advance(7_000).await;

    assert_eq!(h.transport.dice(CHAT).len(), 3);
    assert!(h.transport.dice(other).is_empty());
    assert_eq!(h.manager.metrics().empty_rounds, 1);
    assert_eq!(h.manager.metrics().rounds_settled, 1);
    assert_eq!(h.manager.table(CHAT).status().await.issue, IssueId(2));
    assert_eq!(h.manager.table(other).status().await.issue, IssueId(2));

    h.manager.stop_round(CHAT).await.unwrap();
    assert!(h.manager.table(other).is_running().await);
    h.manager.stop_round(other).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn bet_text_round_trip_through_manager() {
    let h = harness().await;
    h.transport.script_faces([2, 2, 3]);
    h.manager.start_round(CHAT).await.unwrap();

    h.manager
        .submit_bet_text(CHAT, PlayerId(9), "cat", "hz 7 5")
        .await
        .unwrap();
    assert_eq!(h.manager.player_bets(CHAT, PlayerId(9)).await.unwrap().len(), 1);
    assert_eq!(h.manager.roster(CHAT).await.unwrap(), vec![(PlayerId(9), 5)]);

    advance(7_000).await;

    // single bettor rolls by hand; after the window the house throws 2,2,3
    assert_eq!(h.transport.dice(CHAT), Vec::<u8>::new());
    advance(5_000).await;
    assert_eq!(h.transport.dice(CHAT), vec![2, 2, 3]);
    // sum 7 pays 12x
    assert_eq!(h.balance(PlayerId(9)).await, (1060, 0));

    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn racing_dice_never_exceed_three() {
    let h = harness().await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, BetKind::Pair, 80).await.unwrap();
    h.manager.submit_bet(CHAT, BOB, small(), 50).await.unwrap();
    advance(5_500).await;

    h.manager.submit_die_face(CHAT, ANN, 3).await.unwrap();
    h.manager.submit_die_face(CHAT, ANN, 3).await.unwrap();
    let (first, second) = tokio::join!(
        h.manager.submit_die_face(CHAT, ANN, 1),
        h.manager.submit_die_face(CHAT, ANN, 6),
    );

    let accepted: Vec<usize> = [&first, &second]
        .into_iter()
        .filter_map(|r| r.as_ref().ok().copied())
        .collect();
    assert_eq!(accepted, vec![3]);
    let refused = if first.is_ok() { second } else { first };
    assert!(matches!(
        refused,
        Err(DiceError::Admission(
            AdmissionError::DiceComplete | AdmissionError::RollWindowClosed
        ))
    ));

    advance(2_000).await;
    assert!(h.transport.dice(CHAT).is_empty());
    assert!(h.said("3+3+"));
    assert_eq!(h.manager.metrics().rounds_settled, 1);
    h.manager.stop_round(CHAT).await.unwrap();
}

#[tokio::test]
async fn concurrent_starts_open_a_single_round() {
    let dir = tempfile::tempdir().unwrap();
    let h = persisted_harness(&dir).await;

    let ((first, bet), second) = tokio::join!(
        async {
            let issue = h.manager.start_round(CHAT).await;
            let bet = h.manager.submit_bet(CHAT, ANN, big(), 100).await;
            (issue, bet)
        },
        h.manager.start_round(CHAT),
    );

    let issues: Vec<IssueId> = [&first, &second]
        .into_iter()
        .filter_map(|r| r.as_ref().ok().copied())
        .collect();
    assert_eq!(issues, vec![IssueId(1)]);
    let refused = if first.is_ok() { second } else { first };
    assert!(matches!(
        refused,
        Err(DiceError::Admission(AdmissionError::AlreadyRunning))
    ));
    bet.unwrap();

    let status = h.manager.table(CHAT).status().await;
    assert_eq!(status.issue, IssueId(1));
    assert_eq!(status.phase, Phase::BettingOpen);
    assert_eq!(status.bets, 1);
    assert_eq!(h.manager.metrics().rounds_opened, 1);
    assert_eq!(h.balance(ANN).await, (1000, 100));
    assert_eq!(h.store.bet_count(RoundScope::new(CHAT, IssueId(1))).await, 1);

    h.manager.stop_round(CHAT).await.unwrap();
    assert_eq!(h.balance(ANN).await, (1000, 0));
}

#[tokio::test]
async fn stop_and_start_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let h = persisted_harness(&dir).await;
    h.manager.start_round(CHAT).await.unwrap();
    h.manager.submit_bet(CHAT, ANN, big(), 100).await.unwrap();

    let (stopped, restarted) = tokio::join!(
        h.manager.stop_round(CHAT),
        h.manager.start_round(CHAT),
    );
    stopped.unwrap();

    let table = h.manager.table(CHAT);
    let status = table.status().await;
    // the stopped round's reservation is always released
    assert_eq!(h.balance(ANN).await, (1000, 0));
    match restarted {
        Ok(issue) => {
            assert_eq!(issue, IssueId(2));
            assert!(table.is_running().await);
            assert_eq!(status.phase, Phase::BettingOpen);
            assert_eq!(status.issue, IssueId(2));

            h.manager.submit_bet(CHAT, BOB, small(), 40).await.unwrap();
            assert_eq!(h.balance(BOB).await, (1000, 40));
            h.manager.stop_round(CHAT).await.unwrap();
        }
        Err(e) => {
            assert!(matches!(
                e,
                DiceError::Admission(AdmissionError::AlreadyRunning)
            ));
            assert!(!table.is_running().await);
            assert_eq!(status.phase, Phase::Idle);
        }
    }
    assert!(!table.is_running().await);
}
