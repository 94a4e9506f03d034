//! Odds table and bet evaluator
//!
//! Pure functions from a bet and a resolved [`DieTriple`] to a win/loss
//! verdict and settlement amount. Odds are kept in integer hundredths so
//! every settlement is exact integer arithmetic; fractional wins are floored.

use crate::games::types::{Bet, BetKind, DieTriple};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payout multiplier in hundredths (`0.95` is stored as `95`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Odds(u32);

impl Odds {
    pub const ZERO: Odds = Odds(0);

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn whole(multiplier: u32) -> Self {
        Self(multiplier * 100)
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    /// Winnings for `stake`, floored to whole currency units
    pub fn apply(&self, stake: i64) -> i64 {
        stake.saturating_mul(self.0 as i64) / 100
    }
}

impl TryFrom<f64> for Odds {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value < 0.0 || value > 1_000_000.0 {
            return Err(format!("odds must be a finite non-negative multiplier, got {}", value));
        }
        Ok(Self((value * 100.0).round() as u32))
    }
}

impl From<Odds> for f64 {
    fn from(odds: Odds) -> Self {
        odds.0 as f64 / 100.0
    }
}

impl fmt::Display for Odds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}", self.0 / 100)
        } else {
            write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
        }
    }
}

/// One row of the sum table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumOdds {
    pub sum: u8,
    pub odds: Odds,
}

/// Per-bet-type multipliers; every entry can be overridden from config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsTable {
    pub size: Odds,
    pub size_parity: Odds,
    pub sum: Vec<SumOdds>,
    pub pair: Odds,
    pub exact_pair: Odds,
    pub straight: Odds,
    pub triple: Odds,
    pub exact_triple: Odds,
    pub fixed_position: Odds,
}

impl Default for OddsTable {
    fn default() -> Self {
        let sum = [
            (4, 50),
            (5, 18),
            (6, 14),
            (7, 12),
            (8, 8),
            (9, 6),
            (10, 6),
            (11, 6),
            (12, 6),
            (13, 8),
            (14, 12),
            (15, 14),
            (16, 18),
            (17, 50),
        ]
        .into_iter()
        .map(|(sum, multiplier)| SumOdds {
            sum,
            odds: Odds::whole(multiplier),
        })
        .collect();

        Self {
            size: Odds::from_hundredths(95),
            size_parity: Odds::from_hundredths(298),
            sum,
            pair: Odds::whole(11),
            exact_pair: Odds::whole(33),
            straight: Odds::whole(30),
            triple: Odds::whole(180),
            exact_triple: Odds::whole(300),
            fixed_position: Odds::whole(9),
        }
    }
}

/// Verdict for one bet against one outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub won: bool,
    pub odds: Odds,
    pub explanation: String,
}

/// Bets the evaluator cannot score at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Invalid bet payload: {0}")]
    InvalidPayload(String),

    #[error("No odds configured for sum {0}")]
    MissingSumOdds(u8),
}

impl OddsTable {
    pub fn sum_odds(&self, sum: u8) -> Option<Odds> {
        self.sum.iter().find(|row| row.sum == sum).map(|row| row.odds)
    }

    /// Multiplier a bet of this kind would pay on a win
    pub fn odds_for(&self, kind: &BetKind) -> Result<Odds, EvaluationError> {
        Ok(match kind {
            BetKind::Size { .. } => self.size,
            BetKind::SizeParity { .. } => self.size_parity,
            BetKind::Sum { target } => self
                .sum_odds(*target)
                .ok_or(EvaluationError::MissingSumOdds(*target))?,
            BetKind::Pair => self.pair,
            BetKind::ExactPair { .. } => self.exact_pair,
            BetKind::Straight => self.straight,
            BetKind::Triple => self.triple,
            BetKind::ExactTriple { .. } => self.exact_triple,
            BetKind::FixedPosition { .. } | BetKind::FixedPositionShorthand { .. } => {
                self.fixed_position
            }
            BetKind::Unrecognized { .. } => Odds::ZERO,
        })
    }

    /// Score `kind` against `outcome`
    pub fn evaluate(&self, kind: &BetKind, outcome: &DieTriple) -> Result<Evaluation, EvaluationError> {
        kind.validate().map_err(EvaluationError::InvalidPayload)?;
        let odds = self.odds_for(kind)?;

        let (won, explanation) = match kind {
            BetKind::Size { choice } => (
                outcome.size() == *choice,
                format!("sum {} is {}", outcome.sum(), outcome.size()),
            ),
            BetKind::SizeParity { size, parity } => (
                outcome.size() == *size && outcome.parity() == *parity,
                format!("sum {} is {}-{}", outcome.sum(), outcome.size(), outcome.parity()),
            ),
            BetKind::Sum { target } => (
                outcome.sum() == *target,
                format!("sum {} vs target {}", outcome.sum(), target),
            ),
            BetKind::Pair => (outcome.has_pair(), "any two dice equal".to_string()),
            BetKind::ExactPair { face } => (
                outcome.count(*face) >= 2,
                format!("{} dice show {}", outcome.count(*face), face),
            ),
            BetKind::Straight => (outcome.is_straight(), "three consecutive faces".to_string()),
            BetKind::Triple => (outcome.is_triple(), "all three dice equal".to_string()),
            BetKind::ExactTriple { face } => (
                outcome.count(*face) == 3,
                format!("{} dice show {}", outcome.count(*face), face),
            ),
            BetKind::FixedPosition { position, face } => {
                let shown = outcome.face_at(*position);
                (
                    shown == Some(*face),
                    format!("die {} shows {}", position, shown.unwrap_or_default()),
                )
            }
            BetKind::FixedPositionShorthand { position } => {
                let shown = outcome.face_at(*position);
                (
                    shown == Some(*position),
                    format!("die {} shows {}", position, shown.unwrap_or_default()),
                )
            }
            BetKind::Unrecognized { label } => {
                tracing::warn!(label = %label, "Unrecognized bet kind settles as a loss");
                (false, format!("unrecognized bet '{}' forfeits its stake", label))
            }
        };

        Ok(Evaluation {
            won,
            odds,
            explanation,
        })
    }
}

/// Signed balance change for a bet: `+floor(stake × odds)` on a win, `-stake` on a loss
pub fn settlement_amount(bet: &Bet, evaluation: &Evaluation) -> i64 {
    if evaluation.won {
        evaluation.odds.apply(bet.stake)
    } else {
        -bet.stake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::PlayerId;
    use crate::games::types::{Parity, SizeChoice};

    fn dice(a: u8, b: u8, c: u8) -> DieTriple {
        DieTriple::new(a, b, c).unwrap()
    }

    fn bet(kind: BetKind, stake: i64) -> Bet {
        Bet::new(PlayerId(1), kind, stake).unwrap()
    }

    fn settle(table: &OddsTable, kind: BetKind, stake: i64, outcome: DieTriple) -> i64 {
        let bet = bet(kind, stake);
        let evaluation = table.evaluate(&bet.kind, &outcome).unwrap();
        settlement_amount(&bet, &evaluation)
    }

    #[test]
    fn test_big_on_triple_four_floors_fractional_win() {
        let table = OddsTable::default();
        let kind = BetKind::Size {
            choice: SizeChoice::Big,
        };
        let evaluation = table.evaluate(&kind, &dice(4, 4, 4)).unwrap();
        assert!(evaluation.won);
        assert_eq!(evaluation.odds, Odds::from_hundredths(95));
        // 10 × 0.95 = 9.5, floored
        assert_eq!(settle(&table, kind, 10, dice(4, 4, 4)), 9);
    }

    #[test]
    fn test_sum_seven_pays_twelve() {
        let table = OddsTable::default();
        assert_eq!(settle(&table, BetKind::Sum { target: 7 }, 5, dice(2, 2, 3)), 60);
        assert_eq!(settle(&table, BetKind::Sum { target: 7 }, 5, dice(2, 2, 4)), -5);
    }

    #[test]
    fn test_small_boundary_is_nine() {
        let table = OddsTable::default();
        let small = BetKind::Size {
            choice: SizeChoice::Small,
        };
        assert!(table.evaluate(&small, &dice(3, 3, 3)).unwrap().won);
        assert!(!table.evaluate(&small, &dice(3, 3, 4)).unwrap().won);
    }

    #[test]
    fn test_size_parity_combinations() {
        let table = OddsTable::default();
        let outcome = dice(6, 5, 2); // 13, big-odd
        let cases = [
            (SizeChoice::Big, Parity::Odd, true),
            (SizeChoice::Big, Parity::Even, false),
            (SizeChoice::Small, Parity::Odd, false),
            (SizeChoice::Small, Parity::Even, false),
        ];
        for (size, parity, expected) in cases {
            let kind = BetKind::SizeParity { size, parity };
            assert_eq!(table.evaluate(&kind, &outcome).unwrap().won, expected);
        }
        // 100 × 2.98 = 298
        assert_eq!(
            settle(
                &table,
                BetKind::SizeParity {
                    size: SizeChoice::Big,
                    parity: Parity::Odd
                },
                100,
                outcome
            ),
            298
        );
    }

    #[test]
    fn test_pairs_triples_and_straights() {
        let table = OddsTable::default();
        assert_eq!(settle(&table, BetKind::Pair, 10, dice(2, 5, 2)), 110);
        assert_eq!(settle(&table, BetKind::Pair, 10, dice(1, 2, 3)), -10);
        assert_eq!(settle(&table, BetKind::ExactPair { face: 5 }, 10, dice(5, 1, 5)), 330);
        assert_eq!(settle(&table, BetKind::ExactPair { face: 4 }, 10, dice(5, 1, 5)), -10);
        assert_eq!(settle(&table, BetKind::Straight, 10, dice(4, 6, 5)), 300);
        assert_eq!(settle(&table, BetKind::Triple, 1, dice(6, 6, 6)), 180);
        assert_eq!(settle(&table, BetKind::ExactTriple { face: 6 }, 1, dice(6, 6, 6)), 300);
        assert_eq!(settle(&table, BetKind::ExactTriple { face: 5 }, 1, dice(6, 6, 6)), -1);
    }

    #[test]
    fn test_fixed_position_variants() {
        let table = OddsTable::default();
        let outcome = dice(3, 2, 6);
        assert_eq!(
            settle(&table, BetKind::FixedPosition { position: 3, face: 6 }, 10, outcome),
            90
        );
        assert_eq!(
            settle(&table, BetKind::FixedPosition { position: 1, face: 6 }, 10, outcome),
            -10
        );
        assert_eq!(
            settle(&table, BetKind::FixedPositionShorthand { position: 2 }, 10, outcome),
            90
        );
        assert_eq!(
            settle(&table, BetKind::FixedPositionShorthand { position: 1 }, 10, outcome),
            -10
        );
    }

    #[test]
    fn test_unrecognized_kind_loses_stake() {
        let table = OddsTable::default();
        let kind = BetKind::Unrecognized {
            label: "lucky7".to_string(),
        };
        let evaluation = table.evaluate(&kind, &dice(1, 2, 3)).unwrap();
        assert!(!evaluation.won);
        assert_eq!(settle(&table, kind, 25, dice(1, 2, 3)), -25);
    }

    #[test]
    fn test_invalid_payload_is_an_evaluation_error() {
        let table = OddsTable::default();
        let result = table.evaluate(&BetKind::ExactPair { face: 9 }, &dice(1, 1, 1));
        assert!(matches!(result, Err(EvaluationError::InvalidPayload(_))));
    }

    #[test]
    fn test_sum_table_is_symmetric() {
        let table = OddsTable::default();
        for sum in 4..=17u8 {
            assert_eq!(table.sum_odds(sum), table.sum_odds(21 - sum));
        }
        assert_eq!(table.sum_odds(4), Some(Odds::whole(50)));
        assert_eq!(table.sum_odds(10), Some(Odds::whole(6)));
    }

    #[test]
    fn test_odds_float_conversion() {
        assert_eq!(Odds::try_from(0.95).unwrap(), Odds::from_hundredths(95));
        assert_eq!(Odds::try_from(2.98).unwrap().to_string(), "2.98");
        assert_eq!(Odds::whole(12).to_string(), "12");
        assert!(Odds::try_from(-1.0).is_err());
        assert!(Odds::try_from(f64::NAN).is_err());
    }
}
