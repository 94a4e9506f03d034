use crate::common::types::{current_timestamp_ms, PlayerId};
use crate::errors::AdmissionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest and highest die face
pub const MIN_FACE: u8 = 1;
pub const MAX_FACE: u8 = 6;

/// Sums a sum bet may target; 3 and 18 are only reachable as triples
pub const MIN_SUM_TARGET: u8 = 4;
pub const MAX_SUM_TARGET: u8 = 17;

/// Sums above this are "big"
pub const BIG_THRESHOLD: u8 = 9;

/// Big/small classification of a sum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SizeChoice {
    Big,
    Small,
}

impl fmt::Display for SizeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeChoice::Big => write!(f, "big"),
            SizeChoice::Small => write!(f, "small"),
        }
    }
}

/// Odd/even classification of a sum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

/// What a bet is on, with the payload each rule needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BetKind {
    /// Sum above or at/below 9
    Size { choice: SizeChoice },
    /// Size and parity together (big-odd, big-even, small-odd, small-even)
    SizeParity { size: SizeChoice, parity: Parity },
    /// Exact sum, 4..=17
    Sum { target: u8 },
    /// Any two dice equal
    Pair,
    /// At least two dice showing `face`
    ExactPair { face: u8 },
    /// Sorted faces are consecutive
    Straight,
    /// All three dice equal
    Triple,
    /// All three dice showing `face`
    ExactTriple { face: u8 },
    /// Die at `position` (1..=3) shows `face`
    FixedPosition { position: u8, face: u8 },
    /// Die at `position` shows the face equal to the position
    FixedPositionShorthand { position: u8 },
    /// Anything the admission layer could not classify; always loses
    Unrecognized { label: String },
}

impl BetKind {
    /// Stable key for the odds table and reports
    pub fn label(&self) -> &'static str {
        match self {
            BetKind::Size { .. } => "size",
            BetKind::SizeParity { .. } => "size_parity",
            BetKind::Sum { .. } => "sum",
            BetKind::Pair => "pair",
            BetKind::ExactPair { .. } => "exact_pair",
            BetKind::Straight => "straight",
            BetKind::Triple => "triple",
            BetKind::ExactTriple { .. } => "exact_triple",
            BetKind::FixedPosition { .. } => "fixed_position",
            BetKind::FixedPositionShorthand { .. } => "fixed_position_shorthand",
            BetKind::Unrecognized { .. } => "unrecognized",
        }
    }

    /// Check the payload ranges. Unrecognized kinds are valid: they simply lose.
    pub fn validate(&self) -> Result<(), String> {
        let face_ok = |face: u8| (MIN_FACE..=MAX_FACE).contains(&face);
        let position_ok = |position: u8| (1..=3).contains(&position);
        match self {
            BetKind::Sum { target } if !(MIN_SUM_TARGET..=MAX_SUM_TARGET).contains(target) => {
                Err(format!("sum target {} outside {}..={}", target, MIN_SUM_TARGET, MAX_SUM_TARGET))
            }
            BetKind::ExactPair { face } | BetKind::ExactTriple { face } if !face_ok(*face) => {
                Err(format!("face {} outside 1..=6", face))
            }
            BetKind::FixedPosition { position, face } => {
                if !position_ok(*position) {
                    Err(format!("position {} outside 1..=3", position))
                } else if !face_ok(*face) {
                    Err(format!("face {} outside 1..=6", face))
                } else {
                    Ok(())
                }
            }
            BetKind::FixedPositionShorthand { position } if !position_ok(*position) => {
                Err(format!("position {} outside 1..=3", position))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for BetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKind::Size { choice } => write!(f, "{}", choice),
            BetKind::SizeParity { size, parity } => write!(f, "{}-{}", size, parity),
            BetKind::Sum { target } => write!(f, "sum {}", target),
            BetKind::Pair => write!(f, "pair"),
            BetKind::ExactPair { face } => write!(f, "pair of {}", face),
            BetKind::Straight => write!(f, "straight"),
            BetKind::Triple => write!(f, "triple"),
            BetKind::ExactTriple { face } => write!(f, "triple {}", face),
            BetKind::FixedPosition { position, face } => {
                write!(f, "die {} shows {}", position, face)
            }
            BetKind::FixedPositionShorthand { position } => {
                write!(f, "die {} shows {}", position, position)
            }
            BetKind::Unrecognized { label } => write!(f, "unrecognized '{}'", label),
        }
    }
}

/// An admitted bet. Immutable once placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    pub owner: PlayerId,
    #[serde(flatten)]
    pub kind: BetKind,
    pub stake: i64,
    pub placed_at: u64,
}

impl Bet {
    pub fn new(owner: PlayerId, kind: BetKind, stake: i64) -> Result<Self, AdmissionError> {
        if stake <= 0 {
            return Err(AdmissionError::NonPositiveStake);
        }
        Ok(Self {
            owner,
            kind,
            stake,
            placed_at: current_timestamp_ms(),
        })
    }
}

/// The three resolved faces of a round, in roll order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DieTriple([u8; 3]);

impl DieTriple {
    /// Build from three faces; `None` if any face is outside 1..=6
    pub fn new(first: u8, second: u8, third: u8) -> Option<Self> {
        Self::from_faces([first, second, third])
    }

    pub fn from_faces(faces: [u8; 3]) -> Option<Self> {
        if faces.iter().all(|f| (MIN_FACE..=MAX_FACE).contains(f)) {
            Some(Self(faces))
        } else {
            None
        }
    }

    pub fn faces(&self) -> [u8; 3] {
        self.0
    }

    /// Face at 1-based position
    pub fn face_at(&self, position: u8) -> Option<u8> {
        match position {
            1..=3 => Some(self.0[(position - 1) as usize]),
            _ => None,
        }
    }

    pub fn sum(&self) -> u8 {
        self.0.iter().sum()
    }

    pub fn size(&self) -> SizeChoice {
        if self.sum() > BIG_THRESHOLD {
            SizeChoice::Big
        } else {
            SizeChoice::Small
        }
    }

    pub fn parity(&self) -> Parity {
        if self.sum() % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }

    pub fn count(&self, face: u8) -> usize {
        self.0.iter().filter(|&&f| f == face).count()
    }

    pub fn is_triple(&self) -> bool {
        self.0[0] == self.0[1] && self.0[1] == self.0[2]
    }

    pub fn has_pair(&self) -> bool {
        self.0[0] == self.0[1] || self.0[0] == self.0[2] || self.0[1] == self.0[2]
    }

    pub fn is_straight(&self) -> bool {
        let mut sorted = self.0;
        sorted.sort_unstable();
        sorted[1] == sorted[0] + 1 && sorted[2] == sorted[1] + 1
    }
}

impl fmt::Display for DieTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}+{}+{}={} ({}, {})",
            self.0[0],
            self.0[1],
            self.0[2],
            self.sum(),
            self.size(),
            self.parity()
        )
    }
}
