//! Bet notation parser
//!
//! Turns chat text such as `dd 50`, `hz 7 20` or `2y 10` into a [`BetSlip`].
//! Both the ASCII shorthand and the Chinese keywords are accepted.

use crate::errors::ParseError;
use crate::games::types::{
    BetKind, Parity, SizeChoice, MAX_FACE, MAX_SUM_TARGET, MIN_FACE, MIN_SUM_TARGET,
};

/// A parsed but not yet admitted bet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetSlip {
    pub kind: BetKind,
    pub stake: i64,
}

enum Keyword {
    Size(SizeChoice),
    SizeParity(SizeChoice, Parity),
    Sum,
    Pair,
    Straight,
    Triple,
    FixedPosition,
}

fn keyword(token: &str) -> Option<Keyword> {
    let keyword = match token.to_lowercase().as_str() {
        "big" | "d" | "da" | "大" => Keyword::Size(SizeChoice::Big),
        "small" | "x" | "xiao" | "小" => Keyword::Size(SizeChoice::Small),
        "dd" | "dadan" | "大单" => Keyword::SizeParity(SizeChoice::Big, Parity::Odd),
        "ds" | "dashuang" | "大双" => Keyword::SizeParity(SizeChoice::Big, Parity::Even),
        "xd" | "xiaodan" | "小单" => Keyword::SizeParity(SizeChoice::Small, Parity::Odd),
        "xs" | "xiaoshuang" | "小双" => Keyword::SizeParity(SizeChoice::Small, Parity::Even),
        "hz" | "sum" | "和值" => Keyword::Sum,
        "dz" | "pair" | "对子" => Keyword::Pair,
        "sz" | "straight" | "顺子" => Keyword::Straight,
        "bz" | "triple" | "豹子" => Keyword::Triple,
        "dwd" | "定位胆" => Keyword::FixedPosition,
        _ => return None,
    };
    Some(keyword)
}

fn parse_stake(token: &str) -> Result<i64, ParseError> {
    match token.parse::<i64>() {
        Ok(stake) if stake > 0 => Ok(stake),
        _ => Err(ParseError::InvalidStake(token.to_string())),
    }
}

fn parse_in_range(
    token: &str,
    what: &'static str,
    range: std::ops::RangeInclusive<u8>,
) -> Result<u8, ParseError> {
    match token.parse::<u8>() {
        Ok(value) if range.contains(&value) => Ok(value),
        _ => Err(ParseError::InvalidArgument {
            what,
            value: token.to_string(),
        }),
    }
}

/// Split a leading keyword glued to its first argument, e.g. `hz7` or `大100`
fn split_glued(token: &str) -> Option<(&str, &str)> {
    let idx = token.find(|c: char| c.is_ascii_digit())?;
    if idx == 0 {
        return None;
    }
    Some((&token[..idx], &token[idx..]))
}

/// Parse one bet from free text
pub fn parse_bet(text: &str) -> Result<BetSlip, ParseError> {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    // Fixed-position shorthand: `<pos>y <stake>` or `<pos> y <stake>`
    if let Some(slip) = parse_position_shorthand(&tokens)? {
        return Ok(slip);
    }

    if keyword(tokens[0]).is_none() {
        if let Some((head, tail)) = split_glued(tokens[0]) {
            if keyword(head).is_some() {
                tokens[0] = tail;
                tokens.insert(0, head);
            }
        }
    }

    let head = tokens[0];
    let args = &tokens[1..];
    let parsed = keyword(head).ok_or_else(|| ParseError::UnknownKeyword(head.to_string()))?;
    let arity = || ParseError::Arity {
        keyword: head.to_string(),
    };

    let slip = match parsed {
        Keyword::Size(choice) => match args {
            [stake] => BetSlip {
                kind: BetKind::Size { choice },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::SizeParity(size, parity) => match args {
            [stake] => BetSlip {
                kind: BetKind::SizeParity { size, parity },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::Sum => match args {
            [target, stake] => BetSlip {
                kind: BetKind::Sum {
                    target: parse_in_range(target, "sum target", MIN_SUM_TARGET..=MAX_SUM_TARGET)?,
                },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::Pair => match args {
            [stake] => BetSlip {
                kind: BetKind::Pair,
                stake: parse_stake(stake)?,
            },
            [face, stake] => BetSlip {
                kind: BetKind::ExactPair {
                    face: parse_in_range(face, "face", MIN_FACE..=MAX_FACE)?,
                },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::Straight => match args {
            [stake] => BetSlip {
                kind: BetKind::Straight,
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::Triple => match args {
            [stake] => BetSlip {
                kind: BetKind::Triple,
                stake: parse_stake(stake)?,
            },
            [face, stake] => BetSlip {
                kind: BetKind::ExactTriple {
                    face: parse_in_range(face, "face", MIN_FACE..=MAX_FACE)?,
                },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
        Keyword::FixedPosition => match args {
            [position, face, stake] => BetSlip {
                kind: BetKind::FixedPosition {
                    position: parse_in_range(position, "position", 1..=3)?,
                    face: parse_in_range(face, "face", MIN_FACE..=MAX_FACE)?,
                },
                stake: parse_stake(stake)?,
            },
            _ => return Err(arity()),
        },
    };

    Ok(slip)
}

fn parse_position_shorthand(tokens: &[&str]) -> Result<Option<BetSlip>, ParseError> {
    let (position, stake) = match tokens {
        [glued, stake] if glued.len() == 2 && glued.to_lowercase().ends_with('y') => {
            (&glued[..1], *stake)
        }
        [position, y, stake] if y.eq_ignore_ascii_case("y") => (*position, *stake),
        _ => return Ok(None),
    };
    if !position.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    Ok(Some(BetSlip {
        kind: BetKind::FixedPositionShorthand {
            position: parse_in_range(position, "position", 1..=3)?,
        },
        stake: parse_stake(stake)?,
    }))
}
