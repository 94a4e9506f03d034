//! Trend board of recent sums
//!
//! Sums fill a fixed grid column by column, top to bottom. A full board is
//! discarded on the next push.

use crate::games::types::BIG_THRESHOLD;
use serde::Serialize;

pub const BOARD_ROWS: usize = 6;
pub const BOARD_COLUMNS: usize = 14;
const BOARD_CELLS: usize = BOARD_ROWS * BOARD_COLUMNS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrendBoard {
    sums: Vec<u8>,
}

impl TrendBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sum: u8) {
        if self.is_full() {
            self.sums.clear();
        }
        self.sums.push(sum);
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.sums.len() >= BOARD_CELLS
    }

    /// Row-major view of the board; unfilled cells are `None`
    pub fn grid(&self) -> [[Option<u8>; BOARD_COLUMNS]; BOARD_ROWS] {
        let mut grid = [[None; BOARD_COLUMNS]; BOARD_ROWS];
        for (i, &sum) in self.sums.iter().enumerate() {
            grid[i % BOARD_ROWS][i / BOARD_ROWS] = Some(sum);
        }
        grid
    }

    pub fn big_count(&self) -> usize {
        self.sums.iter().filter(|&&s| s > BIG_THRESHOLD).count()
    }

    pub fn small_count(&self) -> usize {
        self.sums.len() - self.big_count()
    }

    pub fn latest(&self) -> Option<u8> {
        self.sums.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_column_major() {
        let mut board = TrendBoard::new();
        for sum in 3..=10 {
            board.push(sum);
        }
        let grid = board.grid();
        assert_eq!(grid[0][0], Some(3));
        assert_eq!(grid[5][0], Some(8));
        assert_eq!(grid[0][1], Some(9));
        assert_eq!(grid[1][1], Some(10));
        assert_eq!(grid[2][1], None);
        assert_eq!(board.big_count(), 1);
        assert_eq!(board.small_count(), 7);
    }

    #[test]
    fn test_full_board_starts_over() {
        let mut board = TrendBoard::new();
        for _ in 0..BOARD_CELLS {
            board.push(12);
        }
        assert!(board.is_full());

        board.push(4);
        assert_eq!(board.len(), 1);
        assert_eq!(board.latest(), Some(4));
        assert_eq!(board.grid()[0][0], Some(4));
    }
}
