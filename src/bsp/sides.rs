use core::convert::Infallible;
use embedded_hal::digital::v2::InputPin;

use crate::utils::InfallibleResult;
use super::{NCOLS, NROWS};

/// Side of a half of a split-keyboard
#[derive(Debug, PartialEq, Eq, Clone, Copy, defmt::Format)]
pub enum BoardSide {
    Left,
    Right,
}

impl BoardSide {
    /// Board side can be determined via pull-up/down on a pin
    pub fn get(pin: impl InputPin<Error = Infallible>) -> Self {
        if pin.is_high().infallible() {
            Self::Left
        } else {
            Self::Right
        }
    }

    /// Check if global coordinates belong to this half
    pub const fn coordinates_valid(&self, row: u8, col: u8) -> bool {
        let (row, col) = ((row as usize), (col as usize));
        let col_valid = match self {
            Self::Left => col < NCOLS,
            Self::Right => col >= NCOLS && col < 2 * NCOLS,
        };
        row < NROWS && col_valid
    }

    /// Keyboard matrix coordinates have to be transformed to global representation
    ///
    /// Both halves are wired the same way with column 0 on the outer edge, so
    /// the right half gets mirrored.
    pub const fn transform_coordinates(&self, (row, col): (u8, u8)) -> (u8, u8) {
        let (row, col) = match self {
            Self::Left => (row, col),
            Self::Right => (row, 2 * NCOLS as u8 - 1 - col),
        };
        debug_assert!(self.coordinates_valid(row, col));
        (row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_no_coordinates_translation() {
        let side = BoardSide::Left;
        assert_eq!(side.transform_coordinates((0, 0)), (0, 0));
        assert_eq!(side.transform_coordinates((1, 3)), (1, 3));
        assert_eq!(side.transform_coordinates((3, 6)), (3, 6));
        assert_eq!(side.transform_coordinates((5, 2)), (5, 2));
    }

    #[test]
    fn right_coordinates_translation() {
        let side = BoardSide::Right;
        assert_eq!(side.transform_coordinates((0, 0)), (0, 13));
        assert_eq!(side.transform_coordinates((1, 3)), (1, 10));
        assert_eq!(side.transform_coordinates((3, 6)), (3, 7));
        assert_eq!(side.transform_coordinates((5, 2)), (5, 11));
    }

    type Range = std::ops::RangeInclusive<u8>;

    fn valid_coordinates(side: &BoardSide, rows: Range, cols: Range, valid: bool) {
        for row in rows {
            for col in cols.clone() {
                let result = side.coordinates_valid(row, col);
                assert_eq!(result, valid,
                   "{:?}, row={}, col={} => valid={} vs expected {}",
                   side, row, col, result, valid
               );
            }
        }
    }

    #[test]
    fn valid_coordinates_left() {
        let side = BoardSide::Left;
        valid_coordinates(&side, 0..=5, 0..=6, true);
        valid_coordinates(&side, 0..=5, 7..=14, false);
        // out of range
        valid_coordinates(&side, 6..=7, 0..=14, false);
    }

    #[test]
    fn valid_coordinates_right() {
        let side = BoardSide::Right;
        valid_coordinates(&side, 0..=5, 0..=6, false);
        valid_coordinates(&side, 0..=5, 7..=13, true);
        valid_coordinates(&side, 0..=5, 14..=15, false);
        // out of range
        valid_coordinates(&side, 6..=7, 0..=14, false);
    }

    #[test]
    fn transformed_coordinates_are_valid() {
        for side in [BoardSide::Left, BoardSide::Right] {
            for row in 0..NROWS as u8 {
                for col in 0..NCOLS as u8 {
                    let (r, c) = side.transform_coordinates((row, col));
                    assert!(side.coordinates_valid(r, c));
                }
            }
        }
    }
}
