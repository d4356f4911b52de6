use keyberon::{matrix, debounce, layout};

use crate::bsp::{NCOLS, NROWS, ColPin, RowPin, sides::BoardSide};
use crate::utils::InfallibleResult;

/// Keyboard key matrix scanner
pub struct Keys {
    matrix: matrix::Matrix<ColPin, RowPin, NCOLS, NROWS>,
    debouncer: debounce::Debouncer<matrix::PressedKeys<NCOLS, NROWS>>,
    side: BoardSide,
}

impl Keys {
    /// Initialize key matrix scanner with debouncing that requires `debounce_cnt` stable states
    pub fn new(
        side: BoardSide,
        cols: [ColPin; NCOLS],
        rows: [RowPin; NROWS],
        debounce_cnt: u16,
    ) -> Self {
        let released = matrix::PressedKeys::default;
        Self {
            side,
            matrix: matrix::Matrix::new(cols, rows).infallible(),
            debouncer: debounce::Debouncer::new(released(), released(), debounce_cnt),
        }
    }

    /// Scan for key events in global coordinates
    pub fn scan(&mut self) -> impl Iterator<Item = layout::Event> + '_ {
        let scan = self.matrix.get().infallible();
        let side = self.side;
        self.debouncer.events(scan)
            .map(move |e| e.transform(|i, j| side.transform_coordinates((i, j))))
    }

    pub fn side(&self) -> BoardSide {
        self.side
    }
}
