//! Core domain types for the mirrored tic-tac-toe board.

use super::position::Position;
use crate::protocol::DecodeError;
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Marker a player places on the board.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
pub enum Mark {
    /// Player X (first to join).
    X,
    /// Player O.
    O,
}

impl Mark {
    /// Parses the server's symbol string.
    ///
    /// The empty string means "no symbol" and yields `Ok(None)`.
    #[instrument]
    pub fn from_wire(symbol: &str) -> Result<Option<Self>, DecodeError> {
        match symbol {
            "" => Ok(None),
            "X" => Ok(Some(Mark::X)),
            "O" => Ok(Some(Mark::O)),
            other => Err(DecodeError::new(format!("Unknown symbol {:?}", other))),
        }
    }
}

/// A single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    Empty,
    /// Cell taken by a mark.
    Occupied(Mark),
}

impl Cell {
    /// Returns true for an empty cell.
    pub fn is_empty(self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Returns the mark in this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::Occupied(mark) => Some(mark),
        }
    }
}

/// 3x3 board snapshot, always exactly nine cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board {
    /// Cells in row-major order (0-8).
    cells: [Cell; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a board from row-major cells.
    pub fn from_cells(cells: [Cell; 9]) -> Self {
        Self { cells }
    }

    /// Builds a board from the server's `board_state` array.
    ///
    /// The server always sends nine strings, each `""`, `"X"` or `"O"`.
    #[instrument(skip(raw), fields(len = raw.len()))]
    pub fn from_wire(raw: &[String]) -> Result<Self, DecodeError> {
        if raw.len() != 9 {
            return Err(DecodeError::new(format!(
                "Board snapshot must have 9 cells, got {}",
                raw.len()
            )));
        }

        let mut cells = [Cell::Empty; 9];
        for (cell, symbol) in cells.iter_mut().zip(raw) {
            *cell = match Mark::from_wire(symbol)? {
                Some(mark) => Cell::Occupied(mark),
                None => Cell::Empty,
            };
        }
        Ok(Self { cells })
    }

    /// Gets the cell at the given position.
    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.to_index()]
    }

    /// Sets the cell at the given position.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.to_index()] = cell;
    }

    /// Checks if the cell at `pos` is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos).is_empty()
    }

    /// Returns all cells as a slice.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_empty()).count()
    }

    /// Positions that were occupied in `self` but are empty in `next`.
    ///
    /// Within one game the board only fills up, so a non-empty result
    /// means the server rolled cells back.
    pub fn cleared_in(&self, next: &Board) -> Vec<Position> {
        Position::ALL
            .iter()
            .copied()
            .filter(|pos| !self.is_empty(*pos) && next.is_empty(*pos))
            .collect()
    }
}
