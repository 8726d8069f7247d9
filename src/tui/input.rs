//! Keyboard mapping and cursor movement.

use crate::games::tictactoe::Position;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move the cursor to this cell.
    Cursor(Position),
    /// Play the cell under the cursor.
    Submit,
    /// Play this cell directly.
    Play(Position),
    /// Start another match.
    NewGame,
    /// Search again, or reconnect after the socket closed.
    Retry,
    /// Leave.
    Quit,
}

/// Maps a key event to an action given the current cursor.
pub fn action(key: KeyEvent, cursor: Position) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('n') => Some(Action::NewGame),
        KeyCode::Char('r') => Some(Action::Retry),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Submit),
        KeyCode::Char(c) => c
            .to_digit(10)
            .filter(|d| (1..=9).contains(d))
            .and_then(|d| Position::from_index(d as usize - 1))
            .map(Action::Play),
        KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right => {
            Some(Action::Cursor(move_cursor(cursor, key.code)))
        }
        _ => None,
    }
}

/// Moves cursor based on arrow keys.
pub fn move_cursor(cursor: Position, key: KeyCode) -> Position {
    let (row, col) = (i64::from(cursor.row()), i64::from(cursor.col()));
    let (row, col) = match key {
        KeyCode::Up => (row - 1, col),
        KeyCode::Down => (row + 1, col),
        KeyCode::Left => (row, col - 1),
        KeyCode::Right => (row, col + 1),
        _ => (row, col),
    };
    // Edges do not wrap.
    Position::from_row_col(row, col).unwrap_or(cursor)
}
