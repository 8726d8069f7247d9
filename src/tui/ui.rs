//! Stateless rendering of the session and app state.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Row, Table},
};

use super::app::{App, DEFAULT_TURN_SECONDS, MessageKind};
use crate::games::tictactoe::{Cell, Mark, Position};
use crate::leaderboard::LeaderboardView;
use crate::session::{Phase, Session, TurnOwner};

/// Renders the whole screen.
pub fn draw(frame: &mut Frame, app: &App, session: &Session) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(3), // Status
            Constraint::Min(13),   // Board + leaderboard
            Constraint::Length(3), // Timer
            Constraint::Length(8), // Messages
            Constraint::Length(1), // Help
        ])
        .split(area);

    let title = Paragraph::new("Strictly Games - Online Tic Tac Toe")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[0]);

    draw_status(frame, chunks[1], app, session);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(42), Constraint::Length(36)])
        .split(chunks[2]);
    draw_board(frame, middle[0], app, session);
    draw_leaderboard(frame, middle[1], app.leaderboard());

    draw_timer(frame, chunks[3], app, session);
    draw_messages(frame, chunks[4], app);

    let help = if session.new_game_allowed() {
        "arrows move | enter/space play | 1-9 play cell | n new game | q quit"
    } else {
        "arrows move | enter/space play | 1-9 play cell | q quit"
    };
    let help = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, chunks[5]);
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let symbol = session
        .local_symbol()
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());
    let turn = match session.turn_owner() {
        TurnOwner::Unknown => "-".to_string(),
        TurnOwner::Player(_) if session.is_local_turn() => "yours".to_string(),
        TurnOwner::Player(_) => "opponent".to_string(),
    };
    let mode = session
        .game_mode()
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "-".to_string());

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", app.status()),
            Style::default().fg(Color::Black).bg(Color::Green),
        ),
        Span::raw(format!(
            "  symbol: {}  turn: {}  mode: {}  players: {}/2  phase: {}",
            symbol,
            turn,
            mode,
            session.roster().len(),
            session.phase()
        )),
    ]);
    let status = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn draw_board(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let block = Block::default().title("Board").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Center the board
    let board_area = center_rect(inner, 40, 11);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(board_area);

    let selectable = session.selectable_cells();
    for (row, positions) in Position::ALL.chunks(3).enumerate() {
        draw_row(frame, rows[row * 2], session, app.cursor(), &selectable, positions);
        if row < 2 {
            draw_separator(frame, rows[row * 2 + 1]);
        }
    }
}

fn draw_row(
    frame: &mut Frame,
    area: Rect,
    session: &Session,
    cursor: Position,
    selectable: &[Position],
    positions: &[Position],
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12),
            Constraint::Length(1),
            Constraint::Length(12),
            Constraint::Length(1),
            Constraint::Length(12),
        ])
        .split(area);

    for (i, pos) in positions.iter().enumerate() {
        draw_cell(frame, cols[i * 2], session, cursor, selectable, *pos);
        if i < 2 {
            draw_separator_vertical(frame, cols[i * 2 + 1]);
        }
    }
}

fn draw_cell(
    frame: &mut Frame,
    area: Rect,
    session: &Session,
    cursor: Position,
    selectable: &[Position],
    pos: Position,
) {
    let (symbol, base_style) = match session.board().get(pos) {
        Cell::Empty if selectable.contains(&pos) => {
            (pos.label_short(), Style::default().fg(Color::Green))
        }
        Cell::Empty => ("   ", Style::default().fg(Color::DarkGray)),
        Cell::Occupied(Mark::X) => (
            " X ",
            Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
        ),
        Cell::Occupied(Mark::O) => (
            " O ",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };

    let style = if pos == cursor && *session.phase() != Phase::Ended {
        base_style.bg(Color::White).fg(Color::Black)
    } else {
        base_style
    };

    let paragraph =
        Paragraph::new(Line::from(Span::styled(symbol, style))).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

fn draw_separator(frame: &mut Frame, area: Rect) {
    let sep = Paragraph::new("──────────────────────────────────────")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, area);
}

fn draw_separator_vertical(frame: &mut Frame, area: Rect) {
    let sep = Paragraph::new("│").style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, area);
}

fn draw_leaderboard(frame: &mut Frame, area: Rect, view: &LeaderboardView) {
    let block = Block::default().title("Leaderboard").borders(Borders::ALL);
    match view {
        LeaderboardView::Ranked(players) => {
            let rows = players.iter().enumerate().map(|(i, p)| {
                Row::new(vec![
                    (i + 1).to_string(),
                    p.display_name().to_string(),
                    p.score.to_string(),
                ])
            });
            let table = Table::new(
                rows,
                [
                    Constraint::Length(4),
                    Constraint::Min(16),
                    Constraint::Length(8),
                ],
            )
            .header(
                Row::new(vec!["#", "Player", "Score"])
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(block);
            frame.render_widget(table, area);
        }
        LeaderboardView::Loading => {
            let text = Paragraph::new("Loading...")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(text, area);
        }
        LeaderboardView::NoData => {
            let text = Paragraph::new("No scores yet - play some games!")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(text, area);
        }
    }
}

fn draw_timer(frame: &mut Frame, area: Rect, app: &App, session: &Session) {
    let timer = app.timer();
    let block = Block::default().title("Turn clock").borders(Borders::ALL);
    if !timer.visible || !session.timer_visible() {
        frame.render_widget(
            Paragraph::new("untimed").style(Style::default().fg(Color::DarkGray)).block(block),
            area,
        );
        return;
    }

    let limit = (*session.turn_time_limit())
        .unwrap_or(DEFAULT_TURN_SECONDS)
        .max(1);
    let remaining = timer.remaining.unwrap_or(limit).min(limit);
    let color = if timer.low_time {
        Color::Red
    } else {
        Color::Green
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(color))
        .ratio(remaining as f64 / limit as f64)
        .label(format!("{}s", remaining));
    frame.render_widget(gauge, area);
}

fn draw_messages(frame: &mut Frame, area: Rect, app: &App) {
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<_> = app.messages().collect();
    let items: Vec<ListItem> = lines
        .iter()
        .skip(lines.len().saturating_sub(visible))
        .map(|line| {
            let color = match line.kind {
                MessageKind::Info => Color::White,
                MessageKind::Success => Color::Green,
                MessageKind::Warning => Color::Yellow,
                MessageKind::Error => Color::Red,
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    line.at.format("%H:%M:%S ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(line.text.clone(), Style::default().fg(color)),
            ]))
        })
        .collect();
    let list = List::new(items).block(Block::default().title("Messages").borders(Borders::ALL));
    frame.render_widget(list, area);
}

fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height.saturating_sub(height)) / 2),
            Constraint::Length(height),
            Constraint::Length((area.height.saturating_sub(height)) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width.saturating_sub(width)) / 2),
            Constraint::Length(width),
            Constraint::Length((area.width.saturating_sub(width)) / 2),
        ])
        .split(vert[1])[1]
}
