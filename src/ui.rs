//! Layout and drawing: menu, board, sidebar, pause, game over, leaderboard.

use crate::app::{MenuState, MenuTab, QuitOption, ScorePopup, Screen};
use crate::game::{GameState, GRID_COLS, GRID_ROWS, MAX_COMBO, TIME_LIMIT};
use crate::highscores::Leaderboard;
use crate::theme::Theme;
use crate::Mode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use ratatui::Frame;
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    fx, ref_count, CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation,
};

/// Each grid cell is CELL_W × CELL_H terminal cells.
const CELL_W: u16 = 5;
const CELL_H: u16 = 2;
const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the clear fade (TachyonFX) in ms.
const CLEAR_FADE_MS: u32 = 400;

/// Board size in terminal cells (border included).
fn board_pixel_size() -> (u16, u16) {
    (
        GRID_COLS as u16 * CELL_W + 2,
        GRID_ROWS as u16 * CELL_H + 2,
    )
}

/// Board inner rect (cells only, no border) for the given area; matches
/// the draw_game layout.
fn board_inner_rect(area: Rect) -> Rect {
    let (pw, ph) = board_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;
    let x = area.x + area.width.saturating_sub(total_w) / 2;
    let y = area.y + area.height.saturating_sub(ph) / 2;
    Rect {
        x: x + 1,
        y: y + 1,
        width: (GRID_COLS as u16 * CELL_W).min(area.width.saturating_sub(2)),
        height: (GRID_ROWS as u16 * CELL_H).min(area.height.saturating_sub(2)),
    }
}

/// Buffer positions covered by the given grid cells.
fn cell_buffer_positions(board: Rect, cells: &[(usize, usize)]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for &(row, col) in cells {
        let x0 = board.x + (col as u16) * CELL_W;
        let y0 = board.y + (row as u16) * CELL_H;
        for bx in x0..(x0 + CELL_W).min(board.x + board.width) {
            for by in y0..(y0 + CELL_H).min(board.y + board.height) {
                set.insert((bx, by));
            }
        }
    }
    set
}

/// Create or update the clear fade effect and process it (fade just-cleared
/// cells back to the board background).
fn apply_clear_effect(
    frame: &mut Frame,
    theme: &Theme,
    area: Rect,
    clear_cells: &[(usize, usize)],
    clear_effect: &mut Option<Effect>,
    clear_process_time: &mut Option<Instant>,
    now: Instant,
) {
    let board = board_inner_rect(area);
    let delta = clear_process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u128::from(u32::MAX)) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *clear_process_time = Some(now);

    if clear_effect.is_none() {
        let clearing_set = cell_buffer_positions(board, clear_cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            clearing_set.contains(&(pos.x, pos.y))
        }));
        let bg = theme.bg;
        let effect = fx::fade_to(bg, bg, (CLEAR_FADE_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *clear_effect = Some(effect);
    }

    if let Some(effect) = clear_effect {
        frame.render_effect(effect, board, tfx_delta);
    }
}

/// Draw current screen (menu, game, quit menu, game over).
/// `name_entry` is Some(buffer) while the player is typing a leaderboard name.
pub fn draw(
    frame: &mut Frame,
    screen: Screen,
    state: &GameState,
    theme: &Theme,
    board: &Leaderboard,
    menu_state: &MenuState,
    quit_selected: Option<QuitOption>,
    cursor: (usize, usize),
    popups: &[ScorePopup],
    clear_cells: &[(usize, usize)],
    clear_effect: &mut Option<Effect>,
    clear_process_time: &mut Option<Instant>,
    name_entry: Option<&str>,
    now: Instant,
    area: Rect,
) {
    match screen {
        Screen::Menu => draw_menu(frame, theme, board, menu_state, area),
        Screen::Playing => {
            draw_game(frame, state, theme, board, cursor, popups, area);
            if !clear_cells.is_empty() {
                apply_clear_effect(
                    frame,
                    theme,
                    area,
                    clear_cells,
                    clear_effect,
                    clear_process_time,
                    now,
                );
            }
            if state.paused {
                draw_pause_overlay(frame, theme, area);
            }
        }
        Screen::QuitMenu => {
            draw_game(frame, state, theme, board, cursor, popups, area);
            if let Some(opt) = quit_selected {
                draw_quit_menu(frame, theme, opt);
            }
        }
        Screen::GameOver => draw_game_over(frame, state, theme, board, name_entry, area),
    }
}

fn tab_style(current: bool, selected: bool, theme: &Theme) -> Style {
    if current {
        Style::default()
            .fg(Color::Black)
            .bg(theme.blocks[1])
            .add_modifier(Modifier::BOLD)
    } else if selected {
        Style::default()
            .fg(theme.blocks[1])
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.main_fg)
    }
}

fn draw_menu(
    frame: &mut Frame,
    theme: &Theme,
    board: &Leaderboard,
    menu_state: &MenuState,
    area: Rect,
) {
    let popup_w = 46u16;
    let popup_h = 18u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let title = Line::from(vec![
        Span::styled(
            " Sum ",
            Style::default()
                .fg(Color::Rgb(255, 120, 120))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " stack ",
            Style::default()
                .fg(theme.main_fg)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let on_mode = menu_state.current_tab == MenuTab::Mode;
    let classic_tab = Span::styled(
        " CLASSIC ",
        tab_style(
            on_mode && menu_state.selected_mode == Mode::Classic,
            menu_state.selected_mode == Mode::Classic,
            theme,
        ),
    );
    let time_tab = Span::styled(
        " TIME ",
        tab_style(
            on_mode && menu_state.selected_mode == Mode::Time,
            menu_state.selected_mode == Mode::Time,
            theme,
        ),
    );

    let start_btn = if menu_state.current_tab == MenuTab::Start {
        Span::styled(
            " [ START ] ",
            Style::default()
                .fg(Color::Black)
                .bg(theme.blocks[1])
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(" [ START ] ", Style::default().fg(theme.main_fg))
    };

    let lines = vec![
        Line::from(""),
        title,
        Line::from(""),
        Line::from(Span::styled(
            " ─ MODE ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(vec![classic_tab, Span::from("  "), time_tab]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Best classic: ", Style::default().fg(theme.inactive_fg)),
            Span::styled(
                board.best(Mode::Classic).to_string(),
                Style::default().fg(theme.main_fg),
            ),
            Span::from("   "),
            Span::styled("Best time: ", Style::default().fg(theme.inactive_fg)),
            Span::styled(
                board.best(Mode::Time).to_string(),
                Style::default().fg(theme.main_fg),
            ),
        ]),
        Line::from(""),
        Line::from(start_btn),
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↕ ", Style::default().fg(theme.blocks[3])),
            Span::from("NAVIGATE   "),
            Span::styled(" ↔ ", Style::default().fg(theme.blocks[3])),
            Span::from("CHANGE   "),
            Span::styled(" ENTER ", Style::default().fg(theme.blocks[3])),
            Span::from("START"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Pick blocks that add up to the target ",
            Style::default().fg(theme.inactive_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(Color::Rgb(255, 80, 80)),
        )),
    ];

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

fn draw_pause_overlay(frame: &mut Frame, theme: &Theme, area: Rect) {
    let popup_w = 28u16;
    let popup_h = 5u16;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Paused ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " P — Resume    Q — Quit ",
            Style::default().fg(theme.main_fg),
        )),
    ];
    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );
    p.render(popup, frame.buffer_mut());
}

/// Draw game: board + sidebar; use full area and center.
fn draw_game(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    board: &Leaderboard,
    cursor: (usize, usize),
    popups: &[ScorePopup],
    area: Rect,
) {
    let (pw, ph) = board_pixel_size();
    let total_w = pw + SIDEBAR_WIDTH;

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(ph),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);
    let active_area = vert_chunks[1];

    let (board_area, sidebar_area) = {
        let inner = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(pw), Constraint::Length(SIDEBAR_WIDTH)])
            .split(active_area);
        (inner[0], inner[1])
    };

    draw_board(frame, state, theme, cursor, popups, board_area);
    draw_sidebar(frame, state, theme, board, sidebar_area);
}

fn draw_board(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    cursor: (usize, usize),
    popups: &[ScorePopup],
    area: Rect,
) {
    let title = format!(" Sumstack — {} ", state.mode.label());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, frame.buffer_mut());

    let buf = frame.buffer_mut();
    for row in 0..GRID_ROWS {
        for col in 0..GRID_COLS {
            let x0 = inner.x + col as u16 * CELL_W;
            let y0 = inner.y + row as u16 * CELL_H;
            if x0 + CELL_W > inner.x + inner.width || y0 + CELL_H > inner.y + inner.height {
                continue;
            }
            let cell = state.grid.at(row, col);
            let under_cursor = cursor == (row, col);

            let style = match cell {
                Some(b) if state.is_selected(b.id) => Style::default()
                    .fg(theme.value_color(b.value))
                    .bg(theme.bg)
                    .add_modifier(Modifier::BOLD),
                Some(b) => Style::default().fg(theme.bg).bg(theme.value_color(b.value)),
                None => Style::default().fg(theme.main_fg).bg(theme.bg),
            };
            for bx in x0..x0 + CELL_W {
                for by in y0..y0 + CELL_H {
                    buf[(bx, by)].set_symbol(" ").set_style(style);
                }
            }
            if let Some(b) = cell {
                let digit = b.value.to_string();
                buf.set_string(x0 + CELL_W / 2, y0 + CELL_H / 2, digit, style);
            }
            if under_cursor {
                let marker_style = style.add_modifier(Modifier::BOLD);
                buf.set_string(x0, y0 + CELL_H / 2, "▸", marker_style);
                buf.set_string(x0 + CELL_W - 1, y0 + CELL_H / 2, "◂", marker_style);
            }
        }
    }

    for popup in popups {
        let rx = inner.x + (popup.col as u16 * CELL_W).min(inner.width.saturating_sub(1));
        let ry = inner.y + popup.row as u16 * CELL_H;
        if rx < inner.x + inner.width && ry < inner.y + inner.height {
            let label = if popup.combo > 1 {
                format!("+{} (x{})", popup.points, popup.combo)
            } else {
                format!("+{}", popup.points)
            };
            let style = Style::default()
                .fg(Color::Yellow)
                .bg(theme.bg)
                .add_modifier(Modifier::BOLD);
            buf.set_string(rx, ry, label, style);
        }
    }
}

fn draw_sidebar(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    board: &Leaderboard,
    area: Rect,
) {
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Target (border + number + running sum)
            Constraint::Length(1), // gap
            Constraint::Length(6), // Stats (border + score, best, picked)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Combo (border + label + bar)
            Constraint::Length(1), // gap
            Constraint::Length(4), // Clock (time mode) or hints
        ])
        .split(area);

    // --- Target ---
    let target_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let target_inner = target_block.inner(chunks[0]);
    target_block.render(chunks[0], frame.buffer_mut());
    let sum = state.selection_sum();
    let target_lines = vec![
        Line::from(vec![
            Span::styled("Target  ", title_style),
            Span::styled(
                state.target.to_string(),
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Sum     ", title_style),
            Span::styled(sum.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Picked  ", title_style),
            Span::styled(state.selected.len().to_string(), fg_style),
        ]),
    ];
    Paragraph::new(target_lines).render(target_inner, frame.buffer_mut());

    // --- Stats ---
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(chunks[2]);
    stats_block.render(chunks[2], frame.buffer_mut());
    let stats_lines = vec![
        Line::from(vec![
            Span::styled("Score: ", title_style),
            Span::styled(state.score.to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Best:  ", title_style),
            Span::styled(board.best(state.mode).to_string(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Mode:  ", title_style),
            Span::styled(state.mode.label(), fg_style),
        ]),
        Line::from(vec![
            Span::styled("Blocks: ", title_style),
            Span::styled(state.grid.len().to_string(), fg_style),
        ]),
    ];
    Paragraph::new(stats_lines).render(stats_inner, frame.buffer_mut());

    // --- Combo ---
    let combo_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let combo_inner = combo_block.inner(chunks[4]);
    combo_block.render(chunks[4], frame.buffer_mut());
    let combo_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(combo_inner);
    Paragraph::new(Line::from(Span::styled(
        format!("Combo x{}", state.combo),
        title_style,
    )))
    .render(combo_layout[0], frame.buffer_mut());
    let combo_ratio = f64::from(state.combo) / f64::from(MAX_COMBO);
    let combo_color = if state.combo >= 4 {
        Color::Green
    } else if state.combo >= 2 {
        Color::Yellow
    } else {
        theme.div_line
    };
    Gauge::default()
        .ratio(combo_ratio)
        .gauge_style(Style::default().fg(combo_color))
        .render(combo_layout[1], frame.buffer_mut());

    // --- Clock (time mode) or key hints ---
    let tail_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let tail_inner = tail_block.inner(chunks[6]);
    tail_block.render(chunks[6], frame.buffer_mut());
    if state.mode == Mode::Time {
        let tail_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(tail_inner);
        Paragraph::new(Line::from(Span::styled(
            format!("Time {}s", state.time_left),
            title_style,
        )))
        .render(tail_layout[0], frame.buffer_mut());
        let ratio = f64::from(state.time_left) / f64::from(TIME_LIMIT);
        let bar_color = if ratio > 0.6 {
            Color::Green
        } else if ratio > 0.3 {
            Color::Yellow
        } else {
            Color::Red
        };
        Gauge::default()
            .ratio(ratio)
            .gauge_style(Style::default().fg(bar_color))
            .render(tail_layout[1], frame.buffer_mut());
    } else {
        Paragraph::new(vec![
            Line::from(Span::styled("Space — pick", fg_style)),
            Line::from(Span::styled("P pause  Q quit", fg_style)),
        ])
        .render(tail_inner, frame.buffer_mut());
    }
}

fn draw_game_over(
    frame: &mut Frame,
    state: &GameState,
    theme: &Theme,
    board: &Leaderboard,
    name_entry: Option<&str>,
    area: Rect,
) {
    let entries = board.entries(state.mode);
    let popup_w = 44u16;
    let popup_h = if name_entry.is_some() {
        13
    } else {
        (11 + entries.len() as u16).min(22)
    };
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };

    let mut lines: Vec<Line> = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Game Over ",
            Style::default().fg(Color::White).bg(Color::Red),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Score: {} ", state.score),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Best ({}): {} ", state.mode.label(), board.best(state.mode)),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
    ];

    if let Some(buffer) = name_entry {
        lines.push(Line::from(Span::styled(
            " You made the board! ",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(" Name: ", Style::default().fg(theme.title)),
            Span::styled(
                format!("{buffer}█"),
                Style::default()
                    .fg(theme.main_fg)
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Enter — save    Esc — skip ",
            Style::default().fg(theme.inactive_fg),
        )));
    } else {
        if entries.is_empty() {
            lines.push(Line::from(Span::styled(
                " No scores yet ",
                Style::default().fg(theme.inactive_fg),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                format!(" ─ TOP {} ─ ", state.mode.label().to_uppercase()),
                Style::default().fg(theme.div_line),
            )));
            for (i, e) in entries.iter().enumerate() {
                lines.push(Line::from(vec![
                    Span::styled(format!(" {:>2}. ", i + 1), Style::default().fg(theme.title)),
                    Span::styled(
                        format!("{:<12} ", e.name),
                        Style::default().fg(theme.main_fg),
                    ),
                    Span::styled(format!("{:>6} ", e.score), Style::default().fg(theme.main_fg)),
                    Span::styled(e.date.clone(), Style::default().fg(theme.inactive_fg)),
                ]));
            }
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " R — Restart   M — Menu   Q — Quit ",
            Style::default().fg(theme.main_fg),
        )));
    }

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
            .title(Span::styled(" Sumstack ", Style::default().fg(theme.title))),
    );
    p.render(popup, frame.buffer_mut());
}

pub fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let qw = 24;
    let qh = 8;
    let quit_rect = Rect {
        x: area.x + area.width.saturating_sub(qw) / 2,
        y: area.y + area.height.saturating_sub(qh) / 2,
        width: qw,
        height: qh,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.y..quit_rect.y + quit_rect.height {
        for x in quit_rect.x..quit_rect.x + quit_rect.width {
            frame.buffer_mut()[(x, y)].set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default()
                .fg(theme.bg)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        frame.buffer_mut().set_string(rx, ry, label, style);
    }
}
