//! App: terminal init, main loop, tick and key handling.

use crate::game::{GameEvent, GameState, GRID_COLS, GRID_ROWS};
use crate::highscores::{self, Leaderboard};
use crate::input::{key_to_action, Action};
use crate::theme::Theme;
use crate::{Args, GameConfig, Mode};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Score popups live this long before fading out.
const POPUP_LIFETIME_MS: u32 = 1500;
/// Longest accepted leaderboard name.
const NAME_MAX_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    QuitMenu,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTab {
    Mode,
    Start,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub current_tab: MenuTab,
    pub selected_mode: Mode,
}

impl Default for MenuState {
    fn default() -> Self {
        Self {
            current_tab: MenuTab::Mode,
            selected_mode: Mode::Classic,
        }
    }
}

/// Floating "+points" label above a just-cleared cell.
#[derive(Debug, Clone)]
pub struct ScorePopup {
    pub row: usize,
    pub col: usize,
    pub points: u32,
    pub combo: u32,
    pub age_ms: u32,
}

pub struct App {
    args: Args,
    config: GameConfig,
    theme: Theme,
    state: GameState,
    screen: Screen,
    menu_state: MenuState,
    quit_selected: QuitOption,
    /// Board cursor (row, col).
    cursor: (usize, usize),
    board: Leaderboard,
    name_input: String,
    name_entry_active: bool,
    /// First leaderboard write failure, reported once after teardown.
    save_error: Option<String>,
    popups: Vec<ScorePopup>,
    /// Cells of the last clear, still fading; empty when no effect runs.
    clear_cells: Vec<(usize, usize)>,
    clear_effect: Option<Effect>,
    clear_effect_process_time: Option<Instant>,
    /// Start of the current countdown second (time mode).
    second_anchor: Instant,
    /// Elapsed part of the second when the clock was suspended.
    pause_carry: Duration,
    last_popup_tick: Instant,
}

impl App {
    pub fn new(args: Args, config: GameConfig, theme: Theme) -> Result<Self> {
        let state = match config.seed {
            Some(seed) => GameState::with_seed(args.mode, seed),
            None => GameState::new(args.mode),
        };
        let screen = if args.no_menu {
            Screen::Playing
        } else {
            Screen::Menu
        };
        let menu_state = MenuState {
            current_tab: MenuTab::Mode,
            selected_mode: args.mode,
        };
        let now = Instant::now();
        Ok(Self {
            args,
            config,
            theme,
            state,
            screen,
            menu_state,
            quit_selected: QuitOption::Resume,
            cursor: (GRID_ROWS - 1, GRID_COLS / 2),
            board: highscores::load(),
            name_input: String::new(),
            name_entry_active: false,
            save_error: None,
            popups: Vec::new(),
            clear_cells: Vec::new(),
            clear_effect: None,
            clear_effect_process_time: None,
            second_anchor: now,
            pause_carry: Duration::ZERO,
            last_popup_tick: now,
        })
    }

    fn start_round(&mut self) {
        self.state = match self.config.seed {
            Some(seed) => GameState::with_seed(self.args.mode, seed),
            None => GameState::new(self.args.mode),
        };
        self.screen = Screen::Playing;
        self.cursor = (GRID_ROWS - 1, GRID_COLS / 2);
        self.popups.clear();
        self.clear_cells.clear();
        self.clear_effect = None;
        self.clear_effect_process_time = None;
        self.name_entry_active = false;
        self.name_input.clear();
        self.second_anchor = Instant::now();
        self.pause_carry = Duration::ZERO;
    }

    /// Freeze the countdown, keeping the elapsed part of the current second.
    fn suspend_clock(&mut self) {
        self.pause_carry = self.second_anchor.elapsed().min(Duration::from_secs(1));
    }

    /// Continue the countdown from where it was suspended.
    fn resume_clock(&mut self) {
        self.second_anchor = Instant::now() - self.pause_carry;
        self.pause_carry = Duration::ZERO;
    }

    fn pause_game(&mut self) {
        self.suspend_clock();
        self.state.pause();
    }

    fn resume_game(&mut self) {
        self.state.resume();
        self.resume_clock();
    }

    fn enter_quit_menu(&mut self) {
        if !self.state.paused {
            self.pause_game();
        }
        self.quit_selected = QuitOption::Resume;
        self.screen = Screen::QuitMenu;
    }

    fn enter_game_over(&mut self) {
        self.screen = Screen::GameOver;
        if self.board.qualifies(self.state.mode, self.state.score) {
            self.name_entry_active = true;
            self.name_input = self
                .config
                .player_name
                .clone()
                .unwrap_or_else(|| self.board.last_name.clone());
            while self.name_input.len() > NAME_MAX_LEN {
                self.name_input.pop();
            }
        }
    }

    fn submit_name(&mut self) {
        let name = self.name_input.trim();
        let name = if name.is_empty() { "anon" } else { name };
        self.board.record(self.state.mode, name, self.state.score);
        if let Err(err) = highscores::save(&self.board) {
            if self.save_error.is_none() {
                self.save_error = Some(err.to_string());
            }
        }
        self.name_entry_active = false;
    }

    fn move_cursor(&mut self, action: Action) {
        let (row, col) = self.cursor;
        self.cursor = match action {
            Action::CursorLeft => (row, col.saturating_sub(1)),
            Action::CursorRight => (row, (col + 1).min(GRID_COLS - 1)),
            Action::CursorUp => (row.saturating_sub(1), col),
            Action::CursorDown => ((row + 1).min(GRID_ROWS - 1), col),
            _ => (row, col),
        };
    }

    fn toggle_at_cursor(&mut self) {
        let (row, col) = self.cursor;
        if let Some(b) = self.state.grid.at(row, col) {
            let id = b.id;
            self.state.toggle_select(id);
        }
    }

    /// Turn engine events into popups and the clear-fade effect.
    fn drain_events(&mut self) {
        for ev in self.state.take_events() {
            match ev {
                GameEvent::BlocksCleared {
                    blocks,
                    points,
                    combo,
                } => {
                    if let Some(first) = blocks.first() {
                        self.popups.push(ScorePopup {
                            row: first.row,
                            col: first.col,
                            points,
                            combo,
                            age_ms: 0,
                        });
                    }
                    if !self.args.no_animation {
                        self.clear_cells = blocks.iter().map(|b| (b.row, b.col)).collect();
                        self.clear_effect = None;
                        self.clear_effect_process_time = None;
                    }
                    // A clear restarts the countdown second as well.
                    self.second_anchor = Instant::now();
                    self.pause_carry = Duration::ZERO;
                }
                GameEvent::RowAdded | GameEvent::GameOver { .. } => {}
            }
        }
    }

    fn tick_popups(&mut self, delta_ms: u32) {
        self.popups.retain_mut(|p| {
            let old_steps = p.age_ms / 300;
            p.age_ms += delta_ms;
            let new_steps = p.age_ms / 300;
            if new_steps > old_steps && p.row > 0 {
                p.row -= 1;
            }
            p.age_ms < POPUP_LIFETIME_MS
        });
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;
        if let Some(err) = &self.save_error {
            eprintln!("warning: failed to save leaderboard: {err}");
        }
        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.state,
                    &self.theme,
                    &self.board,
                    &self.menu_state,
                    (self.screen == Screen::QuitMenu).then_some(self.quit_selected),
                    self.cursor,
                    &self.popups,
                    &self.clear_cells,
                    &mut self.clear_effect,
                    &mut self.clear_effect_process_time,
                    self.name_entry_active.then_some(self.name_input.as_str()),
                    now,
                    f.area(),
                )
            })?;

            if self.clear_effect.as_ref().is_some_and(|e| e.done()) {
                self.clear_cells.clear();
                self.clear_effect = None;
                self.clear_effect_process_time = None;
            }

            let delta_ms = self.last_popup_tick.elapsed().as_millis().min(250) as u32;
            self.last_popup_tick = Instant::now();
            self.tick_popups(delta_ms);

            let timeout = Duration::from_millis(16).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = event::read()? {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key) {
                            return Ok(());
                        }
                    }
                }
            }

            // Time-mode countdown: whole seconds only, frozen while paused.
            if self.screen == Screen::Playing
                && self.state.mode == Mode::Time
                && !self.state.paused
                && !self.state.game_over
            {
                while self.second_anchor.elapsed() >= Duration::from_secs(1) {
                    self.second_anchor += Duration::from_secs(1);
                    self.state.tick();
                }
            }

            self.drain_events();

            if self.state.game_over && self.screen == Screen::Playing {
                self.enter_game_over();
            }
        }
    }

    /// Returns true when the app should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let action = key_to_action(key);
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return true,
                Action::CursorLeft | Action::CursorRight => {
                    if self.menu_state.current_tab == MenuTab::Mode {
                        self.menu_state.selected_mode = match self.menu_state.selected_mode {
                            Mode::Classic => Mode::Time,
                            Mode::Time => Mode::Classic,
                        };
                    }
                }
                Action::CursorUp | Action::CursorDown => {
                    self.menu_state.current_tab = match self.menu_state.current_tab {
                        MenuTab::Mode => MenuTab::Start,
                        MenuTab::Start => MenuTab::Mode,
                    };
                }
                Action::ToggleSelect => {
                    if self.menu_state.current_tab == MenuTab::Start {
                        self.args.mode = self.menu_state.selected_mode;
                        self.start_round();
                    } else {
                        self.menu_state.current_tab = MenuTab::Start;
                    }
                }
                _ => {}
            },
            Screen::Playing => {
                if self.state.paused {
                    match action {
                        Action::Pause => self.resume_game(),
                        Action::Quit => self.enter_quit_menu(),
                        _ => {}
                    }
                } else {
                    match action {
                        Action::Pause => self.pause_game(),
                        Action::Quit => self.enter_quit_menu(),
                        Action::CursorLeft
                        | Action::CursorRight
                        | Action::CursorUp
                        | Action::CursorDown => self.move_cursor(action),
                        Action::ToggleSelect => self.toggle_at_cursor(),
                        Action::None => {}
                    }
                }
            }
            Screen::QuitMenu => match action {
                Action::CursorDown | Action::CursorRight => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::MainMenu,
                        QuitOption::MainMenu => QuitOption::Exit,
                        QuitOption::Exit => QuitOption::Resume,
                    };
                }
                Action::CursorUp | Action::CursorLeft => {
                    self.quit_selected = match self.quit_selected {
                        QuitOption::Resume => QuitOption::Exit,
                        QuitOption::MainMenu => QuitOption::Resume,
                        QuitOption::Exit => QuitOption::MainMenu,
                    };
                }
                Action::ToggleSelect => match self.quit_selected {
                    QuitOption::Resume => {
                        self.resume_game();
                        self.screen = Screen::Playing;
                    }
                    QuitOption::MainMenu => self.screen = Screen::Menu,
                    QuitOption::Exit => return true,
                },
                Action::Pause | Action::Quit => {
                    self.resume_game();
                    self.screen = Screen::Playing;
                }
                _ => {}
            },
            Screen::GameOver => {
                if self.name_entry_active {
                    match key.code {
                        KeyCode::Enter => self.submit_name(),
                        KeyCode::Backspace => {
                            self.name_input.pop();
                        }
                        KeyCode::Esc => self.name_entry_active = false,
                        KeyCode::Char(c) => {
                            if !c.is_control() && self.name_input.len() < NAME_MAX_LEN {
                                self.name_input.push(c);
                            }
                        }
                        _ => {}
                    }
                } else {
                    match key.code {
                        KeyCode::Char('r') | KeyCode::Char('R') => self.start_round(),
                        KeyCode::Char('m') | KeyCode::Char('M') => self.screen = Screen::Menu,
                        _ => {
                            if action == Action::Quit {
                                return true;
                            }
                        }
                    }
                }
            }
        }
        false
    }
}
