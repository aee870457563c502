//! Sumstack — pick blocks that add up to the target, in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect a round (RNG seed, default player name).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub seed: Option<u64>,
    pub player_name: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        seed: args.seed,
        player_name: args.name.clone(),
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Sum-stack number puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "sumstack",
    version,
    about = "Sum-stack number puzzle in the terminal. Select blocks that add up to the target to clear them.",
    long_about = "Sumstack is a terminal puzzle game.\n\n\
        The board holds numbered blocks. Select blocks whose values add up exactly to the \
        displayed target: they clear, you score, and the stack keeps growing. Overshoot the \
        target and your selection busts. The round ends when a new row no longer fits.\n\n\
        MODES:\n  classic    a new row pushes up after every clear\n  time       beat the clock; every clear resets it, running out forces a row\n\n\
        CONTROLS (normal):\n  Arrows      Move cursor   Enter/Space  Select/deselect\n  P           Pause        Q / Esc      Quit\n\n\
        CONTROLS (vim):\n  h/j/k/l     Move cursor   x            Select/deselect\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Game mode: classic (row after every clear) or time (countdown).
    #[arg(short, long, default_value = "classic")]
    pub mode: Mode,

    /// RNG seed for a deterministic round (block values and targets).
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Player name preset for the leaderboard.
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Path to theme file (btop-style theme[key]="value"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable the clear animation (blocks vanish instantly).
    #[arg(long)]
    pub no_animation: bool,

    /// Skip main menu and start a round immediately.
    #[arg(long)]
    pub no_menu: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    #[default]
    Classic,
    Time,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Classic => "Classic",
            Self::Time => "Time",
        }
    }
}
