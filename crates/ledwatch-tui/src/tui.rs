//! Owns the terminal while the console runs.
//!
//! The alternate screen keeps the device table and activity log off the
//! user's scrollback. Every way out (normal quit, `Drop`, a panic, an eyre
//! report from a failed relay connect) puts the shell back in cooked mode.

use std::io::{Stdout, stdout};

use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand, cursor,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{Terminal, backend::CrosstermBackend};

pub type Backend = CrosstermBackend<Stdout>;

/// The console's terminal handle.
pub struct Tui {
    pub terminal: Terminal<Backend>,
}

impl Tui {
    /// Wrap stdout. Nothing changes on screen until [`enter`](Self::enter).
    pub fn new() -> Result<Self> {
        let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        Ok(Self { terminal })
    }

    pub fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        self.terminal.clear()?;
        Ok(())
    }

    /// Leave the alternate screen. Called on quit and again from `Drop`, so
    /// each step tolerates having already run.
    pub fn exit(&mut self) {
        restore_terminal();
    }

    pub fn draw<F>(&mut self, render: F) -> Result<()>
    where
        F: FnOnce(&mut ratatui::Frame),
    {
        self.terminal.draw(render)?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        self.exit();
    }
}

fn restore_terminal() {
    let _ = stdout().execute(cursor::Show);
    let _ = stdout().execute(LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
}

/// Install color-eyre hooks. A panic or a startup error such as an
/// unreadable config then prints to a restored shell instead of the raw
/// alternate screen.
pub fn install_hooks() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();

    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    std::panic::set_hook(Box::new(move |info| {
        restore_terminal();
        panic_hook(info);
    }));

    Ok(())
}
