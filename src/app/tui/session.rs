use std::io;

use anyhow::{Context, Result};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use log::LevelFilter;

/// Raw mode plus alternate screen. Log output is muted while the screen is
/// ours and restored whenever the terminal is handed back.
pub(super) struct TuiSession {
    active: bool,
    log_level: LevelFilter,
}

impl TuiSession {
    pub(super) fn enter() -> Result<Self> {
        let log_level = log::max_level();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen).context("failed to enter alternate screen")?;
        log::set_max_level(LevelFilter::Off);
        Ok(Self {
            active: true,
            log_level,
        })
    }

    pub(super) fn suspend(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(io::stdout(), LeaveAlternateScreen).context("failed to leave alternate screen")?;
        log::set_max_level(self.log_level);
        self.active = false;
        Ok(())
    }

    pub(super) fn resume(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        execute!(io::stdout(), EnterAlternateScreen)
            .context("failed to re-enter alternate screen")?;
        enable_raw_mode().context("failed to re-enable raw mode")?;
        log::set_max_level(LevelFilter::Off);
        self.active = true;
        Ok(())
    }

    pub(super) fn leave(&mut self) -> Result<()> {
        self.suspend()
    }
}

impl Drop for TuiSession {
    fn drop(&mut self) {
        if self.active {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            log::set_max_level(self.log_level);
        }
    }
}
