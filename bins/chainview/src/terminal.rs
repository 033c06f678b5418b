use std::io::{self, Stdout, Write};

use chain_core::{GRID_ROWS, GRID_WIDTH, Surface};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::style::Print;
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetSize,
};
use crossterm::{execute, queue};

/// Row under the grid.
const FOOTER_ROW: u16 = GRID_ROWS;

/// Raw mode plus alternate screen sized to the grid. Dropping it puts the
/// terminal back the way it was.
pub struct Terminal {
    original_size: Option<(u16, u16)>,
}

impl Terminal {
    pub fn enter() -> io::Result<Self> {
        let original_size = terminal::size().ok();
        terminal::enable_raw_mode()?;
        let guard = Self { original_size };
        execute!(
            io::stdout(),
            EnterAlternateScreen,
            SetSize(GRID_WIDTH, GRID_ROWS + 1),
            Clear(ClearType::All),
            Hide
        )?;
        Ok(guard)
    }

    pub fn surface(&self) -> TerminalSurface {
        TerminalSurface { out: io::stdout() }
    }

    pub fn show_loading(&self) -> io::Result<()> {
        execute!(io::stdout(), MoveTo(0, 0), Print("Loading..."))
    }

    pub fn show_footer(&self) -> io::Result<()> {
        execute!(io::stdout(), MoveTo(0, FOOTER_ROW), Print("Press 'q' to quit"))
    }

    /// Blocks until `q` is pressed. Other keys are ignored.
    pub fn wait_for_quit(&self) -> io::Result<()> {
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('q') {
                    return Ok(());
                }
            }
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let mut out = io::stdout();
        if let Some((cols, rows)) = self.original_size {
            let _ = queue!(out, SetSize(cols, rows));
        }
        let _ = execute!(out, Show, LeaveAlternateScreen);
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::error!(error = %e, "cannot restore terminal");
        }
    }
}

/// Draws the grid straight onto the terminal, grid row = screen row.
pub struct TerminalSurface {
    out: Stdout,
}

impl Surface for TerminalSurface {
    fn put_str(&mut self, row: u16, col: u16, text: &str) {
        if let Err(e) = queue!(self.out, MoveTo(col, row), Print(text)) {
            tracing::warn!(row, col, error = %e, "terminal write failed");
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!(error = %e, "terminal flush failed");
        }
    }
}
