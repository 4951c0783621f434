//! Terminal surfaces the renderer paints on.

use std::io::{self, Stderr};

use crossterm::event::{Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::Stream;
use futures::channel::mpsc;
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::{Position, Rect};
use ratatui::style::Style;

use crate::error::{FinderError, Result};

pub trait Surface {
    type Events: Stream<Item = io::Result<Event>> + Unpin + Send + 'static;

    /// Takes over the terminal and hands back its event stream.
    fn init(&mut self) -> Result<Self::Events>;
    fn finalise(&mut self) -> io::Result<()>;
    fn size(&mut self) -> (u16, u16);
    fn clear(&mut self);
    fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style);
    fn show_cursor(&mut self, x: u16, y: u16);
    fn present(&mut self) -> io::Result<()>;
}

type TuiTerminal = Terminal<CrosstermBackend<Stderr>>;

/// Full-screen surface on stderr, leaving stdout free for the result.
#[derive(Default)]
pub struct CrosstermSurface {
    terminal: Option<TuiTerminal>,
    cursor: Option<Position>,
}

impl CrosstermSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for CrosstermSurface {
    type Events = EventStream;

    fn init(&mut self) -> Result<EventStream> {
        enable_raw_mode().map_err(FinderError::TerminalInit)?;
        let guard = SetupGuard::new(|| {
            let _ = execute!(io::stderr(), LeaveAlternateScreen);
            let _ = disable_raw_mode();
        });

        let mut stderr = io::stderr();
        execute!(stderr, EnterAlternateScreen).map_err(FinderError::TerminalInit)?;
        let mut terminal =
            Terminal::new(CrosstermBackend::new(stderr)).map_err(FinderError::TerminalInit)?;
        terminal.clear().map_err(FinderError::TerminalInit)?;

        guard.disarm();
        self.terminal = Some(terminal);
        Ok(EventStream::new())
    }

    fn finalise(&mut self) -> io::Result<()> {
        let Some(mut terminal) = self.terminal.take() else {
            return Ok(());
        };
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        Ok(())
    }

    fn size(&mut self) -> (u16, u16) {
        self.terminal
            .as_ref()
            .and_then(|terminal| terminal.size().ok())
            .map_or((0, 0), |size| (size.width, size.height))
    }

    fn clear(&mut self) {
        self.cursor = None;
        if let Some(terminal) = self.terminal.as_mut() {
            if let Err(error) = terminal.autoresize() {
                tracing::warn!("terminal resize failed: {error}");
            }
            terminal.current_buffer_mut().reset();
        }
    }

    fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) {
        if let Some(cell) = self
            .terminal
            .as_mut()
            .and_then(|terminal| terminal.current_buffer_mut().cell_mut((x, y)))
        {
            cell.set_char(ch).set_style(style);
        }
    }

    fn show_cursor(&mut self, x: u16, y: u16) {
        self.cursor = Some(Position { x, y });
    }

    fn present(&mut self) -> io::Result<()> {
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };
        terminal.flush()?;
        terminal.swap_buffers();
        match self.cursor {
            Some(position) => {
                terminal.set_cursor_position(position)?;
                terminal.show_cursor()?;
            }
            None => terminal.hide_cursor()?,
        }
        Backend::flush(terminal.backend_mut())
    }
}

/// Runs `undo` on drop unless setup completed and called [`SetupGuard::disarm`].
struct SetupGuard<F: FnOnce()> {
    undo: Option<F>,
}

impl<F: FnOnce()> SetupGuard<F> {
    fn new(undo: F) -> Self {
        Self { undo: Some(undo) }
    }

    fn disarm(mut self) {
        self.undo = None;
    }
}

impl<F: FnOnce()> Drop for SetupGuard<F> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            undo();
        }
    }
}

/// Cell grid kept in memory, fed by a channel of synthetic events.
pub struct MemorySurface {
    buffer: Buffer,
    cursor: Option<Position>,
    events: Option<mpsc::UnboundedReceiver<io::Result<Event>>>,
    init_calls: usize,
    finalise_calls: usize,
    frames: usize,
}

impl MemorySurface {
    pub fn new(width: u16, height: u16) -> (Self, mpsc::UnboundedSender<io::Result<Event>>) {
        let (tx, rx) = mpsc::unbounded();
        let surface = Self {
            buffer: Buffer::empty(Rect::new(0, 0, width, height)),
            cursor: None,
            events: Some(rx),
            init_calls: 0,
            finalise_calls: 0,
            frames: 0,
        };
        (surface, tx)
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor.map(|position| (position.x, position.y))
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    pub fn finalise_calls(&self) -> usize {
        self.finalise_calls
    }

    /// Number of presented frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Symbols of one row, with trailing blanks removed.
    pub fn row_text(&self, y: u16) -> String {
        let area = self.buffer.area;
        let text = (0..area.width)
            .map(|x| self.buffer[(x, y)].symbol())
            .collect::<String>();
        text.trim_end().to_string()
    }

    pub fn style_at(&self, x: u16, y: u16) -> Style {
        self.buffer[(x, y)].style()
    }
}

impl Surface for MemorySurface {
    type Events = mpsc::UnboundedReceiver<io::Result<Event>>;

    fn init(&mut self) -> Result<Self::Events> {
        self.init_calls += 1;
        self.events.take().ok_or_else(|| {
            FinderError::TerminalInit(io::Error::other("memory surface already initialised"))
        })
    }

    fn finalise(&mut self) -> io::Result<()> {
        self.finalise_calls += 1;
        Ok(())
    }

    fn size(&mut self) -> (u16, u16) {
        (self.buffer.area.width, self.buffer.area.height)
    }

    fn clear(&mut self) {
        self.cursor = None;
        self.buffer.reset();
    }

    fn set_cell(&mut self, x: u16, y: u16, ch: char, style: Style) {
        if let Some(cell) = self.buffer.cell_mut((x, y)) {
            cell.set_char(ch).set_style(style);
        }
    }

    fn show_cursor(&mut self, x: u16, y: u16) {
        self.cursor = Some(Position { x, y });
    }

    fn present(&mut self) -> io::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::SetupGuard;

    fn setup(fail_last_step: bool, undone: &Cell<usize>) -> Result<(), &'static str> {
        let guard = SetupGuard::new(|| undone.set(undone.get() + 1));
        if fail_last_step {
            return Err("clear failed");
        }
        guard.disarm();
        Ok(())
    }

    #[test]
    fn setup_failure_runs_undo() {
        let undone = Cell::new(0);
        assert!(setup(true, &undone).is_err());
        assert_eq!(undone.get(), 1);
    }

    #[test]
    fn completed_setup_keeps_terminal_state() {
        let undone = Cell::new(0);
        assert!(setup(false, &undone).is_ok());
        assert_eq!(undone.get(), 0);
    }
}
