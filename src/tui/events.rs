//! Custom event types for TUI application.

use crossterm::event::KeyEvent;

/// Events that can occur in the TUI application
#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Terminal was resized; redraw on the next tick
    Resize,
    /// Request to quit the application
    Quit,
}
