//! Async event loop for the TUI.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;

use super::{app::App, events::TuiEvent, ui::render_ui};
use crate::export;
use crate::orchestrator::{Orchestrator, Resolution};
use crate::pipeline::Pipeline;
use crate::render::RegionPolicies;

/// Everything the TUI needs from the command line and config.
#[derive(Debug, Clone)]
pub struct TuiOptions {
    pub model: String,
    pub endpoint: String,
    pub export_path: PathBuf,
    pub initial_query: Option<String>,
}

/// Run the interactive front end until the user quits.
pub async fn run_tui<P>(pipeline: P, opts: TuiOptions) -> Result<()>
where
    P: Pipeline + 'static,
{
    // Check if we're in a proper terminal environment
    if !io::IsTerminal::is_terminal(&io::stdout()) {
        return Err(anyhow::anyhow!("TUI mode requires a proper terminal environment"));
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(opts.model.clone(), opts.endpoint.clone(), opts.export_path.clone(), RegionPolicies::default());
    let mut orchestrator = Orchestrator::new(opts.model.clone());

    if let Some(q) = opts.initial_query.as_deref() {
        app.input = q.to_string();
        app.move_cursor_end();
    }

    // Main event loop
    let result = run_app(&mut terminal, &mut app, &mut orchestrator, Arc::new(pipeline)).await;

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main application loop
async fn run_app<P>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    orchestrator: &mut Orchestrator,
    pipeline: Arc<P>,
) -> Result<()>
where
    P: Pipeline + 'static,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Resolution>();
    let mut state_rx = orchestrator.subscribe();

    // Spawn input handler
    let input_tx = event_tx.clone();
    tokio::task::spawn_blocking(move || {
        while !input_tx.is_closed() {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                let sent = match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => input_tx.send(TuiEvent::Key(key)),
                    Ok(Event::Resize(_, _)) => input_tx.send(TuiEvent::Resize),
                    _ => Ok(()),
                };
                if sent.is_err() {
                    break; // Channel closed
                }
            }
        }
    });

    // A query passed on the command line runs right away.
    if !app.input.trim().is_empty() {
        submit_input(app, orchestrator, &pipeline, &result_tx);
    }

    loop {
        // Render UI
        terminal.draw(|frame| render_ui(frame, app))?;

        // Handle events
        while let Ok(tui_event) = event_rx.try_recv() {
            match tui_event {
                TuiEvent::Key(key) => {
                    if handle_key_event(app, key, orchestrator, &pipeline, &result_tx, &event_tx) {
                        return Ok(());
                    }
                }
                TuiEvent::Resize => {}
                TuiEvent::Quit => return Ok(()),
            }
        }

        // Pipeline calls that finished since the last tick
        while let Ok(resolution) = result_rx.try_recv() {
            // Stale resolutions are logged by the orchestrator and otherwise ignored.
            let _ = orchestrator.resolve(resolution);
        }

        if state_rx.has_changed().unwrap_or(false) {
            let state = state_rx.borrow_and_update().clone();
            app.apply_state(&state, orchestrator.generation());
        }

        // Small delay to prevent busy waiting
        tokio::time::sleep(Duration::from_millis(16)).await; // ~60 FPS
    }
}

/// Handle keyboard events. Returns true when the app should quit.
fn handle_key_event<P>(
    app: &mut App,
    key: KeyEvent,
    orchestrator: &mut Orchestrator,
    pipeline: &Arc<P>,
    result_tx: &mpsc::UnboundedSender<Resolution>,
    event_tx: &mpsc::UnboundedSender<TuiEvent>,
) -> bool
where
    P: Pipeline + 'static,
{
    if app.show_help {
        app.toggle_help();
        return false;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return app.handle_ctrl_c(),
        KeyCode::Char('s') if ctrl => export_page(app),
        KeyCode::Char('p') if ctrl => app.history_prev(),
        KeyCode::Char('n') if ctrl => app.history_next(),
        KeyCode::Esc => {
            let _ = event_tx.send(TuiEvent::Quit);
        }
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Enter => submit_input(app, orchestrator, pipeline, result_tx),
        KeyCode::Up => app.history_prev(),
        KeyCode::Down => app.history_next(),
        KeyCode::PageUp => app.scroll_up(),
        KeyCode::PageDown => app.scroll_down(),
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
    false
}

fn submit_input<P>(
    app: &mut App,
    orchestrator: &mut Orchestrator,
    pipeline: &Arc<P>,
    result_tx: &mpsc::UnboundedSender<Resolution>,
) where
    P: Pipeline + 'static,
{
    // Empty input only triggers the cue; nothing reaches the orchestrator.
    let Ok(query) = app.take_query() else {
        return;
    };
    let generation = orchestrator.submit(query, Arc::clone(pipeline), result_tx.clone());
    app.status_message = format!("Submitted {} | Enter=run | ctrl+s export | F1 help", generation);
}

fn export_page(app: &mut App) {
    let html = export::page(&app.view, app.last_query.as_deref());
    app.status_message = match export::write_page(&app.export_path, &html) {
        Ok(()) => format!("Exported to {}", app.export_path.display()),
        Err(e) => format!("Export failed: {:#}", e),
    };
}
