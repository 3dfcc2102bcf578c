//! TUI application state management.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::dom::ScriptLog;
use crate::error::ValidationError;
use crate::orchestrator::{Generation, RequestState};
use crate::query::Query;
use crate::render::RegionPolicies;
use crate::view::HostView;

/// How long the input border stays red after an empty submit.
pub const REJECT_CUE: Duration = Duration::from_millis(600);

/// Application state for the TUI
#[derive(Debug)]
pub struct App {
    /// Input buffer
    pub input: String,
    /// Cursor position in input (char index)
    pub input_cursor: usize,
    /// Input history (submitted questions)
    pub input_history: Vec<String>,
    /// Current history index when navigating (None = new line)
    pub history_index: Option<usize>,
    /// Model identifier sent with every request
    pub model: String,
    /// Pipeline endpoint, shown in the status bar
    pub endpoint: String,
    /// Whether to show help
    pub show_help: bool,
    /// Status message to display
    pub status_message: String,
    /// When the last empty submit was rejected
    pub rejected_at: Option<Instant>,
    /// Question behind the currently displayed state
    pub last_query: Option<String>,
    /// Label of the current request state
    pub state_label: &'static str,
    /// Generation of the latest submission
    pub generation: Generation,
    /// Report and chart regions
    pub view: HostView<ScriptLog>,
    /// Scroll offset for the report region
    pub report_scroll: u16,
    /// Where ctrl+s writes the page
    pub export_path: PathBuf,
    /// Timestamp of last Ctrl+C press for double Ctrl+C detection
    pub last_ctrl_c_time: Option<Instant>,
}

impl App {
    /// Create a new TUI application instance
    pub fn new(model: String, endpoint: String, export_path: PathBuf, policies: RegionPolicies) -> Self {
        Self {
            input: String::new(),
            input_cursor: 0,
            input_history: Vec::new(),
            history_index: None,
            model,
            endpoint,
            show_help: false,
            status_message: "Enter=run | ctrl+s export | F1 help".to_string(),
            rejected_at: None,
            last_query: None,
            state_label: RequestState::Idle.label(),
            generation: Generation::default(),
            view: HostView::new(ScriptLog::default(), policies),
            report_scroll: 0,
            export_path,
            last_ctrl_c_time: None,
        }
    }

    /// Validate and take the current input as a query.
    ///
    /// Empty input stays where it is and triggers the rejection cue; nothing
    /// about the request state changes.
    pub fn take_query(&mut self) -> Result<Query, ValidationError> {
        match Query::parse(&self.input) {
            Ok(query) => {
                self.push_history(query.to_string());
                self.last_query = Some(query.to_string());
                self.clear_input();
                self.rejected_at = None;
                Ok(query)
            }
            Err(err) => {
                self.rejected_at = Some(Instant::now());
                Err(err)
            }
        }
    }

    /// Whether the rejection cue should still be drawn at `now`.
    pub fn is_rejecting(&self, now: Instant) -> bool {
        self.rejected_at
            .is_some_and(|at| now.saturating_duration_since(at) < REJECT_CUE)
    }

    /// Rebuild the view for a new request state.
    /// The script log only ever holds the latest render pass.
    pub fn apply_state(&mut self, state: &RequestState, generation: Generation) {
        self.view.document_mut().host_mut().clear();
        self.view.sync(state);
        self.state_label = state.label();
        self.generation = generation;
        self.report_scroll = 0;
    }

    pub fn scripts_executed(&self) -> usize {
        self.view.document().host().executed().len()
    }

    /// Clear input buffers
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.input_cursor = 0;
        self.history_index = None;
    }

    /// Toggle help display
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn scroll_up(&mut self) {
        self.report_scroll = self.report_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.report_scroll = self.report_scroll.saturating_add(1);
    }

    // ----- Input editing helpers -----
    pub fn move_cursor_left(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
        }
    }

    pub fn move_cursor_right(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            self.input_cursor += 1;
        }
    }

    pub fn move_cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.input_cursor);
        self.input.insert(at, c);
        self.input_cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            let at = self.byte_offset(self.input_cursor - 1);
            self.input.remove(at);
            self.input_cursor -= 1;
        }
    }

    pub fn delete(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let at = self.byte_offset(self.input_cursor);
            self.input.remove(at);
        }
    }

    /// Input text before the cursor, for cursor placement.
    pub fn input_before_cursor(&self) -> &str {
        &self.input[..self.byte_offset(self.input_cursor)]
    }

    pub fn push_history(&mut self, line: String) {
        if !line.trim().is_empty() && self.input_history.last().map(|s| s.as_str()) != Some(line.as_str()) {
            self.input_history.push(line);
        }
        self.history_index = None;
    }

    pub fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let i = match self.history_index {
            None => self.input_history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.history_index = Some(i);
        self.input = self.input_history[i].clone();
        self.move_cursor_end();
    }

    pub fn history_next(&mut self) {
        match self.history_index {
            None => {}
            Some(i) if i + 1 < self.input_history.len() => {
                self.history_index = Some(i + 1);
                self.input = self.input_history[i + 1].clone();
                self.move_cursor_end();
            }
            Some(_) => {
                self.history_index = None;
                self.input.clear();
                self.input_cursor = 0;
            }
        }
    }

    /// Handle Ctrl+C press and detect double press for quit
    /// Returns true if should quit (double Ctrl+C), false otherwise
    pub fn handle_ctrl_c(&mut self) -> bool {
        const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);

        let now = Instant::now();

        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        // Single Ctrl+C - clear input and record timestamp
        self.clear_input();
        self.last_ctrl_c_time = Some(now);
        false
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineResponse;

    fn app() -> App {
        App::new("gpt-4o-mini".into(), "http://localhost:8000/pipeline".into(), PathBuf::from("out.html"), RegionPolicies::default())
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.insert_char(c);
        }
    }

    #[test]
    fn whitespace_submit_is_rejected_with_cue() {
        let mut app = app();
        type_str(&mut app, "   ");
        assert_eq!(app.take_query(), Err(ValidationError::EmptyQuery));
        assert!(app.is_rejecting(Instant::now()));
        assert_eq!(app.input, "   ", "rejected input stays in place");
        assert_eq!(app.state_label, "idle");
        assert!(app.input_history.is_empty());
    }

    #[test]
    fn rejection_cue_fades() {
        let mut app = app();
        app.take_query().unwrap_err();
        let later = Instant::now() + REJECT_CUE + Duration::from_millis(1);
        assert!(!app.is_rejecting(later));
    }

    #[test]
    fn accepted_query_is_trimmed_recorded_and_cleared() {
        let mut app = app();
        type_str(&mut app, "  sales by region ");
        let q = app.take_query().unwrap();
        assert_eq!(q.as_str(), "sales by region");
        assert_eq!(app.last_query.as_deref(), Some("sales by region"));
        assert_eq!(app.input_history, vec!["sales by region"]);
        assert!(app.input.is_empty());
        assert_eq!(app.input_cursor, 0);
    }

    #[test]
    fn editing_handles_multibyte_chars() {
        let mut app = app();
        type_str(&mut app, "ventes é");
        app.move_cursor_left();
        app.insert_char('→');
        assert_eq!(app.input, "ventes →é");
        app.backspace();
        app.delete();
        assert_eq!(app.input, "ventes ");
        assert_eq!(app.input_before_cursor(), "ventes ");
    }

    #[test]
    fn history_navigation() {
        let mut app = app();
        app.push_history("first".into());
        app.push_history("second".into());
        app.push_history("second".into());
        assert_eq!(app.input_history.len(), 2);

        app.history_prev();
        assert_eq!(app.input, "second");
        app.history_prev();
        assert_eq!(app.input, "first");
        app.history_prev();
        assert_eq!(app.input, "first");
        app.history_next();
        assert_eq!(app.input, "second");
        app.history_next();
        assert!(app.input.is_empty());
    }

    #[test]
    fn apply_state_updates_label_and_view() {
        let mut app = app();
        app.apply_state(&RequestState::Loading, Generation::default());
        assert_eq!(app.state_label, "loading");
        app.apply_state(
            &RequestState::Success(PipelineResponse {
                report_html: "<p>ok</p>".into(),
                chart_html_list: vec!["<p>c</p>".into()],
                sql_query: None,
                reformulated_intent: None,
            }),
            Generation::default(),
        );
        assert_eq!(app.state_label, "success");
        assert_eq!(app.view.chart_summaries().len(), 1);
    }
}
