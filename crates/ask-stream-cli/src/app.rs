//! Application state.
//!
//! This module manages the TUI state and coordinates between the UI and the
//! session supervisor. Answer text appears delta-by-delta as sessions report
//! it; the viewport follows the growing answer only while the user is at the
//! bottom.

use ask_stream_core::{
    ResponseState, ScrollFollow, SessionEvent, SessionSupervisor, SurfaceGate,
};
use tokio::sync::watch;

/// Starter questions shown while there is no answer.
pub const SUGGESTIONS: [&str; 3] = [
    "What is a Canopy element?",
    "What is a Collection?",
    "How do I create a form?",
];

/// Lines from the bottom still counted as "at the bottom".
pub const SCROLL_THRESHOLD_LINES: f64 = 2.0;

/// Application state.
pub struct App {
    supervisor: SessionSupervisor,
    surface: SurfaceGate,
    /// Endpoint URL for display.
    endpoint_url: String,
    /// Current input buffer.
    pub input: String,
    /// Cursor position in input, in characters.
    pub cursor_position: usize,
    /// Highlighted suggestion.
    pub selected_suggestion: Option<usize>,
    /// Requested first visible line of the answer; clamped by the renderer.
    scroll_top: usize,
    follow: ScrollFollow,
    /// Wrapped line count of the answer at the last render.
    content_height: usize,
    /// Visible lines at the last render.
    viewport_height: usize,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Animation frame counter for loading indicators.
    pub animation_frame: usize,
}

impl App {
    /// Create a new application.
    #[must_use]
    pub fn new(supervisor: SessionSupervisor, endpoint_url: impl Into<String>) -> Self {
        Self {
            supervisor,
            surface: SurfaceGate::new(),
            endpoint_url: endpoint_url.into(),
            input: String::new(),
            cursor_position: 0,
            selected_suggestion: None,
            scroll_top: 0,
            follow: ScrollFollow::new(SCROLL_THRESHOLD_LINES),
            content_height: 0,
            viewport_height: 0,
            should_quit: false,
            animation_frame: 0,
        }
    }

    /// Tick the animation frame (call on each render).
    pub fn tick_animation(&mut self) {
        self.animation_frame = self.animation_frame.wrapping_add(1);
    }

    /// Get current spinner character for loading animation.
    #[must_use]
    pub fn spinner_char(&self) -> &'static str {
        const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        SPINNER[self.animation_frame % SPINNER.len()]
    }

    /// Get the endpoint URL for display.
    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Current answer state. Do not hold across an `.await`.
    #[must_use]
    pub fn response(&self) -> watch::Ref<'_, ResponseState> {
        self.supervisor.state()
    }

    /// Whether a query is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.response().is_loading
    }

    // =========================================================================
    // Surface
    // =========================================================================

    /// Whether the answer sheet is showing.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.surface.is_open()
    }

    /// Show the answer sheet.
    pub fn open_surface(&mut self) {
        self.surface.set_open(true, &mut self.supervisor);
    }

    /// Hide the answer sheet, dropping the answer and query.
    pub fn close_surface(&mut self) {
        if self.surface.set_open(false, &mut self.supervisor) {
            self.clear_input();
            self.selected_suggestion = None;
            self.follow.stick();
            self.scroll_top = 0;
        }
    }

    /// Toggle the answer sheet.
    pub fn toggle_surface(&mut self) {
        if self.is_open() {
            self.close_surface();
        } else {
            self.open_surface();
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether Enter would submit the current input.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.input.trim().is_empty()
    }

    /// Submit the current input. Returns `false` if submitting is disabled.
    pub fn submit(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        if self.supervisor.submit(&self.input).is_none() {
            return false;
        }
        self.selected_suggestion = None;
        self.follow.stick();
        self.scroll_to_end();
        true
    }

    /// Put a suggestion in the input and submit it.
    pub fn run_suggestion(&mut self, index: usize) -> bool {
        let Some(suggestion) = SUGGESTIONS.get(index) else {
            return false;
        };
        self.set_input(suggestion);
        self.submit()
    }

    /// Stop the query in flight, keeping the partial answer.
    pub fn stop(&mut self) {
        self.supervisor.stop();
    }

    /// Apply a session event. Returns `true` if the screen should redraw.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        let before = self.response().accumulated_text.len();
        if !self.supervisor.handle_event(event) {
            return false;
        }

        let grew = self.response().accumulated_text.len() > before;
        if grew && self.follow.on_content_grow().is_scroll() {
            self.scroll_to_end();
        }
        true
    }

    /// Whether the starter questions are showing.
    #[must_use]
    pub fn shows_suggestions(&self) -> bool {
        let state = self.response();
        !state.is_loading && !state.has_content() && state.error.is_none()
    }

    /// Highlight the previous suggestion.
    pub fn select_prev_suggestion(&mut self) {
        self.selected_suggestion = Some(match self.selected_suggestion {
            Some(0) | None => SUGGESTIONS.len() - 1,
            Some(i) => i - 1,
        });
    }

    /// Highlight the next suggestion.
    pub fn select_next_suggestion(&mut self) {
        self.selected_suggestion = Some(match self.selected_suggestion {
            Some(i) if i + 1 < SUGGESTIONS.len() => i + 1,
            _ => 0,
        });
    }

    // =========================================================================
    // Answer Scrolling
    // =========================================================================

    /// Record the answer's size at render time and clamp the scroll position.
    pub fn set_viewport(&mut self, content_height: usize, viewport_height: usize) {
        self.content_height = content_height;
        self.viewport_height = viewport_height;
        self.scroll_top = self.scroll_top.min(self.max_scroll());
    }

    /// First visible line of the answer.
    #[must_use]
    pub fn scroll_offset(&self) -> usize {
        self.scroll_top.min(self.max_scroll())
    }

    /// Whether new text will pull the view down.
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.follow.stick_to_bottom()
    }

    /// Scroll towards the start of the answer.
    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_top = self.scroll_offset().saturating_sub(amount);
        self.record_scroll();
    }

    /// Scroll towards the end of the answer.
    pub fn scroll_down(&mut self, amount: usize) {
        self.scroll_top = self
            .scroll_offset()
            .saturating_add(amount)
            .min(self.max_scroll());
        self.record_scroll();
    }

    fn max_scroll(&self) -> usize {
        self.content_height.saturating_sub(self.viewport_height)
    }

    fn scroll_to_end(&mut self) {
        self.scroll_top = usize::MAX;
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_scroll(&mut self) {
        self.follow.on_viewport_scroll(
            self.scroll_top as f64,
            self.content_height as f64,
            self.viewport_height as f64,
        );
    }

    // =========================================================================
    // Input Handling
    // =========================================================================

    /// Replace the input, moving the cursor to the end.
    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor_position = self.input.chars().count();
        self.sync_query();
    }

    /// Input text before the cursor.
    #[must_use]
    pub fn input_before_cursor(&self) -> &str {
        &self.input[..self.byte_index(self.cursor_position)]
    }

    /// Insert a character at the cursor position.
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_position);
        self.input.insert(at, c);
        self.cursor_position += 1;
        self.sync_query();
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
            self.sync_query();
        }
    }

    /// Delete the character at the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.char_count() {
            let at = self.byte_index(self.cursor_position);
            self.input.remove(at);
            self.sync_query();
        }
    }

    /// Delete the word before the cursor, including trailing spaces.
    pub fn delete_word(&mut self) {
        let chars: Vec<char> = self.input.chars().take(self.cursor_position).collect();
        let mut start = chars.len();
        while start > 0 && chars[start - 1] == ' ' {
            start -= 1;
        }
        while start > 0 && chars[start - 1] != ' ' {
            start -= 1;
        }

        let from = self.byte_index(start);
        let to = self.byte_index(self.cursor_position);
        self.input.replace_range(from..to, "");
        self.cursor_position = start;
        self.sync_query();
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.char_count() {
            self.cursor_position += 1;
        }
    }

    /// Move cursor to the start.
    pub fn move_cursor_start(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to the end.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.char_count();
    }

    /// Clear the input.
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
        self.sync_query();
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, char_position: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn sync_query(&mut self) {
        self.supervisor.set_query(self.input.as_str());
    }
}
