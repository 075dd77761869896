//! Presentation of the session controls, busy indicator and message list

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{Message, SessionStatus};

/// Presentation-only sink; holds nothing beyond what it is given
pub trait Renderer: Send + Sync {
    fn set_busy(&self, busy: bool);

    fn show_signed_in(&self);

    /// Show sign-in only and clear the list
    fn show_signed_out(&self);

    /// Replace the displayed list
    fn show(&self, messages: &[Message]);
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len.saturating_sub(3)).collect::<String>())
    }
}

/// One display line for a message
pub fn format_message_line(position: usize, message: &Message) -> String {
    format!(
        "{:>2}. {}  [{}]",
        position,
        truncate_string(&message.subject, 70),
        message.id
    )
}

/// Terminal renderer: spinner for the busy state, printed list otherwise
pub struct ConsoleRenderer {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleRenderer {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
            spinner: Mutex::new(None),
        }
    }

    fn println(&self, line: impl AsRef<str>) {
        let _ = self.multi.println(line);
    }
}

impl Renderer for ConsoleRenderer {
    fn set_busy(&self, busy: bool) {
        let mut spinner = self.spinner.lock().unwrap_or_else(|e| e.into_inner());
        if busy {
            if spinner.is_none() {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(self.spinner_style.clone());
                pb.set_message("Sorting by priority...");
                pb.enable_steady_tick(Duration::from_millis(100));
                *spinner = Some(pb);
            }
        } else if let Some(pb) = spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn show_signed_in(&self) {
        self.println("Signed in. Commands: sort, review, read <ID>, sign-out");
    }

    fn show_signed_out(&self) {
        self.println("Signed out. Command: sign-in");
    }

    fn show(&self, messages: &[Message]) {
        if messages.is_empty() {
            self.println("No messages.");
            return;
        }
        for (index, message) in messages.iter().enumerate() {
            self.println(format_message_line(index + 1, message));
            if !message.snippet.is_empty() {
                self.println(format!("      {}", truncate_string(&message.snippet, 90)));
            }
        }
    }
}

/// Snapshot of everything a renderer has been told to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub sign_in_visible: bool,
    pub sign_out_visible: bool,
    pub sort_visible: bool,
    pub busy: bool,
    pub messages: Vec<Message>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sign_in_visible: true,
            sign_out_visible: false,
            sort_visible: false,
            busy: false,
            messages: Vec::new(),
        }
    }
}

impl ViewState {
    pub fn status(&self) -> SessionStatus {
        if self.sign_out_visible {
            SessionStatus::SignedIn
        } else {
            SessionStatus::SignedOut
        }
    }
}

/// Renderer that records state in memory, for headless runs and tests
#[derive(Default)]
pub struct RecordingRenderer {
    state: Mutex<ViewState>,
    busy_events: Mutex<Vec<bool>>,
    render_count: Mutex<usize>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Every `set_busy` call in order
    pub fn busy_events(&self) -> Vec<bool> {
        self.busy_events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `show` calls
    pub fn render_count(&self) -> usize {
        *self.render_count.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Renderer for RecordingRenderer {
    fn set_busy(&self, busy: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).busy = busy;
        self.busy_events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(busy);
    }

    fn show_signed_in(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sign_in_visible = false;
        state.sign_out_visible = true;
        state.sort_visible = true;
    }

    fn show_signed_out(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sign_in_visible = true;
        state.sign_out_visible = false;
        state.sort_visible = false;
        state.messages.clear();
    }

    fn show(&self, messages: &[Message]) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).messages = messages.to_vec();
        *self.render_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }
}
