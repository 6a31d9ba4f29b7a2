use crate::analysis::{AnalysisResult, AnalysisType};
use crate::chat::{ChatInstance, ChatRole, PendingReply};
use crate::client::{AnalysisClient, AnalysisError};
use crate::editor::EditorBuffer;
use crate::language::SupportedLanguage;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Analysis,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Editor,
    Results,
    ChatInput,
}

/// Sample shown on first launch so every analysis has something to find:
/// a wasteful loop and an XSS sink.
pub const DEFAULT_CODE: &str = r#"import React from 'react';

// A simple component that might have issues
function UserProfile({ user }) {
  // Inefficient data processing
  const processedData = user.data.map(item => {
    let processed = item;
    for (let i = 0; i < 1000; i++) {
      processed += i;
    }
    return processed;
  });

  return (
    <div>
      <h1>{user.name}</h1>
      <div dangerouslySetInnerHTML={{ __html: user.bio }} />
      <ul>
        {processedData.map((d, i) => <li key={i}>{d}</li>)}
      </ul>
    </div>
  );
}

export default UserProfile;
"#;

/// The code and language captured when an analysis was triggered.
///
/// The chat opened on success is seeded from this snapshot, not from
/// whatever the editor holds by the time the model answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub kind: AnalysisType,
    pub code: String,
    pub language: SupportedLanguage,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub theme: Theme,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Code under analysis
    pub editor: EditorBuffer,
    pub language: SupportedLanguage,

    // Result pane state
    pub active_tab: Tab,
    pub analysis_type: AnalysisType,
    pub analysis_result: Option<AnalysisResult>,
    pub is_loading: bool,
    pub result_scroll: u16,

    // Chat state
    pub chat: Option<ChatInstance>,
    pub chat_input: String,
    pub chat_cursor: usize, // cursor position in chat_input
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations

    // Blocking error popups, oldest first
    pub notifications: VecDeque<String>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Language picker state
    pub show_language_picker: bool,
    pub language_picker_state: ListState,

    // Panel areas for mouse hit-testing (updated during render)
    pub editor_area: Option<Rect>,
    pub result_area: Option<Rect>,

    pub client: AnalysisClient,
    analysis_task: Option<(AnalysisRequest, JoinHandle<Result<AnalysisResult, AnalysisError>>)>,
    pending_reply: Option<PendingReply>,
}

impl App {
    pub fn new(client: AnalysisClient, code: &str, language: SupportedLanguage, theme: Theme) -> Self {
        Self {
            should_quit: false,
            theme,
            input_mode: InputMode::Normal,
            focus: FocusPane::Editor,

            editor: EditorBuffer::from_text(code),
            language,

            active_tab: Tab::Analysis,
            analysis_type: AnalysisType::default(),
            analysis_result: None,
            is_loading: false,
            result_scroll: 0,

            chat: None,
            chat_input: String::new(),
            chat_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            notifications: VecDeque::new(),

            animation_frame: 0,

            show_language_picker: false,
            language_picker_state: ListState::default(),

            editor_area: None,
            result_area: None,

            client,
            analysis_task: None,
            pending_reply: None,
        }
    }

    pub fn code(&self) -> String {
        self.editor.text()
    }

    /// Replace the whole buffer. Result and chat are left alone.
    pub fn edit_code(&mut self, text: &str) {
        self.editor = EditorBuffer::from_text(text);
    }

    pub fn select_language(&mut self, language: SupportedLanguage) {
        self.language = language;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
    }

    pub fn chat_available(&self) -> bool {
        self.chat.is_some()
    }

    /// Switching to Chat without a chat session does nothing.
    pub fn switch_tab(&mut self, tab: Tab) {
        if tab == Tab::Chat && self.chat.is_none() {
            return;
        }
        self.active_tab = tab;
        if tab == Tab::Analysis && self.focus == FocusPane::ChatInput {
            self.focus = FocusPane::Results;
            self.input_mode = InputMode::Normal;
        }
    }

    pub fn next_tab(&mut self) {
        match self.active_tab {
            Tab::Analysis => self.switch_tab(Tab::Chat),
            Tab::Chat => self.switch_tab(Tab::Analysis),
        }
    }

    /// Enter the loading state for a `kind` analysis.
    ///
    /// Returns `None` (and changes nothing) when the buffer is empty or an
    /// analysis is already running.
    pub fn begin_analysis(&mut self, kind: AnalysisType) -> Option<AnalysisRequest> {
        if self.is_loading {
            return None;
        }
        let code = self.code();
        if code.is_empty() {
            return None;
        }

        self.is_loading = true;
        self.analysis_result = None;
        self.analysis_type = kind;
        self.active_tab = Tab::Analysis;
        self.result_scroll = 0;
        self.drop_chat();
        if self.focus == FocusPane::ChatInput {
            self.focus = FocusPane::Results;
            self.input_mode = InputMode::Normal;
        }

        Some(AnalysisRequest {
            kind,
            code,
            language: self.language,
        })
    }

    /// Leave the loading state with the outcome of `request`.
    pub fn complete_analysis(
        &mut self,
        request: AnalysisRequest,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) {
        match outcome {
            Ok(result) => {
                info!(kind = %request.kind, "analysis result ready");
                self.analysis_result = Some(result);
                let session = self.client.create_session(&request.code, request.language);
                self.chat = Some(ChatInstance::new(session));
            }
            Err(e) => {
                warn!(kind = %request.kind, error = %e, "analysis failed");
                self.analysis_result = None;
                self.notifications.push_back(format!("Analysis failed: {}", e));
            }
        }
        self.is_loading = false;
    }

    /// Run a `kind` analysis to completion on the current task.
    pub async fn analyze(&mut self, kind: AnalysisType) {
        if let Some(request) = self.begin_analysis(kind) {
            let outcome = self
                .client
                .analyze(request.kind, &request.code, request.language)
                .await;
            self.complete_analysis(request, outcome);
        }
    }

    /// Start a `kind` analysis in the background; see [`App::poll_background`].
    pub fn start_analysis(&mut self, kind: AnalysisType) {
        if let Some(request) = self.begin_analysis(kind) {
            let client = self.client.clone();
            let (code, language) = (request.code.clone(), request.language);
            let task = tokio::spawn(async move { client.analyze(kind, &code, language).await });
            self.analysis_task = Some((request, task));
        }
    }

    /// Append or update the chat history. Ignored when no chat exists.
    pub fn append_chat_turn(&mut self, role: ChatRole, content: impl Into<String>) {
        if let Some(chat) = self.chat.as_mut() {
            chat.append(role, content);
        }
    }

    pub fn is_chat_pending(&self) -> bool {
        self.pending_reply.is_some()
    }

    /// Send the chat input box as the next user turn.
    pub fn send_chat_message(&mut self) -> bool {
        if self.chat_input.trim().is_empty() || self.pending_reply.is_some() {
            return false;
        }
        let Some(chat) = self.chat.as_mut() else {
            return false;
        };

        let text = std::mem::take(&mut self.chat_input);
        self.chat_cursor = 0;
        chat.append(ChatRole::User, text.clone());
        self.pending_reply = Some(chat.session.spawn_reply(&text));
        self.scroll_chat_to_bottom();
        true
    }

    /// Apply finished background work. Called on every event-loop turn.
    pub async fn poll_background(&mut self) {
        if self
            .analysis_task
            .as_ref()
            .is_some_and(|(_, task)| task.is_finished())
        {
            self.finish_analysis_task().await;
        }

        self.apply_partials();
        if self.pending_reply.as_ref().is_some_and(|p| p.is_finished()) {
            self.finish_reply().await;
        }
    }

    /// Wait for all background work to finish and apply it.
    pub async fn settle(&mut self) {
        if self.analysis_task.is_some() {
            self.finish_analysis_task().await;
        }
        if self.pending_reply.is_some() {
            self.finish_reply().await;
        }
    }

    async fn finish_analysis_task(&mut self) {
        if let Some((request, task)) = self.analysis_task.take() {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AnalysisError::Model(crate::ai::ModelError::Interrupted(
                    e.to_string(),
                ))),
            };
            self.complete_analysis(request, outcome);
        }
    }

    fn apply_partials(&mut self) {
        let partials = match self.pending_reply.as_mut() {
            Some(pending) => pending.drain(),
            None => return,
        };
        if let Some(latest) = partials.into_iter().last() {
            self.append_chat_turn(ChatRole::Model, latest);
            self.scroll_chat_to_bottom();
        }
    }

    async fn finish_reply(&mut self) {
        self.apply_partials();
        let Some(pending) = self.pending_reply.take() else {
            return;
        };
        let Some(chat) = self.chat.as_mut() else {
            pending.abort();
            return;
        };
        match pending.finish(&mut chat.session).await {
            Ok(reply) => chat.append(ChatRole::Model, reply),
            Err(e) => {
                warn!(error = %e, "chat reply failed");
                // Keep whatever already streamed in and put the error under it
                let notice = format!("Error: {}", e);
                let content = match chat.history.last() {
                    Some(last) if last.role == ChatRole::Model => {
                        format!("{}\n\n{}", last.content, notice)
                    }
                    _ => notice,
                };
                chat.append(ChatRole::Model, content);
            }
        }
        self.scroll_chat_to_bottom();
    }

    /// A new analysis replaces the chat, so a reply still streaming into the
    /// old one is abandoned.
    fn drop_chat(&mut self) {
        if let Some(pending) = self.pending_reply.take() {
            pending.abort();
        }
        self.chat = None;
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_scroll = 0;
    }

    pub fn current_notification(&self) -> Option<&str> {
        self.notifications.front().map(String::as_str)
    }

    pub fn dismiss_notification(&mut self) {
        self.notifications.pop_front();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_loading || self.pending_reply.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Result pane scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        match self.active_tab {
            Tab::Analysis => self.result_scroll = self.result_scroll.saturating_add(lines),
            Tab::Chat => self.chat_scroll = self.chat_scroll.saturating_add(lines),
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        match self.active_tab {
            Tab::Analysis => self.result_scroll = self.result_scroll.saturating_sub(lines),
            Tab::Chat => self.chat_scroll = self.chat_scroll.saturating_sub(lines),
        }
    }

    pub fn scroll_top(&mut self) {
        match self.active_tab {
            Tab::Analysis => self.result_scroll = 0,
            Tab::Chat => self.chat_scroll = 0,
        }
    }

    /// Scroll chat to bottom so the newest turn is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        if let Some(chat) = &self.chat {
            for msg in &chat.history {
                total_lines = total_lines.saturating_add(1); // Role line ("You:" or "AI:")
                for line in msg.content.lines() {
                    // Use character count, not byte length, for proper UTF-8 handling
                    let char_count = line.chars().count();
                    total_lines = total_lines.saturating_add(((char_count / wrap_width) + 1) as u16);
                }
                total_lines = total_lines.saturating_add(1); // Blank line after message
            }
        }

        // Room for the "Thinking..." indicator
        if self.pending_reply.is_some() {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    // Language picker methods
    pub fn open_language_picker(&mut self) {
        let current_idx = SupportedLanguage::all()
            .iter()
            .position(|l| *l == self.language)
            .unwrap_or(0);
        self.language_picker_state.select(Some(current_idx));
        self.show_language_picker = true;
    }

    pub fn language_picker_nav_down(&mut self) {
        let len = SupportedLanguage::all().len();
        let i = self.language_picker_state.selected().unwrap_or(0);
        self.language_picker_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn language_picker_nav_up(&mut self) {
        let i = self.language_picker_state.selected().unwrap_or(0);
        self.language_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn confirm_language_picker(&mut self) {
        if let Some(language) = self
            .language_picker_state
            .selected()
            .and_then(|i| SupportedLanguage::all().get(i).copied())
        {
            self.select_language(language);
        }
        self.show_language_picker = false;
    }

    pub fn status_title(&self) -> String {
        format!("{}: {}", self.client.provider().as_str(), self.client.model_name())
    }
}
