use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tracing::warn;

use crate::analysis::AnalysisType;
use crate::app::{App, FocusPane, InputMode, Tab};
use crate::config::Config;
use crate::editor::char_to_byte_index;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
    }
    app.poll_background().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // An error popup swallows the next key press
    if app.current_notification().is_some() {
        app.dismiss_notification();
        return;
    }

    if app.show_language_picker {
        handle_language_picker(app, key);
        return;
    }

    match (app.input_mode, app.focus) {
        (InputMode::Editing, FocusPane::Editor) => handle_editor_editing(app, key),
        (InputMode::Editing, FocusPane::ChatInput) => handle_chat_editing(app, key),
        _ => handle_normal_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    let page = result_page_height(app);

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Analyses
        KeyCode::Char('r') => app.start_analysis(AnalysisType::Review),
        KeyCode::Char('o') => app.start_analysis(AnalysisType::Optimize),
        KeyCode::Char('s') => app.start_analysis(AnalysisType::Secure),
        KeyCode::Char('e') => app.start_analysis(AnalysisType::Explain),

        // Editing
        KeyCode::Char('i') | KeyCode::Enter if app.focus == FocusPane::Editor => {
            app.input_mode = InputMode::Editing;
        }
        KeyCode::Char('c') | KeyCode::Char('i') | KeyCode::Enter => {
            if app.chat_available() {
                app.switch_tab(Tab::Chat);
                app.focus = FocusPane::ChatInput;
                app.input_mode = InputMode::Editing;
            }
        }

        // Tabs and focus
        KeyCode::Char('1') => app.switch_tab(Tab::Analysis),
        KeyCode::Char('2') => app.switch_tab(Tab::Chat),
        KeyCode::BackTab => app.next_tab(),
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Editor => FocusPane::Results,
                FocusPane::Results | FocusPane::ChatInput => FocusPane::Editor,
            };
        }

        // Preferences
        KeyCode::Char('L') => app.open_language_picker(),
        KeyCode::Char('t') => {
            app.toggle_theme();
            persist_preferences(app);
        }

        // Navigation
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Editor => app.editor.move_down(),
            _ => app.scroll_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Editor => app.editor.move_up(),
            _ => app.scroll_up(1),
        },
        KeyCode::Char('h') | KeyCode::Left if app.focus == FocusPane::Editor => {
            app.editor.move_left();
        }
        KeyCode::Char('l') | KeyCode::Right if app.focus == FocusPane::Editor => {
            app.editor.move_right();
        }
        KeyCode::Char('g') => match app.focus {
            FocusPane::Editor => app.editor.page_up(app.editor.line_count()),
            _ => app.scroll_top(),
        },
        KeyCode::Char('G') => match app.focus {
            FocusPane::Editor => app.editor.page_down(app.editor.line_count()),
            _ if app.active_tab == Tab::Chat => app.scroll_chat_to_bottom(),
            _ => app.scroll_down(page),
        },

        // Half-page scroll
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(page / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(page / 2);
        }
        KeyCode::PageDown => app.scroll_down(page),
        KeyCode::PageUp => app.scroll_up(page),

        _ => {}
    }
}

fn handle_editor_editing(app: &mut App, key: KeyEvent) {
    let height = editor_page_height(app);
    let editor = &mut app.editor;

    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => editor.newline(),
        KeyCode::Tab => editor.insert_char('\t'),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Delete => editor.delete(),
        KeyCode::Left => editor.move_left(),
        KeyCode::Right => editor.move_right(),
        KeyCode::Up => editor.move_up(),
        KeyCode::Down => editor.move_down(),
        KeyCode::Home => editor.move_home(),
        KeyCode::End => editor.move_end(),
        KeyCode::PageUp => editor.page_up(height),
        KeyCode::PageDown => editor.page_down(height),
        KeyCode::Char(c) => editor.insert_char(c),
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Results;
        }
        KeyCode::Enter => {
            app.send_chat_message();
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

fn handle_language_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.show_language_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.language_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.language_picker_nav_up(),
        KeyCode::Enter => {
            app.confirm_language_picker();
            persist_preferences(app);
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    if app.current_notification().is_some() || app.show_language_picker {
        return;
    }
    match (app.input_mode, app.focus) {
        (InputMode::Editing, FocusPane::ChatInput) => {
            // The chat box is a single line
            let flat = text.replace(['\r', '\n'], " ");
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert_str(byte_pos, &flat);
            app.chat_cursor += flat.chars().count();
        }
        (_, FocusPane::Editor) => app.editor.insert_str(text),
        _ => {}
    }
}

fn persist_preferences(app: &App) {
    if let Err(e) = Config::save_preferences(app.theme, app.language) {
        warn!(error = %e, "could not save preferences");
    }
}

fn editor_page_height(app: &App) -> usize {
    app.editor_area
        .map(|r| r.height.saturating_sub(2) as usize)
        .unwrap_or(10)
}

fn result_page_height(app: &App) -> u16 {
    app.result_area
        .map(|r| r.height.saturating_sub(2))
        .unwrap_or(10)
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling
    let in_editor = app.editor_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_results = app.result_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_editor {
                let last = app.editor.line_count().saturating_sub(1);
                app.editor.scroll = (app.editor.scroll + 3).min(last);
            } else if in_results {
                app.scroll_down(3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_editor {
                app.editor.scroll = app.editor.scroll.saturating_sub(3);
            } else if in_results {
                app.scroll_up(3);
            }
        }
        MouseEventKind::Down(_) => {
            if in_editor {
                app.focus = FocusPane::Editor;
            } else if in_results {
                app.focus = FocusPane::Results;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubModel;
    use crate::app::Theme;
    use crate::client::AnalysisClient;
    use crate::language::SupportedLanguage;
    use std::sync::Arc;

    const REVIEW_JSON: &str = r#"{"summary":"fine","details":[]}"#;

    fn app(replies: &[&str], code: &str) -> App {
        let client = AnalysisClient::new(Arc::new(StubModel::replying(replies)), "stub-model");
        App::new(client, code, SupportedLanguage::Python, Theme::Dark)
    }

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn typing_in_editor_mode_edits_code() {
        let mut app = app(&[], "");
        for event in [press(KeyCode::Char('i')), press(KeyCode::Char('x')), press(KeyCode::Enter)] {
            handle_event(&mut app, event).await.unwrap();
        }
        handle_event(&mut app, AppEvent::Paste("y = 2".to_string()))
            .await
            .unwrap();
        handle_event(&mut app, press(KeyCode::Esc)).await.unwrap();

        assert_eq!(app.code(), "x\ny = 2");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn analysis_key_runs_and_failure_popup_dismisses() {
        let mut app = app(&["garbage"], "print(1)");
        handle_event(&mut app, press(KeyCode::Char('r'))).await.unwrap();
        assert!(app.is_loading);
        app.settle().await;
        assert_eq!(app.notifications.len(), 1);

        // The dismissing key is not also treated as a command
        handle_event(&mut app, press(KeyCode::Char('q'))).await.unwrap();
        assert!(app.notifications.is_empty());
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn chat_key_is_ignored_until_analysis_succeeds() {
        let mut app = app(&[REVIEW_JSON], "print(1)");
        app.focus = FocusPane::Results;
        handle_event(&mut app, press(KeyCode::Char('c'))).await.unwrap();
        assert_eq!(app.active_tab, Tab::Analysis);
        assert_eq!(app.input_mode, InputMode::Normal);

        app.analyze(AnalysisType::Review).await;
        handle_event(&mut app, press(KeyCode::Char('c'))).await.unwrap();
        assert_eq!(app.active_tab, Tab::Chat);
        assert_eq!(app.focus, FocusPane::ChatInput);

        for c in "héllo".chars() {
            handle_event(&mut app, press(KeyCode::Char(c))).await.unwrap();
        }
        handle_event(&mut app, press(KeyCode::Left)).await.unwrap();
        handle_event(&mut app, press(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.chat_input, "hélo");
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_editing() {
        let mut app = app(&[], "x");
        app.input_mode = InputMode::Editing;
        let event = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, event).await.unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn point_in_rect_excludes_far_edges() {
        let rect = Rect::new(2, 3, 4, 5);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(5, 7, rect));
        assert!(!point_in_rect(6, 3, rect));
        assert!(!point_in_rect(2, 8, rect));
    }
}
