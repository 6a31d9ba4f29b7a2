use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::analysis::{AnalysisResult, AnalysisType, Severity};
use crate::app::{App, FocusPane, InputMode, Tab, Theme};
use crate::chat::ChatRole;
use crate::language::SupportedLanguage;

/// Colors that change with the light/dark theme.
struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    border: Color,
    focus: Color,
    code: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                border: Color::DarkGray,
                focus: Color::Cyan,
                code: Color::LightGreen,
            },
            Theme::Light => Self {
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                border: Color::Gray,
                focus: Color::Blue,
                code: Color::Green,
            },
        }
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::High => Color::Red,
        Severity::Medium => Color::Yellow,
        Severity::Low => Color::Blue,
    }
}

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing **, treat as literal
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn dots(app: &App) -> String {
    ".".repeat(app.animation_frame as usize + 1)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.theme);

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let [code_area, result_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
            .areas(body_area);

    render_header(app, frame, header_area);
    render_code_pane(app, &palette, frame, code_area);
    render_result_pane(app, &palette, frame, result_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if let Some(message) = app.current_notification() {
        render_notification(message, frame, area);
    } else if app.show_language_picker {
        render_language_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let theme = match app.theme {
        Theme::Dark => "dark",
        Theme::Light => "light",
    };

    let title = Line::from(vec![
        Span::styled(" CodeLens ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.status_title()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!(" {} ", app.language.display_name()),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(format!(" {} ", theme), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_code_pane(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let [editor_area, actions_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);

    app.editor_area = Some(editor_area);

    let editing = app.input_mode == InputMode::Editing && app.focus == FocusPane::Editor;
    let border_color = if editing {
        Color::Yellow
    } else if app.focus == FocusPane::Editor {
        palette.focus
    } else {
        palette.border
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Code ({}) ", app.language.display_name()));
    let inner = block.inner(editor_area);
    let height = inner.height as usize;

    if editing {
        app.editor.scroll_into_view(height);
    }

    let gutter = app.editor.line_count().to_string().len();
    let text = if app.editor.is_empty() && !editing {
        Text::from(Span::styled(
            "Paste or type code here (i to edit)",
            Style::default().fg(palette.muted),
        ))
    } else {
        let lines: Vec<Line> = app
            .editor
            .lines()
            .iter()
            .enumerate()
            .skip(app.editor.scroll)
            .take(height)
            .map(|(i, line)| {
                Line::from(vec![
                    Span::styled(
                        format!("{:>width$} ", i + 1, width = gutter),
                        Style::default().fg(palette.muted),
                    ),
                    Span::styled(line.clone(), Style::default().fg(palette.text)),
                ])
            })
            .collect();
        Text::from(lines)
    };

    frame.render_widget(Paragraph::new(text).block(block), editor_area);

    // Show cursor when editing
    if editing {
        let (row, col) = app.editor.cursor();
        let x = inner.x + (gutter + 1 + col) as u16;
        let y = inner.y + row.saturating_sub(app.editor.scroll) as u16;
        if x < inner.x + inner.width && y < inner.y + inner.height {
            frame.set_cursor_position((x, y));
        }
    }

    render_actions(app, palette, frame, actions_area);
}

fn render_actions(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let mut spans = Vec::new();
    for (key, kind) in [
        ("r", AnalysisType::Review),
        ("o", AnalysisType::Optimize),
        ("s", AnalysisType::Secure),
        ("e", AnalysisType::Explain),
    ] {
        let label_style = if kind == app.analysis_type && (app.is_loading || app.analysis_result.is_some()) {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        spans.push(Span::styled(
            format!(" {} ", key),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ));
        spans.push(Span::styled(format!(" {} ", kind.label()), label_style));
    }

    if app.is_loading {
        spans.push(Span::styled(
            format!(" Analyzing{}", dots(app)),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ));
    } else if app.editor.is_empty() {
        spans.push(Span::styled(" (no code)", Style::default().fg(palette.muted)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_result_pane(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let [tabs_area, content_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);

    app.result_area = Some(content_area);

    let chat_style = if app.chat_available() {
        Style::default().fg(palette.text)
    } else {
        Style::default().fg(palette.muted)
    };
    let titles = vec![
        Line::styled(" 1 Analysis ", Style::default().fg(palette.text)),
        Line::styled(" 2 Chat ", chat_style),
    ];
    let selected = match app.active_tab {
        Tab::Analysis => 0,
        Tab::Chat => 1,
    };
    let tabs = Tabs::new(titles).select(selected).highlight_style(
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    );
    frame.render_widget(tabs, tabs_area);

    match app.active_tab {
        Tab::Analysis => render_analysis(app, palette, frame, content_area),
        Tab::Chat => render_chat(app, palette, frame, content_area),
    }
}

fn render_analysis(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let border_color = if app.focus == FocusPane::Results {
        palette.focus
    } else {
        palette.border
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {} ", app.analysis_type.label()));

    let text = if app.is_loading {
        Text::from(Span::styled(
            format!("Running {}{}", app.analysis_type.label(), dots(app)),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        ))
    } else if let Some(result) = &app.analysis_result {
        Text::from(result_lines(result, palette))
    } else {
        Text::from(vec![
            Line::styled(
                "No analysis yet.",
                Style::default().fg(palette.muted),
            ),
            Line::default(),
            Line::styled(
                "Press r, o, s or e to review, optimize, scan or explain the code.",
                Style::default().fg(palette.muted),
            ),
        ])
    };

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0));
    frame.render_widget(paragraph, area);
}

fn result_lines(result: &AnalysisResult, palette: &Palette) -> Vec<Line<'static>> {
    let heading = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);
    let muted = Style::default().fg(palette.muted);

    let mut lines = vec![Line::styled("Summary", heading)];
    lines.extend(result.summary().lines().map(parse_markdown_line));
    lines.push(Line::default());

    match result {
        AnalysisResult::Review(review) => {
            lines.push(Line::styled(format!("Findings ({})", review.details.len()), heading));
            if review.details.is_empty() {
                lines.push(Line::styled("No issues found.", muted));
            }
            for detail in &review.details {
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("[{}]", detail.severity.as_str()),
                        Style::default()
                            .fg(severity_color(detail.severity))
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!(" Line {}", detail.line), muted),
                ]));
                lines.push(Line::from(format!("  {}", detail.issue)));
                lines.push(Line::from(vec![
                    Span::styled("  Suggestion: ", muted),
                    Span::raw(detail.suggestion.clone()),
                ]));
                lines.push(Line::default());
            }
        }
        AnalysisResult::Optimize(optimize) => {
            lines.push(Line::styled("Optimized code", heading));
            for code_line in optimize.optimized_code.lines() {
                lines.push(Line::styled(
                    code_line.to_string(),
                    Style::default().fg(palette.code),
                ));
            }
        }
        AnalysisResult::Secure(secure) => {
            lines.push(Line::styled(
                format!("Vulnerabilities ({})", secure.vulnerabilities.len()),
                heading,
            ));
            if secure.vulnerabilities.is_empty() {
                lines.push(Line::styled("No vulnerabilities found.", muted));
            }
            for vuln in &secure.vulnerabilities {
                lines.push(Line::from(vec![
                    Span::styled(
                        vuln.kind.clone(),
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!(" Line {}", vuln.line), muted),
                ]));
                lines.push(Line::from(format!("  {}", vuln.description)));
                lines.push(Line::from(vec![
                    Span::styled("  Fix: ", muted),
                    Span::raw(vuln.recommendation.clone()),
                ]));
                lines.push(Line::default());
            }
        }
        AnalysisResult::Explain(explain) => {
            lines.push(Line::styled("Line by line", heading));
            for entry in &explain.line_by_line {
                lines.push(Line::styled(
                    entry.line.clone(),
                    Style::default().fg(palette.code),
                ));
                lines.push(parse_markdown_line(&format!("  {}", entry.explanation)));
                lines.push(Line::default());
            }
        }
    }

    lines
}

fn render_chat(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let border_color = if app.focus == FocusPane::Results {
        palette.focus
    } else {
        palette.border
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chat about {} ", app.analysis_type.label()));

    let history = app.chat.as_ref().map(|c| c.history.as_slice()).unwrap_or(&[]);
    let waiting = app.is_chat_pending()
        && history.last().map(|m| m.role) != Some(ChatRole::Model);

    let chat_text = if history.is_empty() && !waiting {
        Text::from(Span::styled(
            "Ask a follow-up question about the analyzed code...",
            Style::default().fg(palette.muted),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in history {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                }
                ChatRole::Model => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    lines.extend(msg.content.lines().map(parse_markdown_line));
                }
            }
            lines.push(Line::default());
        }

        if waiting {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots(app)),
                Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    let editing = app.input_mode == InputMode::Editing && app.focus == FocusPane::ChatInput;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { palette.border }))
        .title(" Ask (c to type, Enter to send) ");

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;
    let scroll_offset = if inner_width > 0 && cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match (app.input_mode, app.focus) {
        (InputMode::Editing, FocusPane::Editor) => " EDIT ",
        (InputMode::Editing, _) => " CHAT ",
        _ => " NORMAL ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: Vec<(&str, &str)> = match (app.input_mode, app.focus) {
        (InputMode::Editing, FocusPane::Editor) => vec![
            ("Esc", "done"),
            ("arrows", "move"),
            ("PgUp/PgDn", "page"),
        ],
        (InputMode::Editing, _) => vec![("Enter", "send"), ("Esc", "stop typing")],
        (InputMode::Normal, focus) => {
            let mut pairs = vec![("r/o/s/e", "analyze")];
            if focus == FocusPane::Editor {
                pairs.push(("i", "edit"));
            } else {
                pairs.push(("j/k", "scroll"));
            }
            if app.chat_available() {
                pairs.push(("c", "chat"));
                pairs.push(("1/2", "tab"));
            }
            pairs.extend([
                ("Tab", "focus"),
                ("L", "language"),
                ("t", "theme"),
                ("q", "quit"),
            ]);
            pairs
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    for (key, label) in pairs {
        spans.push(Span::styled(format!(" {} ", key), key_style));
        spans.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// A `width` x `height` rectangle centered in `area`.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    )
}

fn render_language_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let languages = SupportedLanguage::all();
    let popup_area = centered(area, 36, languages.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Language (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = languages
        .iter()
        .map(|language| {
            let style = if *language == app.language {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", language.display_name())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.language_picker_state);
}

fn render_notification(message: &str, frame: &mut Frame, area: Rect) {
    let popup_area = centered(area, 60, 8);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error ");

    let text = Text::from(vec![
        Line::from(message.to_string()),
        Line::default(),
        Line::styled("Press any key to dismiss", Style::default().fg(Color::DarkGray)),
    ]);

    let popup = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    frame.render_widget(popup, popup_area);
}
