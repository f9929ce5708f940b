use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
};
use lexipen::host::{Element, ElementKind, InputType};
use lexipen::overlay::{OverlayState, SourceLanguage};
use lexipen::session::Notice;

use crate::App;
use crate::theme::Theme;
use crate::utils::{excerpt, indicator_cells, to_cells};

const CLOSE_LABEL: &str = "[x]";

/// Renders the page, the indicator, the overlay and the footer.
pub fn render(f: &mut Frame, app: &App) {
    let theme = Theme::default();
    let area = f.area();
    let vertical_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(area);

    let page_block = Block::default()
        .title(app.doc.url().to_string())
        .title_style(theme.page_title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.blurred_border));
    let page = page_block.inner(vertical_chunks[0]);
    f.render_widget(page_block, vertical_chunks[0]);

    let root = app.doc.root();
    for id in app.doc.descendants(root).into_iter().skip(1) {
        if !app.doc.is_rendered(id) {
            continue;
        }
        let Some(element) = app.doc.get(id) else {
            continue;
        };
        if let Some(cells) = to_cells(element.rect, page) {
            render_element(f, app, element, cells, &theme);
        }
    }

    if let Some(view) = app.session.indicator().view() {
        let label = format!(" ✎ {} ", view.label.text());
        let width = label.chars().count() as u16;
        if let Some(cells) = indicator_cells(view.anchor, width, app.doc.viewport(), page) {
            f.render_widget(Clear, cells);
            f.render_widget(Paragraph::new(label).style(theme.indicator), cells);
        }
    }

    if app.session.overlay().is_visible() {
        f.buffer_mut()
            .set_style(vertical_chunks[0], Style::default().add_modifier(Modifier::DIM));
        render_overlay(f, app, &theme);
    }

    render_footer(f, app, &theme, vertical_chunks[1]);
}

fn render_element(f: &mut Frame, app: &App, element: &Element, cells: Rect, theme: &Theme) {
    if element.kind == ElementKind::Block {
        let line = Rect { height: 1, ..cells };
        let para = Paragraph::new(element.text().to_string())
            .style(Style::default().fg(theme.text_secondary).add_modifier(Modifier::BOLD));
        f.render_widget(para, line);
        return;
    }

    let focused = app.doc.focused() == Some(element.id);
    let tracked = app.session.registry().contains(element.id);
    let mut text = match element.kind {
        ElementKind::Input(InputType::Password) => "•".repeat(element.text().chars().count()),
        _ => element.text().to_string(),
    };
    if focused {
        text.push('▏');
    }
    let border = if focused {
        theme.focus_border
    } else if tracked {
        theme.tracked_border
    } else {
        theme.blurred_border
    };

    f.render_widget(Clear, cells);
    // Too small for a frame: bare text on a dim background.
    if cells.height < 3 || cells.width < 4 {
        let para = Paragraph::new(text).style(Style::default().fg(theme.text).bg(theme.dim_bg));
        f.render_widget(para, cells);
        return;
    }
    let title = if tracked {
        format!("{} ✎", element.label)
    } else {
        element.label.clone()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let para = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(theme.text));
    f.render_widget(para, cells);
}

/// Where the overlay box sits for a terminal of `area`.
pub fn overlay_area(area: Rect) -> Rect {
    centered_rect(70, 60, area)
}

pub fn close_button_area(overlay: Rect) -> Rect {
    Rect {
        x: overlay.right().saturating_sub(CLOSE_LABEL.len() as u16 + 2),
        y: overlay.y,
        width: CLOSE_LABEL.len() as u16,
        height: 1,
    }
}

fn hint(key: &str, label: &str, theme: &Theme) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!("[{key}]"), theme.key_hint),
        Span::raw(format!(" {label}   ")),
    ]
}

fn render_overlay(f: &mut Frame, app: &App, theme: &Theme) {
    let popup_area = overlay_area(f.area());
    f.render_widget(Clear, popup_area);
    let block = Block::default()
        .title(" Lexi ")
        .title_style(theme.overlay_title)
        .borders(Borders::ALL)
        .style(theme.overlay_border);
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);
    f.render_widget(
        Paragraph::new(CLOSE_LABEL).style(theme.key_hint),
        close_button_area(popup_area),
    );

    let para = |lines: Vec<Line<'static>>| {
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .style(theme.overlay_text)
    };

    match app.session.overlay().state() {
        OverlayState::Hidden => {}
        OverlayState::ActionMenu(menu) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Original: ", theme.original),
                    Span::raw(excerpt(&menu.original, inner.width.saturating_sub(12) as usize)),
                ]),
                Line::from(""),
                Line::from(hint("g", "Grammar check", theme)),
                Line::from(hint("t", if menu.tone_menu_open { "Change tone ▾" } else { "Change tone ▸" }, theme)),
            ];
            if menu.tone_menu_open {
                let mut tones = vec![Span::raw("      ")];
                tones.extend(hint("p", "Professional", theme));
                tones.extend(hint("c", "Casual", theme));
                lines.push(Line::from(tones));
            }
            lines.push(Line::from(hint(
                "l",
                if menu.translation.is_some() { "Translate ▾" } else { "Translate ▸" },
                theme,
            )));
            if let Some(form) = &menu.translation {
                let source = match form.source {
                    SourceLanguage::Detecting { .. } => "Detecting...".to_string(),
                    SourceLanguage::Detected(language) => language.to_string(),
                };
                let mut row = vec![
                    Span::raw(format!("      From: {source}   To: ")),
                    Span::styled(format!("◂ {} ▸", form.target), Style::default().fg(theme.text_highlight)),
                    Span::raw("   "),
                ];
                row.extend(hint("Enter", "Translate", theme));
                lines.push(Line::from(row));
            }
            f.render_widget(para(lines), inner);
        }
        OverlayState::WritingPrompt(prompt) => {
            let mut lines = vec![
                Line::from(Span::styled("What would you like to write?", theme.overlay_title)),
                Line::from(""),
                Line::from(vec![
                    Span::raw("> "),
                    Span::raw(app.form.prompt.clone()),
                    Span::styled("▏", Style::default().fg(theme.focus_border)),
                ]),
                Line::from(""),
                Line::from(vec![
                    Span::raw("Tone: "),
                    Span::styled(app.form.tone.title(), Style::default().fg(theme.text_highlight)),
                    Span::styled("  [Tab]", theme.key_hint),
                    Span::raw("   Length: "),
                    Span::styled(app.form.length.as_str(), Style::default().fg(theme.text_highlight)),
                    Span::styled("  [Shift+Tab]", theme.key_hint),
                ]),
            ];
            if let Some(message) = &prompt.validation {
                lines.push(Line::from(Span::styled(message.clone(), theme.validation)));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(hint("Enter", "Generate", theme)));
            f.render_widget(para(lines), inner);
        }
        OverlayState::Loading(loading) => {
            let lines = vec![
                Line::from(Span::styled(loading.action_label.clone(), theme.overlay_title)),
                Line::from(""),
                Line::from(Span::styled(
                    format!("⏳ {}", loading.message),
                    Style::default().fg(theme.text_secondary),
                )),
            ];
            f.render_widget(para(lines), inner);
        }
        OverlayState::Comparison(view) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)])
                .split(inner);
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(rows[0]);
            let original = Paragraph::new(view.original.clone())
                .block(Block::default().title("Original").borders(Borders::ALL))
                .wrap(Wrap { trim: false })
                .style(theme.original);
            let candidate = Paragraph::new(view.candidate.clone())
                .block(Block::default().title(view.action_label.clone()).borders(Borders::ALL))
                .wrap(Wrap { trim: false })
                .style(theme.candidate);
            f.render_widget(original, columns[0]);
            f.render_widget(candidate, columns[1]);
            f.render_widget(Paragraph::new(result_hints(theme)), rows[1]);
        }
        OverlayState::GeneratedContent(view) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(1)])
                .split(inner);
            let candidate = Paragraph::new(view.candidate.clone())
                .block(Block::default().title("Generated Content").borders(Borders::ALL))
                .wrap(Wrap { trim: false })
                .style(theme.candidate);
            f.render_widget(candidate, rows[0]);
            f.render_widget(Paragraph::new(result_hints(theme)), rows[1]);
        }
        OverlayState::Failed(failed) => {
            let mut retry = hint("Enter", "Retry", theme);
            retry.extend(hint("r", "Dismiss", theme));
            let lines = vec![
                Line::from(Span::styled(format!("{} failed", failed.action_label), theme.error)),
                Line::from(""),
                Line::from(failed.message.clone()),
                Line::from(""),
                Line::from(retry),
            ];
            f.render_widget(para(lines), inner);
        }
    }
}

fn result_hints(theme: &Theme) -> Line<'static> {
    let mut spans = hint("a", "Approve", theme);
    spans.extend(hint("r", "Reject", theme));
    spans.extend(hint("c", "Copy", theme));
    Line::from(spans)
}

fn render_footer(f: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let keys = if app.session.overlay().is_visible() {
        "Esc Close | Ctrl+Q Quit"
    } else {
        "Tab/Shift+Tab Focus | Ctrl+Space Lexi | Ctrl+N/Ctrl+R Comments | F5 Test detection | F6 Test AI | Esc Blur | Ctrl+Q Quit"
    };
    let status = match app.session.notice() {
        Some(Notice::Applied(id)) => {
            let label = app.doc.get(*id).map(|e| e.label.as_str()).unwrap_or("field");
            format!("Changes applied to {label}")
        }
        Some(Notice::Rejected) => "Changes discarded".to_string(),
        Some(Notice::Error(message)) => message.clone(),
        None => app.status(),
    };
    let line = Line::from(vec![
        Span::raw(format!("{keys} | ")),
        Span::styled(status, Style::default().fg(theme.text_highlight)),
        Span::raw(format!(" | {} fields tracked", app.session.registry().len())),
    ]);
    let footer = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .style(theme.footer);
    f.render_widget(footer, area);
}

/// Centers a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default().direction(Direction::Vertical)
        .constraints([Constraint::Percentage((100-percent_y)/2), Constraint::Percentage(percent_y), Constraint::Percentage((100-percent_y)/2)]).split(r)[1];
    Layout::default().direction(Direction::Horizontal)
        .constraints([Constraint::Percentage((100-percent_x)/2), Constraint::Percentage(percent_x), Constraint::Percentage((100-percent_x)/2)]).split(vertical)[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_button_sits_in_the_top_border() {
        let overlay = overlay_area(Rect::new(0, 0, 100, 40));
        let close = close_button_area(overlay);
        assert_eq!(close.y, overlay.y);
        assert!(close.x > overlay.x && close.right() < overlay.right());
    }
}
