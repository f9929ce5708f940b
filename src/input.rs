use anyhow::Result;
use arboard::Clipboard;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::runtime::Handle;

use lexipen::host::{ElementKind, HostDocument};
use lexipen::models::{ActionRequest, Language, Length, Tone};
use lexipen::overlay::{ClickTarget, OverlayActions, OverlayState, SubPanel};

use crate::App;
use crate::ui;
use crate::utils::contains;

/// View-side form values that only reach the controller on submit.
#[derive(Debug, Default)]
pub struct OverlayForm {
    pub prompt: String,
    pub tone: Tone,
    pub length: Length,
}

/// Returns `Ok(false)` when the user asked to quit.
pub fn handle_key(key: KeyEvent, app: &mut App, rt: &Handle) -> Result<bool> {
    if key.kind == KeyEventKind::Release {
        return Ok(true);
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('q') {
        return Ok(false);
    }

    if app.session.overlay().is_visible() {
        let state = app.session.overlay().state().clone();
        let mut actions = app.session.actions(&mut app.doc);
        if let Some(copied) = overlay_key(key, &state, &mut app.form, &mut actions) {
            app.set_status(copied);
        }
        return Ok(true);
    }

    match key.code {
        KeyCode::Tab => cycle_focus(&mut app.doc, true),
        KeyCode::BackTab => cycle_focus(&mut app.doc, false),
        KeyCode::Esc => app.doc.blur(),
        KeyCode::F(2) => open_overlay(app),
        KeyCode::Char(' ') if ctrl => open_overlay(app),
        KeyCode::Char('n') if ctrl => app.insert_comments(),
        KeyCode::Char('r') if ctrl => app.remove_comments(),
        KeyCode::F(5) => app.run_diagnostics(rt),
        KeyCode::F(6) => app.run_ai_check(rt),
        KeyCode::Backspace => {
            if let Some(field) = app.doc.focused() {
                app.doc.backspace(field);
            }
        }
        KeyCode::Enter => {
            let multiline = app
                .doc
                .focused()
                .and_then(|f| app.doc.get(f))
                .is_some_and(|e| matches!(e.kind, ElementKind::TextArea | ElementKind::Editable));
            if let (true, Some(field)) = (multiline, app.doc.focused()) {
                app.doc.type_text(field, "\n");
            }
        }
        KeyCode::Char(c) if !ctrl => {
            if let Some(field) = app.doc.focused() {
                app.doc.type_text(field, c.encode_utf8(&mut [0; 4]));
            }
        }
        _ => {}
    }
    Ok(true)
}

fn open_overlay(app: &mut App) {
    app.form = OverlayForm::default();
    if app.session.click_indicator(&app.doc).is_none() {
        app.set_status("Focus a text field first");
    }
}

fn cycle_focus(doc: &mut HostDocument, forward: bool) {
    let order = doc.focus_order();
    if order.is_empty() {
        return;
    }
    let current = doc.focused().and_then(|f| order.iter().position(|id| *id == f));
    let next = match (current, forward) {
        (None, true) => 0,
        (None, false) => order.len() - 1,
        (Some(i), true) => (i + 1) % order.len(),
        (Some(i), false) => (i + order.len() - 1) % order.len(),
    };
    doc.focus(order[next]);
}

/// Keys while the overlay is up. Returns a status message when something
/// was copied to the clipboard.
pub fn overlay_key(
    key: KeyEvent,
    state: &OverlayState,
    form: &mut OverlayForm,
    actions: &mut dyn OverlayActions,
) -> Option<String> {
    if key.code == KeyCode::Esc {
        actions.on_close();
        return None;
    }
    match state {
        OverlayState::Hidden => {}
        OverlayState::ActionMenu(menu) => match key.code {
            KeyCode::Char('g') => actions.on_action(ActionRequest::GrammarCheck),
            KeyCode::Char('t') => actions.on_toggle(SubPanel::ToneMenu),
            KeyCode::Char('l') => actions.on_toggle(SubPanel::Translation),
            KeyCode::Char('p') if menu.tone_menu_open => {
                actions.on_action(ActionRequest::ChangeTone(Tone::Professional));
            }
            KeyCode::Char('c') if menu.tone_menu_open => {
                actions.on_action(ActionRequest::ChangeTone(Tone::Casual));
            }
            KeyCode::Left | KeyCode::Right => {
                if let Some(translation) = &menu.translation {
                    let target = if key.code == KeyCode::Left {
                        translation.target.prev()
                    } else {
                        translation.target.next()
                    };
                    actions.on_target_language(target);
                }
            }
            KeyCode::Enter => {
                if let Some(translation) = &menu.translation {
                    actions.on_action(ActionRequest::Translate {
                        source: None,
                        target: translation.target,
                    });
                }
            }
            _ => {}
        },
        OverlayState::WritingPrompt(_) => match key.code {
            KeyCode::Enter => actions.on_action(ActionRequest::Generate {
                prompt: form.prompt.clone(),
                tone: form.tone,
                length: form.length,
            }),
            KeyCode::Tab => form.tone = form.tone.toggle(),
            KeyCode::BackTab => form.length = form.length.next(),
            KeyCode::Backspace => {
                form.prompt.pop();
            }
            KeyCode::Char(c) => form.prompt.push(c),
            _ => {}
        },
        OverlayState::Loading(_) => {}
        OverlayState::Comparison(_) | OverlayState::GeneratedContent(_) => match key.code {
            KeyCode::Enter | KeyCode::Char('a') => actions.on_approve(),
            KeyCode::Char('r') => actions.on_reject(),
            KeyCode::Char('c') => {
                let candidate = match state {
                    OverlayState::Comparison(view) => &view.candidate,
                    OverlayState::GeneratedContent(view) => &view.candidate,
                    _ => return None,
                };
                return Some(copy_to_clipboard(candidate));
            }
            _ => {}
        },
        OverlayState::Failed(_) => match key.code {
            KeyCode::Enter => actions.on_retry(),
            KeyCode::Char('r') => actions.on_reject(),
            _ => {}
        },
    }
    None
}

fn copy_to_clipboard(text: &str) -> String {
    match Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string())) {
        Ok(()) => "Copied to clipboard".to_string(),
        Err(e) => format!("Clipboard unavailable: {e}"),
    }
}

/// Presses outside the overlay box hit the scrim; the `[x]` in its top
/// border is the close button.
pub fn handle_mouse(mouse: MouseEvent, area: Rect, app: &mut App) {
    if mouse.kind != MouseEventKind::Down(MouseButton::Left) || !app.session.overlay().is_visible() {
        return;
    }
    let overlay = ui::overlay_area(area);
    let close = ui::close_button_area(overlay);
    let target = if contains(close, mouse.column, mouse.row) {
        ClickTarget::CloseButton
    } else if contains(overlay, mouse.column, mouse.row) {
        ClickTarget::Content
    } else {
        ClickTarget::Scrim
    };
    app.session.actions(&mut app.doc).on_click(target);
}
