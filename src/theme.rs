use ratatui::style::{Color, Modifier, Style};

pub struct Theme {
    pub focus_border: Color,
    pub blurred_border: Color,
    pub tracked_border: Color,
    pub text: Color,
    pub text_secondary: Color,
    pub text_highlight: Color,
    pub dim_bg: Color,

    // Specific components
    pub page_title: Style,
    pub indicator: Style,
    pub overlay_title: Style,
    pub overlay_border: Style,
    pub overlay_text: Style,
    pub original: Style,
    pub candidate: Style,
    pub key_hint: Style,
    pub validation: Style,
    pub error: Style,
    pub footer: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            focus_border: Color::Cyan,
            blurred_border: Color::DarkGray,
            tracked_border: Color::Green,
            text: Color::White,
            text_secondary: Color::Gray,
            text_highlight: Color::Yellow,
            dim_bg: Color::Rgb(30, 30, 30),

            page_title: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            indicator: Style::default().fg(Color::Black).bg(Color::Magenta).add_modifier(Modifier::BOLD),
            overlay_title: Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            overlay_border: Style::default().fg(Color::Magenta).bg(Color::Black),
            overlay_text: Style::default().fg(Color::White),
            original: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
            candidate: Style::default().fg(Color::Green),
            key_hint: Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            validation: Style::default().fg(Color::Red).add_modifier(Modifier::ITALIC),
            error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            footer: Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        }
    }
}
