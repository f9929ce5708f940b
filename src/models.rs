use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GrammarCheck,
    ChangeTone,
    Translate,
    Generate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Casual,
    Professional,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Casual => "casual",
            Tone::Professional => "professional",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Tone::Casual => "Casual",
            Tone::Professional => "Professional",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Tone::Casual => Tone::Professional,
            Tone::Professional => Tone::Casual,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Length {
    pub fn as_str(self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Length::Short => Length::Medium,
            Length::Medium => Length::Long,
            Length::Long => Length::Short,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Ja,
    Zh,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::En,
        Language::Es,
        Language::Fr,
        Language::De,
        Language::It,
        Language::Pt,
        Language::Ja,
        Language::Zh,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Ja => "ja",
            Language::Zh => "zh",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
            Language::It => "Italian",
            Language::Pt => "Portuguese",
            Language::Ja => "Japanese",
            Language::Zh => "Chinese",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|l| l.code() == code || l.name().eq_ignore_ascii_case(&code))
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|l| *l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|l| *l == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action together with the parameters collected for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    GrammarCheck,
    ChangeTone(Tone),
    Translate {
        source: Option<Language>,
        target: Language,
    },
    Generate {
        prompt: String,
        tone: Tone,
        length: Length,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::GrammarCheck => ActionKind::GrammarCheck,
            ActionRequest::ChangeTone(_) => ActionKind::ChangeTone,
            ActionRequest::Translate { .. } => ActionKind::Translate,
            ActionRequest::Generate { .. } => ActionKind::Generate,
        }
    }

    /// Heading shown above a result, e.g. "Professional Tone".
    pub fn label(&self) -> String {
        match self {
            ActionRequest::GrammarCheck => "Grammar Check".to_string(),
            ActionRequest::ChangeTone(tone) => format!("{} Tone", tone.title()),
            ActionRequest::Translate { .. } => "Translation".to_string(),
            ActionRequest::Generate { .. } => "Generated Content".to_string(),
        }
    }

    pub fn loading_message(&self) -> &'static str {
        match self {
            ActionRequest::GrammarCheck => "Checking grammar...",
            ActionRequest::ChangeTone(_) => "Adjusting tone...",
            ActionRequest::Translate { .. } => "Translating...",
            ActionRequest::Generate { .. } => "Generating your content...",
        }
    }
}

/// In-flight transformation. `token` identifies it against later requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub token: u64,
    pub request: ActionRequest,
    pub original: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_lookup_accepts_codes_and_names() {
        assert_eq!(Language::from_code("DE"), Some(Language::De));
        assert_eq!(Language::from_code(" spanish\n"), Some(Language::Es));
        assert_eq!(Language::from_code("klingon"), None);
    }

    #[test]
    fn language_cycle_wraps() {
        assert_eq!(Language::Zh.next(), Language::En);
        assert_eq!(Language::En.prev(), Language::Zh);
    }

    #[test]
    fn labels_follow_parameters() {
        assert_eq!(ActionRequest::ChangeTone(Tone::Professional).label(), "Professional Tone");
        assert_eq!(ActionRequest::GrammarCheck.kind(), ActionKind::GrammarCheck);
    }
}
