//! Clipboard collaborator used by link formatting.

/// Host clipboard access. Only [`crate::MarkdownToggler`] talks to this trait.
pub trait Clipboard {
    /// Current plain-text contents, if any.
    fn read_text(&self) -> Option<String>;
    fn write_text(&mut self, text: &str);
}

/// In-process clipboard (tests, headless hosts).
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<String>,
    writes: usize,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            contents: Some(text.into()),
            writes: 0,
        }
    }

    /// Number of `write_text` calls observed.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Clipboard for MemoryClipboard {
    fn read_text(&self) -> Option<String> {
        self.contents.clone()
    }

    fn write_text(&mut self, text: &str) {
        self.contents = Some(text.to_string());
        self.writes += 1;
    }
}

const URL_PREFIXES: [&str; 3] = ["http://", "https://", "www."];

/// Clipboard text that should become a link target.
pub fn url_candidate(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    URL_PREFIXES
        .iter()
        .any(|p| trimmed.starts_with(p))
        .then_some(trimmed)
}
