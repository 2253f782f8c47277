//! Generation response events.
//!
//! The [`Event`] enum represents what a [`super::LanguageModel`] streams back while
//! generating a response. Unlike a chat-assistant trait there is no tool-call or
//! built-in-tool-result variant here: the Generator Driver only ever streams
//! answer text, token by token, and the caller accumulates it (or forwards it to
//! a UI) as it arrives.

use alloc::string::String;

/// A single event emitted while a [`super::LanguageModel`] generates a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Visible text chunk from the model.
    ///
    /// Chunks should be concatenated in arrival order to form the complete answer.
    Text(String),
}

impl Event {
    /// Creates a text event.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Returns the text content if this is a Text event.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
        }
    }

    /// Returns true if this is a text event.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_constructors() {
        let text = Event::text("hello");
        assert!(text.is_text());
        assert_eq!(text.as_text(), Some("hello"));
    }
}
