//! Transcript reducer.
//!
//! Owns the ordered message list and applies one state transition per call.
//! Each exchange moves its assistant placeholder through
//! `created (loading) -> zero or more content updates -> finalized`, where
//! finalization happens through exactly one of `Done`, a direct result, or a
//! failure. Calls that arrive when nothing is loading are ignored; the return
//! value reports whether the transcript changed.

use super::types::{ChatEvent, Message, Source};

/// Ordered list of chat messages for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True iff the last message is an assistant answer still in flight.
    pub fn is_loading(&self) -> bool {
        self.messages.last().is_some_and(|m| m.loading)
    }

    /// Owned copy for renderers that must not hold a borrow.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Starts an exchange: appends the user message and a loading placeholder.
    ///
    /// No-op when `text` is blank or another exchange is still loading.
    pub fn submit(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.is_loading() {
            return false;
        }

        self.messages.push(Message::user(trimmed));
        self.messages.push(Message::assistant_placeholder());
        true
    }

    /// Applies one decoded stream event to the loading placeholder.
    pub fn apply_event(&mut self, event: &ChatEvent) -> bool {
        let Some(current) = self.loading_mut() else {
            return false;
        };

        match event {
            ChatEvent::Definition { text, sources } => {
                current.content.clone_from(text);
                current.sources.clone_from(sources);
            }
            ChatEvent::TextChunk { text } => current.content.push_str(text),
            ChatEvent::Done => current.loading = false,
        }
        true
    }

    /// Finalizes the placeholder with a complete, non-streamed answer.
    pub fn apply_direct_result(&mut self, answer: impl Into<String>, sources: Vec<Source>) -> bool {
        let Some(current) = self.loading_mut() else {
            return false;
        };

        current.content = answer.into();
        current.sources = sources;
        current.loading = false;
        true
    }

    /// Finalizes the placeholder as failed.
    ///
    /// Replaces any partial content with a description of the failure.
    pub fn apply_failure(&mut self, reason: &str) -> bool {
        let Some(current) = self.loading_mut() else {
            return false;
        };

        current.loading = false;
        current.error = true;
        current.content = format!("Error: {reason}");
        true
    }

    fn loading_mut(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|m| m.loading && m.is_assistant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::Role;

    fn chunk(text: &str) -> ChatEvent {
        ChatEvent::TextChunk {
            text: text.to_string(),
        }
    }

    fn assert_invariant(transcript: &Transcript) {
        let loading: Vec<usize> = transcript
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.loading)
            .map(|(i, _)| i)
            .collect();
        assert!(loading.len() <= 1);
        if let Some(&idx) = loading.first() {
            assert_eq!(idx, transcript.len() - 1);
            assert_eq!(transcript.messages()[idx].role, Role::Assistant);
        }
    }

    #[test]
    fn test_submit_blank_is_noop() {
        let mut transcript = Transcript::new();
        assert!(!transcript.submit("  "));
        assert!(!transcript.submit(""));
        assert_eq!(transcript.len(), 0);
    }

    #[test]
    fn test_submit_creates_user_and_placeholder() {
        let mut transcript = Transcript::new();
        assert!(transcript.submit("  hi  "));

        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(messages[1], Message::assistant_placeholder());
        assert!(transcript.is_loading());
        assert_invariant(&transcript);
    }

    #[test]
    fn test_submit_while_loading_is_noop() {
        let mut transcript = Transcript::new();
        transcript.submit("hi");
        assert!(!transcript.submit("again"));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_streamed_chunks_then_done() {
        let mut transcript = Transcript::new();
        transcript.submit("hi");
        assert!(transcript.apply_event(&chunk("He")));
        assert!(transcript.apply_event(&chunk("llo")));
        assert!(transcript.is_loading());
        assert!(transcript.apply_event(&ChatEvent::Done));

        let last = transcript.last().unwrap();
        assert_eq!(last.content, "Hello");
        assert!(!last.loading);
        assert!(!last.error);
        assert!(!transcript.is_loading());
        assert_invariant(&transcript);
    }

    #[test]
    fn test_definition_replaces_content_and_sources() {
        let mut transcript = Transcript::new();
        transcript.submit("what is IFSC?");
        transcript.apply_event(&chunk("partial "));
        transcript.apply_event(&ChatEvent::Definition {
            text: "International Financial Services Centre".to_string(),
            sources: vec![Source::new("a.pdf")],
        });

        let last = transcript.last().unwrap();
        assert_eq!(last.content, "International Financial Services Centre");
        assert_eq!(last.sources, vec![Source::new("a.pdf")]);
        assert!(last.loading);
    }

    #[test]
    fn test_chunk_after_definition_appends() {
        let mut transcript = Transcript::new();
        transcript.submit("q");
        transcript.apply_event(&ChatEvent::Definition {
            text: "A".to_string(),
            sources: vec![],
        });
        transcript.apply_event(&chunk("B"));
        assert_eq!(transcript.last().unwrap().content, "AB");
    }

    #[test]
    fn test_failure_then_done_is_noop() {
        let mut transcript = Transcript::new();
        transcript.submit("hi");
        transcript.apply_event(&chunk("half an ans"));
        assert!(transcript.apply_failure("network down"));

        let after_failure = transcript.clone();
        let last = transcript.last().unwrap();
        assert!(!last.loading);
        assert!(last.error);
        assert!(last.content.contains("network down"));

        assert!(!transcript.apply_event(&ChatEvent::Done));
        assert!(!transcript.apply_event(&chunk("late")));
        assert_eq!(transcript, after_failure);
    }

    #[test]
    fn test_done_is_idempotent() {
        let mut once = Transcript::new();
        once.submit("hi");
        once.apply_event(&chunk("x"));
        once.apply_event(&ChatEvent::Done);

        let mut twice = once.clone();
        assert!(!twice.apply_event(&ChatEvent::Done));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_direct_result_finalizes_in_one_step() {
        let mut transcript = Transcript::new();
        transcript.submit("hi");
        assert!(transcript.apply_direct_result("answer", vec![Source::unavailable()]));

        let last = transcript.last().unwrap();
        assert_eq!(last.content, "answer");
        assert_eq!(last.sources, vec![Source::unavailable()]);
        assert!(!last.loading);
        assert!(!transcript.apply_direct_result("again", vec![]));
    }

    #[test]
    fn test_updates_without_placeholder_are_noops() {
        let mut transcript = Transcript::new();
        assert!(!transcript.apply_event(&chunk("x")));
        assert!(!transcript.apply_failure("boom"));
        assert!(!transcript.apply_direct_result("x", vec![]));
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_next_exchange_after_finalize() {
        let mut transcript = Transcript::new();
        transcript.submit("one");
        transcript.apply_event(&ChatEvent::Done);
        assert!(transcript.submit("two"));
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript.messages()[0].content, "one");
        assert_eq!(transcript.messages()[2].content, "two");
        assert_invariant(&transcript);
    }
}
