//! Terminal renderer for a transcript.
//!
//! Content goes to stdout; status lines (loading, errors) go to stderr. The
//! renderer is fed the whole transcript after every change and prints only
//! what it has not printed yet.

use std::io::{Stderr, Stdout, Write, stderr, stdout};

use ichat_core::chat::{Message, Role, Source, Transcript};

pub const WELCOME_BANNER: &str = "\
Hello! I'm IFSCA IntelliChat 🤖
Your dedicated AI assistant, here to provide you with quick access to internal
resources, up-to-date regulatory information, and step-by-step guidance.
Ask a question. Type /quit or press Ctrl+C to leave.";

pub struct TranscriptRenderer<O: Write = Stdout, E: Write = Stderr> {
    out: O,
    err: E,
    base_url: String,
    echo_user: bool,
    /// Index of the first message not yet fully rendered.
    cursor: usize,
    /// Assistant content already written for the message at `cursor`.
    printed: String,
    loading_shown: bool,
    /// Whether the final newline has been printed after assistant output.
    needs_final_newline: bool,
}

impl TranscriptRenderer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_writers(stdout(), stderr(), base_url)
    }
}

impl<O: Write, E: Write> TranscriptRenderer<O, E> {
    pub fn with_writers(out: O, err: E, base_url: impl Into<String>) -> Self {
        Self {
            out,
            err,
            base_url: base_url.into(),
            echo_user: true,
            cursor: 0,
            printed: String::new(),
            loading_shown: false,
            needs_final_newline: false,
        }
    }

    /// Skips `You: ...` lines, for one-shot commands where the question is
    /// already on the command line.
    #[must_use]
    pub fn without_user_echo(mut self) -> Self {
        self.echo_user = false;
        self
    }

    pub fn welcome(&mut self) {
        let _ = writeln!(self.out, "{WELCOME_BANNER}");
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    /// Renders everything in `transcript` that has not been rendered yet.
    pub fn render(&mut self, transcript: &Transcript) {
        let messages = transcript.messages();
        while let Some(message) = messages.get(self.cursor) {
            match message.role {
                Role::User => {
                    if self.echo_user {
                        let _ = writeln!(self.out, "You: {}", message.content);
                    }
                    self.advance();
                }
                Role::Assistant => {
                    if !self.render_assistant(message) {
                        break;
                    }
                    self.advance();
                }
            }
        }
        let _ = self.out.flush();
        let _ = self.err.flush();
    }

    /// Returns true once the message is finalized and fully written.
    fn render_assistant(&mut self, message: &Message) -> bool {
        if message.error {
            self.finish_line();
            let _ = writeln!(self.err, "✗ {}", message.content);
            return true;
        }

        if message.loading && message.content.is_empty() {
            if !self.loading_shown {
                let _ = writeln!(self.err, "Loading...");
                self.loading_shown = true;
            }
            return false;
        }

        if let Some(delta) = message.content.strip_prefix(self.printed.as_str()) {
            let _ = write!(self.out, "{delta}");
        } else {
            // Content was replaced wholesale; start over on a fresh line.
            self.finish_line();
            let _ = write!(self.out, "{}", message.content);
        }
        self.printed.clone_from(&message.content);
        self.needs_final_newline = !message.content.is_empty();

        if message.loading {
            return false;
        }

        self.finish_line();
        self.write_sources(&message.sources);
        true
    }

    fn write_sources(&mut self, sources: &[Source]) {
        if sources.is_empty() {
            let _ = writeln!(self.out, "No sources provided");
            return;
        }

        let _ = writeln!(self.out, "Sources:");
        for source in sources {
            match source.locator() {
                Some(locator) => {
                    let _ = writeln!(
                        self.out,
                        "  - {}: {}",
                        file_name(locator),
                        resolve_link(&self.base_url, locator)
                    );
                }
                None => {
                    let _ = writeln!(self.out, "  - (source unavailable)");
                }
            }
        }
    }

    fn finish_line(&mut self) {
        if self.needs_final_newline {
            let _ = writeln!(self.out);
            self.needs_final_newline = false;
        }
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.printed.clear();
        self.loading_shown = false;
        self.needs_final_newline = false;
    }

    #[cfg(test)]
    fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}

/// Display name for a source locator: its last path segment.
pub fn file_name(locator: &str) -> &str {
    let trimmed = locator.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Absolute locators are kept; relative ones are joined to the backend root.
pub fn resolve_link(base_url: &str, locator: &str) -> String {
    if url::Url::parse(locator).is_ok() {
        return locator.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        locator.trim_start_matches('/')
    )
}
