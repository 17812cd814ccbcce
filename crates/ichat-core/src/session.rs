//! Exchange driver.
//!
//! Runs one question/answer exchange against the backend and feeds the
//! results into a `Transcript`. Every exchange that starts also finalizes:
//! success, backend failure, a truncated stream and cancellation all leave
//! the placeholder with `loading == false`.

use std::future::Future;

use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::chat::{ChatEvent, Transcript};
use crate::client::ChatClient;
pub use crate::config::ResponseMode;
use crate::error::{ChatError, ChatResult};

/// Failure reason recorded when the stream closes before `[DONE]`.
pub const TRUNCATED_REASON: &str = "stream ended before completion";
/// Failure reason recorded when the caller cancels an exchange.
pub const INTERRUPTED_REASON: &str = "interrupted";

/// How one `send` call ended.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    Completed,
    Failed(ChatError),
    Interrupted,
    /// Blank input, or an exchange was already in flight
    Rejected,
}

impl ExchangeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed)
    }
}

/// A transcript bound to a backend client.
#[derive(Debug)]
pub struct ChatSession {
    client: ChatClient,
    transcript: Transcript,
    mode: ResponseMode,
}

impl ChatSession {
    pub fn new(client: ChatClient, mode: ResponseMode) -> Self {
        Self {
            client,
            transcript: Transcript::new(),
            mode,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    /// Sends `text` and drives the exchange to completion.
    ///
    /// `on_update` runs after every transcript change. If `cancel` resolves
    /// first, the request is dropped and the placeholder is failed.
    pub async fn send<C, F>(&mut self, text: &str, cancel: C, mut on_update: F) -> ExchangeOutcome
    where
        C: Future<Output = ()>,
        F: FnMut(&Transcript),
    {
        if !self.transcript.submit(text) {
            debug!("submission rejected");
            return ExchangeOutcome::Rejected;
        }
        on_update(&self.transcript);

        let question = text.trim();
        info!(mode = ?self.mode, chars = question.len(), "exchange started");

        let finished = {
            let exchange = run_exchange(
                &self.client,
                self.mode,
                question,
                &mut self.transcript,
                &mut on_update,
            );
            tokio::select! {
                outcome = exchange => Some(outcome),
                () = cancel => None,
            }
        };

        match finished {
            Some(outcome) => outcome,
            None => {
                warn!("exchange interrupted");
                if self.transcript.apply_failure(INTERRUPTED_REASON) {
                    on_update(&self.transcript);
                }
                ExchangeOutcome::Interrupted
            }
        }
    }
}

async fn run_exchange<F>(
    client: &ChatClient,
    mode: ResponseMode,
    question: &str,
    transcript: &mut Transcript,
    on_update: &mut F,
) -> ExchangeOutcome
where
    F: FnMut(&Transcript),
{
    match mode {
        ResponseMode::Direct => match client.ask(question).await {
            Ok(answer) => {
                if transcript.apply_direct_result(answer.answer, answer.sources) {
                    on_update(transcript);
                }
                ExchangeOutcome::Completed
            }
            Err(e) => fail(transcript, on_update, e),
        },
        ResponseMode::Stream => match client.ask_stream(question).await {
            Ok(events) => drive_stream(transcript, events, on_update).await,
            Err(e) => fail(transcript, on_update, e),
        },
    }
}

/// Applies decoded events in order until `Done`, an error, or the end.
pub async fn drive_stream<S, F>(
    transcript: &mut Transcript,
    mut events: S,
    on_update: &mut F,
) -> ExchangeOutcome
where
    S: Stream<Item = ChatResult<ChatEvent>> + Unpin,
    F: FnMut(&Transcript),
{
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                debug!(?event, "applying event");
                let done = matches!(event, ChatEvent::Done);
                if transcript.apply_event(&event) {
                    on_update(transcript);
                }
                if done {
                    info!("exchange completed");
                    return ExchangeOutcome::Completed;
                }
            }
            Err(e) => return fail(transcript, on_update, e),
        }
    }

    fail(transcript, on_update, ChatError::stream(TRUNCATED_REASON))
}

fn fail<F>(transcript: &mut Transcript, on_update: &mut F, error: ChatError) -> ExchangeOutcome
where
    F: FnMut(&Transcript),
{
    warn!(kind = %error.kind, error = %error, "exchange failed");
    if transcript.apply_failure(&error.message) {
        on_update(transcript);
    }
    ExchangeOutcome::Failed(error)
}
