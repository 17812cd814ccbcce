//! One-shot question.

use std::sync::Arc;

use anyhow::Result;
use ichat_core::client::ChatClient;
use ichat_core::interrupt::InterruptedError;
use ichat_core::session::{ChatSession, ExchangeOutcome, ResponseMode};

use super::chat;
use crate::cli::AppContext;
use crate::render::TranscriptRenderer;

pub async fn run(ctx: &AppContext, question: &str, mode: ResponseMode) -> Result<()> {
    let client = ChatClient::new(ctx.client.clone(), Arc::clone(&ctx.tokens))?;
    let mut session = ChatSession::new(client, mode);
    let mut renderer = TranscriptRenderer::new(ctx.client.base_url.clone()).without_user_echo();

    match chat::exchange(&mut session, &mut renderer, question).await {
        ExchangeOutcome::Completed => Ok(()),
        // The renderer already printed the failure reason.
        ExchangeOutcome::Failed(e) => anyhow::bail!("Question failed ({})", e.kind),
        ExchangeOutcome::Interrupted => Err(InterruptedError.into()),
        ExchangeOutcome::Rejected => anyhow::bail!("Question cannot be empty"),
    }
}
